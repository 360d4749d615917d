//! Several nodes sharing one loopback bus, each in its own thread.

use super::config;
use spoke_common::bus::{BusClient, LoopbackBus, LoopbackEndpoint, RequestError};
use spoke_common::node::config::NodeConfig;
use spoke_common::protocol::{Command, Parameter, Reply};
use spoke_node::drivers::simulation;
use spoke_node::hardware::MemoryStore;
use spoke_node::{LoopSettings, NodeContext, NodeCore, NodeError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(2);

// ── Helpers ─────────────────────────────────────────────────────────

struct RunningNode {
    running: Arc<AtomicBool>,
    handle: JoinHandle<Result<(), NodeError>>,
}

impl RunningNode {
    fn spawn(config: NodeConfig, bus: &LoopbackBus) -> Self {
        let (caps, _plant) = simulation::build(
            (&config).into(),
            config.hardware.dock_sensor,
            Box::new(MemoryStore::new()),
        );
        let ctx = NodeContext::boot(&config, caps).unwrap();
        let mut settings = LoopSettings::from(&config.node);
        settings.tick = Duration::from_micros(200);
        let mut core = NodeCore::new(ctx, bus.endpoint(), settings);
        let running = core.running_flag();
        let handle = thread::spawn(move || core.run());
        Self { running, handle }
    }

    fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        self.handle
            .join()
            .expect("node thread panicked")
            .expect("node loop failed");
    }
}

fn client(bus: &LoopbackBus) -> BusClient<LoopbackEndpoint> {
    BusClient::new(bus.endpoint()).with_poll_interval(Duration::from_micros(200))
}

fn ignore_events(_device: u8, _reply: Reply) {}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn nodes_answer_only_their_own_id() {
    let bus = LoopbackBus::new();
    let mut host = client(&bus);
    let four = RunningNode::spawn(config(4), &bus);
    let five = RunningNode::spawn(config(5), &bus);

    let reply = host
        .request(5, &Command::DispenseNearest, TIMEOUT, &mut ignore_events)
        .unwrap();
    assert_eq!(reply, Reply::DispenseNearest { ok: true, window: 1 });

    let Reply::Status(four_status) = host
        .request(4, &Command::GetStatus, TIMEOUT, &mut ignore_events)
        .unwrap()
    else {
        panic!("expected status from device 4");
    };
    let Reply::Status(five_status) = host
        .request(5, &Command::GetStatus, TIMEOUT, &mut ignore_events)
        .unwrap()
    else {
        panic!("expected status from device 5");
    };

    assert_eq!(four_status.device_id, 4);
    assert_eq!(four_status.window_index, 0);
    assert_eq!(four_status.filled_count(), 4);
    assert_eq!(five_status.device_id, 5);
    assert_eq!(five_status.window_index, 1);
    assert_eq!(five_status.filled_count(), 3);

    four.stop();
    five.stop();
}

#[test]
fn change_announcements_reach_the_event_sink() {
    let bus = LoopbackBus::new();
    let mut host = client(&bus);
    let mut announcing = config(4);
    announcing.node.announce_changes = true;
    let node = RunningNode::spawn(announcing, &bus);

    let reply = host
        .request(
            4,
            &Command::SetParameter(Parameter::SpokeCount(6)),
            TIMEOUT,
            &mut ignore_events,
        )
        .unwrap();
    assert_eq!(reply, Reply::Param { sub: 0x03, ok: true });

    let mut events = Vec::new();
    host.listen(Duration::from_millis(200), &mut |device, reply| {
        events.push((device, reply));
    })
    .unwrap();

    assert_eq!(events.len(), 1);
    let (device, Reply::Status(status)) = events[0] else {
        panic!("expected a status event, got {:?}", events[0]);
    };
    assert_eq!(device, 4);
    assert_eq!(status.spoke_count, 6);
    assert_eq!(status.slot_bitmap, 0b11_1110);

    node.stop();
}

#[test]
fn periodic_status_events() {
    let bus = LoopbackBus::new();
    let mut host = client(&bus);
    let mut periodic = config(7);
    periodic.node.status_interval_ms = 20;
    let node = RunningNode::spawn(periodic, &bus);

    let mut count = 0;
    host.listen(Duration::from_millis(200), &mut |device, reply| {
        assert_eq!(device, 7);
        assert!(matches!(reply, Reply::Status(_)));
        count += 1;
    })
    .unwrap();
    assert!(count >= 3, "only {count} events");

    node.stop();
}

#[test]
fn absent_device_times_out() {
    let bus = LoopbackBus::new();
    let mut host = client(&bus);
    let node = RunningNode::spawn(config(4), &bus);

    let result = host.request(
        9,
        &Command::GetStatus,
        Duration::from_millis(100),
        &mut ignore_events,
    );
    assert!(matches!(result, Err(RequestError::Timeout { device: 9, .. })));

    node.stop();
}

#[test]
fn gantry_commands_get_error_reply() {
    let bus = LoopbackBus::new();
    let mut host = client(&bus);
    let node = RunningNode::spawn(config(4), &bus);

    let reply = host
        .request(4, &Command::GantryHome, TIMEOUT, &mut ignore_events)
        .unwrap();
    assert_eq!(reply, Reply::Error);

    node.stop();
}

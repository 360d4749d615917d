//! Jams, interlock, manual rotation and storage failures.

use super::{boot, boot_with, config};
use spoke_common::protocol::Reply;
use spoke_node::hardware::MemoryStore;
use spoke_node::{NodeError, OperationError};

#[test]
fn jam_leaves_state_and_record_untouched() {
    let (mut node, store) = boot();
    node.request(&[0x01]);
    let slots_before = node.slots();
    let record_before = store.contents();

    node.plant.set_lost_step_ratio(1.0);
    let reply = node.request(&[0x01]);

    assert_eq!(reply, Reply::DispenseNearest { ok: false, window: 1 });
    assert_eq!(node.slots(), slots_before);
    assert_eq!(node.ctx.drum().window_index(), 1);
    assert_eq!(store.contents(), record_before);
    assert_eq!(node.plant.steps_lost(), 320);
}

#[test]
fn partial_slip_beyond_tolerance_is_a_jam() {
    let (mut node, _store) = boot();
    node.plant.set_lost_step_ratio(0.5);

    let err = node.ctx.dispense_nearest().unwrap_err();
    let OperationError::JamDetected { expected, actual } = err else {
        panic!("expected a jam, got {err:?}");
    };
    assert_eq!(expected, -819);
    assert!((actual + 410).abs() <= 1, "measured {actual}");
    assert_eq!(node.slots(), vec![0, 1, 1, 1, 1]);
}

#[test]
fn slip_within_tolerance_is_accepted() {
    let (mut node, _store) = boot();
    node.plant.set_lost_step_ratio(0.1);

    assert_eq!(node.ctx.dispense_nearest(), Ok(1));
}

#[test]
fn open_loop_never_reports_jams() {
    let mut config = config(4);
    config.node.verify_motion = false;
    let mut node = boot_with(&config, Box::new(MemoryStore::new()));
    node.plant.set_lost_step_ratio(1.0);

    assert_eq!(
        node.request(&[0x01]),
        Reply::DispenseNearest { ok: true, window: 1 }
    );
}

#[test]
fn dock_interlock_refuses_dispense_and_return() {
    let (mut node, _store) = boot();
    node.plant.set_dock_ready(false);

    assert_eq!(
        node.request(&[0x01]),
        Reply::DispenseNearest { ok: false, window: 0 }
    );
    assert_eq!(
        node.request(&[0x07, 2]),
        Reply::DispenseToSlot { ok: false, window: 0 }
    );
    assert_eq!(node.plant.steps_received(), 0);

    // configuration commands are not interlocked
    assert_eq!(node.request(&[0x05, 1, 0]), Reply::Slot { index: 1, ok: true });
    assert_eq!(
        node.request(&[0x02]),
        Reply::ReturnNearest { ok: false, window: 0 }
    );

    node.plant.set_dock_ready(true);
    assert_eq!(
        node.request(&[0x02]),
        Reply::ReturnNearest { ok: true, window: 1 }
    );
}

#[test]
fn manual_rotation_is_advisory() {
    let (mut node, _store) = boot();

    node.plant.rotate_by_hand(-1250.0);
    assert_eq!(node.ctx.poll_encoder(), None);
    node.plant.rotate_by_hand(-1250.0);
    assert_eq!(node.ctx.poll_encoder(), Some(-2500));

    // inventory is not rewritten and the next move still verifies
    assert_eq!(node.ctx.drum().window_index(), 0);
    assert_eq!(
        node.request(&[0x01]),
        Reply::DispenseNearest { ok: true, window: 1 }
    );
    assert_eq!(node.ctx.encoder().drift_since_anchor(), Some(0));
}

#[test]
fn manual_restock_re_anchors_the_encoder() {
    let (mut node, _store) = boot();

    node.plant.rotate_by_hand(-1250.0);
    assert_eq!(node.request(&[0x05, 2, 0]), Reply::Slot { index: 2, ok: true });
    assert_eq!(node.ctx.encoder().drift_since_anchor(), Some(0));

    // drift measured from the restock position, not the boot position
    node.plant.rotate_by_hand(-1250.0);
    assert_eq!(node.ctx.poll_encoder(), None);
}

#[test]
fn write_failure_is_fatal() {
    let (mut node, store) = boot();
    store.set_fail_writes(true);

    let result = node.send(&[0x01]);
    assert!(matches!(result, Err(NodeError::Persistence(_))));
}

#[test]
fn write_failure_at_boot_is_fatal() {
    let store = MemoryStore::new();
    store.set_fail_writes(true);
    let config = config(4);
    let (caps, _plant) = spoke_node::drivers::simulation::build(
        (&config).into(),
        config.hardware.dock_sensor,
        Box::new(store),
    );

    let result = spoke_node::NodeContext::boot(&config, caps);
    assert!(matches!(result, Err(NodeError::Persistence(_))));
}

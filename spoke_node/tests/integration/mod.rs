//! Shared fixtures for the integration tests.

mod faults;
mod multi_node;
mod restart;
mod routing;
mod scenarios;

use spoke_common::node::config::{DockSensorKind, NodeConfig};
use spoke_common::protocol::{Frame, Reply, command_id};
use spoke_node::drivers::simulation::{self, PlantConfig, PlantHandle};
use spoke_node::hardware::{MemoryStore, RecordStore};
use spoke_node::{Dispatcher, NodeContext, NodeError};

/// A booted node with its plant and dispatcher.
pub struct TestNode {
    pub ctx: NodeContext,
    pub plant: PlantHandle,
    pub dispatcher: Dispatcher,
}

impl TestNode {
    /// Deliver a command frame and return the reply.
    pub fn send(&mut self, data: &[u8]) -> Result<Option<Reply>, NodeError> {
        let frame = Frame::new(command_id(self.ctx.device_id()), data).unwrap();
        self.dispatcher.handle_frame(&mut self.ctx, &frame)
    }

    /// Deliver a command frame that must be answered.
    pub fn request(&mut self, data: &[u8]) -> Reply {
        self.send(data)
            .expect("operation should not be fatal")
            .expect("addressed frame should be answered")
    }

    /// Occupancy as `0`/`1` bytes.
    pub fn slots(&self) -> Vec<u8> {
        self.ctx.drum().slots().iter().map(|s| u8::from(*s)).collect()
    }
}

/// Default node configuration with the dock sensor wired.
pub fn config(device_id: u8) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.node.device_id = device_id;
    config.hardware.dock_sensor = DockSensorKind::Driver;
    config
}

/// Boot a node on fresh simulated hardware.
pub fn boot_with(config: &NodeConfig, store: Box<dyn RecordStore>) -> TestNode {
    let (caps, plant) =
        simulation::build(PlantConfig::from(config), config.hardware.dock_sensor, store);
    TestNode {
        ctx: NodeContext::boot(config, caps).expect("boot should succeed"),
        plant,
        dispatcher: Dispatcher::new(),
    }
}

/// Boot device 4 with an in-memory record store.
pub fn boot() -> (TestNode, MemoryStore) {
    let store = MemoryStore::new();
    let node = boot_with(&config(4), Box::new(store.clone()));
    (node, store)
}

//! Simulation hardware.
//!
//! Provides a software plant so a node runs without a motor, encoder or
//! dock. Tests keep the returned [`PlantHandle`] to inject jams, turn the
//! drum by hand or pull the dock.

mod devices;
mod plant;

pub use devices::{SimAngleSensor, SimDockSensor, SimPulseGenerator};
pub use plant::{Plant, PlantConfig, PlantHandle};

use super::record_store_for;
use crate::hardware::{AlwaysReady, Capabilities, DockSensor, HardwareError, RecordStore};
use parking_lot::Mutex;
use spoke_common::node::config::{DockSensorKind, NodeConfig};
use std::sync::Arc;
use tracing::info;

/// Build simulated capabilities around a fresh plant.
pub fn build(
    config: PlantConfig,
    dock: DockSensorKind,
    store: Box<dyn RecordStore>,
) -> (Capabilities, PlantHandle) {
    let plant = Arc::new(Mutex::new(Plant::new(config)));
    let dock: Box<dyn DockSensor> = match dock {
        DockSensorKind::None => Box::new(AlwaysReady),
        DockSensorKind::Driver => Box::new(SimDockSensor::new(Arc::clone(&plant))),
    };
    let caps = Capabilities {
        pulses: Box::new(SimPulseGenerator::new(Arc::clone(&plant))),
        sensor: Box::new(SimAngleSensor::new(Arc::clone(&plant))),
        dock,
        store,
    };
    (caps, PlantHandle::new(plant))
}

/// Registry factory for the `simulation` driver.
pub fn create_capabilities(config: &NodeConfig) -> Result<Capabilities, HardwareError> {
    let plant = PlantConfig::from(config);
    info!(
        "Simulation hardware: {} steps/rev, offset {}, realtime={}",
        plant.steps_per_rev, plant.encoder_offset, plant.realtime
    );
    let store = record_store_for(&config.hardware)?;
    let (caps, _handle) = build(plant, config.hardware.dock_sensor, store);
    Ok(caps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MemoryStore;

    #[test]
    fn capabilities_share_one_plant() {
        let (mut caps, handle) = build(
            PlantConfig::default(),
            DockSensorKind::Driver,
            Box::new(MemoryStore::new()),
        );

        caps.pulses.set_enabled(true);
        caps.pulses.set_direction(true);
        let mut seen = Vec::new();
        caps.pulses
            .emit(400, std::time::Duration::ZERO, &mut || seen.push(()));
        caps.pulses.set_enabled(false);

        assert_eq!(seen.len(), 400);
        assert_eq!(handle.steps_received(), 400);
        assert_eq!(caps.read_raw(), 1024);

        handle.set_dock_ready(false);
        assert!(!caps.dock.is_ready());
    }

    #[test]
    fn unwired_dock_is_always_ready() {
        let (mut caps, handle) = build(
            PlantConfig::default(),
            DockSensorKind::None,
            Box::new(MemoryStore::new()),
        );
        handle.set_dock_ready(false);
        assert!(caps.dock.is_ready());
    }
}

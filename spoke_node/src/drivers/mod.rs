//! Hardware driver implementations.
//!
//! - [`simulation`] - Software plant for development and testing
//! - [`file_store`] - File-backed record storage shared by all drivers
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Provide a factory returning [`Capabilities`](crate::hardware::Capabilities)
//! 3. Register it in [`register_builtin`]

pub mod file_store;
pub mod simulation;

pub use file_store::FileStore;

use crate::hardware::{HardwareError, MemoryStore, RecordStore};
use crate::hardware_registry::HardwareRegistry;
use spoke_common::node::config::HardwareSection;

/// Register every built-in driver.
pub fn register_builtin(registry: &mut HardwareRegistry) {
    registry.register("simulation", simulation::create_capabilities);
}

/// Record store selected by the hardware section: a file when `state_file`
/// is set, memory otherwise.
pub fn record_store_for(hardware: &HardwareSection) -> Result<Box<dyn RecordStore>, HardwareError> {
    Ok(match &hardware.state_file {
        Some(path) => Box::new(FileStore::new(path)),
        None => Box::new(MemoryStore::new()),
    })
}

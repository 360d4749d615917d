//! Hardware capability traits.
//!
//! The node core never touches pins or files directly. It drives four
//! narrow capabilities, bundled into [`Capabilities`] by a hardware driver
//! from the [`HardwareRegistry`](crate::hardware_registry::HardwareRegistry).
//!
//! # Timing Contracts
//!
//! | Operation | Blocking | Notes |
//! |-----------|----------|-------|
//! | `PulseGenerator::emit()` | Yes, whole step train | Calls `on_step` after every step |
//! | `AngleSensor::read_raw()` | No | 12-bit absolute reading |
//! | `DockSensor::is_ready()` | No | Sampled before each dispense/return |
//! | `RecordStore::write()` | Yes | Synchronous; failure stops the node |

use parking_lot::Mutex;
use spoke_common::consts::RAW_TICK_MASK;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by hardware drivers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HardwareError {
    /// Driver initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Driver not found
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// Record storage failed
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Step/direction/enable outputs of a stepper driver.
pub trait PulseGenerator: Send {
    /// Energise or release the motor.
    fn set_enabled(&mut self, enabled: bool);

    /// Current enable state.
    fn is_enabled(&self) -> bool;

    /// Drive the direction pin.
    fn set_direction(&mut self, level_high: bool);

    /// Emit `steps` pulses with the given half period, calling `on_step`
    /// after each pulse. Returns once the train is complete.
    fn emit(&mut self, steps: u32, half_period: Duration, on_step: &mut dyn FnMut());
}

/// Absolute single-turn angle sensor.
pub trait AngleSensor: Send {
    /// Raw reading in `0..4096`.
    fn read_raw(&mut self) -> u16;
}

/// Dock presence interlock.
pub trait DockSensor: Send {
    /// True when a dispense or return may move the drum.
    fn is_ready(&mut self) -> bool;
}

/// Interlock for nodes without a dock sensor.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

impl DockSensor for AlwaysReady {
    fn is_ready(&mut self) -> bool {
        true
    }
}

/// Non-volatile storage for the persisted record.
pub trait RecordStore: Send {
    /// Stored bytes, or `None` if nothing was ever written.
    fn read(&mut self) -> Result<Option<Vec<u8>>, HardwareError>;

    /// Replace the stored bytes.
    fn write(&mut self, bytes: &[u8]) -> Result<(), HardwareError>;
}

/// In-memory record store.
///
/// Clones share the same contents, so a test can keep one clone to inspect
/// or corrupt what the node wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    bytes: Arc<Mutex<Option<Vec<u8>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with `bytes`.
    pub fn with_contents(bytes: Vec<u8>) -> Self {
        let store = Self::default();
        *store.bytes.lock() = Some(bytes);
        store
    }

    /// Copy of the current contents.
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.bytes.lock().clone()
    }

    /// Overwrite the contents behind the node's back.
    pub fn replace(&self, bytes: Option<Vec<u8>>) {
        *self.bytes.lock() = bytes;
    }

    /// Make subsequent writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }
}

impl RecordStore for MemoryStore {
    fn read(&mut self) -> Result<Option<Vec<u8>>, HardwareError> {
        Ok(self.bytes.lock().clone())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), HardwareError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(HardwareError::Storage("write rejected".to_string()));
        }
        *self.bytes.lock() = Some(bytes.to_vec());
        Ok(())
    }
}

/// Everything a node needs from the hardware.
pub struct Capabilities {
    /// Stepper outputs
    pub pulses: Box<dyn PulseGenerator>,
    /// Absolute encoder
    pub sensor: Box<dyn AngleSensor>,
    /// Dock interlock
    pub dock: Box<dyn DockSensor>,
    /// Record storage
    pub store: Box<dyn RecordStore>,
}

impl Capabilities {
    /// Read the sensor, masked to 12 bits.
    pub fn read_raw(&mut self) -> u16 {
        self.sensor.read_raw() & RAW_TICK_MASK
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("enabled", &self.pulses.is_enabled())
            .finish_non_exhaustive()
    }
}

//! Node error types.
//!
//! - `OperationError` - A drum operation was refused or failed. Local to the
//!   operation: state is unchanged and the loop keeps serving.
//! - `NodeError` - Startup or loop failure. Stops the node.

use crate::hardware::HardwareError;
use crate::persistence::PersistenceError;
use spoke_common::bus::BusError;
use spoke_common::config::ConfigError;
use thiserror::Error;

/// Failure of one drum operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    /// Encoder travel disagreed with the commanded travel beyond tolerance.
    #[error("Jam detected: expected {expected} ticks, encoder moved {actual}")]
    JamDetected {
        /// Commanded travel in encoder ticks
        expected: i64,
        /// Measured travel in encoder ticks
        actual: i64,
    },

    /// The dock interlock did not report ready.
    #[error("Dock interlock not satisfied")]
    InterlockNotSatisfied,

    /// Argument outside the accepted range or refused by the drum model.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// No filled slot besides the open slot.
    #[error("Nothing to dispense")]
    NothingToDispense,

    /// No empty slot besides the open slot.
    #[error("No empty slot")]
    NoEmptySlot,

    /// The new state could not be written. Fatal to the node.
    #[error("Persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}

impl OperationError {
    /// True if the node must stop serving after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OperationError::Persistence(_))
    }
}

/// Failure that stops the node.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Configuration rejected.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Hardware could not be created or failed.
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    /// The persisted record could not be read or written.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Bus transport failure.
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

//! # Spoke Node Library
//!
//! Rotary drum actuator node: encoder-verified stepper motion, slot
//! inventory, checksummed persistence and the bus command dispatcher.
//!
//! # Module Structure
//!
//! - [`core`] - NodeCore struct, cooperative loop
//! - [`node`] - NodeContext, drum operations
//! - [`dispatcher`] - Frame to operation to reply
//! - [`drum`] - Pure slot geometry and routing
//! - [`motion`] - Step train planning and jam detection
//! - [`encoder`] - Multi-turn tracking of the absolute encoder
//! - [`persistence`] - Versioned record with CRC-32
//! - [`hardware`] - Capability traits
//! - [`hardware_registry`] - Driver factory registration
//! - [`drivers`] - Driver implementations
//! - [`console`] - Debug console
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     spoke_node                                   │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────────────┐  │
//! │  │  Bus (trait)│◄──►│  NodeCore    │◄──►│  Console (stdin)    │  │
//! │  │ spoke_common│    │  (loop)      │    │                     │  │
//! │  └─────────────┘    └──────┬───────┘    └─────────────────────┘  │
//! │                            │ Dispatcher                          │
//! │                            ▼                                     │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────────────┐  │
//! │  │  Drum       │◄──►│ NodeContext  │◄──►│  MotionDriver       │  │
//! │  │  (routing)  │    │              │    │  + EncoderTracker   │  │
//! │  └─────────────┘    └──────┬───────┘    └─────────────────────┘  │
//! │                            ▼                                     │
//! │                   ┌────────────────┐                             │
//! │                   │  Capabilities  │ (from HardwareRegistry)     │
//! │                   └────────────────┘                             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod console;
pub mod core;
pub mod dispatcher;
pub mod drivers;
pub mod drum;
pub mod encoder;
pub mod error;
pub mod hardware;
pub mod hardware_registry;
pub mod motion;
pub mod node;
pub mod persistence;

// Re-export key types for convenience
pub use crate::core::{LoopSettings, LoopStats, NodeCore};
pub use crate::dispatcher::{DispatchStats, Dispatcher};
pub use crate::error::{NodeError, OperationError};
pub use crate::hardware::{Capabilities, HardwareError};
pub use crate::hardware_registry::{HardwareFactory, HardwareRegistry};
pub use crate::node::{DrumState, NodeContext};

//! Spoke Common Library
//!
//! Shared building blocks for every Spoke bus participant: drum nodes,
//! the supervisory controller and host-side tooling.
//!
//! # Module Structure
//!
//! - [`consts`] - Protocol and geometry limits
//! - [`config`] - Configuration loading traits and types
//! - [`node`] - Drum node configuration
//! - [`protocol`] - Binary frame codec (opcodes, replies, payload packing)
//! - [`bus`] - Bus abstraction, transports and the request/reply client
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use spoke_common::protocol::{Command, Frame};
//!
//! let frame = Command::GetStatus.to_frame(4).unwrap();
//! assert_eq!(frame.id(), 4);
//! assert_eq!(frame.data(), &[0x06]);
//! ```

pub mod bus;
pub mod config;
pub mod consts;
pub mod node;
pub mod prelude;
pub mod protocol;

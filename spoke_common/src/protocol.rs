//! Binary command/reply protocol shared by drum nodes and the supervisor.
//!
//! # Frame anatomy
//!
//! ```text
//! identifier   data[0]            data[1..dlc]
//! ──────────   ────────────────   ─────────────────────────────
//! D            opcode             command fields   (to node D)
//! 100 + D      reply/event code   reply fields     (from node D)
//! ```
//!
//! A frame carries at most 8 data bytes. Multi-byte integers are packed
//! big-endian; floats are packed in native byte order.
//!
//! - [`opcode`] - Opcode, parameter and reply code tables
//! - [`frame`] - Frame type, addressing and packing helpers
//! - [`command`] - Command decode/encode (node side decodes)
//! - [`reply`] - Reply decode/encode (node side encodes)

pub mod command;
pub mod frame;
pub mod opcode;
pub mod reply;

pub use command::{Command, Parameter};
pub use frame::{Frame, command_id, device_of_reply, is_reply_id, reply_id};
pub use opcode::{Opcode, ParamId, ReplyCode};
pub use reply::{Reply, StatusSnapshot};

use thiserror::Error;

/// Errors produced while decoding or building frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Frame has no data bytes.
    #[error("Empty frame")]
    Empty,

    /// Opcode byte not in the command table.
    #[error("Unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    /// Reply code byte not in the reply table.
    #[error("Unknown reply code {0:#04x}")]
    UnknownReply(u8),

    /// Payload shorter than the opcode requires.
    #[error("Truncated frame for {code:#04x}: need {need} bytes, got {got}")]
    Truncated {
        /// Opcode or reply code
        code: u8,
        /// Required frame length
        need: usize,
        /// Actual frame length
        got: usize,
    },

    /// Payload does not fit into one frame.
    #[error("Payload of {0} bytes exceeds frame capacity")]
    Oversized(usize),
}

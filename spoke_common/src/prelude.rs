//! Common re-exports for convenience.
//!
//! ```rust
//! use spoke_common::prelude::*;
//! ```

pub use crate::bus::{Bus, BusClient, BusError, LoopbackBus, RequestError, UdpBus};
pub use crate::config::{ConfigError, ConfigLoader, LogLevel};
pub use crate::consts::*;
pub use crate::node::config::{DockSensorKind, FactoryDefaults, NodeConfig};
pub use crate::protocol::{
    Command, DecodeError, Frame, Opcode, ParamId, Parameter, Reply, ReplyCode, StatusSnapshot,
    command_id, device_of_reply, is_reply_id, reply_id,
};

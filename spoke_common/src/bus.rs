//! Shared-bus abstraction and transports.
//!
//! A [`Bus`] endpoint moves whole [`Frame`]s without blocking. Every endpoint
//! sees every frame sent by the others; filtering by identifier is the
//! receiver's job.
//!
//! - [`loopback`] - In-process bus for tests and multi-node simulations
//! - [`udp`] - Datagram emulation of the bus between host processes
//! - [`client`] - Supervisory request/reply helper with deadline

pub mod client;
pub mod loopback;
pub mod udp;

pub use client::BusClient;
pub use loopback::{LoopbackBus, LoopbackEndpoint};
pub use udp::UdpBus;

use crate::protocol::{DecodeError, Frame};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a bus transport.
#[derive(Debug, Error)]
pub enum BusError {
    /// The transport refused or could not queue the frame.
    #[error("Transmit failed: {0}")]
    TransmitFailure(String),

    /// Underlying socket error.
    #[error("Bus I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Received bytes do not form a frame.
    #[error("Malformed frame on bus: {0}")]
    Malformed(#[from] DecodeError),
}

/// Errors raised by [`BusClient::request`].
#[derive(Debug, Error)]
pub enum RequestError {
    /// The command frame could not be transmitted.
    #[error("Transmit failed: {0}")]
    TransmitFailure(#[source] BusError),

    /// No matching reply arrived before the deadline. The command may or may
    /// not have been executed.
    #[error("No reply from device {device} within {waited:?}")]
    Timeout {
        /// Addressed device id
        device: u8,
        /// Time spent waiting
        waited: Duration,
    },

    /// The command could not be encoded, or the reply could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Receiving from the bus failed.
    #[error("Receive failed: {0}")]
    Receive(#[source] BusError),
}

/// Non-blocking frame transport.
pub trait Bus: Send {
    /// Queue one frame for transmission.
    fn try_send(&mut self, frame: &Frame) -> Result<(), BusError>;

    /// Take the next received frame, or `None` if nothing is pending.
    fn try_recv(&mut self) -> Result<Option<Frame>, BusError>;
}

impl<B: Bus + ?Sized> Bus for Box<B> {
    fn try_send(&mut self, frame: &Frame) -> Result<(), BusError> {
        (**self).try_send(frame)
    }

    fn try_recv(&mut self) -> Result<Option<Frame>, BusError> {
        (**self).try_recv()
    }
}

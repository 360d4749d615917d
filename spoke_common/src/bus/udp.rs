//! UDP emulation of the shared bus for host processes.
//!
//! # Datagram layout
//!
//! ```text
//! ┌────────┬────────┬─────┬──────────────────┐
//! │ id_hi  │ id_lo  │ dlc │ data[0..dlc]     │
//! └────────┴────────┴─────┴──────────────────┘
//! ```
//!
//! Each frame is sent as one datagram to every configured peer.

use super::{Bus, BusError};
use crate::consts::MAX_FRAME_LEN;
use crate::protocol::{DecodeError, Frame};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use tracing::{debug, info, trace};

/// Largest datagram produced by [`encode_datagram`].
pub const MAX_DATAGRAM_LEN: usize = 3 + MAX_FRAME_LEN;

/// Serialise a frame into its datagram form. Returns the used length.
pub fn encode_datagram(frame: &Frame, out: &mut [u8; MAX_DATAGRAM_LEN]) -> usize {
    let [hi, lo] = frame.id().to_be_bytes();
    out[0] = hi;
    out[1] = lo;
    out[2] = frame.len() as u8;
    out[3..3 + frame.len()].copy_from_slice(frame.data());
    3 + frame.len()
}

/// Parse one datagram back into a frame.
pub fn decode_datagram(bytes: &[u8]) -> Result<Frame, DecodeError> {
    let [hi, lo, dlc, data @ ..] = bytes else {
        return Err(DecodeError::Empty);
    };
    let dlc = usize::from(*dlc);
    if dlc > MAX_FRAME_LEN {
        return Err(DecodeError::Oversized(dlc));
    }
    let data = data.get(..dlc).ok_or(DecodeError::Truncated {
        code: data.first().copied().unwrap_or_default(),
        need: dlc,
        got: data.len(),
    })?;
    Frame::new(u16::from_be_bytes([*hi, *lo]), data)
}

/// Bus endpoint backed by a non-blocking UDP socket.
#[derive(Debug)]
pub struct UdpBus {
    socket: UdpSocket,
    peers: Vec<SocketAddr>,
}

impl UdpBus {
    /// Bind `bind` and broadcast to `peers`.
    pub fn bind(bind: SocketAddr, peers: Vec<SocketAddr>) -> Result<Self, BusError> {
        let socket = UdpSocket::bind(bind)?;
        socket.set_nonblocking(true)?;
        info!("UDP bus bound to {} ({} peers)", socket.local_addr()?, peers.len());
        Ok(Self { socket, peers })
    }

    /// Local socket address.
    pub fn local_addr(&self) -> Result<SocketAddr, BusError> {
        Ok(self.socket.local_addr()?)
    }

    /// Add a peer after binding.
    pub fn add_peer(&mut self, peer: SocketAddr) {
        if !self.peers.contains(&peer) {
            self.peers.push(peer);
        }
    }
}

impl Bus for UdpBus {
    fn try_send(&mut self, frame: &Frame) -> Result<(), BusError> {
        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        let len = encode_datagram(frame, &mut buf);
        let mut first_error = None;
        for peer in &self.peers {
            if let Err(e) = self.socket.send_to(&buf[..len], peer) {
                debug!("udp tx to {} failed: {}", peer, e);
                first_error.get_or_insert_with(|| {
                    BusError::TransmitFailure(format!("{}: {}", peer, e))
                });
            }
        }
        trace!("udp tx id={} dlc={}", frame.id(), frame.len());
        first_error.map_or(Ok(()), Err)
    }

    fn try_recv(&mut self) -> Result<Option<Frame>, BusError> {
        let mut buf = [0u8; 64];
        match self.socket.recv_from(&mut buf) {
            Ok((len, src)) => match decode_datagram(&buf[..len]) {
                Ok(frame) => Ok(Some(frame)),
                Err(e) => {
                    debug!("Malformed datagram from {}: {}", src, e);
                    Err(BusError::Malformed(e))
                }
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused
                ) =>
            {
                debug!("Peer unreachable: {}", e);
                Ok(None)
            }
            Err(e) => Err(BusError::Io(e)),
        }
    }
}

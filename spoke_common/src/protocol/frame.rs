//! Bus frame type, addressing convention and payload packing helpers.

use super::DecodeError;
use crate::consts::{MAX_DEVICE_ID, MAX_FRAME_LEN, MIN_DEVICE_ID, REPLY_ID_OFFSET};
use heapless::Vec;

/// One bus frame: a standard identifier and 1..=8 data bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    id: u16,
    data: Vec<u8, MAX_FRAME_LEN>,
}

impl Frame {
    /// Build a frame from raw bytes.
    ///
    /// # Errors
    /// `DecodeError::Empty` for no bytes, `DecodeError::Oversized` above 8.
    pub fn new(id: u16, data: &[u8]) -> Result<Self, DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::Empty);
        }
        let data = Vec::from_slice(data).map_err(|_| DecodeError::Oversized(data.len()))?;
        Ok(Self { id, data })
    }

    /// Build a frame from a code byte followed by `payload`.
    pub fn with_code(id: u16, code: u8, payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() + 1 > MAX_FRAME_LEN {
            return Err(DecodeError::Oversized(payload.len() + 1));
        }
        let mut data: Vec<u8, MAX_FRAME_LEN> = Vec::new();
        data.push(code).map_err(|_| DecodeError::Oversized(1))?;
        data.extend_from_slice(payload)
            .map_err(|_| DecodeError::Oversized(payload.len() + 1))?;
        Ok(Self { id, data })
    }

    /// Bus identifier.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// All data bytes, code byte first.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Data length code.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Frames always carry at least the code byte.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Opcode or reply code.
    pub fn code(&self) -> u8 {
        self.data[0]
    }

    /// Bytes after the code byte.
    pub fn payload(&self) -> &[u8] {
        &self.data[1..]
    }

    /// Fail with `Truncated` unless the frame has at least `need` bytes.
    pub(crate) fn require(&self, need: usize) -> Result<(), DecodeError> {
        if self.data.len() < need {
            return Err(DecodeError::Truncated {
                code: self.code(),
                need,
                got: self.data.len(),
            });
        }
        Ok(())
    }
}

/// Identifier of command frames addressed to `device`.
pub const fn command_id(device: u8) -> u16 {
    device as u16
}

/// Identifier of reply/event frames sent by `device`.
pub const fn reply_id(device: u8) -> u16 {
    device as u16 + REPLY_ID_OFFSET
}

/// True if `id` falls in the reply/event range.
pub const fn is_reply_id(id: u16) -> bool {
    id >= REPLY_ID_OFFSET + MIN_DEVICE_ID as u16 && id <= REPLY_ID_OFFSET + MAX_DEVICE_ID as u16
}

/// Device id that sent a reply/event frame, if `id` is in the reply range.
pub const fn device_of_reply(id: u16) -> Option<u8> {
    if is_reply_id(id) {
        Some((id - REPLY_ID_OFFSET) as u8)
    } else {
        None
    }
}

/// Pack a u16 big-endian.
pub fn pack_u16_be(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

/// Read a big-endian u16 from the first two bytes of `bytes`.
pub fn read_u16_be(bytes: &[u8]) -> Option<u16> {
    Some(u16::from_be_bytes([*bytes.first()?, *bytes.get(1)?]))
}

/// Pack an f32 in native byte order.
pub fn pack_f32(value: f32) -> [u8; 4] {
    value.to_ne_bytes()
}

/// Read a native-order f32 from the first four bytes of `bytes`.
pub fn read_f32(bytes: &[u8]) -> Option<f32> {
    let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    Some(f32::from_ne_bytes(raw))
}

//! Replies and unsolicited events sent by a node on `100 + device id`.

use super::frame::{Frame, pack_u16_be, read_u16_be, reply_id};
use super::opcode::ReplyCode;
use super::DecodeError;
use serde::{Deserialize, Serialize};

/// Snapshot carried by a status reply (`0x80`).
///
/// Bit `i` of `slot_bitmap` is set when slot `i` is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Slot currently under the window.
    pub window_index: u8,
    /// Occupancy, bit per slot.
    pub slot_bitmap: u8,
    /// Number of slots.
    pub spoke_count: u8,
    /// Driver steps per motor revolution.
    pub steps_per_rev: u16,
    /// Direction pin polarity.
    pub dir_cw_high: bool,
    /// Reporting device.
    pub device_id: u8,
}

impl StatusSnapshot {
    /// Occupancy of slot `index`; `false` beyond the spoke count.
    pub fn is_filled(&self, index: u8) -> bool {
        index < self.spoke_count && index < 8 && self.slot_bitmap & (1 << index) != 0
    }

    /// Number of filled slots.
    pub fn filled_count(&self) -> u32 {
        (0..self.spoke_count).filter(|i| self.is_filled(*i)).count() as u32
    }
}

/// A decoded reply or event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Dispense-nearest result and the window index afterwards.
    DispenseNearest { ok: bool, window: u8 },
    /// Dispense-to-slot result and the window index afterwards.
    DispenseToSlot { ok: bool, window: u8 },
    /// Return-nearest result and the window index afterwards.
    ReturnNearest { ok: bool, window: u8 },
    /// Newly captured encoder zero (raw ticks).
    Zero(u16),
    /// Parameter-set result for sub-id `sub`.
    Param { sub: u8, ok: bool },
    /// Slot-set result for slot `index`.
    Slot { index: u8, ok: bool },
    /// Status snapshot, solicited or not.
    Status(StatusSnapshot),
    /// Gantry acknowledgement carrying the echoed opcode.
    GantryAck(u8),
    /// Generic error.
    Error,
}

impl Reply {
    /// Reply code of this reply.
    pub fn code(&self) -> ReplyCode {
        match self {
            Reply::DispenseNearest { .. } => ReplyCode::DispenseNearest,
            Reply::DispenseToSlot { .. } => ReplyCode::DispenseToSlot,
            Reply::ReturnNearest { .. } => ReplyCode::ReturnNearest,
            Reply::Zero(_) => ReplyCode::SetZero,
            Reply::Param { .. } => ReplyCode::SetParameter,
            Reply::Slot { .. } => ReplyCode::SetSlot,
            Reply::Status(_) => ReplyCode::Status,
            Reply::GantryAck(_) => ReplyCode::GantryAck,
            Reply::Error => ReplyCode::Error,
        }
    }

    /// Success flag for replies that carry one.
    pub fn ok(&self) -> Option<bool> {
        match self {
            Reply::DispenseNearest { ok, .. }
            | Reply::DispenseToSlot { ok, .. }
            | Reply::ReturnNearest { ok, .. }
            | Reply::Param { ok, .. }
            | Reply::Slot { ok, .. } => Some(*ok),
            Reply::Error => Some(false),
            _ => None,
        }
    }

    /// Encode into a frame sent by `device`.
    pub fn to_frame(&self, device: u8) -> Result<Frame, DecodeError> {
        let id = reply_id(device);
        let code = self.code() as u8;
        match self {
            Reply::DispenseNearest { ok, window }
            | Reply::DispenseToSlot { ok, window }
            | Reply::ReturnNearest { ok, window } => {
                Frame::with_code(id, code, &[u8::from(*ok), *window])
            }
            Reply::Zero(raw) => Frame::with_code(id, code, &pack_u16_be(*raw)),
            Reply::Param { sub, ok } => Frame::with_code(id, code, &[*sub, u8::from(*ok)]),
            Reply::Slot { index, ok } => Frame::with_code(id, code, &[*index, u8::from(*ok)]),
            Reply::Status(s) => {
                let [spr_hi, spr_lo] = pack_u16_be(s.steps_per_rev);
                Frame::with_code(
                    id,
                    code,
                    &[
                        s.window_index,
                        s.slot_bitmap,
                        s.spoke_count,
                        spr_hi,
                        spr_lo,
                        u8::from(s.dir_cw_high),
                        s.device_id,
                    ],
                )
            }
            Reply::GantryAck(op) => Frame::with_code(id, code, &[*op]),
            Reply::Error => Frame::with_code(id, code, &[]),
        }
    }

    /// Decode the data bytes of a reply frame.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let (&byte, p) = data.split_first().ok_or(DecodeError::Empty)?;
        let code = ReplyCode::try_from(byte)?;
        if data.len() < code.min_len() {
            return Err(DecodeError::Truncated {
                code: byte,
                need: code.min_len(),
                got: data.len(),
            });
        }

        Ok(match code {
            ReplyCode::DispenseNearest => Reply::DispenseNearest {
                ok: p[0] != 0,
                window: p[1],
            },
            ReplyCode::DispenseToSlot => Reply::DispenseToSlot {
                ok: p[0] != 0,
                window: p[1],
            },
            ReplyCode::ReturnNearest => Reply::ReturnNearest {
                ok: p[0] != 0,
                window: p[1],
            },
            ReplyCode::SetZero => Reply::Zero(u16::from_be_bytes([p[0], p[1]])),
            ReplyCode::SetParameter => Reply::Param {
                sub: p[0],
                ok: p[1] != 0,
            },
            ReplyCode::SetSlot => Reply::Slot {
                index: p[0],
                ok: p[1] != 0,
            },
            ReplyCode::Status => Reply::Status(StatusSnapshot {
                window_index: p[0],
                slot_bitmap: p[1],
                spoke_count: p[2],
                steps_per_rev: read_u16_be(&p[3..]).unwrap_or_default(),
                dir_cw_high: p[5] != 0,
                device_id: p[6],
            }),
            ReplyCode::GantryAck => Reply::GantryAck(p[0]),
            ReplyCode::Error => Reply::Error,
        })
    }

    /// Decode a reply frame's data bytes.
    pub fn from_frame(frame: &Frame) -> Result<Self, DecodeError> {
        Self::decode(frame.data())
    }
}

//! Commands carried in frames addressed to a device.
//!
//! Nodes decode, the supervisory side encodes. Decoding never panics: every
//! malformed input maps to a [`DecodeError`].

use super::frame::{Frame, command_id, pack_f32, pack_u16_be, read_f32, read_u16_be};
use super::opcode::{Opcode, ParamId};
use super::DecodeError;
use crate::consts::MAX_PAYLOAD_LEN;
use heapless::Vec;

/// Parameter value carried by a set-parameter command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Parameter {
    /// Driver steps per motor revolution.
    StepsPerRev(u16),
    /// Wheel speed in degrees per second.
    DegPerSec(f32),
    /// Direction pin polarity; only 0 and 1 are meaningful.
    DirCwHigh(u8),
    /// Number of slots on the drum.
    SpokeCount(u8),
    /// Sub-id outside the parameter table. Decodes fine, is always refused.
    Unknown(u8),
}

impl Parameter {
    /// Sub-id byte as sent on the wire.
    pub fn sub_id(&self) -> u8 {
        match self {
            Parameter::StepsPerRev(_) => ParamId::StepsPerRev as u8,
            Parameter::DegPerSec(_) => ParamId::DegPerSec as u8,
            Parameter::DirCwHigh(_) => ParamId::DirCwHigh as u8,
            Parameter::SpokeCount(_) => ParamId::SpokeCount as u8,
            Parameter::Unknown(sub) => *sub,
        }
    }
}

/// A decoded command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// `0x01`
    DispenseNearest,
    /// `0x02`
    ReturnNearest,
    /// `0x03`
    SetZeroHere,
    /// `0x04 sub value..`
    SetParameter(Parameter),
    /// `0x05 index filled`
    SetSlot {
        /// Slot index
        index: u8,
        /// New occupancy
        filled: bool,
    },
    /// `0x06`
    GetStatus,
    /// `0x07 index`
    DispenseToSlot(u8),
    /// `0x30`
    GantryHome,
    /// `0x31 f32`. Only the position fits in one frame.
    GantryMoveTo {
        /// Target position in millimetres
        mm: f32,
    },
    /// `true` engages the clamp. A bare opcode means engage.
    GantryClamp(bool),
}

impl Command {
    /// Opcode of this command.
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::DispenseNearest => Opcode::DispenseNearest,
            Command::ReturnNearest => Opcode::ReturnNearest,
            Command::SetZeroHere => Opcode::SetZeroHere,
            Command::SetParameter(_) => Opcode::SetParameter,
            Command::SetSlot { .. } => Opcode::SetSlot,
            Command::GetStatus => Opcode::GetStatus,
            Command::DispenseToSlot(_) => Opcode::DispenseToSlot,
            Command::GantryHome => Opcode::GantryHome,
            Command::GantryMoveTo { .. } => Opcode::GantryMoveTo,
            Command::GantryClamp(_) => Opcode::GantryClamp,
        }
    }

    /// Decode the data bytes of a command frame.
    ///
    /// # Errors
    /// - `Empty` when `data` has no bytes
    /// - `UnknownOpcode` when byte 0 is outside the opcode table
    /// - `Truncated` when the payload is shorter than the opcode needs,
    ///   including a known parameter sub-id without its value bytes
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let (&code, payload) = data.split_first().ok_or(DecodeError::Empty)?;
        let opcode = Opcode::try_from(code)?;

        let truncated = |need: usize| DecodeError::Truncated {
            code,
            need,
            got: data.len(),
        };

        if data.len() < opcode.min_len() {
            return Err(truncated(opcode.min_len()));
        }

        Ok(match opcode {
            Opcode::DispenseNearest => Command::DispenseNearest,
            Opcode::ReturnNearest => Command::ReturnNearest,
            Opcode::SetZeroHere => Command::SetZeroHere,
            Opcode::GetStatus => Command::GetStatus,
            Opcode::DispenseToSlot => Command::DispenseToSlot(payload[0]),
            Opcode::SetSlot => Command::SetSlot {
                index: payload[0],
                filled: payload[1] != 0,
            },
            Opcode::SetParameter => {
                let sub = payload[0];
                let value = &payload[1..];
                let Some(id) = ParamId::from_u8(sub) else {
                    return Ok(Command::SetParameter(Parameter::Unknown(sub)));
                };
                let need = 2 + id.value_len();
                let param = match id {
                    ParamId::StepsPerRev => {
                        Parameter::StepsPerRev(read_u16_be(value).ok_or_else(|| truncated(need))?)
                    }
                    ParamId::DegPerSec => {
                        Parameter::DegPerSec(read_f32(value).ok_or_else(|| truncated(need))?)
                    }
                    ParamId::DirCwHigh => {
                        Parameter::DirCwHigh(*value.first().ok_or_else(|| truncated(need))?)
                    }
                    ParamId::SpokeCount => {
                        Parameter::SpokeCount(*value.first().ok_or_else(|| truncated(need))?)
                    }
                };
                Command::SetParameter(param)
            }
            Opcode::GantryHome => Command::GantryHome,
            Opcode::GantryMoveTo => Command::GantryMoveTo {
                mm: read_f32(payload).ok_or_else(|| truncated(5))?,
            },
            Opcode::GantryClamp => Command::GantryClamp(payload.first().is_none_or(|b| *b != 0)),
        })
    }

    /// Decode a command frame's data bytes.
    pub fn from_frame(frame: &Frame) -> Result<Self, DecodeError> {
        Self::decode(frame.data())
    }

    /// Encode into a frame addressed to `device`.
    pub fn to_frame(&self, device: u8) -> Result<Frame, DecodeError> {
        let mut payload: Vec<u8, MAX_PAYLOAD_LEN> = Vec::new();
        let overflow = |_: u8| DecodeError::Oversized(MAX_PAYLOAD_LEN + 1);

        match self {
            Command::DispenseNearest
            | Command::ReturnNearest
            | Command::SetZeroHere
            | Command::GetStatus
            | Command::GantryHome => {}
            Command::DispenseToSlot(index) => payload.push(*index).map_err(overflow)?,
            Command::SetSlot { index, filled } => payload
                .extend_from_slice(&[*index, u8::from(*filled)])
                .map_err(|_| DecodeError::Oversized(3))?,
            Command::SetParameter(param) => {
                payload.push(param.sub_id()).map_err(overflow)?;
                match param {
                    Parameter::StepsPerRev(v) => payload.extend_from_slice(&pack_u16_be(*v)),
                    Parameter::DegPerSec(v) => payload.extend_from_slice(&pack_f32(*v)),
                    Parameter::DirCwHigh(v) | Parameter::SpokeCount(v) => {
                        payload.extend_from_slice(&[*v])
                    }
                    Parameter::Unknown(_) => Ok(()),
                }
                .map_err(|_| DecodeError::Oversized(MAX_PAYLOAD_LEN + 1))?;
            }
            Command::GantryMoveTo { mm } => payload
                .extend_from_slice(&pack_f32(*mm))
                .map_err(|_| DecodeError::Oversized(5))?,
            Command::GantryClamp(engage) => payload.push(u8::from(*engage)).map_err(overflow)?,
        }

        Frame::with_code(command_id(device), self.opcode() as u8, &payload)
    }
}

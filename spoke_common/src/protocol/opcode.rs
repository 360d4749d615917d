//! Opcode, parameter sub-id and reply code tables.

use super::DecodeError;

/// Command opcodes (supervisor → node, byte 0 of a command frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Rotate to the nearest filled slot and dispense it.
    DispenseNearest = 0x01,
    /// Rotate to the nearest empty slot to accept a returned item.
    ReturnNearest = 0x02,
    /// Capture the current encoder reading as zero.
    SetZeroHere = 0x03,
    /// Write one configuration parameter.
    SetParameter = 0x04,
    /// Override one slot's occupancy.
    SetSlot = 0x05,
    /// Request a status snapshot.
    GetStatus = 0x06,
    /// Rotate to a specific filled slot and dispense it.
    DispenseToSlot = 0x07,
    /// Gantry: home all axes.
    GantryHome = 0x30,
    /// Gantry: move to a position in millimetres.
    GantryMoveTo = 0x31,
    /// Gantry: engage or release the clamp.
    GantryClamp = 0x32,
}

impl Opcode {
    /// Minimum frame length (including the opcode byte) the opcode requires.
    pub const fn min_len(self) -> usize {
        match self {
            Opcode::DispenseToSlot => 2,
            Opcode::SetParameter => 2,
            Opcode::SetSlot => 3,
            Opcode::GantryMoveTo => 5,
            _ => 1,
        }
    }

    /// True for opcodes served by the secondary (gantry) actuator class.
    pub const fn is_gantry(self) -> bool {
        matches!(
            self,
            Opcode::GantryHome | Opcode::GantryMoveTo | Opcode::GantryClamp
        )
    }
}

impl TryFrom<u8> for Opcode {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => Opcode::DispenseNearest,
            0x02 => Opcode::ReturnNearest,
            0x03 => Opcode::SetZeroHere,
            0x04 => Opcode::SetParameter,
            0x05 => Opcode::SetSlot,
            0x06 => Opcode::GetStatus,
            0x07 => Opcode::DispenseToSlot,
            0x30 => Opcode::GantryHome,
            0x31 => Opcode::GantryMoveTo,
            0x32 => Opcode::GantryClamp,
            other => return Err(DecodeError::UnknownOpcode(other)),
        })
    }
}

/// Parameter sub-ids carried in byte 1 of a set-parameter frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ParamId {
    /// Driver steps per motor revolution (u16 BE).
    StepsPerRev = 0x00,
    /// Wheel speed in degrees per second (f32).
    DegPerSec = 0x01,
    /// Direction pin polarity (u8 0/1).
    DirCwHigh = 0x02,
    /// Spoke (slot) count (u8).
    SpokeCount = 0x03,
}

impl ParamId {
    /// Number of value bytes following the sub-id.
    pub const fn value_len(self) -> usize {
        match self {
            ParamId::StepsPerRev => 2,
            ParamId::DegPerSec => 4,
            ParamId::DirCwHigh | ParamId::SpokeCount => 1,
        }
    }

    /// Look up a sub-id; `None` for ids outside the table.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(ParamId::StepsPerRev),
            0x01 => Some(ParamId::DegPerSec),
            0x02 => Some(ParamId::DirCwHigh),
            0x03 => Some(ParamId::SpokeCount),
            _ => None,
        }
    }
}

/// Reply and event codes (node → bus, byte 0 of a reply frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReplyCode {
    /// Status snapshot; also used for unsolicited status events.
    Status = 0x80,
    /// Dispense-nearest acknowledgement.
    DispenseNearest = 0x11,
    /// Dispense-to-slot acknowledgement.
    DispenseToSlot = 0x12,
    /// Return-nearest acknowledgement.
    ReturnNearest = 0x13,
    /// Zero-calibration result.
    SetZero = 0x21,
    /// Parameter-set result.
    SetParameter = 0x22,
    /// Slot-set result.
    SetSlot = 0x23,
    /// Gantry acknowledgement.
    GantryAck = 0x90,
    /// Generic error.
    Error = 0xFE,
}

impl ReplyCode {
    /// Minimum frame length (including the code byte) the reply carries.
    pub const fn min_len(self) -> usize {
        match self {
            ReplyCode::Status => 8,
            ReplyCode::GantryAck => 2,
            ReplyCode::Error => 1,
            _ => 3,
        }
    }
}

impl TryFrom<u8> for ReplyCode {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, DecodeError> {
        Ok(match value {
            0x80 => ReplyCode::Status,
            0x11 => ReplyCode::DispenseNearest,
            0x12 => ReplyCode::DispenseToSlot,
            0x13 => ReplyCode::ReturnNearest,
            0x21 => ReplyCode::SetZero,
            0x22 => ReplyCode::SetParameter,
            0x23 => ReplyCode::SetSlot,
            0x90 => ReplyCode::GantryAck,
            0xFE => ReplyCode::Error,
            other => return Err(DecodeError::UnknownReply(other)),
        })
    }
}

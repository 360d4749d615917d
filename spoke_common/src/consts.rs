//! System-wide constants for the Spoke workspace.
//!
//! Single source of truth for wire limits, encoder resolution and drum
//! geometry bounds. Imported by all crates.

use static_assertions::const_assert;

/// Maximum data bytes in one bus frame (byte 0 is the opcode/reply code).
pub const MAX_FRAME_LEN: usize = 8;

/// Maximum payload bytes following the opcode/reply code.
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - 1;

/// Offset added to a device id to form its reply/event identifier.
pub const REPLY_ID_OFFSET: u16 = 100;

/// Lowest assignable device id.
pub const MIN_DEVICE_ID: u8 = 1;

/// Highest assignable device id.
pub const MAX_DEVICE_ID: u8 = 127;

/// Encoder ticks per mechanical revolution (12-bit absolute sensor).
pub const TICKS_PER_REV: i32 = 4096;

/// Half a revolution in ticks; larger deltas between polls are unwrapped.
pub const HALF_REV_TICKS: i32 = TICKS_PER_REV / 2;

/// Mask applied to raw sensor readings.
pub const RAW_TICK_MASK: u16 = 0x0FFF;

/// Fewest slots a drum may have.
pub const MIN_SPOKES: u8 = 3;

/// Most slots a drum may have (also the persisted slot capacity).
pub const MAX_SPOKES: u8 = 8;

/// Accepted steps-per-revolution range.
pub const STEPS_PER_REV_RANGE: std::ops::RangeInclusive<u16> = 200..=25600;

/// Exclusive lower bound for wheel speed in degrees per second.
pub const MIN_DEG_PER_SEC_EXCLUSIVE: f32 = 0.1;

/// Inclusive upper bound for wheel speed in degrees per second.
pub const MAX_DEG_PER_SEC: f32 = 720.0;

const_assert!(MAX_SPOKES as u32 <= u8::BITS);
const_assert!((MAX_DEVICE_ID as u16) + REPLY_ID_OFFSET < 0x800);

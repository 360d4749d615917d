//! Multi-turn tracking on top of a 12-bit absolute encoder.
//!
//! Raw readings wrap at 4096. Successive readings are unwrapped on the
//! assumption that the shaft moves less than half a turn between polls,
//! so polling must keep up with the fastest step rate.

use crate::hardware::AngleSensor;
use spoke_common::consts::{HALF_REV_TICKS, RAW_TICK_MASK, TICKS_PER_REV};

/// Unwrapped encoder state.
#[derive(Debug, Clone, Default)]
pub struct EncoderTracker {
    zero_raw: u16,
    multi_turn: i64,
    previous_raw: u16,
    seeded: bool,
    last_raw: u16,
    anchor: i64,
    anchor_valid: bool,
}

impl EncoderTracker {
    /// Tracker with the given zero. Call [`update`](Self::update) once
    /// before reading angles.
    pub fn new(zero_raw: u16) -> Self {
        Self {
            zero_raw: zero_raw & RAW_TICK_MASK,
            ..Self::default()
        }
    }

    /// Read the sensor, masked to 12 bits.
    pub fn read_absolute(sensor: &mut dyn AngleSensor) -> u16 {
        sensor.read_raw() & RAW_TICK_MASK
    }

    /// Fold a new raw reading into the multi-turn count and return the
    /// unwrapped delta. The first call only seeds and returns 0.
    pub fn update(&mut self, raw: u16) -> i32 {
        let raw = raw & RAW_TICK_MASK;
        self.last_raw = raw;
        if !self.seeded {
            self.previous_raw = raw;
            self.seeded = true;
            return 0;
        }

        let mut delta = i32::from(raw) - i32::from(self.previous_raw);
        if delta > HALF_REV_TICKS {
            delta -= TICKS_PER_REV;
        } else if delta < -HALF_REV_TICKS {
            delta += TICKS_PER_REV;
        }
        self.multi_turn += i64::from(delta);
        self.previous_raw = raw;
        delta
    }

    /// Read the sensor and update.
    pub fn poll(&mut self, sensor: &mut dyn AngleSensor) -> i32 {
        self.update(Self::read_absolute(sensor))
    }

    /// True once the first reading has been taken.
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Unwrapped ticks since the first reading.
    pub fn multi_turn(&self) -> i64 {
        self.multi_turn
    }

    /// Most recent raw reading.
    pub fn last_raw(&self) -> u16 {
        self.last_raw
    }

    /// Raw reading that corresponds to 0°.
    pub fn zero_raw(&self) -> u16 {
        self.zero_raw
    }

    /// Single-turn angle of the last reading relative to zero, in degrees.
    pub fn angle_degrees(&self) -> f32 {
        let rel = (i32::from(self.last_raw) - i32::from(self.zero_raw) + TICKS_PER_REV)
            .rem_euclid(TICKS_PER_REV);
        rel as f32 * 360.0 / TICKS_PER_REV as f32
    }

    /// Make the last reading the new zero and return it.
    pub fn set_zero_here(&mut self) -> u16 {
        self.zero_raw = self.last_raw;
        self.zero_raw
    }

    /// Remember the current multi-turn count as trusted.
    pub fn anchor_here(&mut self) {
        self.anchor = self.multi_turn;
        self.anchor_valid = true;
    }

    /// Forget the anchor.
    pub fn invalidate_anchor(&mut self) {
        self.anchor_valid = false;
    }

    /// Ticks moved since the anchor, if one is set.
    pub fn drift_since_anchor(&self) -> Option<i64> {
        self.anchor_valid.then(|| self.multi_turn - self.anchor)
    }
}

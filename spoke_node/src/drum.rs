//! Drum geometry and slot inventory.
//!
//! Slots are numbered `0..N` around the drum. Slot [`OPEN_INDEX`] is the
//! permanently open slot aligned with the port and never holds an item.
//! `window_index` is the slot currently presented at the window.
//!
//! Rotation convention: positive wheel degrees are clockwise. A clockwise
//! leg of `k` pitches decrements the window index by `k`; a counter-clockwise
//! leg increments it. All index arithmetic is modulo `N`.
//!
//! Everything here is pure. Moving the hardware and persisting the result
//! is done by [`NodeContext`](crate::node::NodeContext).

use crate::error::OperationError;
use spoke_common::consts::{MAX_SPOKES, MIN_SPOKES};

/// Slot permanently aligned with the port.
pub const OPEN_INDEX: u8 = 0;

const SLOT_CAPACITY: usize = MAX_SPOKES as usize;

/// Rotation direction of a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Positive wheel degrees; window index decreases.
    Clockwise,
    /// Negative wheel degrees; window index increases.
    CounterClockwise,
}

/// One routed rotation from the current window to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leg {
    /// Slot that ends up at the window.
    pub target: u8,
    /// Pitches to travel.
    pub steps: u8,
    /// Direction of travel.
    pub direction: Direction,
}

impl Leg {
    /// Signed wheel rotation for this leg.
    pub fn wheel_degrees(&self, pitch_degrees: f32) -> f32 {
        let magnitude = f32::from(self.steps) * pitch_degrees;
        match self.direction {
            Direction::Clockwise => magnitude,
            Direction::CounterClockwise => -magnitude,
        }
    }
}

/// Slot layout and occupancy of one drum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drum {
    spoke_count: u8,
    slots: [bool; SLOT_CAPACITY],
    window_index: u8,
}

impl Drum {
    /// Canonical layout: open slot empty, every other slot filled, window 0.
    pub fn new(spoke_count: u8) -> Result<Self, OperationError> {
        check_spoke_count(spoke_count)?;
        let mut slots = [false; SLOT_CAPACITY];
        for slot in slots.iter_mut().take(usize::from(spoke_count)) {
            *slot = true;
        }
        slots[usize::from(OPEN_INDEX)] = false;
        Ok(Self {
            spoke_count,
            slots,
            window_index: 0,
        })
    }

    /// Rebuild from stored parts. The open slot is forced empty.
    pub fn from_parts(
        spoke_count: u8,
        slots: &[bool],
        window_index: u8,
    ) -> Result<Self, OperationError> {
        check_spoke_count(spoke_count)?;
        if window_index >= spoke_count {
            return Err(OperationError::InvalidParameter(format!(
                "window index {} outside 0..{}",
                window_index, spoke_count
            )));
        }
        let mut stored = [false; SLOT_CAPACITY];
        for (dst, src) in stored
            .iter_mut()
            .zip(slots)
            .take(usize::from(spoke_count))
        {
            *dst = *src;
        }
        stored[usize::from(OPEN_INDEX)] = false;
        Ok(Self {
            spoke_count,
            slots: stored,
            window_index,
        })
    }

    /// Number of slots.
    pub fn spoke_count(&self) -> u8 {
        self.spoke_count
    }

    /// Slot at the window.
    pub fn window_index(&self) -> u8 {
        self.window_index
    }

    /// Degrees between adjacent slots.
    pub fn pitch_degrees(&self) -> f32 {
        360.0 / f32::from(self.spoke_count)
    }

    /// Occupancy of the first `N` slots.
    pub fn slots(&self) -> &[bool] {
        &self.slots[..usize::from(self.spoke_count)]
    }

    /// Occupancy padded to the stored capacity.
    pub fn slot_array(&self) -> [bool; SLOT_CAPACITY] {
        self.slots
    }

    /// Occupancy of slot `index`; `false` outside the drum.
    pub fn is_filled(&self, index: u8) -> bool {
        index < self.spoke_count && self.slots[usize::from(index)]
    }

    /// Occupancy as a bitmap, bit `i` for slot `i`.
    pub fn bitmap(&self) -> u8 {
        self.slots()
            .iter()
            .enumerate()
            .filter(|(_, filled)| **filled)
            .fold(0u8, |acc, (i, _)| acc | (1 << i))
    }

    /// Number of filled slots.
    pub fn filled_count(&self) -> usize {
        self.slots().iter().filter(|s| **s).count()
    }

    /// Route from the window to `target`.
    ///
    /// Picks the shorter direction; equal distances go counter-clockwise.
    /// In clockwise-only mode the clockwise distance is always used.
    pub fn shortest_path(&self, target: u8, clockwise_only: bool) -> Leg {
        let n = self.spoke_count;
        let window = self.window_index;
        let cw = (window + n - target % n) % n;
        let ccw = (target % n + n - window) % n;

        if clockwise_only || cw < ccw {
            Leg {
                target,
                steps: cw,
                direction: Direction::Clockwise,
            }
        } else {
            Leg {
                target,
                steps: ccw,
                direction: Direction::CounterClockwise,
            }
        }
    }

    /// First filled slot scanning `window+1, window+2, ...`, skipping the
    /// open slot and the slot already at the window. The scan follows
    /// counter-clockwise distance rather than the routed distance, so the
    /// chosen slot is not always the closest.
    pub fn nearest_filled(&self) -> Option<u8> {
        let n = self.spoke_count;
        (1..n)
            .map(|k| (self.window_index + k) % n)
            .find(|&idx| idx != OPEN_INDEX && self.slots[usize::from(idx)])
    }

    /// Route to the nearest filled slot.
    pub fn plan_dispense_nearest(&self, clockwise_only: bool) -> Result<Leg, OperationError> {
        let target = self
            .nearest_filled()
            .ok_or(OperationError::NothingToDispense)?;
        Ok(self.shortest_path(target, clockwise_only))
    }

    /// Route to a specific filled slot.
    pub fn plan_dispense_to(&self, index: u8, clockwise_only: bool) -> Result<Leg, OperationError> {
        if index == OPEN_INDEX {
            return Err(OperationError::InvalidParameter(
                "cannot dispense the open slot".to_string(),
            ));
        }
        if index >= self.spoke_count {
            return Err(OperationError::InvalidParameter(format!(
                "slot {} outside 0..{}",
                index, self.spoke_count
            )));
        }
        if !self.slots[usize::from(index)] {
            return Err(OperationError::NothingToDispense);
        }
        Ok(self.shortest_path(index, clockwise_only))
    }

    /// Route to the empty non-open slot with the fewest pitches of travel.
    ///
    /// Equal step counts prefer a counter-clockwise leg, then the lower index.
    pub fn plan_return_nearest(&self, clockwise_only: bool) -> Result<Leg, OperationError> {
        (0..self.spoke_count)
            .filter(|&idx| idx != OPEN_INDEX && !self.slots[usize::from(idx)])
            .map(|idx| self.shortest_path(idx, clockwise_only))
            .min_by_key(|leg| {
                (
                    leg.steps,
                    leg.direction == Direction::Clockwise,
                    leg.target,
                )
            })
            .ok_or(OperationError::NoEmptySlot)
    }

    /// Record a successful dispense at `target`.
    pub fn commit_dispense(&mut self, target: u8) {
        self.slots[usize::from(target)] = false;
        self.window_index = target;
    }

    /// Record a successful return into `target`.
    pub fn commit_return(&mut self, target: u8) {
        if target != OPEN_INDEX {
            self.slots[usize::from(target)] = true;
        }
        self.window_index = target;
    }

    /// Override the occupancy of one slot.
    pub fn set_slot(&mut self, index: u8, filled: bool) -> Result<(), OperationError> {
        if index >= self.spoke_count {
            return Err(OperationError::InvalidParameter(format!(
                "slot {} outside 0..{}",
                index, self.spoke_count
            )));
        }
        if index == OPEN_INDEX && filled {
            return Err(OperationError::InvalidParameter(
                "open slot cannot hold an item".to_string(),
            ));
        }
        self.slots[usize::from(index)] = filled;
        Ok(())
    }
}

fn check_spoke_count(spoke_count: u8) -> Result<(), OperationError> {
    if !(MIN_SPOKES..=MAX_SPOKES).contains(&spoke_count) {
        return Err(OperationError::InvalidParameter(format!(
            "spoke count {} outside {}..={}",
            spoke_count, MIN_SPOKES, MAX_SPOKES
        )));
    }
    Ok(())
}

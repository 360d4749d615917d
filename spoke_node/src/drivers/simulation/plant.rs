//! Simulated drum mechanics.
//!
//! The plant tracks the motor shaft angle in (fractional) encoder ticks.
//! The encoder sits on the motor shaft, so one motor revolution is 4096
//! ticks regardless of gearing. Positive ticks are clockwise.

use parking_lot::Mutex;
use spoke_common::consts::{RAW_TICK_MASK, TICKS_PER_REV};
use spoke_common::node::config::NodeConfig;
use std::sync::Arc;

/// Static parameters of the simulated mechanism.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlantConfig {
    /// Physical driver resolution (pulses per motor revolution).
    pub steps_per_rev: u16,
    /// Direction pin level that turns the motor clockwise.
    pub cw_level_high: bool,
    /// Encoder mount offset in raw ticks.
    pub encoder_offset: u16,
    /// Sleep the real pulse period while stepping.
    pub realtime: bool,
}

impl From<&NodeConfig> for PlantConfig {
    fn from(config: &NodeConfig) -> Self {
        Self {
            steps_per_rev: config.defaults.steps_per_rev,
            cw_level_high: config.defaults.dir_cw_high,
            encoder_offset: config.hardware.encoder_offset,
            realtime: config.hardware.realtime,
        }
    }
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self::from(&NodeConfig::default())
    }
}

/// Mechanism state.
#[derive(Debug, Clone)]
pub struct Plant {
    config: PlantConfig,
    position_ticks: f64,
    enabled: bool,
    direction_high: bool,
    lost_step_ratio: f64,
    lost_accumulator: f64,
    steps_received: u64,
    steps_lost: u64,
    dock_ready: bool,
}

impl Plant {
    /// Plant at rest at shaft position 0.
    pub fn new(config: PlantConfig) -> Self {
        Self {
            config,
            position_ticks: 0.0,
            enabled: false,
            direction_high: false,
            lost_step_ratio: 0.0,
            lost_accumulator: 0.0,
            steps_received: 0,
            steps_lost: 0,
            dock_ready: true,
        }
    }

    /// Static parameters.
    pub fn config(&self) -> &PlantConfig {
        &self.config
    }

    pub(super) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(super) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(super) fn set_direction(&mut self, level_high: bool) {
        self.direction_high = level_high;
    }

    /// Apply one step pulse. Pulses while disabled do nothing; a share of
    /// pulses given by the lost-step ratio is swallowed.
    pub(super) fn step(&mut self) {
        if !self.enabled {
            return;
        }
        self.steps_received += 1;

        self.lost_accumulator += self.lost_step_ratio;
        if self.lost_accumulator >= 1.0 {
            self.lost_accumulator -= 1.0;
            self.steps_lost += 1;
            return;
        }

        let ticks_per_step = f64::from(TICKS_PER_REV) / f64::from(self.config.steps_per_rev);
        if self.direction_high == self.config.cw_level_high {
            self.position_ticks += ticks_per_step;
        } else {
            self.position_ticks -= ticks_per_step;
        }
    }

    /// Dock interlock state.
    pub fn dock_ready(&self) -> bool {
        self.dock_ready
    }

    /// Raw encoder reading for the current shaft position.
    pub fn raw(&self) -> u16 {
        let ticks = self.position_ticks.round() as i64 + i64::from(self.config.encoder_offset);
        (ticks.rem_euclid(i64::from(TICKS_PER_REV)) as u16) & RAW_TICK_MASK
    }
}

/// Shared handle for observing and disturbing the plant from tests and
/// tooling.
#[derive(Debug, Clone)]
pub struct PlantHandle {
    plant: Arc<Mutex<Plant>>,
}

impl PlantHandle {
    pub(super) fn new(plant: Arc<Mutex<Plant>>) -> Self {
        Self { plant }
    }

    /// Fraction of pulses that produce no motion (0 = healthy, 1 = stalled).
    pub fn set_lost_step_ratio(&self, ratio: f64) {
        let mut plant = self.plant.lock();
        plant.lost_step_ratio = ratio.clamp(0.0, 1.0);
        plant.lost_accumulator = 0.0;
    }

    /// Turn the shaft by hand.
    pub fn rotate_by_hand(&self, ticks: f64) {
        self.plant.lock().position_ticks += ticks;
    }

    /// Change the dock interlock state.
    pub fn set_dock_ready(&self, ready: bool) {
        self.plant.lock().dock_ready = ready;
    }

    /// Dock interlock state.
    pub fn dock_ready(&self) -> bool {
        self.plant.lock().dock_ready
    }

    /// Shaft position in ticks.
    pub fn position_ticks(&self) -> f64 {
        self.plant.lock().position_ticks
    }

    /// Raw encoder reading.
    pub fn raw(&self) -> u16 {
        self.plant.lock().raw()
    }

    /// Pulses received while enabled.
    pub fn steps_received(&self) -> u64 {
        self.plant.lock().steps_received
    }

    /// Pulses swallowed by the lost-step ratio.
    pub fn steps_lost(&self) -> u64 {
        self.plant.lock().steps_lost
    }

    /// Motor enable state.
    pub fn is_enabled(&self) -> bool {
        self.plant.lock().is_enabled()
    }
}

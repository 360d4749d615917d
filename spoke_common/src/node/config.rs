//! Node configuration types.
//!
//! This module contains configuration types for a drum node:
//! - `NodeConfig` - Main configuration loaded from node.toml
//! - `NodeSection` - Identity, motion verification and loop timing
//! - `HardwareSection` - Hardware driver selection and record location
//! - `BusSection` - Host-side bus transport endpoints
//! - `FactoryDefaults` - Values written when the persisted record is rebuilt

use crate::config::{ConfigError, LogLevel};
use crate::consts::{
    MAX_DEG_PER_SEC, MAX_DEVICE_ID, MAX_SPOKES, MIN_DEG_PER_SEC_EXCLUSIVE, MIN_DEVICE_ID,
    MIN_SPOKES, STEPS_PER_REV_RANGE,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

fn default_device_id() -> u8 {
    4
}

fn default_gear_ratio() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_jam_tolerance() -> i32 {
    300
}

fn default_manual_warn() -> i32 {
    2000
}

fn default_encoder_poll_ms() -> u64 {
    20
}

fn default_loop_tick_us() -> u64 {
    1000
}

fn default_driver() -> String {
    "simulation".to_string()
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 47000))
}

/// Main configuration loaded from `node.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Identity, motion and loop settings.
    #[serde(default)]
    pub node: NodeSection,

    /// Hardware driver and persistence location.
    #[serde(default)]
    pub hardware: HardwareSection,

    /// Bus transport endpoints.
    #[serde(default)]
    pub bus: BusSection,

    /// Factory defaults for a freshly initialised record.
    #[serde(default)]
    pub defaults: FactoryDefaults,
}

impl NodeConfig {
    /// Validate the node configuration.
    ///
    /// # Validation Rules
    /// 1. `device_id` within 1..=127
    /// 2. `gear_ratio` finite and > 0
    /// 3. `jam_tolerance_ticks` and `manual_motion_warn_ticks` > 0
    /// 4. `encoder_poll_ms` > 0
    /// 5. factory defaults inside the protocol's accepted parameter ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let node = &self.node;

        if !(MIN_DEVICE_ID..=MAX_DEVICE_ID).contains(&node.device_id) {
            return Err(ConfigError::ValidationError(format!(
                "device_id {} outside {}..={}",
                node.device_id, MIN_DEVICE_ID, MAX_DEVICE_ID
            )));
        }

        if !node.gear_ratio.is_finite() || node.gear_ratio <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "gear_ratio must be > 0 (got {})",
                node.gear_ratio
            )));
        }

        if node.jam_tolerance_ticks <= 0 {
            return Err(ConfigError::ValidationError(
                "jam_tolerance_ticks must be > 0".to_string(),
            ));
        }

        if node.manual_motion_warn_ticks <= 0 {
            return Err(ConfigError::ValidationError(
                "manual_motion_warn_ticks must be > 0".to_string(),
            ));
        }

        if node.encoder_poll_ms == 0 {
            return Err(ConfigError::ValidationError(
                "encoder_poll_ms must be > 0".to_string(),
            ));
        }

        self.defaults.validate()
    }
}

/// Identity, motion verification and loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSection {
    /// Bus device id (commands to `id`, replies from `100 + id`).
    #[serde(default = "default_device_id")]
    pub device_id: u8,

    /// Motor revolutions per wheel revolution.
    #[serde(default = "default_gear_ratio")]
    pub gear_ratio: f32,

    /// Route every move clockwise regardless of distance.
    #[serde(default)]
    pub clockwise_only: bool,

    /// Verify each move against the encoder (closed loop).
    #[serde(default = "default_true")]
    pub verify_motion: bool,

    /// Largest tolerated |actual - expected| encoder ticks per move.
    #[serde(default = "default_jam_tolerance")]
    pub jam_tolerance_ticks: i32,

    /// Idle drift (ticks) from the anchor that raises a manual-rotation warning.
    #[serde(default = "default_manual_warn")]
    pub manual_motion_warn_ticks: i32,

    /// Encoder refresh period while idle.
    #[serde(default = "default_encoder_poll_ms")]
    pub encoder_poll_ms: u64,

    /// Unsolicited status broadcast period (0 disables).
    #[serde(default)]
    pub status_interval_ms: u64,

    /// Emit a status event after every successful state change.
    #[serde(default)]
    pub announce_changes: bool,

    /// Cooperative loop sleep between polls.
    #[serde(default = "default_loop_tick_us")]
    pub loop_tick_us: u64,

    /// Logging verbosity.
    #[serde(default)]
    pub log_level: LogLevel,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            device_id: default_device_id(),
            gear_ratio: default_gear_ratio(),
            clockwise_only: false,
            verify_motion: true,
            jam_tolerance_ticks: default_jam_tolerance(),
            manual_motion_warn_ticks: default_manual_warn(),
            encoder_poll_ms: default_encoder_poll_ms(),
            status_interval_ms: 0,
            announce_changes: false,
            loop_tick_us: default_loop_tick_us(),
            log_level: LogLevel::default(),
        }
    }
}

/// Dock interlock wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DockSensorKind {
    /// No sensor wired; the interlock always reports ready.
    #[default]
    None,
    /// Sensor provided by the hardware driver.
    Driver,
}

/// Hardware driver selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HardwareSection {
    /// Registered hardware driver name (e.g. "simulation").
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Record file; `None` keeps the record in memory only.
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    /// Dock interlock wiring.
    #[serde(default)]
    pub dock_sensor: DockSensorKind,

    /// Simulation only: sleep the real step period while pulsing.
    #[serde(default)]
    pub realtime: bool,

    /// Simulation only: encoder mount offset in raw ticks.
    #[serde(default)]
    pub encoder_offset: u16,
}

impl Default for HardwareSection {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            state_file: None,
            dock_sensor: DockSensorKind::default(),
            realtime: false,
            encoder_offset: 0,
        }
    }
}

/// Host-side bus transport endpoints (UDP emulation of the shared bus).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusSection {
    /// Local socket address.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Every other participant on the emulated bus.
    #[serde(default)]
    pub peers: Vec<SocketAddr>,
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            peers: Vec::new(),
        }
    }
}

/// Values used when the persisted record is (re)initialised.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactoryDefaults {
    /// Driver steps per motor revolution.
    pub steps_per_rev: u16,
    /// Wheel speed in degrees per second.
    pub deg_per_sec: f32,
    /// Direction pin level meaning clockwise.
    pub dir_cw_high: bool,
    /// Slot count.
    pub spoke_count: u8,
}

impl Default for FactoryDefaults {
    fn default() -> Self {
        Self {
            steps_per_rev: 1600,
            deg_per_sec: 90.0,
            dir_cw_high: true,
            spoke_count: 5,
        }
    }
}

impl FactoryDefaults {
    /// Validate defaults against the wire-level parameter ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !STEPS_PER_REV_RANGE.contains(&self.steps_per_rev) {
            return Err(ConfigError::ValidationError(format!(
                "defaults.steps_per_rev {} outside {:?}",
                self.steps_per_rev, STEPS_PER_REV_RANGE
            )));
        }
        if !(self.deg_per_sec > MIN_DEG_PER_SEC_EXCLUSIVE && self.deg_per_sec <= MAX_DEG_PER_SEC) {
            return Err(ConfigError::ValidationError(format!(
                "defaults.deg_per_sec {} outside ({}, {}]",
                self.deg_per_sec, MIN_DEG_PER_SEC_EXCLUSIVE, MAX_DEG_PER_SEC
            )));
        }
        if !(MIN_SPOKES..=MAX_SPOKES).contains(&self.spoke_count) {
            return Err(ConfigError::ValidationError(format!(
                "defaults.spoke_count {} outside {}..={}",
                self.spoke_count, MIN_SPOKES, MAX_SPOKES
            )));
        }
        Ok(())
    }
}

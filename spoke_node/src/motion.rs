//! Encoder-verified constant-velocity moves.
//!
//! A move is planned from wheel degrees, executed as one step train, and
//! then compared with the encoder. Correction is by rejection only: a
//! move whose measured travel is off by more than the jam tolerance is
//! reported as a jam and the caller leaves its state untouched.

use crate::encoder::EncoderTracker;
use crate::error::OperationError;
use crate::hardware::{AngleSensor, PulseGenerator};
use spoke_common::consts::TICKS_PER_REV;
use spoke_common::node::config::NodeSection;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Moves shorter than this many wheel degrees are skipped.
pub const MIN_MOVE_DEGREES: f32 = 0.1;

/// Longest single move in wheel degrees (ten wheel turns).
pub const MAX_MOVE_DEGREES: f32 = 3600.0;

/// Floor for the step rate.
pub const MIN_STEPS_PER_SEC: f32 = 100.0;

/// Floor for the half period of one step pulse.
pub const MIN_HALF_PERIOD: Duration = Duration::from_micros(200);

/// Runtime motion parameters, writable over the bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionConfig {
    /// Driver steps per motor revolution.
    pub steps_per_rev: u16,
    /// Wheel speed in degrees per second.
    pub deg_per_sec: f32,
    /// Direction pin level that turns the wheel clockwise.
    pub dir_cw_high: bool,
}

/// Static motion settings from the node configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSettings {
    /// Motor revolutions per wheel revolution.
    pub gear_ratio: f32,
    /// Compare every move against the encoder.
    pub verify: bool,
    /// Largest accepted |actual - expected| in ticks.
    pub jam_tolerance: i64,
    /// Idle drift that triggers a manual-rotation warning.
    pub manual_warn: i64,
}

impl From<&NodeSection> for MotionSettings {
    fn from(node: &NodeSection) -> Self {
        Self {
            gear_ratio: node.gear_ratio,
            verify: node.verify_motion,
            jam_tolerance: i64::from(node.jam_tolerance_ticks),
            manual_warn: i64::from(node.manual_motion_warn_ticks),
        }
    }
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self::from(&NodeSection::default())
    }
}

/// A planned step train.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovePlan {
    /// Pulses to emit.
    pub steps: u32,
    /// Clockwise (positive degrees) or not.
    pub clockwise: bool,
    /// Expected signed encoder travel.
    pub expected_ticks: i64,
    /// Step rate after flooring.
    pub steps_per_sec: f32,
    /// Half period of one pulse after flooring.
    pub half_period: Duration,
}

/// Plan a move of `wheel_degrees` (positive is clockwise).
///
/// Returns `None` for no-op moves: non-finite input, less than
/// [`MIN_MOVE_DEGREES`], or a move that rounds to zero steps.
pub fn plan_move(wheel_degrees: f32, gear_ratio: f32, motion: &MotionConfig) -> Option<MovePlan> {
    if !wheel_degrees.is_finite() || wheel_degrees.abs() < MIN_MOVE_DEGREES {
        return None;
    }

    let spr = f64::from(motion.steps_per_rev);
    let motor_deg = f64::from(wheel_degrees) * f64::from(gear_ratio);
    let steps = (motor_deg.abs() * spr / 360.0).round();
    if steps < 1.0 {
        return None;
    }
    let expected_ticks = (motor_deg * f64::from(TICKS_PER_REV) / 360.0).round() as i64;

    let steps_per_sec =
        (motion.deg_per_sec * gear_ratio * f32::from(motion.steps_per_rev) / 360.0)
            .max(MIN_STEPS_PER_SEC);
    let half_period =
        Duration::from_secs_f64(0.5 / f64::from(steps_per_sec)).max(MIN_HALF_PERIOD);

    Some(MovePlan {
        steps: steps as u32,
        clockwise: wheel_degrees > 0.0,
        expected_ticks,
        steps_per_sec,
        half_period,
    })
}

/// Outcome of a completed move.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveReport {
    /// Pulses emitted.
    pub steps: u32,
    /// Expected signed encoder travel.
    pub expected_ticks: i64,
    /// Measured signed encoder travel (equal to expected when unverified).
    pub actual_ticks: i64,
}

/// Executes planned moves against the hardware.
#[derive(Debug, Clone, Default)]
pub struct MotionDriver {
    settings: MotionSettings,
}

impl MotionDriver {
    /// Create a driver with the given settings.
    pub fn new(settings: MotionSettings) -> Self {
        Self { settings }
    }

    /// Current settings.
    pub fn settings(&self) -> &MotionSettings {
        &self.settings
    }

    /// Rotate the wheel by `wheel_degrees` (positive is clockwise).
    ///
    /// # Errors
    /// `OperationError::JamDetected` when verification is enabled and the
    /// encoder travel differs from the commanded travel by more than the
    /// jam tolerance. `OperationError::InvalidParameter` for a move longer
    /// than [`MAX_MOVE_DEGREES`].
    pub fn move_by_wheel_degrees(
        &self,
        wheel_degrees: f32,
        motion: &MotionConfig,
        pulses: &mut dyn PulseGenerator,
        sensor: &mut dyn AngleSensor,
        encoder: &mut EncoderTracker,
    ) -> Result<MoveReport, OperationError> {
        if wheel_degrees.abs() > MAX_MOVE_DEGREES {
            return Err(OperationError::InvalidParameter(format!(
                "move of {wheel_degrees}° exceeds {MAX_MOVE_DEGREES}°"
            )));
        }
        let Some(plan) = plan_move(wheel_degrees, self.settings.gear_ratio, motion) else {
            debug!("Move of {:.3}° is a no-op", wheel_degrees);
            return Ok(MoveReport::default());
        };

        encoder.poll(sensor);
        if self.settings.verify && !pulses.is_enabled() {
            self.check_manual_rotation(encoder);
        }
        let start = encoder.multi_turn();

        info!(
            "Moving {:.2}° ({} steps {} at {:.0} steps/s)",
            wheel_degrees,
            plan.steps,
            if plan.clockwise { "CW" } else { "CCW" },
            plan.steps_per_sec
        );

        pulses.set_enabled(true);
        pulses.set_direction(plan.clockwise == motion.dir_cw_high);
        pulses.emit(plan.steps, plan.half_period, &mut || {
            encoder.poll(sensor);
        });
        pulses.set_enabled(false);
        encoder.poll(sensor);

        let actual = encoder.multi_turn() - start;
        if !self.settings.verify {
            return Ok(MoveReport {
                steps: plan.steps,
                expected_ticks: plan.expected_ticks,
                actual_ticks: plan.expected_ticks,
            });
        }

        let deviation = actual - plan.expected_ticks;
        if deviation.abs() > self.settings.jam_tolerance {
            error!(
                "Jam: expected {} ticks, measured {} (deviation {})",
                plan.expected_ticks, actual, deviation
            );
            return Err(OperationError::JamDetected {
                expected: plan.expected_ticks,
                actual,
            });
        }

        debug!(
            "Move verified: expected {} ticks, measured {}",
            plan.expected_ticks, actual
        );
        Ok(MoveReport {
            steps: plan.steps,
            expected_ticks: plan.expected_ticks,
            actual_ticks: actual,
        })
    }

    /// Warn if the drum turned while nobody was driving it. Advisory only.
    pub fn check_manual_rotation(&self, encoder: &EncoderTracker) -> Option<i64> {
        let drift = encoder.drift_since_anchor()?;
        if drift.abs() > self.settings.manual_warn {
            warn!(
                "Drum moved {} ticks since last trusted position; window index may be stale",
                drift
            );
            return Some(drift);
        }
        None
    }
}

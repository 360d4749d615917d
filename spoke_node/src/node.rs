//! Node context: one drum, its encoder, motion parameters and hardware.
//!
//! Every drum operation follows the same discipline:
//!
//! 1. Check the dock interlock (dispense/return only)
//! 2. Plan a leg on the pure [`Drum`] model
//! 3. Execute it through the [`MotionDriver`]
//! 4. On success commit the inventory change, re-anchor the encoder and
//!    rewrite the persisted record
//!
//! A failure at any step before 4 leaves the drum untouched. A failure while
//! persisting is reported as [`OperationError::Persistence`], which the
//! caller treats as fatal.

use crate::drum::{Drum, Leg};
use crate::encoder::EncoderTracker;
use crate::error::{NodeError, OperationError};
use crate::hardware::Capabilities;
use crate::motion::{MotionConfig, MotionDriver, MotionSettings, MoveReport};
use crate::persistence::{self, LoadOutcome, PersistedRecord, PersistenceError};
use spoke_common::consts::{MAX_DEG_PER_SEC, MIN_DEG_PER_SEC_EXCLUSIVE, STEPS_PER_REV_RANGE};
use spoke_common::node::config::NodeConfig;
use spoke_common::protocol::{Parameter, StatusSnapshot};
use tracing::{debug, info, warn};

/// Motion state of the drum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrumState {
    /// Stationary and accepting commands.
    Idle,
    /// Executing one verified move.
    Moving,
}

/// Complete state of one drum node.
#[derive(Debug)]
pub struct NodeContext {
    device_id: u8,
    drum: Drum,
    motion: MotionConfig,
    encoder: EncoderTracker,
    driver: MotionDriver,
    caps: Capabilities,
    clockwise_only: bool,
    state: DrumState,
    revision: u64,
    drift_reported: bool,
    load_outcome: LoadOutcome,
}

impl NodeContext {
    /// Seed the encoder, load (or initialise) the persisted record and
    /// anchor the encoder at the restored window.
    ///
    /// # Errors
    /// Returns `NodeError::Persistence` if the record store cannot be read
    /// or the factory record cannot be written back.
    pub fn boot(config: &NodeConfig, mut caps: Capabilities) -> Result<Self, NodeError> {
        let device_id = config.node.device_id;
        let raw = EncoderTracker::read_absolute(caps.sensor.as_mut());

        let (record, load_outcome) =
            persistence::load_or_init(caps.store.as_mut(), device_id, &config.defaults, raw)?;

        let drum = Drum::from_parts(record.spoke_count, &record.slots, record.window_index)
            .map_err(|e| PersistenceError::Read(e.to_string()))?;

        let mut encoder = EncoderTracker::new(record.encoder_zero);
        encoder.update(raw);
        encoder.anchor_here();

        let motion = MotionConfig {
            steps_per_rev: record.steps_per_rev,
            deg_per_sec: record.deg_per_sec,
            dir_cw_high: record.dir_cw_high,
        };

        info!(
            "Node {} ready: {} spokes, window {}, {} filled, {} steps/rev, {:.1}°/s",
            device_id,
            drum.spoke_count(),
            drum.window_index(),
            drum.filled_count(),
            motion.steps_per_rev,
            motion.deg_per_sec
        );

        Ok(Self {
            device_id,
            drum,
            motion,
            encoder,
            driver: MotionDriver::new(MotionSettings::from(&config.node)),
            caps,
            clockwise_only: config.node.clockwise_only,
            state: DrumState::Idle,
            revision: 0,
            drift_reported: false,
            load_outcome,
        })
    }

    /// Device id on the bus.
    pub fn device_id(&self) -> u8 {
        self.device_id
    }

    /// Drum model.
    pub fn drum(&self) -> &Drum {
        &self.drum
    }

    /// Runtime motion parameters.
    pub fn motion(&self) -> &MotionConfig {
        &self.motion
    }

    /// Encoder tracker.
    pub fn encoder(&self) -> &EncoderTracker {
        &self.encoder
    }

    /// Current motion state.
    pub fn state(&self) -> DrumState {
        self.state
    }

    /// How the record in use was obtained at boot.
    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.load_outcome
    }

    /// Counter bumped after every persisted change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True when every leg is routed clockwise.
    pub fn clockwise_only(&self) -> bool {
        self.clockwise_only
    }

    /// Switch clockwise-only routing. Not persisted.
    pub fn set_clockwise_only(&mut self, enabled: bool) {
        if self.clockwise_only != enabled {
            info!(
                "Routing mode: {}",
                if enabled { "clockwise only" } else { "bidirectional" }
            );
        }
        self.clockwise_only = enabled;
    }

    /// Status reply contents.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            window_index: self.drum.window_index(),
            slot_bitmap: self.drum.bitmap(),
            spoke_count: self.drum.spoke_count(),
            steps_per_rev: self.motion.steps_per_rev,
            dir_cw_high: self.motion.dir_cw_high,
            device_id: self.device_id,
        }
    }

    /// Record describing the current state.
    pub fn record(&self) -> PersistedRecord {
        PersistedRecord {
            device_id: self.device_id,
            dir_cw_high: self.motion.dir_cw_high,
            steps_per_rev: self.motion.steps_per_rev,
            deg_per_sec: self.motion.deg_per_sec,
            encoder_zero: self.encoder.zero_raw(),
            spoke_count: self.drum.spoke_count(),
            slots: self.drum.slot_array(),
            window_index: self.drum.window_index(),
        }
    }

    /// Present the nearest filled slot at the window and mark it empty.
    /// Returns the new window index.
    pub fn dispense_nearest(&mut self) -> Result<u8, OperationError> {
        self.require_dock()?;
        let leg = self.drum.plan_dispense_nearest(self.clockwise_only)?;
        self.run_leg(leg)?;
        self.drum.commit_dispense(leg.target);
        self.commit("dispense", leg)
    }

    /// Present slot `index` at the window and mark it empty.
    pub fn dispense_to_slot(&mut self, index: u8) -> Result<u8, OperationError> {
        self.require_dock()?;
        let leg = self.drum.plan_dispense_to(index, self.clockwise_only)?;
        self.run_leg(leg)?;
        self.drum.commit_dispense(leg.target);
        self.commit("dispense", leg)
    }

    /// Present the nearest empty slot at the window and mark it filled.
    pub fn return_nearest(&mut self) -> Result<u8, OperationError> {
        self.require_dock()?;
        let leg = self.drum.plan_return_nearest(self.clockwise_only)?;
        self.run_leg(leg)?;
        self.drum.commit_return(leg.target);
        self.commit("return", leg)
    }

    /// Capture the current raw reading as the encoder zero and persist it.
    pub fn set_zero_here(&mut self) -> Result<u16, OperationError> {
        self.encoder.poll(self.caps.sensor.as_mut());
        let zero = self.encoder.set_zero_here();
        info!("Encoder zero set to raw {}", zero);
        self.persist()?;
        Ok(zero)
    }

    /// Override the occupancy of one slot and persist it.
    pub fn set_slot(&mut self, index: u8, filled: bool) -> Result<(), OperationError> {
        self.drum.set_slot(index, filled)?;
        info!(
            "Slot {} marked {}",
            index,
            if filled { "filled" } else { "empty" }
        );
        self.encoder.poll(self.caps.sensor.as_mut());
        self.anchor();
        self.persist()
    }

    /// Apply a parameter write. Out-of-range values change nothing.
    ///
    /// A spoke count change resets the drum to its canonical layout with
    /// the window at 0.
    pub fn set_parameter(&mut self, parameter: Parameter) -> Result<(), OperationError> {
        match parameter {
            Parameter::StepsPerRev(value) => {
                if !STEPS_PER_REV_RANGE.contains(&value) {
                    return Err(OperationError::InvalidParameter(format!(
                        "steps_per_rev {} outside {:?}",
                        value, STEPS_PER_REV_RANGE
                    )));
                }
                self.motion.steps_per_rev = value;
            }
            Parameter::DegPerSec(value) => {
                if !(value > MIN_DEG_PER_SEC_EXCLUSIVE && value <= MAX_DEG_PER_SEC) {
                    return Err(OperationError::InvalidParameter(format!(
                        "deg_per_sec {} outside ({}, {}]",
                        value, MIN_DEG_PER_SEC_EXCLUSIVE, MAX_DEG_PER_SEC
                    )));
                }
                self.motion.deg_per_sec = value;
            }
            Parameter::DirCwHigh(value) => {
                self.motion.dir_cw_high = match value {
                    0 => false,
                    1 => true,
                    other => {
                        return Err(OperationError::InvalidParameter(format!(
                            "dir_cw_high must be 0 or 1 (got {})",
                            other
                        )));
                    }
                };
            }
            Parameter::SpokeCount(count) => {
                self.drum = Drum::new(count)?;
                self.anchor();
            }
            Parameter::Unknown(sub) => {
                return Err(OperationError::InvalidParameter(format!(
                    "unknown parameter 0x{:02X}",
                    sub
                )));
            }
        }
        info!("Parameter {:?} applied", parameter);
        self.persist()
    }

    /// Rotate by `wheel_degrees` without touching the inventory.
    pub fn test_move(&mut self, wheel_degrees: f32) -> Result<MoveReport, OperationError> {
        self.state = DrumState::Moving;
        let result = self.driver.move_by_wheel_degrees(
            wheel_degrees,
            &self.motion,
            self.caps.pulses.as_mut(),
            self.caps.sensor.as_mut(),
            &mut self.encoder,
        );
        self.state = DrumState::Idle;
        result
    }

    /// Refresh the encoder while idle. Returns the drift since the last
    /// trusted position the first time it exceeds the warning threshold.
    pub fn poll_encoder(&mut self) -> Option<i64> {
        self.encoder.poll(self.caps.sensor.as_mut());
        if self.drift_reported
            || !self.driver.settings().verify
            || self.caps.pulses.is_enabled()
        {
            return None;
        }
        let drift = self.driver.check_manual_rotation(&self.encoder)?;
        self.drift_reported = true;
        Some(drift)
    }

    fn require_dock(&mut self) -> Result<(), OperationError> {
        if self.caps.dock.is_ready() {
            Ok(())
        } else {
            warn!("Dock not ready, refusing to move");
            Err(OperationError::InterlockNotSatisfied)
        }
    }

    fn run_leg(&mut self, leg: Leg) -> Result<MoveReport, OperationError> {
        let degrees = leg.wheel_degrees(self.drum.pitch_degrees());
        debug!(
            "Leg to slot {}: {} pitches {:?} ({:.2}°)",
            leg.target, leg.steps, leg.direction, degrees
        );
        self.test_move(degrees)
    }

    fn commit(&mut self, action: &str, leg: Leg) -> Result<u8, OperationError> {
        self.anchor();
        self.persist()?;
        info!(
            "{} complete: window {}, {} filled",
            action,
            leg.target,
            self.drum.filled_count()
        );
        Ok(self.drum.window_index())
    }

    fn anchor(&mut self) {
        self.encoder.anchor_here();
        self.drift_reported = false;
    }

    fn persist(&mut self) -> Result<(), OperationError> {
        let record = self.record();
        persistence::save(self.caps.store.as_mut(), &record)?;
        self.revision += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::simulation::{self, PlantConfig, PlantHandle};
    use crate::hardware::MemoryStore;
    use spoke_common::node::config::DockSensorKind;

    fn boot_with(store: MemoryStore) -> (NodeContext, PlantHandle) {
        let config = NodeConfig::default();
        let (caps, plant) = simulation::build(
            PlantConfig::from(&config),
            DockSensorKind::Driver,
            Box::new(store),
        );
        (NodeContext::boot(&config, caps).unwrap(), plant)
    }

    #[test]
    fn boot_writes_factory_record() {
        let store = MemoryStore::new();
        let (ctx, _plant) = boot_with(store.clone());

        assert!(matches!(ctx.load_outcome(), LoadOutcome::Initialized(_)));
        assert_eq!(ctx.drum().slots(), &[false, true, true, true, true]);
        assert_eq!(ctx.drum().window_index(), 0);
        assert_eq!(ctx.state(), DrumState::Idle);
        assert!(store.contents().is_some());
    }

    #[test]
    fn dispense_moves_and_persists() {
        let store = MemoryStore::new();
        let (mut ctx, plant) = boot_with(store.clone());

        assert_eq!(ctx.dispense_nearest(), Ok(1));
        assert_eq!(ctx.drum().slots(), &[false, false, true, true, true]);
        assert_eq!(ctx.revision(), 1);
        // one pitch counter-clockwise: 72° at 1600 steps/rev
        assert_eq!(plant.steps_received(), 320);

        let stored = PersistedRecord::from_bytes(&store.contents().unwrap()).unwrap();
        assert_eq!(stored, ctx.record());
    }

    #[test]
    fn oversized_test_move_is_refused() {
        let (mut ctx, plant) = boot_with(MemoryStore::new());

        assert!(matches!(
            ctx.test_move(1.0e9),
            Err(OperationError::InvalidParameter(_))
        ));
        assert_eq!(plant.steps_received(), 0);
        assert_eq!(ctx.state(), DrumState::Idle);
        assert!(ctx.test_move(-72.0).is_ok());
    }

    #[test]
    fn interlock_blocks_motion() {
        let (mut ctx, plant) = boot_with(MemoryStore::new());
        plant.set_dock_ready(false);

        assert_eq!(
            ctx.dispense_nearest(),
            Err(OperationError::InterlockNotSatisfied)
        );
        assert_eq!(ctx.return_nearest(), Err(OperationError::InterlockNotSatisfied));
        assert_eq!(plant.steps_received(), 0);
        assert_eq!(ctx.revision(), 0);
    }

    #[test]
    fn out_of_range_parameters_change_nothing() {
        let (mut ctx, _plant) = boot_with(MemoryStore::new());
        let before = *ctx.motion();

        assert!(ctx.set_parameter(Parameter::StepsPerRev(50)).is_err());
        assert!(ctx.set_parameter(Parameter::DegPerSec(0.1)).is_err());
        assert!(ctx.set_parameter(Parameter::DegPerSec(f32::NAN)).is_err());
        assert!(ctx.set_parameter(Parameter::DirCwHigh(2)).is_err());
        assert!(ctx.set_parameter(Parameter::SpokeCount(9)).is_err());
        assert!(ctx.set_parameter(Parameter::Unknown(0x7F)).is_err());

        assert_eq!(*ctx.motion(), before);
        assert_eq!(ctx.drum().spoke_count(), 5);
        assert_eq!(ctx.revision(), 0);
    }

    #[test]
    fn parameters_apply_at_bounds() {
        let (mut ctx, _plant) = boot_with(MemoryStore::new());

        ctx.set_parameter(Parameter::StepsPerRev(25600)).unwrap();
        ctx.set_parameter(Parameter::DegPerSec(720.0)).unwrap();
        ctx.set_parameter(Parameter::DirCwHigh(0)).unwrap();

        assert_eq!(
            *ctx.motion(),
            MotionConfig {
                steps_per_rev: 25600,
                deg_per_sec: 720.0,
                dir_cw_high: false,
            }
        );
        assert_eq!(ctx.revision(), 3);
    }

    #[test]
    fn zero_here_uses_current_reading() {
        let store = MemoryStore::new();
        let (mut ctx, plant) = boot_with(store.clone());
        plant.rotate_by_hand(300.0);

        let zero = ctx.set_zero_here().unwrap();
        assert_eq!(zero, plant.raw());
        assert_eq!(ctx.encoder().angle_degrees(), 0.0);

        let stored = PersistedRecord::from_bytes(&store.contents().unwrap()).unwrap();
        assert_eq!(stored.encoder_zero, zero);
    }

    #[test]
    fn persistence_failure_is_fatal_but_reported() {
        let store = MemoryStore::new();
        let (mut ctx, _plant) = boot_with(store.clone());
        store.set_fail_writes(true);

        let err = ctx.set_slot(1, false).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn manual_drift_reported_once_until_reanchored() {
        let (mut ctx, plant) = boot_with(MemoryStore::new());

        plant.rotate_by_hand(1500.0);
        assert_eq!(ctx.poll_encoder(), None);
        plant.rotate_by_hand(1500.0);
        assert_eq!(ctx.poll_encoder(), Some(3000));
        assert_eq!(ctx.poll_encoder(), None);

        // inventory is untouched by the advisory
        assert_eq!(ctx.drum().window_index(), 0);
        assert_eq!(ctx.drum().filled_count(), 4);
    }

    #[test]
    fn clockwise_only_routes_long_way() {
        let (mut ctx, plant) = boot_with(MemoryStore::new());
        ctx.set_clockwise_only(true);

        assert_eq!(ctx.dispense_nearest(), Ok(1));
        // clockwise from 0 to 1 on five spokes is four pitches
        assert_eq!(plant.steps_received(), 1280);
    }
}

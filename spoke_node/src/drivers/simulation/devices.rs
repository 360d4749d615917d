//! Capability implementations backed by the shared [`Plant`].

use super::plant::Plant;
use crate::hardware::{AngleSensor, DockSensor, PulseGenerator};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Stepper outputs wired to the plant.
pub struct SimPulseGenerator {
    plant: Arc<Mutex<Plant>>,
    realtime: bool,
}

impl SimPulseGenerator {
    pub(super) fn new(plant: Arc<Mutex<Plant>>) -> Self {
        let realtime = plant.lock().config().realtime;
        Self { plant, realtime }
    }
}

impl PulseGenerator for SimPulseGenerator {
    fn set_enabled(&mut self, enabled: bool) {
        self.plant.lock().set_enabled(enabled);
    }

    fn is_enabled(&self) -> bool {
        self.plant.lock().is_enabled()
    }

    fn set_direction(&mut self, level_high: bool) {
        self.plant.lock().set_direction(level_high);
    }

    fn emit(&mut self, steps: u32, half_period: Duration, on_step: &mut dyn FnMut()) {
        for _ in 0..steps {
            self.plant.lock().step();
            if self.realtime {
                std::thread::sleep(half_period * 2);
            }
            on_step();
        }
    }
}

/// Encoder reading the plant's shaft.
pub struct SimAngleSensor {
    plant: Arc<Mutex<Plant>>,
}

impl SimAngleSensor {
    pub(super) fn new(plant: Arc<Mutex<Plant>>) -> Self {
        Self { plant }
    }
}

impl AngleSensor for SimAngleSensor {
    fn read_raw(&mut self) -> u16 {
        self.plant.lock().raw()
    }
}

/// Dock interlock switched through the plant handle.
pub struct SimDockSensor {
    plant: Arc<Mutex<Plant>>,
}

impl SimDockSensor {
    pub(super) fn new(plant: Arc<Mutex<Plant>>) -> Self {
        Self { plant }
    }
}

impl DockSensor for SimDockSensor {
    fn is_ready(&mut self) -> bool {
        self.plant.lock().dock_ready()
    }
}

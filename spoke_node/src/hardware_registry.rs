//! Hardware driver registry.
//!
//! Maps driver names from `[hardware] driver = "..."` to factories that build
//! [`Capabilities`]. Constructed at startup and passed by value; there is no
//! global registry.

use crate::drivers::register_builtin;
use crate::hardware::{Capabilities, HardwareError};
use spoke_common::node::config::NodeConfig;
use std::collections::HashMap;

/// Factory building the capabilities of one driver.
pub type HardwareFactory = fn(&NodeConfig) -> Result<Capabilities, HardwareError>;

/// Registry of available hardware drivers.
pub struct HardwareRegistry {
    factories: HashMap<&'static str, HardwareFactory>,
}

impl HardwareRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in driver.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        register_builtin(&mut registry);
        registry
    }

    /// Register a driver factory.
    ///
    /// # Panics
    /// Panics if a driver with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: HardwareFactory) {
        if self.factories.contains_key(name) {
            panic!("Hardware driver '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Build capabilities for the driver named in `config`.
    ///
    /// # Errors
    /// Returns `HardwareError::DriverNotFound` for unknown names, or whatever
    /// the factory reports.
    pub fn create(&self, config: &NodeConfig) -> Result<Capabilities, HardwareError> {
        let name = config.hardware.driver.as_str();
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| HardwareError::DriverNotFound(name.to_string()))?;
        factory(config)
    }

    /// List all registered driver names.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for HardwareRegistry {
    fn default() -> Self {
        Self::new()
    }
}

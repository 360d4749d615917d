//! Drum node configuration and defaults.
//!
//! This module contains the configuration types for a drum actuator node.

pub mod config;

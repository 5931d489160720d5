//! Simulation configuration with documented constants
//!
//! All magic numbers are collected here with explanations of their purpose
//! and how they interact with each other.

use crate::core::error::{BackboneError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration for the simulation driver and the bundled behavior components
///
/// Every field has a default, so a TOML file only needs to name the values
/// it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // === DRIVER ===
    /// Simulation minutes that elapse per discrete step
    ///
    /// Passed to every component's `tick` as `delta_time`. Components must
    /// scale their continuous state by it rather than assume a fixed step.
    pub minutes_per_tick: f64,

    /// Priority stamped on events built with `ComponentBase::event`
    ///
    /// Lower = more urgent. 5 sits in the middle of the 0-9 range.
    pub default_event_priority: u8,

    /// Log every individual delivery at TRACE level
    ///
    /// Useful when replaying a run; very noisy with many agents.
    pub trace_deliveries: bool,

    /// Keep ticking the remaining components when one component fails
    ///
    /// When false (the default) a failing component aborts the step for its
    /// agent and the error propagates to the caller of `World::tick`.
    pub isolate_component_failures: bool,

    // === NEEDS ===
    /// Hunger lost per simulation minute (1.0 = sated, 0.0 = starving)
    ///
    /// At 0.0015 a sated agent becomes critical (0.2) after ~530 minutes,
    /// roughly two meals a day.
    pub hunger_decay_rate: f32,

    /// Social satisfaction lost per simulation minute
    pub social_decay_rate: f32,

    /// Fun lost per simulation minute
    pub fun_decay_rate: f32,

    /// Need value below which a `need_critical` event is emitted
    ///
    /// Emitted once per crossing; the need has to recover above the threshold
    /// before it can fire again.
    pub critical_need_threshold: f32,

    // === BODY ===
    /// Energy drained per simulation minute while awake
    pub energy_drain_rate: f32,

    // === ACTIONS ===
    /// Length of an eat action in simulation minutes
    pub eat_duration: f64,

    /// Hunger restored when an eat action completes
    pub eat_hunger_restore: f32,

    /// Energy restored when an eat action completes
    pub eat_energy_restore: f32,

    /// Length of a rest action in simulation minutes
    pub rest_duration: f64,

    /// Energy restored when a rest action completes
    pub rest_energy_restore: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            // Driver
            minutes_per_tick: 1.0,
            default_event_priority: 5,
            trace_deliveries: false,
            isolate_component_failures: false,

            // Needs (hunger > fun > social)
            hunger_decay_rate: 0.0015,
            social_decay_rate: 0.0008,
            fun_decay_rate: 0.001,
            critical_need_threshold: 0.2,

            // Body
            energy_drain_rate: 0.0005,

            // Actions
            eat_duration: 30.0,
            eat_hunger_restore: 0.6,
            eat_energy_restore: 0.15,
            rest_duration: 60.0,
            rest_energy_restore: 0.5,
        }
    }
}

impl SimulationConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(content)?;
        config.validate().map_err(BackboneError::Config)?;
        Ok(config)
    }

    /// Load a config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.minutes_per_tick > 0.0) {
            return Err(format!(
                "minutes_per_tick ({}) must be positive",
                self.minutes_per_tick
            ));
        }

        for (name, rate) in [
            ("hunger_decay_rate", self.hunger_decay_rate),
            ("social_decay_rate", self.social_decay_rate),
            ("fun_decay_rate", self.fun_decay_rate),
            ("energy_drain_rate", self.energy_drain_rate),
        ] {
            if rate < 0.0 {
                return Err(format!("{} ({}) must not be negative", name, rate));
            }
        }

        if !(0.0..=1.0).contains(&self.critical_need_threshold) {
            return Err(format!(
                "critical_need_threshold ({}) must be within 0.0..=1.0",
                self.critical_need_threshold
            ));
        }

        if self.eat_duration <= 0.0 || self.rest_duration <= 0.0 {
            return Err("action durations must be positive".to_string());
        }

        Ok(())
    }
}

//! Navigation tuning parameters.
//!
//! All thresholds are product decisions rather than contracts, so they
//! are loaded from JSON with per-field defaults and can be preset per
//! transport mode.

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};

/// Transport mode used to pick tolerance presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Walking,
    #[default]
    Cycling,
    Driving,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavConfig {
    /// Half-width of the corridor around a step's geometry (meters)
    #[serde(default = "default_on_path_threshold")]
    pub on_path_threshold_m: f64,

    /// Remaining distance to the destination that counts as arrival (meters)
    #[serde(default = "default_arrival_threshold")]
    pub arrival_threshold_m: f64,

    /// Distance to the next maneuver that triggers the approach cue (meters)
    #[serde(default = "default_approach_announce")]
    pub approach_announce_m: f64,

    /// Distance above which the approach cue re-arms (meters)
    #[serde(default = "default_approach_rearm")]
    pub approach_rearm_m: f64,

    /// Interval between replayed positions (milliseconds)
    #[serde(default = "default_replay_tick")]
    pub replay_tick_ms: u64,

    /// Minimum time between accepted live fixes (milliseconds)
    #[serde(default = "default_live_min_interval")]
    pub live_min_interval_ms: u64,

    /// Minimum movement between accepted live fixes (meters)
    #[serde(default = "default_live_min_distance")]
    pub live_min_distance_m: f64,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            on_path_threshold_m: default_on_path_threshold(),
            arrival_threshold_m: default_arrival_threshold(),
            approach_announce_m: default_approach_announce(),
            approach_rearm_m: default_approach_rearm(),
            replay_tick_ms: default_replay_tick(),
            live_min_interval_ms: default_live_min_interval(),
            live_min_distance_m: default_live_min_distance(),
        }
    }
}

impl NavConfig {
    /// Preset tolerances for a transport mode.
    pub fn for_mode(mode: TransportMode) -> Self {
        match mode {
            TransportMode::Walking => Self {
                on_path_threshold_m: 20.0,
                arrival_threshold_m: 10.0,
                approach_announce_m: 50.0,
                approach_rearm_m: 150.0,
                live_min_distance_m: 2.0,
                ..Self::default()
            },
            TransportMode::Cycling => Self::default(),
            TransportMode::Driving => Self {
                on_path_threshold_m: 30.0,
                arrival_threshold_m: 25.0,
                approach_announce_m: 400.0,
                approach_rearm_m: 1000.0,
                live_min_distance_m: 10.0,
                ..Self::default()
            },
        }
    }

    /// Parse a (possibly partial) JSON object and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: NavConfig =
            serde_json::from_str(json).map_err(|e| NavError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("on_path_threshold_m", self.on_path_threshold_m),
            ("arrival_threshold_m", self.arrival_threshold_m),
            ("approach_announce_m", self.approach_announce_m),
            ("approach_rearm_m", self.approach_rearm_m),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(NavError::Config(format!("{name} must be positive, got {value}")));
            }
        }
        if self.live_min_distance_m < 0.0 {
            return Err(NavError::Config("live_min_distance_m must not be negative".into()));
        }
        if self.replay_tick_ms == 0 {
            return Err(NavError::Config("replay_tick_ms must be positive".into()));
        }
        if self.approach_rearm_m <= self.approach_announce_m {
            return Err(NavError::Config(format!(
                "approach_rearm_m ({}) must exceed approach_announce_m ({})",
                self.approach_rearm_m, self.approach_announce_m
            )));
        }
        Ok(())
    }
}

// Default value functions
fn default_on_path_threshold() -> f64 {
    25.0
}
fn default_arrival_threshold() -> f64 {
    15.0
}
fn default_approach_announce() -> f64 {
    200.0
}
fn default_approach_rearm() -> f64 {
    500.0
}
fn default_replay_tick() -> u64 {
    1000
}
fn default_live_min_interval() -> u64 {
    1000
}
fn default_live_min_distance() -> f64 {
    5.0
}

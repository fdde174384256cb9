//! Route and maneuver step model.
//!
//! Routes are produced once by an external directions provider (or
//! synthesized from a GPX route) and never mutated afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::geo::{GeoPoint, Polyline};

/// Kind of maneuver performed at the start of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManeuverType {
    Depart,
    Turn,
    Continue,
    #[serde(rename = "new name")]
    NewName,
    Merge,
    #[serde(rename = "on ramp")]
    OnRamp,
    #[serde(rename = "off ramp")]
    OffRamp,
    Fork,
    #[serde(rename = "end of road")]
    EndOfRoad,
    Roundabout,
    Rotary,
    #[serde(rename = "roundabout turn")]
    RoundaboutTurn,
    #[serde(rename = "exit roundabout")]
    ExitRoundabout,
    #[serde(rename = "exit rotary")]
    ExitRotary,
    Notification,
    Arrive,
    #[serde(other)]
    Other,
}

/// Direction qualifier of a maneuver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManeuverModifier {
    #[serde(rename = "sharp left")]
    SharpLeft,
    Left,
    #[serde(rename = "slight left")]
    SlightLeft,
    Straight,
    #[serde(rename = "slight right")]
    SlightRight,
    Right,
    #[serde(rename = "sharp right")]
    SharpRight,
    #[serde(rename = "uturn")]
    UTurn,
    #[default]
    #[serde(other)]
    None,
}

/// One instruction-bearing segment of a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Where the maneuver takes place.
    pub maneuver_location: GeoPoint,
    /// Sub-path covered by this step.
    pub geometry: Polyline,
    pub instruction: String,
    pub maneuver_type: ManeuverType,
    #[serde(default)]
    pub modifier: ManeuverModifier,
}

/// A complete route: full geometry plus ordered maneuver steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub coordinates: Polyline,
    pub steps: Vec<Step>,
    pub distance_m: f64,
    pub duration_s: f64,
}

impl Route {
    /// Check the preconditions navigation relies on.
    pub fn validate(&self) -> Result<()> {
        if self.coordinates.is_empty() {
            return Err(NavError::MalformedRoute("route has no coordinates".into()));
        }
        if self.steps.is_empty() {
            return Err(NavError::MalformedRoute("route has no steps".into()));
        }
        Ok(())
    }

    /// The destination, i.e. the last step's maneuver location.
    pub fn destination(&self) -> Option<&GeoPoint> {
        self.steps.last().map(|s| &s.maneuver_location)
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }
}

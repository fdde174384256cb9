//! Route-progress state machine.
//!
//! [`Engine`] owns the navigation session and evaluates every position
//! sample independently against the active route. It performs no I/O;
//! side effects (speech, vibration) are derived later from the emitted
//! [`NavigationStatus`] values by the announcer.
//!
//! # Per-sample evaluation
//!
//! 1. Arrival: remaining path distance to the last maneuver below the
//!    arrival threshold ends the session in [`NavPhase::Arrived`].
//! 2. Current step: still inside its corridor keeps the step index.
//! 3. Forward scan: the first later step whose corridor contains the
//!    sample becomes current, skipping missed steps.
//! 4. Otherwise the traveler is off route; the step index is kept.
//!
//! The step index never decreases within a session.

use std::time::Instant;

use serde::Serialize;

use crate::config::NavConfig;
use crate::error::Result;
use crate::geo::GeoPoint;
use crate::matcher::is_on_path;
use crate::path::path_distance;
use crate::route::Route;

/// Navigation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum NavPhase {
    /// No session, or the route was rejected.
    #[default]
    NotStarted,
    Active { step_index: usize, on_route: bool },
    /// Terminal until the session is stopped.
    Arrived { step_index: usize },
}

impl NavPhase {
    pub fn step_index(&self) -> Option<usize> {
        match *self {
            NavPhase::NotStarted => None,
            NavPhase::Active { step_index, .. } | NavPhase::Arrived { step_index } => {
                Some(step_index)
            }
        }
    }

    pub fn is_on_route(&self) -> bool {
        match *self {
            NavPhase::Active { on_route, .. } => on_route,
            NavPhase::Arrived { .. } => true,
            NavPhase::NotStarted => false,
        }
    }

    pub fn has_arrived(&self) -> bool {
        matches!(self, NavPhase::Arrived { .. })
    }
}

/// Read-only snapshot emitted after every processed sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationStatus {
    pub position: GeoPoint,
    pub current_step_index: usize,
    /// None on the last step, where no further maneuver exists.
    pub distance_to_next_maneuver_m: Option<f64>,
    pub distance_to_destination_m: f64,
    pub is_on_route: bool,
    pub has_arrived: bool,
    pub should_announce_approach: bool,
    pub should_announce_step: bool,
}

/// Mutable state of one navigation session.
#[derive(Debug, Clone)]
pub struct NavigationSession {
    route: Route,
    phase: NavPhase,
    last_position: Option<GeoPoint>,
    last_sample_at: Option<Instant>,
    /// Step entry not yet announced (set on start).
    step_announcement_pending: bool,
    /// Approach cue may fire for the current step.
    approach_armed: bool,
}

impl NavigationSession {
    fn new(route: Route) -> Self {
        Self {
            route,
            phase: NavPhase::Active {
                step_index: 0,
                on_route: true,
            },
            last_position: None,
            last_sample_at: None,
            step_announcement_pending: true,
            approach_armed: false,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn phase(&self) -> NavPhase {
        self.phase
    }

    pub fn last_position(&self) -> Option<GeoPoint> {
        self.last_position
    }

    pub fn last_sample_at(&self) -> Option<Instant> {
        self.last_sample_at
    }
}

/// The navigation state machine.
#[derive(Debug, Clone)]
pub struct Engine {
    config: NavConfig,
    session: Option<NavigationSession>,
}

impl Engine {
    pub fn new(config: NavConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&NavigationSession> {
        self.session.as_ref()
    }

    pub fn phase(&self) -> NavPhase {
        self.session.as_ref().map_or(NavPhase::NotStarted, |s| s.phase)
    }

    /// Start navigating `route`, replacing any running session.
    ///
    /// A malformed route is rejected and leaves the engine untouched.
    pub fn start(&mut self, route: Route) -> Result<()> {
        route.validate()?;
        if self.session.is_some() {
            self.stop();
        }
        log::info!(
            "Navigation started: {} steps, {} coordinates, {:.0} m",
            route.steps.len(),
            route.coordinates.len(),
            route.distance_m
        );
        self.session = Some(NavigationSession::new(route));
        Ok(())
    }

    /// End the session. Idempotent.
    pub fn stop(&mut self) {
        if self.session.take().is_some() {
            log::info!("Navigation stopped");
        }
    }

    /// Evaluate one position sample.
    ///
    /// Returns None when no session is running.
    pub fn update(&mut self, position: GeoPoint) -> Option<NavigationStatus> {
        let config = &self.config;
        let session = self.session.as_mut()?;
        let route = &session.route;
        let last = route.steps.len() - 1;

        let destination = route.steps[last].maneuver_location;
        let distance_to_destination = path_distance(&position, &destination, &route.coordinates);

        let previous = session.phase;
        let next_phase = match previous {
            NavPhase::Arrived { step_index } => NavPhase::Arrived { step_index },
            _ if distance_to_destination < config.arrival_threshold_m => NavPhase::Arrived {
                step_index: previous.step_index().unwrap_or(0),
            },
            NavPhase::Active { step_index, .. } => {
                evaluate_step(&position, route, step_index, config.on_path_threshold_m)
            }
            NavPhase::NotStarted => return None,
        };

        let step_index = next_phase.step_index().unwrap_or(0);
        let has_arrived = next_phase.has_arrived();

        let distance_to_next_maneuver = if has_arrived {
            None
        } else {
            route
                .steps
                .get(step_index + 1)
                .map(|next| path_distance(&position, &next.maneuver_location, &route.coordinates))
        };

        let step_changed = previous.step_index() != Some(step_index);
        let should_announce_step =
            !has_arrived && (session.step_announcement_pending || step_changed);

        // Entering a step arms the approach cue only if the maneuver is
        // still beyond the announce distance; the step cue covers it otherwise.
        let mut approach_armed = session.approach_armed;
        if session.step_announcement_pending || step_changed {
            approach_armed =
                distance_to_next_maneuver.is_some_and(|d| d >= config.approach_announce_m);
        }
        let mut should_announce_approach = false;
        if let Some(d) = distance_to_next_maneuver {
            if d > config.approach_rearm_m {
                approach_armed = true;
            } else if approach_armed && d < config.approach_announce_m {
                should_announce_approach = true;
                approach_armed = false;
            }
        }

        let status = NavigationStatus {
            position,
            current_step_index: step_index,
            distance_to_next_maneuver_m: distance_to_next_maneuver,
            distance_to_destination_m: distance_to_destination,
            is_on_route: next_phase.is_on_route(),
            has_arrived,
            should_announce_approach,
            should_announce_step,
        };

        log_transition(&previous, &next_phase);

        session.phase = next_phase;
        session.last_position = Some(position);
        session.last_sample_at = Some(Instant::now());
        session.step_announcement_pending = false;
        session.approach_armed = approach_armed;

        Some(status)
    }
}

/// Steps 2-4 of the per-sample evaluation for an active session.
fn evaluate_step(position: &GeoPoint, route: &Route, current: usize, threshold_m: f64) -> NavPhase {
    if is_on_path(position, &route.steps[current], threshold_m) {
        return NavPhase::Active {
            step_index: current,
            on_route: true,
        };
    }

    let ahead = route
        .steps
        .iter()
        .enumerate()
        .skip(current + 1)
        .find(|(_, step)| is_on_path(position, step, threshold_m));

    match ahead {
        Some((index, _)) => NavPhase::Active {
            step_index: index,
            on_route: true,
        },
        None => NavPhase::Active {
            step_index: current,
            on_route: false,
        },
    }
}

fn log_transition(previous: &NavPhase, next: &NavPhase) {
    match (*previous, *next) {
        (NavPhase::Active { .. }, NavPhase::Arrived { step_index }) => {
            log::info!("Arrived at destination (step {step_index})");
        }
        (
            NavPhase::Active {
                step_index: from,
                on_route: was_on,
            },
            NavPhase::Active {
                step_index: to,
                on_route: is_on,
            },
        ) => {
            if to != from {
                log::info!("Advanced from step {from} to step {to}");
            }
            if was_on && !is_on {
                log::warn!("Off route at step {to}");
            } else if !was_on && is_on {
                log::info!("Back on route at step {to}");
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{ManeuverModifier, ManeuverType, Step};

    fn pt(lon: f64, lat: f64) -> GeoPoint {
        GeoPoint::new(lon, lat)
    }

    fn step(maneuver_type: ManeuverType, geometry: Vec<GeoPoint>) -> Step {
        Step {
            maneuver_location: geometry[0],
            geometry,
            instruction: format!("{maneuver_type:?}"),
            maneuver_type,
            modifier: ManeuverModifier::None,
        }
    }

    /// L-shaped route: 2.2 km north, then 2.2 km east, then arrive.
    fn l_route() -> Route {
        let coordinates = vec![
            pt(0.0, 0.0),
            pt(0.0, 0.01),
            pt(0.0, 0.02),
            pt(0.01, 0.02),
            pt(0.02, 0.02),
        ];
        Route {
            steps: vec![
                step(ManeuverType::Depart, coordinates[0..=2].to_vec()),
                step(ManeuverType::Turn, coordinates[2..=4].to_vec()),
                step(ManeuverType::Arrive, vec![coordinates[4], coordinates[4]]),
            ],
            distance_m: crate::geo::polyline_length(&coordinates),
            duration_s: 900.0,
            coordinates,
        }
    }

    fn engine() -> Engine {
        Engine::new(NavConfig::default())
    }

    #[test]
    fn update_without_session_is_noop() {
        let mut e = engine();
        assert!(e.update(pt(0.0, 0.0)).is_none());
        assert_eq!(e.phase(), NavPhase::NotStarted);
    }

    #[test]
    fn malformed_route_stays_not_started() {
        let mut e = engine();
        let mut route = l_route();
        route.steps.clear();
        assert!(e.start(route).is_err());
        assert_eq!(e.phase(), NavPhase::NotStarted);
        assert!(e.update(pt(0.0, 0.0)).is_none());
    }

    #[test]
    fn malformed_route_leaves_running_session_alone() {
        let mut e = engine();
        e.start(l_route()).unwrap();
        let mut bad = l_route();
        bad.coordinates.clear();
        assert!(e.start(bad).is_err());
        assert!(e.session().is_some());
    }

    #[test]
    fn first_sample_announces_step_zero() {
        let mut e = engine();
        e.start(l_route()).unwrap();
        let s = e.update(pt(0.0, 0.001)).unwrap();
        assert_eq!(s.current_step_index, 0);
        assert!(s.is_on_route);
        assert!(s.should_announce_step);
        assert!(!s.has_arrived);
    }

    #[test]
    fn step_announcement_is_edge_triggered() {
        let mut e = engine();
        e.start(l_route()).unwrap();
        let flags: Vec<bool> = [0.001, 0.002, 0.003, 0.004]
            .iter()
            .map(|lat| e.update(pt(0.0, *lat)).unwrap().should_announce_step)
            .collect();
        assert_eq!(flags, vec![true, false, false, false]);

        let s = e.update(pt(0.005, 0.02)).unwrap();
        assert_eq!(s.current_step_index, 1);
        assert!(s.should_announce_step);
        let s = e.update(pt(0.006, 0.02)).unwrap();
        assert!(!s.should_announce_step);
    }

    #[test]
    fn distances_reported_along_route() {
        let mut e = engine();
        e.start(l_route()).unwrap();
        let s = e.update(pt(0.0, 0.0)).unwrap();
        let to_turn = s.distance_to_next_maneuver_m.unwrap();
        assert!((to_turn - 2_223.9).abs() < 5.0, "Expected ~2224 m, got {to_turn:.1}");
        assert!(s.distance_to_destination_m > 4_400.0);
    }

    #[test]
    fn arrival_takes_precedence_over_step_evaluation() {
        let mut e = engine();
        e.start(l_route()).unwrap();
        e.update(pt(0.0, 0.001)).unwrap();
        // Within 15 m of the destination, still on step 0's index
        let s = e.update(pt(0.0199, 0.02)).unwrap();
        assert!(s.has_arrived);
        assert!(s.is_on_route);
        assert_eq!(s.current_step_index, 0);
        assert!(!s.should_announce_step);
        assert_eq!(s.distance_to_next_maneuver_m, None);
    }

    #[test]
    fn arrived_is_terminal() {
        let mut e = engine();
        e.start(l_route()).unwrap();
        e.update(pt(0.0, 0.001)).unwrap();
        e.update(pt(0.005, 0.02)).unwrap();
        e.update(pt(0.02, 0.02)).unwrap();
        assert!(e.phase().has_arrived());

        // Far off any geometry
        let s = e.update(pt(1.0, 1.0)).unwrap();
        assert!(s.has_arrived);
        assert!(s.is_on_route);
        assert_eq!(s.current_step_index, 1);
    }

    #[test]
    fn off_route_keeps_index_and_recovers() {
        let mut e = engine();
        e.start(l_route()).unwrap();
        e.update(pt(0.0, 0.005)).unwrap();

        let s = e.update(pt(0.005, 0.005)).unwrap();
        assert!(!s.is_on_route);
        assert_eq!(s.current_step_index, 0);

        let s = e.update(pt(0.0, 0.006)).unwrap();
        assert!(s.is_on_route);
        assert_eq!(s.current_step_index, 0);
        assert!(!s.should_announce_step);
    }

    #[test]
    fn forward_scan_skips_missed_steps() {
        let coordinates = vec![
            pt(0.0, 0.0),
            pt(0.0, 0.01),
            pt(0.01, 0.01),
            pt(0.01, 0.03),
            pt(0.02, 0.03),
        ];
        let route = Route {
            steps: vec![
                step(ManeuverType::Depart, coordinates[0..=1].to_vec()),
                step(ManeuverType::Turn, coordinates[1..=2].to_vec()),
                step(ManeuverType::Turn, coordinates[2..=3].to_vec()),
                step(ManeuverType::Turn, coordinates[3..=4].to_vec()),
                step(ManeuverType::Arrive, vec![coordinates[4]]),
            ],
            distance_m: 0.0,
            duration_s: 0.0,
            coordinates,
        };
        let mut e = engine();
        e.start(route).unwrap();
        e.update(pt(0.0, 0.005)).unwrap();
        let s = e.update(pt(0.01, 0.02)).unwrap();
        assert_eq!(s.current_step_index, 2);
        assert!(s.should_announce_step);
    }

    #[test]
    fn scan_never_looks_backward() {
        let mut e = engine();
        e.start(l_route()).unwrap();
        e.update(pt(0.005, 0.02)).unwrap();
        assert_eq!(e.phase().step_index(), Some(1));

        // Back on step 0's geometry: no regression, just off route
        let s = e.update(pt(0.0, 0.005)).unwrap();
        assert_eq!(s.current_step_index, 1);
        assert!(!s.is_on_route);
    }

    #[test]
    fn step_index_is_monotonic() {
        let mut e = engine();
        e.start(l_route()).unwrap();
        let samples = [
            pt(0.0, 0.001),
            pt(0.005, 0.02),
            pt(0.0, 0.01),
            pt(0.5, 0.5),
            pt(0.0, 0.0),
            pt(0.01, 0.02),
        ];
        let mut last = 0;
        for p in samples {
            let s = e.update(p).unwrap();
            assert!(s.current_step_index >= last);
            last = s.current_step_index;
        }
    }

    #[test]
    fn approach_fires_once_with_hysteresis() {
        let mut e = engine();
        e.start(l_route()).unwrap();
        // Turn is at lat 0.02 (~2224 m from origin)
        let fired: Vec<bool> = [0.010, 0.019, 0.0185, 0.0195, 0.0188]
            .iter()
            .map(|lat| e.update(pt(0.0, *lat)).unwrap().should_announce_approach)
            .collect();
        assert_eq!(fired, vec![false, true, false, false, false]);

        // Drifting back beyond the rearm distance re-arms the cue
        assert!(!e.update(pt(0.0, 0.01)).unwrap().should_announce_approach);
        assert!(e.update(pt(0.0, 0.019)).unwrap().should_announce_approach);
    }

    #[test]
    fn last_step_has_no_next_maneuver() {
        let coordinates = vec![pt(0.0, 0.0), pt(0.0, 0.01), pt(0.0, 0.02)];
        let mut arrive = step(ManeuverType::Arrive, coordinates[1..=2].to_vec());
        arrive.maneuver_location = coordinates[2];
        let route = Route {
            steps: vec![step(ManeuverType::Depart, coordinates[0..=1].to_vec()), arrive],
            distance_m: 0.0,
            duration_s: 0.0,
            coordinates,
        };
        let mut e = engine();
        e.start(route).unwrap();
        let s = e.update(pt(0.0, 0.015)).unwrap();
        assert_eq!(s.current_step_index, 1);
        assert!(!s.has_arrived);
        assert_eq!(s.distance_to_next_maneuver_m, None);
        assert!(!s.should_announce_approach);
    }

    #[test]
    fn step_entry_near_maneuver_does_not_double_announce() {
        let mut e = engine();
        e.start(l_route()).unwrap();
        // First sample already inside the approach distance
        let s = e.update(pt(0.0, 0.019)).unwrap();
        assert!(s.should_announce_step);
        assert!(!s.should_announce_approach);
    }

    #[test]
    fn stop_is_idempotent_and_resets() {
        let mut e = engine();
        e.start(l_route()).unwrap();
        e.update(pt(0.0, 0.001)).unwrap();
        e.stop();
        e.stop();
        assert_eq!(e.phase(), NavPhase::NotStarted);
        assert!(e.update(pt(0.0, 0.001)).is_none());
    }

    #[test]
    fn restart_begins_a_fresh_session() {
        let mut e = engine();
        e.start(l_route()).unwrap();
        e.update(pt(0.005, 0.02)).unwrap();
        e.start(l_route()).unwrap();
        let s = e.update(pt(0.0, 0.001)).unwrap();
        assert_eq!(s.current_step_index, 0);
        assert!(s.should_announce_step);
        assert_eq!(e.session().and_then(|s| s.last_position()), Some(pt(0.0, 0.001)));
    }
}

//! Voice and haptic cues derived from navigation status.
//!
//! The engine only reports what changed; the [`Announcer`] compares
//! successive statuses and turns them into [`Cue`]s, which a host
//! [`CueSink`] speaks and vibrates. Keeping this out of the engine lets
//! the state machine be tested without any audio backend.

use serde::Serialize;

use crate::engine::NavigationStatus;
use crate::route::Route;

/// Vibration pattern played with every cue (milliseconds, off/on).
pub const VIBRATION_PATTERN_MS: [u64; 2] = [0, 300];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CueKind {
    Step,
    Approach,
    OffRoute,
    Arrived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cue {
    pub kind: CueKind,
    pub text: String,
    pub vibrate: bool,
}

impl Cue {
    fn new(kind: CueKind, text: String) -> Self {
        Self {
            kind,
            text,
            vibrate: true,
        }
    }
}

/// Speech and vibration output provided by the host platform.
pub trait CueSink {
    fn speak(&mut self, text: &str);
    fn vibrate(&mut self, pattern_ms: &[u64]);
}

/// Decides what to say for each new status.
#[derive(Debug, Default)]
pub struct Announcer {
    previous: Option<NavigationStatus>,
}

impl Announcer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous status, e.g. when a new session starts.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Cues to emit for `status`, given the status seen before it.
    pub fn review(&mut self, route: &Route, status: &NavigationStatus) -> Vec<Cue> {
        let previous = self.previous.replace(status.clone());
        let was_arrived = previous.as_ref().is_some_and(|p| p.has_arrived);
        let was_on_route = previous.as_ref().is_none_or(|p| p.is_on_route);

        if status.has_arrived {
            if was_arrived {
                return Vec::new();
            }
            return vec![Cue::new(CueKind::Arrived, "You have arrived".into())];
        }

        if !status.is_on_route {
            if was_on_route {
                return vec![Cue::new(CueKind::OffRoute, "You are off route".into())];
            }
            return Vec::new();
        }

        let mut cues = Vec::new();
        let rejoined = !was_on_route;
        if status.should_announce_step || rejoined {
            if let Some(text) = step_text(route, status) {
                cues.push(Cue::new(CueKind::Step, text));
            }
        }
        if status.should_announce_approach {
            if let Some(text) = approach_text(route, status) {
                cues.push(Cue::new(CueKind::Approach, text));
            }
        }
        cues
    }

    /// Review `status` and play the resulting cues on `sink`.
    pub fn dispatch(&mut self, route: &Route, status: &NavigationStatus, sink: &mut dyn CueSink) {
        for cue in self.review(route, status) {
            log::debug!("Cue {:?}: {}", cue.kind, cue.text);
            if cue.vibrate {
                sink.vibrate(&VIBRATION_PATTERN_MS);
            }
            sink.speak(&cue.text);
        }
    }
}

/// Instruction shown and spoken when a step becomes current.
pub fn step_text(route: &Route, status: &NavigationStatus) -> Option<String> {
    let current = route.step(status.current_step_index)?;
    let Some(next) = route.step(status.current_step_index + 1) else {
        return Some(current.instruction.clone());
    };
    let distance = format_distance(status.distance_to_next_maneuver_m.unwrap_or(0.0));

    if status.current_step_index == 0 {
        Some(format!(
            "{}\nThen in {distance}, {}",
            current.instruction, next.instruction
        ))
    } else {
        Some(format!("In {distance}, {}", next.instruction))
    }
}

fn approach_text(route: &Route, status: &NavigationStatus) -> Option<String> {
    let next = route.step(status.current_step_index + 1)?;
    let distance = format_distance(status.distance_to_next_maneuver_m?);
    Some(format!("In {distance}, {}", next.instruction))
}

/// Human-readable distance: 50 m steps below a kilometer, then km.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{} m", (meters / 50.0).round() as i64 * 50)
    } else {
        format!("{:.1} km", meters / 1000.0)
    }
}

/// Human-readable duration in minutes, with hours past the hour mark.
pub fn format_duration(seconds: f64) -> String {
    let minutes = (seconds / 60.0).round() as i64;
    if minutes < 60 {
        format!("{minutes} min")
    } else {
        format!("{} h {:02} min", minutes / 60, minutes % 60)
    }
}

/// One-line route overview shown before navigation starts.
pub fn route_summary(route: &Route) -> String {
    format!(
        "{} · {}",
        format_distance(route.distance_m),
        format_duration(route.duration_s)
    )
}

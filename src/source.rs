//! Position sources feeding the navigator.
//!
//! Two interchangeable producers push [`GeoPoint`]s through the same
//! [`SampleSink`]:
//!
//! - [`ReplaySource`] walks a polyline on a fixed tick from its own
//!   thread, for simulation without real movement.
//! - [`LiveSource`] accepts fixes from the platform location provider
//!   through a cloneable [`LiveHandle`], filtered to a minimum time and
//!   distance interval.
//!
//! [`SourceAdapter`] owns the single active subscription and always
//! stops the previous source before starting the next one.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::config::NavConfig;
use crate::error::{NavError, Result};
use crate::geo::{distance, GeoPoint};
use crate::navigator::SampleSink;
use crate::route::Route;

/// A producer of position samples.
pub trait PositionSource: Send {
    fn name(&self) -> &'static str;

    /// Begin delivering samples to `sink`.
    fn start(&mut self, sink: SampleSink) -> Result<()>;

    /// Stop delivering. Must be idempotent and must not return while
    /// samples can still be pushed.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Reason the source stopped on its own, if it did.
    fn failure(&self) -> Option<String> {
        None
    }
}

/// Replays a fixed list of positions.
pub struct ReplaySource {
    points: Vec<GeoPoint>,
    tick: Duration,
    worker: Option<(Sender<()>, JoinHandle<()>)>,
}

impl ReplaySource {
    pub fn new(points: Vec<GeoPoint>, tick: Duration) -> Self {
        Self {
            points,
            tick,
            worker: None,
        }
    }

    /// Replay a route's own coordinates.
    pub fn from_route(route: &Route, tick: Duration) -> Self {
        Self::new(route.coordinates.clone(), tick)
    }
}

impl PositionSource for ReplaySource {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn start(&mut self, sink: SampleSink) -> Result<()> {
        self.stop();

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let points = self.points.clone();
        let tick = self.tick;

        let handle = thread::Builder::new()
            .name("replay".into())
            .spawn(move || {
                for (i, point) in points.into_iter().enumerate() {
                    if sink.push(point).is_err() {
                        log::warn!("Replay stopped at point {i}: engine gone");
                        return;
                    }
                    match stop_rx.recv_timeout(tick) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
                log::info!("Replay finished");
            })
            .map_err(|e| NavError::Thread(e.to_string()))?;

        log::info!("Replay started: {} points every {:?}", self.points.len(), self.tick);
        self.worker = Some((stop_tx, handle));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some((stop_tx, handle)) = self.worker.take() {
            let _ = stop_tx.try_send(());
            if handle.join().is_err() {
                log::error!("Replay thread panicked");
            }
        }
    }

    fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Default)]
struct LiveState {
    sink: Option<SampleSink>,
    last_fix: Option<(GeoPoint, u64)>,
    failure: Option<String>,
}

/// Receives fixes from the platform location provider.
pub struct LiveSource {
    shared: Arc<Mutex<LiveState>>,
    min_interval_ms: u64,
    min_distance_m: f64,
}

impl LiveSource {
    pub fn new(config: &NavConfig) -> Self {
        Self {
            shared: Arc::new(Mutex::new(LiveState::default())),
            min_interval_ms: config.live_min_interval_ms,
            min_distance_m: config.live_min_distance_m,
        }
    }

    /// Callback handle for the location provider.
    pub fn handle(&self) -> LiveHandle {
        LiveHandle {
            shared: Arc::clone(&self.shared),
            min_interval_ms: self.min_interval_ms,
            min_distance_m: self.min_distance_m,
        }
    }
}

impl PositionSource for LiveSource {
    fn name(&self) -> &'static str {
        "live"
    }

    fn start(&mut self, sink: SampleSink) -> Result<()> {
        let mut state = self.shared.lock();
        *state = LiveState {
            sink: Some(sink),
            ..LiveState::default()
        };
        log::info!(
            "Live location subscribed (min {} ms, {} m)",
            self.min_interval_ms,
            self.min_distance_m
        );
        Ok(())
    }

    fn stop(&mut self) {
        if self.shared.lock().sink.take().is_some() {
            log::info!("Live location unsubscribed");
        }
    }

    fn is_running(&self) -> bool {
        self.shared.lock().sink.is_some()
    }

    fn failure(&self) -> Option<String> {
        self.shared.lock().failure.clone()
    }
}

/// Cloneable entry point for platform location callbacks.
#[derive(Clone)]
pub struct LiveHandle {
    shared: Arc<Mutex<LiveState>>,
    min_interval_ms: u64,
    min_distance_m: f64,
}

impl LiveHandle {
    /// Deliver a fix taken at `timestamp_ms`.
    ///
    /// Returns `Ok(false)` when the fix is filtered out for arriving too
    /// soon or too close to the previous accepted one. Once unsubscribed
    /// it fails with [`NavError::SourceFailed`] if the provider reported
    /// a failure, else [`NavError::SourceStopped`].
    pub fn deliver(&self, position: GeoPoint, timestamp_ms: u64) -> Result<bool> {
        let mut state = self.shared.lock();
        let Some(sink) = state.sink.as_ref() else {
            return Err(match &state.failure {
                Some(reason) => NavError::SourceFailed(reason.clone()),
                None => NavError::SourceStopped,
            });
        };

        if let Some((last, last_ms)) = state.last_fix {
            let elapsed = timestamp_ms.saturating_sub(last_ms);
            if elapsed < self.min_interval_ms || distance(&last, &position) < self.min_distance_m {
                return Ok(false);
            }
        }

        sink.push(position)?;
        state.last_fix = Some((position, timestamp_ms));
        Ok(true)
    }

    /// Report a provider failure (permission revoked, outage). The
    /// source unsubscribes and keeps the reason for its owner.
    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        log::error!("Live location failed: {reason}");
        let mut state = self.shared.lock();
        state.sink = None;
        state.failure = Some(reason);
    }

    pub fn is_subscribed(&self) -> bool {
        self.shared.lock().sink.is_some()
    }
}

/// Owns the one active position source.
pub struct SourceAdapter {
    sink: SampleSink,
    active: Option<Box<dyn PositionSource>>,
}

impl SourceAdapter {
    pub fn new(sink: SampleSink) -> Self {
        Self { sink, active: None }
    }

    pub fn sink(&self) -> SampleSink {
        self.sink.clone()
    }

    /// Stop the current source, then start `source`.
    pub fn switch_to(&mut self, mut source: Box<dyn PositionSource>) -> Result<()> {
        self.stop();
        source.start(self.sink.clone())?;
        log::info!("Position source: {}", source.name());
        self.active = Some(source);
        Ok(())
    }

    /// Stop and drop the active source. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut source) = self.active.take() {
            source.stop();
            log::info!("Position source {} stopped", source.name());
        }
    }

    pub fn active_name(&self) -> Option<&'static str> {
        self.active.as_ref().map(|s| s.name())
    }

    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(|s| s.is_running())
    }

    pub fn failure(&self) -> Option<String> {
        self.active.as_ref().and_then(|s| s.failure())
    }
}

impl Drop for SourceAdapter {
    fn drop(&mut self) {
        self.stop();
    }
}

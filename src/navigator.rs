//! Navigation service: the control surface other components use.
//!
//! [`Navigator`] runs the [`Engine`] on a dedicated worker thread that
//! drains a single command queue, so samples arriving from several
//! threads (foreground watcher, background task, replay timer) are
//! applied one at a time in arrival order.
//!
//! # Sessions and stale samples
//!
//! Every sample is stamped with the session generation current at the
//! moment it is pushed. `start()` and `stop()` bump the generation
//! before queueing their command, so samples still in the queue from a
//! previous session are dropped instead of being applied to the new one.
//!
//! # Snapshots
//!
//! The worker computes a full [`NavigationStatus`] and publishes it in a
//! single write; readers never see a half-updated session. Listeners
//! registered with [`Navigator::on_status_changed`] run on the worker
//! thread after publication and must not register or remove listeners
//! from inside the callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::announcer::{Announcer, CueSink};
use crate::config::NavConfig;
use crate::engine::{Engine, NavPhase, NavigationStatus};
use crate::error::{NavError, Result};
use crate::geo::GeoPoint;
use crate::route::Route;
use crate::source::{LiveHandle, LiveSource, PositionSource, ReplaySource, SourceAdapter};

pub(crate) enum Command {
    Start { route: Route, generation: u64 },
    Stop { generation: u64 },
    Sample { position: GeoPoint, generation: u64 },
    SetCueSink(Box<dyn CueSink + Send>),
    Sync(Sender<()>),
    Shutdown,
}

/// Ingestion entry point shared by every position source.
#[derive(Clone)]
pub struct SampleSink {
    commands: Sender<Command>,
    generation: Arc<AtomicU64>,
}

impl SampleSink {
    /// Queue a position for the engine.
    pub fn push(&self, position: GeoPoint) -> Result<()> {
        let generation = self.generation.load(Ordering::Acquire);
        self.commands
            .send(Command::Sample {
                position,
                generation,
            })
            .map_err(|_| NavError::EngineStopped)
    }

    /// A sink not attached to any engine, for exercising sources alone.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, Receiver<Command>) {
        let (tx, rx) = unbounded();
        let sink = Self {
            commands: tx,
            generation: Arc::new(AtomicU64::new(0)),
        };
        (sink, rx)
    }
}

/// Handle returned by [`Navigator::on_status_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&NavigationStatus) + Send>;

#[derive(Debug, Clone, Default)]
struct Snapshot {
    phase: NavPhase,
    status: Option<NavigationStatus>,
    received_at: Option<Instant>,
}

#[derive(Default)]
struct Shared {
    snapshot: RwLock<Snapshot>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
}

pub struct Navigator {
    config: NavConfig,
    commands: Sender<Command>,
    generation: Arc<AtomicU64>,
    shared: Arc<Shared>,
    sources: SourceAdapter,
    route: Option<Arc<Route>>,
    worker: Option<JoinHandle<()>>,
}

impl Navigator {
    /// Spawn the worker thread. No session is active yet.
    pub fn new(config: NavConfig) -> Result<Self> {
        config.validate()?;

        let (commands, rx) = unbounded();
        let generation = Arc::new(AtomicU64::new(0));
        let shared = Arc::new(Shared::default());

        let worker = {
            let config = config.clone();
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("navigator".into())
                .spawn(move || run_worker(config, rx, shared))
                .map_err(|e| NavError::Thread(e.to_string()))?
        };

        let sink = SampleSink {
            commands: commands.clone(),
            generation: Arc::clone(&generation),
        };

        Ok(Self {
            config,
            commands,
            generation,
            shared,
            sources: SourceAdapter::new(sink),
            route: None,
            worker: Some(worker),
        })
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Start navigating `route`, stopping any running session first.
    ///
    /// A malformed route is rejected before anything is stopped.
    pub fn start(&mut self, route: Route) -> Result<()> {
        route.validate()?;
        self.stop();

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.route = Some(Arc::new(route.clone()));
        self.send(Command::Start { route, generation })
    }

    /// Stop the position source and end the session. Idempotent.
    pub fn stop(&mut self) {
        self.sources.stop();
        self.route = None;
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        if self.send(Command::Stop { generation }).is_err() {
            log::warn!("Navigator worker gone while stopping");
        }
    }

    /// Register a callback invoked after every processed sample.
    pub fn on_status_changed<F>(&self, callback: F) -> ListenerId
    where
        F: FnMut(&NavigationStatus) + Send + 'static,
    {
        let id = ListenerId(self.shared.next_listener.fetch_add(1, Ordering::Relaxed));
        self.shared.listeners.lock().push((id, Box::new(callback)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.shared.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Route speech and vibration cues to `sink`.
    pub fn set_cue_sink(&self, sink: Box<dyn CueSink + Send>) -> Result<()> {
        self.send(Command::SetCueSink(sink))
    }

    /// Replace the active position source.
    pub fn attach_source(&mut self, source: Box<dyn PositionSource>) -> Result<()> {
        self.sources.switch_to(source)
    }

    /// Replay the active route's own coordinates.
    pub fn use_replay(&mut self) -> Result<()> {
        let route = self
            .route
            .as_ref()
            .ok_or_else(|| NavError::MalformedRoute("no active route to replay".into()))?;
        let tick = Duration::from_millis(self.config.replay_tick_ms);
        let source = ReplaySource::from_route(route, tick);
        self.attach_source(Box::new(source))
    }

    /// Switch to live fixes; the host feeds them through the returned handle.
    pub fn use_live(&mut self) -> Result<LiveHandle> {
        let source = LiveSource::new(&self.config);
        let handle = source.handle();
        self.attach_source(Box::new(source))?;
        Ok(handle)
    }

    /// Direct access to the ingestion entry point.
    pub fn sink(&self) -> SampleSink {
        self.sources.sink()
    }

    pub fn source_failure(&self) -> Option<String> {
        self.sources.failure()
    }

    pub fn route(&self) -> Option<Arc<Route>> {
        self.route.clone()
    }

    pub fn phase(&self) -> NavPhase {
        self.shared.snapshot.read().phase
    }

    /// Latest published status, if any sample was applied this session.
    pub fn status(&self) -> Option<NavigationStatus> {
        self.shared.snapshot.read().status.clone()
    }

    /// Time since the last applied sample.
    pub fn last_sample_age(&self) -> Option<Duration> {
        self.shared.snapshot.read().received_at.map(|t| t.elapsed())
    }

    /// Block until every command queued so far has been processed.
    pub fn sync(&self) -> Result<()> {
        let (tx, rx) = bounded(1);
        self.send(Command::Sync(tx))?;
        rx.recv().map_err(|_| NavError::EngineStopped)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| NavError::EngineStopped)
    }
}

impl Drop for Navigator {
    fn drop(&mut self) {
        self.sources.stop();
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Navigator worker panicked");
            }
        }
    }
}

struct CueOutput {
    announcer: Announcer,
    sink: Box<dyn CueSink + Send>,
}

fn run_worker(config: NavConfig, commands: Receiver<Command>, shared: Arc<Shared>) {
    log::debug!("Navigator worker running");
    let mut engine = Engine::new(config);
    let mut generation = 0;
    let mut cues: Option<CueOutput> = None;

    for command in commands.iter() {
        match command {
            Command::Start {
                route,
                generation: g,
            } => {
                generation = g;
                if let Err(e) = engine.start(route) {
                    log::warn!("Rejected route: {e}");
                }
                if let Some(out) = cues.as_mut() {
                    out.announcer.reset();
                }
                *shared.snapshot.write() = Snapshot {
                    phase: engine.phase(),
                    ..Snapshot::default()
                };
            }
            Command::Stop { generation: g } => {
                generation = g;
                engine.stop();
                *shared.snapshot.write() = Snapshot::default();
            }
            Command::Sample {
                position,
                generation: g,
            } => {
                if g != generation {
                    log::debug!("Dropping stale sample from session {g}");
                    continue;
                }
                let Some(status) = engine.update(position) else {
                    continue;
                };

                *shared.snapshot.write() = Snapshot {
                    phase: engine.phase(),
                    status: Some(status.clone()),
                    received_at: Some(Instant::now()),
                };

                if let (Some(out), Some(session)) = (cues.as_mut(), engine.session()) {
                    out.announcer
                        .dispatch(session.route(), &status, out.sink.as_mut());
                }
                for (_, listener) in shared.listeners.lock().iter_mut() {
                    listener(&status);
                }
            }
            Command::SetCueSink(sink) => {
                cues = Some(CueOutput {
                    announcer: Announcer::new(),
                    sink,
                });
            }
            Command::Sync(ack) => {
                let _ = ack.send(());
            }
            Command::Shutdown => break,
        }
    }
    log::debug!("Navigator worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{ManeuverModifier, ManeuverType, Step};

    fn pt(lon: f64, lat: f64) -> GeoPoint {
        GeoPoint::new(lon, lat)
    }

    fn route() -> Route {
        let coordinates = vec![pt(0.0, 0.0), pt(0.0, 0.01), pt(0.0, 0.02), pt(0.01, 0.02)];
        let step = |maneuver_type, geometry: Vec<GeoPoint>, text: &str| Step {
            maneuver_location: geometry[0],
            geometry,
            instruction: text.into(),
            maneuver_type,
            modifier: ManeuverModifier::None,
        };
        Route {
            steps: vec![
                step(ManeuverType::Depart, coordinates[0..=2].to_vec(), "Head north"),
                step(ManeuverType::Turn, coordinates[2..=3].to_vec(), "Turn right"),
                step(ManeuverType::Arrive, vec![coordinates[3]], "Arrive"),
            ],
            distance_m: 3_336.0,
            duration_s: 720.0,
            coordinates,
        }
    }

    fn navigator() -> Navigator {
        Navigator::new(NavConfig::default()).unwrap()
    }

    #[test]
    fn samples_update_published_status() {
        let mut nav = navigator();
        nav.start(route()).unwrap();
        nav.sink().push(pt(0.0, 0.001)).unwrap();
        nav.sync().unwrap();

        let status = nav.status().unwrap();
        assert_eq!(status.current_step_index, 0);
        assert!(status.should_announce_step);
        assert!(nav.last_sample_age().is_some());
        assert!(matches!(nav.phase(), NavPhase::Active { step_index: 0, .. }));
    }

    #[test]
    fn malformed_route_is_rejected_synchronously() {
        let mut nav = navigator();
        let mut bad = route();
        bad.steps.clear();
        assert!(matches!(nav.start(bad), Err(NavError::MalformedRoute(_))));
        nav.sync().unwrap();
        assert_eq!(nav.phase(), NavPhase::NotStarted);
    }

    #[test]
    fn listeners_receive_every_status_in_order() {
        let mut nav = navigator();
        let (tx, rx) = unbounded();
        nav.on_status_changed(move |s| {
            let _ = tx.send(s.current_step_index);
        });
        nav.start(route()).unwrap();
        let sink = nav.sink();
        for p in [pt(0.0, 0.001), pt(0.0, 0.01), pt(0.005, 0.02), pt(0.0, 0.005)] {
            sink.push(p).unwrap();
        }
        nav.sync().unwrap();
        let indices: Vec<usize> = rx.try_iter().collect();
        assert_eq!(indices, vec![0, 0, 1, 1]);
    }

    #[test]
    fn removed_listener_is_not_called() {
        let mut nav = navigator();
        let (tx, rx) = unbounded();
        let id = nav.on_status_changed(move |_| {
            let _ = tx.send(());
        });
        assert!(nav.remove_listener(id));
        assert!(!nav.remove_listener(id));
        nav.start(route()).unwrap();
        nav.sink().push(pt(0.0, 0.001)).unwrap();
        nav.sync().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn samples_after_stop_are_ignored() {
        let mut nav = navigator();
        nav.start(route()).unwrap();
        let sink = nav.sink();
        nav.stop();
        // No session to apply it to
        sink.push(pt(0.0, 0.001)).unwrap();
        nav.sync().unwrap();
        assert!(nav.status().is_none());
        assert_eq!(nav.phase(), NavPhase::NotStarted);
        nav.stop();
    }

    #[test]
    fn stale_generation_is_dropped_after_restart() {
        let mut nav = navigator();
        nav.start(route()).unwrap();
        let stale = nav.generation.load(Ordering::Acquire);
        nav.start(route()).unwrap();
        nav.commands
            .send(Command::Sample {
                position: pt(0.005, 0.02),
                generation: stale,
            })
            .unwrap();
        nav.sync().unwrap();
        assert!(nav.status().is_none());

        nav.sink().push(pt(0.0, 0.001)).unwrap();
        nav.sync().unwrap();
        assert_eq!(nav.status().unwrap().current_step_index, 0);
    }

    #[test]
    fn cue_sink_receives_announcements() {
        struct ChannelSink(Sender<String>);
        impl CueSink for ChannelSink {
            fn speak(&mut self, text: &str) {
                let _ = self.0.send(text.to_string());
            }
            fn vibrate(&mut self, _pattern_ms: &[u64]) {}
        }

        let mut nav = navigator();
        let (tx, rx) = unbounded();
        nav.set_cue_sink(Box::new(ChannelSink(tx))).unwrap();
        nav.start(route()).unwrap();
        nav.sink().push(pt(0.0, 0.001)).unwrap();
        nav.sink().push(pt(0.01, 0.02)).unwrap();
        nav.sync().unwrap();

        let spoken: Vec<String> = rx.try_iter().collect();
        assert_eq!(spoken.len(), 2);
        assert!(spoken[0].starts_with("Head north\nThen in"));
        assert_eq!(spoken[1], "You have arrived");
    }

    #[test]
    fn replay_requires_active_route() {
        let mut nav = navigator();
        assert!(nav.use_replay().is_err());
    }

    #[test]
    fn replay_drives_session_to_arrival() {
        let mut config = NavConfig::default();
        config.replay_tick_ms = 1;
        let mut nav = Navigator::new(config).unwrap();
        let (tx, rx) = unbounded();
        nav.on_status_changed(move |s| {
            if s.has_arrived {
                let _ = tx.send(s.clone());
            }
        });
        nav.start(route()).unwrap();
        nav.use_replay().unwrap();

        let arrived = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(arrived.is_on_route);
        nav.stop();
        assert!(nav.route().is_none());
    }

    #[test]
    fn live_handle_rejected_after_stop() {
        let mut nav = navigator();
        nav.start(route()).unwrap();
        let live = nav.use_live().unwrap();
        assert!(live.deliver(pt(0.0, 0.001), 0).unwrap());
        nav.sync().unwrap();
        assert!(nav.status().is_some());

        nav.stop();
        assert_eq!(live.deliver(pt(0.0, 0.002), 5_000), Err(NavError::SourceStopped));
    }
}

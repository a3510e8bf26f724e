//! DeviceSession - thread orchestration for one device.
//!
//! ```text
//!  submit_frame ──> [detection worker] ──MarkerSolved, FrameTick──┐
//!                     normalize + solve + remap                  ▼
//!  deliver / create_object / reset ───────────────────────> [coordinator] ──> Broadcaster
//!                                                              │
//!                                                   SceneSnapshot (RwLock)
//! ```
//!
//! The coordinator owns [`SessionState`] exclusively; the render side only
//! ever reads the published snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::marker::{estimate_marker_pose, profile_for, DeviceOrientation, PoseSolver};
use crate::scene::{NodeKind, PeerId};
use crate::sync::{Broadcaster, HubEvent, PeerTransport};

use super::messages::{DetectionJob, FrameInput, MarkerObservation, SessionEvent};
use super::state::{SceneSnapshot, SessionState};

/// Poll interval for the detection worker's shutdown check.
const RECV_TIMEOUT: Duration = Duration::from_millis(20);

/// Upper bound on how long [`SessionHandle::flush`] waits.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Off-queue marker solving for the detection worker.
///
/// Warns once when the device enters an orientation without a pose remap,
/// rather than once per frame.
pub struct DetectionStage {
    solver: Box<dyn PoseSolver>,
    half_size: f64,
    warned_orientation: Option<DeviceOrientation>,
}

impl DetectionStage {
    pub fn new(solver: Box<dyn PoseSolver>, half_size: f64) -> Self {
        Self {
            solver,
            half_size,
            warned_orientation: None,
        }
    }

    /// Solve every detection in the frame. Failed solves are dropped.
    pub fn process(&mut self, frame: &FrameInput) -> Vec<MarkerObservation> {
        let profile = profile_for(frame.orientation);
        if profile.supports_pose() {
            self.warned_orientation = None;
        }

        let mut observations = Vec::with_capacity(frame.detections.len());
        for detection in &frame.detections {
            match estimate_marker_pose(
                detection,
                profile,
                &frame.view,
                &frame.intrinsics,
                self.half_size,
                self.solver.as_mut(),
            ) {
                Ok(device_marker) => observations.push(MarkerObservation {
                    device_marker,
                    camera_pose: frame.camera_pose,
                }),
                Err(SyncError::UnsupportedOrientation(orientation)) => {
                    if self.warned_orientation != Some(orientation) {
                        warn!(
                            "{}; marker pose updates paused",
                            SyncError::UnsupportedOrientation(orientation)
                        );
                        self.warned_orientation = Some(orientation);
                    }
                    break;
                }
                Err(err) => debug!("Detection skipped: {}", err),
            }
        }
        observations
    }
}

/// Cloneable submission API for a running [`DeviceSession`].
#[derive(Clone)]
pub struct SessionHandle {
    jobs: Sender<DetectionJob>,
    events: Sender<SessionEvent>,
    object_kind: NodeKind,
    snapshot: Arc<RwLock<SceneSnapshot>>,
}

impl SessionHandle {
    /// Queue a frame for detection. Blocks while the detection queue is full.
    pub fn submit_frame(&self, frame: FrameInput) -> Result<()> {
        self.jobs
            .send(DetectionJob::Frame(frame))
            .map_err(|_| anyhow!("session detection worker has stopped"))
    }

    /// User "place object" action.
    pub fn create_object(&self) -> Result<()> {
        self.send(SessionEvent::CreateObject(self.object_kind))
    }

    /// Text received from `from` by the transport.
    pub fn deliver(&self, from: PeerId, text: impl Into<String>) -> Result<()> {
        self.send(SessionEvent::PeerMessage {
            from,
            text: text.into(),
        })
    }

    pub fn peers_changed(&self, peers: Vec<PeerId>) -> Result<()> {
        self.send(SessionEvent::PeersChanged(peers))
    }

    /// Tracking session restarted.
    pub fn reset(&self) -> Result<()> {
        self.send(SessionEvent::Reset)
    }

    /// Forward whatever a loopback hub has queued for this device.
    ///
    /// Returns the number of events forwarded.
    pub fn forward_hub_events(&self, inbound: &Receiver<HubEvent>) -> Result<usize> {
        let mut forwarded = 0;
        for event in inbound.try_iter() {
            match event {
                HubEvent::Message { from, text } => self.deliver(from, text)?,
                HubEvent::PeersChanged(peers) => self.peers_changed(peers)?,
            }
            forwarded += 1;
        }
        Ok(forwarded)
    }

    /// Wait until every frame and event submitted so far has been handled.
    pub fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = bounded(1);
        self.jobs
            .send(DetectionJob::Flush(done_tx))
            .map_err(|_| anyhow!("session detection worker has stopped"))?;
        done_rx
            .recv_timeout(FLUSH_TIMEOUT)
            .context("waiting for session flush")
    }

    /// Latest published scene.
    pub fn snapshot(&self) -> SceneSnapshot {
        self.snapshot.read().clone()
    }

    fn send(&self, event: SessionEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| anyhow!("session coordinator has stopped"))
    }
}

/// One device's synchronization pipeline and its two threads.
pub struct DeviceSession {
    handle: SessionHandle,
    shutdown_requested: Arc<AtomicBool>,
    detection_thread: Option<JoinHandle<()>>,
    coordinator_thread: Option<JoinHandle<()>>,
}

impl DeviceSession {
    /// Spawn the detection worker and the coordinator.
    pub fn spawn(
        config: SyncConfig,
        transport: Arc<dyn PeerTransport>,
        solver: Box<dyn PoseSolver>,
    ) -> Result<Self> {
        config.validate()?;

        let (jobs_tx, jobs_rx) = bounded::<DetectionJob>(config.detection_queue_capacity);
        let (events_tx, events_rx) = bounded::<SessionEvent>(config.event_queue_capacity);
        let snapshot = Arc::new(RwLock::new(SceneSnapshot::default()));
        let shutdown_requested = Arc::new(AtomicBool::new(false));
        let name = config.device_name.clone();

        let stage = DetectionStage::new(solver, config.marker_half_size_m);
        let detection_thread = {
            let events = events_tx.clone();
            let shutdown = Arc::clone(&shutdown_requested);
            thread::Builder::new()
                .name(format!("{name}-detection"))
                .spawn(move || run_detection(stage, jobs_rx, events, shutdown))
                .context("spawning detection worker")?
        };

        let object_kind = config.object_kind;
        let state = SessionState::new(config, Broadcaster::new(transport));
        let coordinator_thread = {
            let snapshot = Arc::clone(&snapshot);
            thread::Builder::new()
                .name(format!("{name}-coordinator"))
                .spawn(move || run_coordinator(state, events_rx, snapshot))
                .context("spawning coordinator")?
        };

        info!("Session {} started", name);
        Ok(Self {
            handle: SessionHandle {
                jobs: jobs_tx,
                events: events_tx,
                object_kind,
                snapshot,
            },
            shutdown_requested,
            detection_thread: Some(detection_thread),
            coordinator_thread: Some(coordinator_thread),
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        self.handle.snapshot()
    }

    /// Stop both threads after draining queued work.
    pub fn shutdown(&mut self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);

        // Detection first, so its forwarded events land ahead of Shutdown.
        if let Some(handle) = self.detection_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.coordinator_thread.take() {
            let _ = self.handle.events.send(SessionEvent::Shutdown);
            let _ = handle.join();
        }
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_detection(
    mut stage: DetectionStage,
    jobs: Receiver<DetectionJob>,
    events: Sender<SessionEvent>,
    shutdown: Arc<AtomicBool>,
) {
    debug!("Detection worker started");
    loop {
        let job = match jobs.recv_timeout(RECV_TIMEOUT) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let forwarded = match job {
            DetectionJob::Frame(frame) => {
                let observations = stage.process(&frame);
                observations
                    .into_iter()
                    .map(SessionEvent::MarkerSolved)
                    .chain(std::iter::once(SessionEvent::FrameTick(frame)))
                    .try_for_each(|event| events.send(event))
            }
            DetectionJob::Flush(done) => events.send(SessionEvent::Flush(done)),
        };
        if forwarded.is_err() {
            break;
        }
    }
    debug!("Detection worker stopped");
}

fn run_coordinator(
    mut state: SessionState,
    events: Receiver<SessionEvent>,
    snapshot: Arc<RwLock<SceneSnapshot>>,
) {
    debug!("Coordinator started");
    while let Ok(event) = events.recv() {
        match event {
            SessionEvent::FrameTick(frame) => state.on_frame(&frame),
            SessionEvent::MarkerSolved(observation) => state.on_marker(&observation),
            SessionEvent::CreateObject(kind) => {
                if let Err(err) = state.create_object(kind) {
                    debug!("Object not created: {}", err);
                }
            }
            SessionEvent::PeerMessage { from, text } => {
                if let Err(err) = state.on_peer_message(&from, &text) {
                    debug!("Discarded message from {}: {}", from, err);
                }
            }
            SessionEvent::PeersChanged(peers) => state.on_peers_changed(peers),
            SessionEvent::Reset => state.reset(),
            SessionEvent::Flush(done) => {
                *snapshot.write() = state.scene_snapshot();
                let _ = done.send(());
                continue;
            }
            SessionEvent::Shutdown => break,
        }
        *snapshot.write() = state.scene_snapshot();
    }
    info!("Session {} stopped", state.config().device_name);
}

// src/capture.rs - Feeding detector output into a motion session
//
// A `CaptureAdapter` turns video frames into detection frames synchronously.
// `CaptureLoop` drives an adapter on the tokio runtime with a latest-frame-wins
// slot, so a slow detector drops frames instead of queueing them.
use crate::error::{MotionError, Result};
use crate::frame::{Frame, HolisticFrame, Landmark, Side};
use crate::session::{MotionSession, TrackingTargets};
use image::DynamicImage;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One decoded video frame handed to a detector.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Monotonic source counter, used to count frames that were skipped.
    pub sequence: u64,
    /// Media position in seconds.
    pub position: f64,
    pub image: DynamicImage,
}

impl VideoFrame {
    pub fn new(sequence: u64, position: f64, image: DynamicImage) -> Self {
        Self {
            sequence,
            position,
            image,
        }
    }
}

/// A landmark detector backend.
///
/// `detect` returns `Ok(None)` when nothing was found in the frame.
pub trait Detector: Send {
    fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn detect(&mut self, frame: &VideoFrame, timestamp_ms: f64) -> anyhow::Result<Option<Frame>>;
}

/// A hand found by the hand model, labelled as the model sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct HandDetection {
    pub label: Side,
    pub landmarks: Vec<Landmark>,
}

/// Separate pose, hand and face models run over the same frame.
pub trait HolisticSource: Send {
    fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn detect_pose(&mut self, frame: &VideoFrame, timestamp_ms: f64) -> anyhow::Result<Option<Vec<Landmark>>>;

    fn detect_hands(&mut self, frame: &VideoFrame, timestamp_ms: f64) -> anyhow::Result<Vec<HandDetection>>;

    fn detect_face(&mut self, frame: &VideoFrame, timestamp_ms: f64) -> anyhow::Result<Option<Vec<Landmark>>>;
}

/// Combines a `HolisticSource` into holistic frames.
///
/// A failing model only empties its own modality. With mirroring on, a hand
/// labelled left is stored as the subject's right hand.
pub struct HolisticDetector<S> {
    source: S,
    targets: TrackingTargets,
    mirror_handedness: bool,
}

impl<S: HolisticSource> HolisticDetector<S> {
    pub fn new(source: S, mirror_handedness: bool) -> Self {
        Self {
            source,
            targets: TrackingTargets::default(),
            mirror_handedness,
        }
    }

    pub fn with_targets(mut self, targets: TrackingTargets) -> Self {
        self.targets = targets;
        self
    }

    pub fn set_targets(&mut self, targets: TrackingTargets) {
        self.targets = targets;
    }

    fn hand_slot(&self, label: Side) -> Side {
        if self.mirror_handedness {
            label.opposite()
        } else {
            label
        }
    }
}

impl<S: HolisticSource> Detector for HolisticDetector<S> {
    fn initialize(&mut self) -> anyhow::Result<()> {
        self.source.initialize()
    }

    fn detect(&mut self, frame: &VideoFrame, timestamp_ms: f64) -> anyhow::Result<Option<Frame>> {
        let mut holistic = HolisticFrame::empty(timestamp_ms);

        if self.targets.pose {
            holistic.pose = self
                .source
                .detect_pose(frame, timestamp_ms)
                .unwrap_or_else(|e| {
                    warn!("Pose detection failed: {:#}", e);
                    None
                });
        }

        if self.targets.left_hand || self.targets.right_hand {
            let hands = self
                .source
                .detect_hands(frame, timestamp_ms)
                .unwrap_or_else(|e| {
                    warn!("Hand detection failed: {:#}", e);
                    Vec::new()
                });
            for hand in hands {
                match self.hand_slot(hand.label) {
                    Side::Left if self.targets.left_hand => holistic.left_hand = Some(hand.landmarks),
                    Side::Right if self.targets.right_hand => holistic.right_hand = Some(hand.landmarks),
                    _ => {}
                }
            }
        }

        if self.targets.face {
            holistic.face = self
                .source
                .detect_face(frame, timestamp_ms)
                .unwrap_or_else(|e| {
                    warn!("Face detection failed: {:#}", e);
                    None
                });
        }

        Ok(Some(Frame::Holistic(holistic)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    /// Frames handed to the detector.
    pub processed: u64,
    /// Frames that produced a detection.
    pub detected: u64,
    /// Frames skipped because the media position had not advanced.
    pub duplicates: u64,
    pub failures: u64,
    /// Frames overwritten in the slot before the detector saw them.
    pub dropped: u64,
}

/// Synchronous wrapper that applies duplicate suppression and error
/// isolation around a detector.
pub struct CaptureAdapter<D> {
    detector: D,
    last_position: Option<f64>,
    stats: CaptureStats,
}

impl<D: Detector> CaptureAdapter<D> {
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            last_position: None,
            stats: CaptureStats::default(),
        }
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// Moves the session through Initializing to Ready, or back to Idle on
    /// failure.
    pub fn initialize(&mut self, session: &mut MotionSession) -> Result<()> {
        begin_initializing(session)?;
        let loaded = self.detector.initialize();
        self.finish_initializing(loaded, session)
    }

    /// Same transitions as `initialize`, but the shared session is locked
    /// only for each state change and stays readable while the detector loads.
    pub fn initialize_shared(&mut self, session: &SharedSession) -> Result<()> {
        begin_initializing(&mut lock_session(session))?;
        let loaded = self.detector.initialize();
        self.finish_initializing(loaded, &mut lock_session(session))
    }

    fn finish_initializing(&mut self, loaded: anyhow::Result<()>, session: &mut MotionSession) -> Result<()> {
        match loaded {
            Ok(()) => {
                self.last_position = None;
                session.mark_ready();
                info!("Detector ready");
                Ok(())
            }
            Err(e) => {
                warn!("Detector failed to initialize: {:#}", e);
                session.mark_idle();
                Err(MotionError::DetectorInit(e))
            }
        }
    }

    /// Runs the detector on `frame` unless its media position repeats the
    /// previous one. Detector errors are logged and yield `None`.
    pub fn detect(&mut self, frame: &VideoFrame, timestamp_ms: f64) -> Option<Frame> {
        if self.last_position == Some(frame.position) {
            self.stats.duplicates += 1;
            return None;
        }
        self.last_position = Some(frame.position);
        self.stats.processed += 1;

        match self.detector.detect(frame, timestamp_ms) {
            Ok(Some(detection)) => {
                self.stats.detected += 1;
                Some(detection)
            }
            Ok(None) => None,
            Err(e) => {
                self.stats.failures += 1;
                warn!("Detection failed at {:.1}ms: {:#}", timestamp_ms, e);
                None
            }
        }
    }

    /// Detects and, on success, adds the frame to `session`.
    pub fn process(&mut self, frame: &VideoFrame, timestamp_ms: f64, session: &mut MotionSession) -> bool {
        match self.detect(frame, timestamp_ms) {
            Some(detection) => {
                session.add_frame(detection);
                true
            }
            None => false,
        }
    }

    fn record_gap(&mut self, dropped: u64) {
        self.stats.dropped += dropped;
    }
}

fn begin_initializing(session: &mut MotionSession) -> Result<()> {
    if session.begin_initializing() {
        Ok(())
    } else {
        Err(MotionError::CaptureRunning)
    }
}

/// Where frame timestamps come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureClock {
    /// Milliseconds since the loop started.
    #[default]
    Wall,
    /// The frame's media position.
    MediaPosition,
}

pub type SharedSession = Arc<Mutex<MotionSession>>;

pub fn shared(session: MotionSession) -> SharedSession {
    Arc::new(Mutex::new(session))
}

/// Locks the session, recovering the data if a holder panicked.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, MotionSession> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Background detection loop over a shared session.
pub struct CaptureLoop<D> {
    frames: watch::Sender<Option<Arc<VideoFrame>>>,
    stopped: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: JoinHandle<Result<CaptureAdapter<D>>>,
    session: SharedSession,
}

impl<D: Detector + 'static> CaptureLoop<D> {
    /// Initializes the detector and starts the loop.
    ///
    /// Fails with `CaptureRunning` if the session is not idle, or with
    /// `DetectorInit` if the detector cannot start; the session is idle again
    /// in that case.
    pub async fn start(adapter: CaptureAdapter<D>, session: SharedSession, clock: CaptureClock) -> Result<Self> {
        let init_session = Arc::clone(&session);
        let (adapter, init) = tokio::task::spawn_blocking(move || {
            let mut adapter = adapter;
            let result = adapter.initialize_shared(&init_session);
            (adapter, result)
        })
        .await?;
        init?;

        let (frames, rx) = watch::channel(None);
        let stopped = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());

        let task = tokio::spawn(run_loop(
            adapter,
            rx,
            Arc::clone(&session),
            Arc::clone(&stopped),
            Arc::clone(&wake),
            clock,
        ));

        Ok(Self {
            frames,
            stopped,
            wake,
            task,
            session,
        })
    }

    /// Offers a frame to the loop, replacing any frame still waiting.
    pub fn submit(&self, frame: VideoFrame) {
        self.frames.send_replace(Some(Arc::new(frame)));
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Stops the loop and returns the adapter with its final counters.
    ///
    /// A detection still in flight finishes but is not added to the session.
    pub async fn stop(self) -> Result<CaptureAdapter<D>> {
        self.stopped.store(true, Ordering::Release);
        self.wake.notify_one();

        let joined = self.task.await;
        lock_session(&self.session).mark_idle();
        let adapter = joined??;
        info!("Capture stopped: {:?}", adapter.stats());
        Ok(adapter)
    }
}

async fn run_loop<D: Detector + 'static>(
    mut adapter: CaptureAdapter<D>,
    mut rx: watch::Receiver<Option<Arc<VideoFrame>>>,
    session: SharedSession,
    stopped: Arc<AtomicBool>,
    wake: Arc<Notify>,
    clock: CaptureClock,
) -> Result<CaptureAdapter<D>> {
    let started = Instant::now();
    let mut last_sequence: Option<u64> = None;

    loop {
        tokio::select! {
            _ = wake.notified() => {}
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        if stopped.load(Ordering::Acquire) {
            break;
        }

        let latest = rx.borrow_and_update().clone();
        let Some(frame) = latest else {
            continue;
        };

        if let Some(last) = last_sequence {
            let gap = frame.sequence.saturating_sub(last + 1);
            if gap > 0 {
                debug!("Detector skipped {} frames", gap);
                adapter.record_gap(gap);
            }
        }
        last_sequence = Some(frame.sequence);

        let timestamp_ms = match clock {
            CaptureClock::Wall => started.elapsed().as_secs_f64() * 1000.0,
            CaptureClock::MediaPosition => frame.position * 1000.0,
        };

        let (returned, detection) = tokio::task::spawn_blocking(move || {
            let detection = adapter.detect(&frame, timestamp_ms);
            (adapter, detection)
        })
        .await?;
        adapter = returned;

        if stopped.load(Ordering::Acquire) {
            break;
        }
        // Session observers run under this lock.
        if let Some(detection) = detection {
            lock_session(&session).add_frame(detection);
        }
    }

    Ok(adapter)
}

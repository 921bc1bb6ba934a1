// src/session.rs - Single owner of live, recorded and playback motion state
use crate::buffer::RollingBuffer;
use crate::config::Settings;
use crate::frame::Frame;
use crate::skeleton::POSE_LANDMARK_COUNT;
use crate::trajectory::{to_display_space, Trajectory};
use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub const MAX_PLAYBACK_SPEED: f64 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    Initializing,
    Ready,
    Recording,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Showing live frames.
    Inactive,
    Paused,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationMode {
    Skeleton,
    Trajectory,
    Mesh,
    Wireframe,
    Avatar,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingTargets {
    pub pose: bool,
    pub left_hand: bool,
    pub right_hand: bool,
    pub face: bool,
}

impl Default for TrackingTargets {
    fn default() -> Self {
        Self {
            pose: true,
            left_hand: true,
            right_hand: true,
            face: true,
        }
    }
}

/// Presentation toggles read by renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSettings {
    pub mode: VisualizationMode,
    pub show_skeleton: bool,
    pub show_trajectory: bool,
    pub show_metrics: bool,
    pub targets: TrackingTargets,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            mode: VisualizationMode::Both,
            show_skeleton: true,
            show_trajectory: true,
            show_metrics: true,
            targets: TrackingTargets::default(),
        }
    }
}

/// Capacities and tracked joints for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub max_buffer_size: usize,
    pub trajectory_length: usize,
    pub tracked_joints: Vec<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig::from(&Settings::default())
    }
}

impl From<&Settings> for SessionConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            max_buffer_size: settings.max_buffer_size,
            trajectory_length: settings.trajectory_length,
            tracked_joints: settings.tracked_joints.clone(),
        }
    }
}

/// Notification sent to subscribers after a mutation has fully applied.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    FrameAdded {
        timestamp: f64,
        buffered: usize,
        recorded: usize,
    },
    CaptureStateChanged(CaptureState),
    RecordingStarted,
    RecordingStopped {
        frames: usize,
    },
    PlaybackChanged {
        state: PlaybackState,
        index: usize,
    },
    TrackedJointsChanged(Vec<usize>),
    TrajectoryLengthChanged(usize),
    BufferSizeChanged(usize),
    ViewChanged(ViewSettings),
    FramesCleared,
    RecordingCleared,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&SessionEvent) + Send>;

/// Read-only copy of what a renderer needs for one draw.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub current_frame: Option<Frame>,
    pub trajectories: Vec<Trajectory>,
    pub capture_state: CaptureState,
    pub playback: PlaybackState,
    pub playback_index: usize,
    pub is_recording: bool,
    pub buffered_frames: usize,
    pub recorded_frames: usize,
    pub view: ViewSettings,
}

/// The motion session store.
///
/// All mutation goes through `&mut self`; subscribers only ever see the
/// state after an operation has completed.
pub struct MotionSession {
    config: SessionConfig,
    capture_state: CaptureState,

    current_frame: Option<Frame>,
    frame_buffer: RollingBuffer<Frame>,
    trajectories: HashMap<usize, Trajectory>,

    is_recording: bool,
    recorded_frames: Vec<Frame>,
    recording_started_at: Option<DateTime<Local>>,

    playback: PlaybackState,
    playback_index: usize,
    playback_speed: f64,
    playback_clock_ms: f64,

    view: ViewSettings,

    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl Default for MotionSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl MotionSession {
    pub fn new(config: SessionConfig) -> Self {
        let config = SessionConfig {
            max_buffer_size: config.max_buffer_size.max(1),
            trajectory_length: config.trajectory_length.max(1),
            tracked_joints: sanitize_joints(config.tracked_joints),
        };

        Self {
            frame_buffer: RollingBuffer::new(config.max_buffer_size),
            config,
            capture_state: CaptureState::Idle,
            current_frame: None,
            trajectories: HashMap::new(),
            is_recording: false,
            recorded_frames: Vec::new(),
            recording_started_at: None,
            playback: PlaybackState::Inactive,
            playback_index: 0,
            playback_speed: 1.0,
            playback_clock_ms: 0.0,
            view: ViewSettings::default(),
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(SessionConfig::from(settings))
    }

    // ---- Ingest --------------------------------------------------------

    /// Ingests one detection frame.
    ///
    /// Updates the live window, the current frame, every tracked trajectory
    /// and, while recording, the recorded sequence. A frame without a pose
    /// leaves trajectories untouched.
    pub fn add_frame(&mut self, frame: Frame) {
        let timestamp = frame.timestamp();

        if let Some(landmarks) = frame.pose_landmarks() {
            for (slot, &joint) in self.config.tracked_joints.iter().enumerate() {
                if let Some(landmark) = landmarks.get(joint) {
                    let max_points = self.config.trajectory_length;
                    self.trajectories
                        .entry(joint)
                        .or_insert_with(|| Trajectory::new(joint, slot, max_points))
                        .push(to_display_space(landmark, timestamp));
                }
            }
        }

        if self.is_recording {
            self.recorded_frames.push(frame.clone());
        }
        self.frame_buffer.push(frame.clone());
        self.current_frame = Some(frame);

        self.emit(SessionEvent::FrameAdded {
            timestamp,
            buffered: self.frame_buffer.len(),
            recorded: self.recorded_frames.len(),
        });
    }

    pub fn clear_frames(&mut self) {
        self.frame_buffer.clear();
        self.trajectories.clear();
        self.current_frame = None;
        self.emit(SessionEvent::FramesCleared);
    }

    // ---- Capture lifecycle ---------------------------------------------

    pub fn capture_state(&self) -> CaptureState {
        self.capture_state
    }

    /// Idle -> Initializing. Ignored from any other state.
    pub fn begin_initializing(&mut self) -> bool {
        self.transition(CaptureState::Idle, CaptureState::Initializing)
    }

    /// Initializing -> Ready. Ignored from any other state.
    pub fn mark_ready(&mut self) -> bool {
        self.transition(CaptureState::Initializing, CaptureState::Ready)
    }

    /// Returns to Idle from any state. An active recording is stopped but
    /// its frames are kept.
    pub fn mark_idle(&mut self) {
        if self.is_recording {
            self.stop_recording();
        }
        if self.capture_state != CaptureState::Idle {
            self.set_capture_state(CaptureState::Idle);
        }
    }

    fn transition(&mut self, from: CaptureState, to: CaptureState) -> bool {
        if self.capture_state != from {
            debug!(
                "Ignoring capture transition {:?} -> {:?} while {:?}",
                from, to, self.capture_state
            );
            return false;
        }
        self.set_capture_state(to);
        true
    }

    fn set_capture_state(&mut self, state: CaptureState) {
        debug!("Capture state {:?} -> {:?}", self.capture_state, state);
        self.capture_state = state;
        self.emit(SessionEvent::CaptureStateChanged(state));
    }

    // ---- Recording -----------------------------------------------------

    /// Starts a fresh recording, discarding any previous one and rewinding
    /// the playback cursor.
    ///
    /// Recording does not require a running capture: frames pushed with
    /// `add_frame` from any source are recorded. Only a `Ready` capture moves
    /// to `Recording`; other capture states are left as they are.
    pub fn start_recording(&mut self) {
        self.recorded_frames.clear();
        self.playback_index = 0;
        self.playback_clock_ms = 0.0;
        self.is_recording = true;
        self.recording_started_at = Some(Local::now());

        if self.playback != PlaybackState::Inactive {
            self.leave_playback();
        }
        if self.capture_state == CaptureState::Ready {
            self.set_capture_state(CaptureState::Recording);
        }

        info!("Recording started");
        self.emit(SessionEvent::RecordingStarted);
    }

    /// Stops recording and keeps the recorded frames. No-op when not recording.
    pub fn stop_recording(&mut self) {
        if !self.is_recording {
            return;
        }
        self.is_recording = false;
        self.recording_started_at = None;

        if self.capture_state == CaptureState::Recording {
            self.set_capture_state(CaptureState::Ready);
        }

        let frames = self.recorded_frames.len();
        info!("Recording stopped with {} frames", frames);
        self.emit(SessionEvent::RecordingStopped { frames });
    }

    pub fn clear_recording(&mut self) {
        self.recorded_frames.clear();
        if self.playback != PlaybackState::Inactive {
            self.leave_playback();
        }
        self.playback_index = 0;
        self.emit(SessionEvent::RecordingCleared);
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn recording_started_at(&self) -> Option<DateTime<Local>> {
        self.recording_started_at
    }

    /// Wall-clock time since recording began.
    pub fn recording_elapsed(&self) -> Option<Duration> {
        self.recording_started_at.map(|start| Local::now() - start)
    }

    pub fn recorded_frames(&self) -> &[Frame] {
        &self.recorded_frames
    }

    // ---- Playback ------------------------------------------------------

    pub fn playback_state(&self) -> PlaybackState {
        self.playback
    }

    pub fn playback_index(&self) -> usize {
        self.playback_index
    }

    pub fn playback_speed(&self) -> f64 {
        self.playback_speed
    }

    /// Selects a recorded frame, clamping `index` into range, and returns it.
    ///
    /// Enters paused playback if playback was inactive. With no recording
    /// this does nothing and returns `None`.
    pub fn set_playback_index(&mut self, index: usize) -> Option<&Frame> {
        let last = self.recorded_frames.len().checked_sub(1)?;
        self.playback_index = index.min(last);
        self.playback_clock_ms = 0.0;
        if self.playback == PlaybackState::Inactive {
            self.playback = PlaybackState::Paused;
        }
        self.show_playback_frame();
        self.recorded_frames.get(self.playback_index)
    }

    /// Steps forward one recorded frame. Returns false at the end.
    pub fn next_frame(&mut self) -> bool {
        if self.playback_index + 1 >= self.recorded_frames.len() {
            return false;
        }
        self.set_playback_index(self.playback_index + 1);
        true
    }

    /// Steps back one recorded frame. Returns false at the start.
    pub fn prev_frame(&mut self) -> bool {
        if self.playback_index == 0 || self.recorded_frames.is_empty() {
            return false;
        }
        self.set_playback_index(self.playback_index - 1);
        true
    }

    /// Plays the recording from the current position, or from the start
    /// when playback was inactive or had reached the end.
    ///
    /// Refused when nothing has been recorded.
    pub fn start_playback(&mut self) -> bool {
        if self.recorded_frames.is_empty() {
            warn!("Nothing recorded to play back");
            return false;
        }

        let at_end = self.playback_index + 1 >= self.recorded_frames.len();
        if self.playback == PlaybackState::Inactive || at_end {
            self.playback_index = 0;
        }
        self.playback = PlaybackState::Playing;
        self.playback_clock_ms = 0.0;
        self.show_playback_frame();
        true
    }

    /// Pauses playback on the current frame.
    pub fn stop_playback(&mut self) {
        if self.playback == PlaybackState::Playing {
            self.playback = PlaybackState::Paused;
            self.emit_playback();
        }
    }

    /// Leaves playback and shows the latest live frame again.
    pub fn exit_playback(&mut self) {
        if self.playback != PlaybackState::Inactive {
            self.leave_playback();
        }
    }

    /// Clamped to `(0, 16]`; non-finite or non-positive speeds are ignored.
    pub fn set_playback_speed(&mut self, speed: f64) {
        if !(speed.is_finite() && speed > 0.0) {
            warn!("Ignoring playback speed {}", speed);
            return;
        }
        self.playback_speed = speed.min(MAX_PLAYBACK_SPEED);
    }

    /// Advances playing playback by `elapsed_ms` of wall time scaled by the
    /// playback speed, following the recorded timestamps.
    ///
    /// Returns the new index when it moved. Reaching the last frame pauses.
    pub fn advance_playback(&mut self, elapsed_ms: f64) -> Option<usize> {
        if self.playback != PlaybackState::Playing || !elapsed_ms.is_finite() {
            return None;
        }

        self.playback_clock_ms += elapsed_ms.max(0.0) * self.playback_speed;
        let start = self.playback_index;

        while self.playback_index + 1 < self.recorded_frames.len() {
            let step = (self.recorded_frames[self.playback_index + 1].timestamp()
                - self.recorded_frames[self.playback_index].timestamp())
            .max(0.0);
            if step > self.playback_clock_ms {
                break;
            }
            self.playback_clock_ms -= step;
            self.playback_index += 1;
        }

        if self.playback_index + 1 >= self.recorded_frames.len() {
            self.playback = PlaybackState::Paused;
            self.playback_clock_ms = 0.0;
        }

        if self.playback_index != start {
            self.show_playback_frame();
            Some(self.playback_index)
        } else {
            if self.playback == PlaybackState::Paused {
                self.emit_playback();
            }
            None
        }
    }

    fn show_playback_frame(&mut self) {
        self.current_frame = self.recorded_frames.get(self.playback_index).cloned();
        self.emit_playback();
    }

    fn leave_playback(&mut self) {
        self.playback = PlaybackState::Inactive;
        self.playback_clock_ms = 0.0;
        self.current_frame = self.frame_buffer.latest().cloned();
        self.emit_playback();
    }

    fn emit_playback(&mut self) {
        self.emit(SessionEvent::PlaybackChanged {
            state: self.playback,
            index: self.playback_index,
        });
    }

    // ---- Tracking configuration ----------------------------------------

    pub fn tracked_joints(&self) -> &[usize] {
        &self.config.tracked_joints
    }

    /// Replaces the tracked joint set and discards every trajectory.
    ///
    /// Duplicates and indices outside the 33-point body model are dropped.
    pub fn set_tracked_joints(&mut self, joints: impl IntoIterator<Item = usize>) {
        self.config.tracked_joints = sanitize_joints(joints.into_iter().collect());
        self.trajectories.clear();
        let joints = self.config.tracked_joints.clone();
        self.emit(SessionEvent::TrackedJointsChanged(joints));
    }

    pub fn trajectory_length(&self) -> usize {
        self.config.trajectory_length
    }

    /// Existing trails longer than `length` lose their oldest points.
    pub fn set_trajectory_length(&mut self, length: usize) {
        self.config.trajectory_length = length.max(1);
        for trajectory in self.trajectories.values_mut() {
            trajectory.set_max_points(self.config.trajectory_length);
        }
        self.emit(SessionEvent::TrajectoryLengthChanged(self.config.trajectory_length));
    }

    pub fn max_buffer_size(&self) -> usize {
        self.frame_buffer.capacity()
    }

    pub fn set_max_buffer_size(&mut self, size: usize) {
        self.config.max_buffer_size = size.max(1);
        self.frame_buffer.set_capacity(self.config.max_buffer_size);
        self.emit(SessionEvent::BufferSizeChanged(self.config.max_buffer_size));
    }

    // ---- View ----------------------------------------------------------

    pub fn view(&self) -> &ViewSettings {
        &self.view
    }

    pub fn update_view(&mut self, update: impl FnOnce(&mut ViewSettings)) {
        let before = self.view;
        update(&mut self.view);
        if self.view != before {
            self.emit(SessionEvent::ViewChanged(self.view));
        }
    }

    // ---- Queries -------------------------------------------------------

    pub fn current_frame(&self) -> Option<&Frame> {
        self.current_frame.as_ref()
    }

    pub fn frame_buffer(&self) -> &RollingBuffer<Frame> {
        &self.frame_buffer
    }

    /// Trajectory for `joint_index`, once it has received a point.
    pub fn trajectory(&self, joint_index: usize) -> Option<&Trajectory> {
        self.trajectories.get(&joint_index)
    }

    /// Existing trajectories in tracked-joint order.
    pub fn trajectories(&self) -> impl Iterator<Item = &Trajectory> + '_ {
        self.config
            .tracked_joints
            .iter()
            .filter_map(move |joint| self.trajectories.get(joint))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_frame: self.current_frame.clone(),
            trajectories: self.trajectories().cloned().collect(),
            capture_state: self.capture_state,
            playback: self.playback,
            playback_index: self.playback_index,
            is_recording: self.is_recording,
            buffered_frames: self.frame_buffer.len(),
            recorded_frames: self.recorded_frames.len(),
            view: self.view,
        }
    }

    // ---- Lifecycle -----------------------------------------------------

    /// Back to the initial state. Capacities, tracked joints, view settings
    /// and subscribers are kept.
    pub fn reset(&mut self) {
        self.capture_state = CaptureState::Idle;
        self.current_frame = None;
        self.frame_buffer.clear();
        self.trajectories.clear();
        self.is_recording = false;
        self.recorded_frames.clear();
        self.recording_started_at = None;
        self.playback = PlaybackState::Inactive;
        self.playback_index = 0;
        self.playback_speed = 1.0;
        self.playback_clock_ms = 0.0;

        info!("Session reset");
        self.emit(SessionEvent::Reset);
    }

    // ---- Subscribers ---------------------------------------------------

    /// Registers `observer` for every event emitted after a mutation.
    ///
    /// Observers run synchronously inside the mutating call. When the session
    /// sits behind a `SharedSession`, that call holds the session lock, so an
    /// observer must not lock the same session; forward the event through a
    /// channel and read the session from the receiving side instead.
    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&SessionEvent) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    fn emit(&mut self, event: SessionEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
    }
}

fn sanitize_joints(joints: Vec<usize>) -> Vec<usize> {
    let mut kept: Vec<usize> = Vec::with_capacity(joints.len());
    for joint in joints {
        if joint >= POSE_LANDMARK_COUNT {
            warn!("Ignoring joint index {} outside the body model", joint);
        } else if !kept.contains(&joint) {
            kept.push(joint);
        }
    }
    kept
}

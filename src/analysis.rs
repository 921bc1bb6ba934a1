// src/analysis.rs - Live readouts and whole-recording reports
use crate::frame::{Frame, Side};
use crate::kinematics::{
    acceleration, detect_peaks, finger_flexion, joint_angle_set, moving_average_smooth,
    range_of_motion, symmetry_score, velocity_series, wrist_flexion, Finger, JointAngleKind,
    JointAngles, RangeOfMotion,
};
use crate::session::MotionSession;
use crate::skeleton::PoseJoint;
use crate::trajectory::Trajectory;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Angle pairs compared for the left/right symmetry readout.
pub const SYMMETRY_PAIRS: [(JointAngleKind, JointAngleKind); 3] = [
    (JointAngleKind::LeftElbow, JointAngleKind::RightElbow),
    (JointAngleKind::LeftShoulder, JointAngleKind::RightShoulder),
    (JointAngleKind::LeftKnee, JointAngleKind::RightKnee),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymmetryStatus {
    Good,
    Warning,
    Bad,
}

impl SymmetryStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            SymmetryStatus::Good
        } else if score >= 60.0 {
            SymmetryStatus::Warning
        } else {
            SymmetryStatus::Bad
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandFlexion {
    pub fingers: BTreeMap<Finger, f64>,
    pub wrist: f64,
}

impl HandFlexion {
    pub fn from_landmarks(hand: &[crate::frame::Landmark]) -> Self {
        Self {
            fingers: Finger::ALL
                .iter()
                .map(|&finger| (finger, finger_flexion(hand, finger)))
                .collect(),
            wrist: wrist_flexion(hand),
        }
    }
}

/// What the metrics panel shows for the current moment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveMetrics {
    pub angles: Option<JointAngles>,
    pub left_wrist_speed: f64,
    pub right_wrist_speed: f64,
    pub symmetry_score: f64,
    pub symmetry_status: SymmetryStatus,
    pub left_hand: Option<HandFlexion>,
    pub right_hand: Option<HandFlexion>,
    pub buffered_frames: usize,
    pub recorded_frames: usize,
    pub is_recording: bool,
}

impl LiveMetrics {
    /// Wrist speeds are averaged over the last `recent_frames` buffered frames.
    pub fn from_session(session: &MotionSession, recent_frames: usize) -> Self {
        let current = session.current_frame();
        let angles = current
            .and_then(Frame::pose_landmarks)
            .map(joint_angle_set);

        let symmetry = angles.as_ref().map_or(100.0, |angles| {
            let (left, right): (Vec<f64>, Vec<f64>) = SYMMETRY_PAIRS
                .iter()
                .map(|(l, r)| (angles[l], angles[r]))
                .unzip();
            symmetry_score(&left, &right)
        });

        let holistic = current.and_then(Frame::as_holistic);
        let hand = |side| {
            holistic
                .and_then(|frame| frame.hand(side))
                .map(HandFlexion::from_landmarks)
        };

        let buffer = session.frame_buffer();
        Self {
            left_wrist_speed: average_speed(buffer.recent(recent_frames), PoseJoint::LeftWrist.index()),
            right_wrist_speed: average_speed(buffer.recent(recent_frames), PoseJoint::RightWrist.index()),
            symmetry_score: symmetry,
            symmetry_status: SymmetryStatus::from_score(symmetry),
            angles,
            left_hand: hand(Side::Left),
            right_hand: hand(Side::Right),
            buffered_frames: buffer.len(),
            recorded_frames: session.recorded_frames().len(),
            is_recording: session.is_recording(),
        }
    }
}

/// Mean pairwise speed of one joint; 0 for fewer than two frames.
pub fn average_speed<'a>(frames: impl IntoIterator<Item = &'a Frame>, joint_index: usize) -> f64 {
    let series = velocity_series(frames, joint_index);
    if series.is_empty() {
        return 0.0;
    }
    series.iter().sum::<f64>() / series.len() as f64
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisOptions {
    pub tracked_joints: Vec<usize>,
    /// Moving-average window applied to angle series first.
    pub smoothing_window: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetrics {
    pub max_velocity: BTreeMap<String, f64>,
    pub avg_velocity: BTreeMap<String, f64>,
    pub max_acceleration: BTreeMap<String, f64>,
    pub range_of_motion: BTreeMap<String, RangeOfMotion>,
    /// Indices (into the angle series) of repetition peaks per joint angle.
    pub peaks: BTreeMap<String, Vec<usize>>,
    pub symmetry_score: Option<f64>,
}

/// Summary of a recorded sequence.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub session_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Capture-clock milliseconds of the first analysed frame.
    pub start_time: f64,
    pub duration: f64,
    pub frame_count: usize,
    pub fps: f64,
    pub joint_angles: BTreeMap<String, Vec<f64>>,
    pub velocities: BTreeMap<String, Vec<f64>>,
    pub trajectories: Vec<Trajectory>,
    pub metrics: AnalysisMetrics,
}

/// Builds a report from frames that carry a body pose; others are skipped.
pub fn analyze(frames: &[Frame], trajectories: Vec<Trajectory>, options: &AnalysisOptions) -> AnalysisReport {
    let posed: Vec<&Frame> = frames.iter().filter(|f| f.pose_landmarks().is_some()).collect();
    let timestamps: Vec<f64> = posed.iter().map(|f| f.timestamp()).collect();

    let start_time = timestamps.first().copied().unwrap_or(0.0);
    let duration = timestamps.last().map_or(0.0, |last| (last - start_time).max(0.0));
    let fps = if duration > 0.0 {
        (posed.len() - 1) as f64 / (duration / 1000.0)
    } else {
        0.0
    };

    let mut angle_series: BTreeMap<JointAngleKind, Vec<f64>> =
        JointAngleKind::ALL.iter().map(|&k| (k, Vec::with_capacity(posed.len()))).collect();
    for landmarks in posed.iter().filter_map(|f| f.pose_landmarks()) {
        for (kind, angle) in joint_angle_set(landmarks) {
            angle_series.entry(kind).or_default().push(angle);
        }
    }
    if let Some(window) = options.smoothing_window.filter(|&w| w > 1) {
        for series in angle_series.values_mut() {
            *series = moving_average_smooth(series, window);
        }
    }

    let mut metrics = AnalysisMetrics {
        max_velocity: BTreeMap::new(),
        avg_velocity: BTreeMap::new(),
        max_acceleration: BTreeMap::new(),
        range_of_motion: BTreeMap::new(),
        peaks: BTreeMap::new(),
        symmetry_score: None,
    };

    for (kind, series) in &angle_series {
        let rom = range_of_motion(series);
        let midpoint = rom.min + rom.range / 2.0;
        metrics.peaks.insert(kind.name().to_string(), detect_peaks(series, midpoint));
        metrics.range_of_motion.insert(kind.name().to_string(), rom);
    }

    if !posed.is_empty() {
        let scores: Vec<f64> = SYMMETRY_PAIRS
            .iter()
            .map(|(l, r)| symmetry_score(&angle_series[l], &angle_series[r]))
            .collect();
        metrics.symmetry_score = Some(scores.iter().sum::<f64>() / scores.len() as f64);
    }

    let mut velocities = BTreeMap::new();
    for &joint in &options.tracked_joints {
        let name = PoseJoint::from_index(joint)
            .map(|j| j.name().to_string())
            .unwrap_or_else(|| format!("joint_{}", joint));
        let series = velocity_series(posed.iter().copied(), joint);

        let max = series.iter().copied().fold(0.0, f64::max);
        let avg = if series.is_empty() {
            0.0
        } else {
            series.iter().sum::<f64>() / series.len() as f64
        };
        // Each speed is stamped with the later frame of its pair.
        let accel = acceleration(&series, timestamps.get(1..).unwrap_or_default());
        let max_accel = accel.iter().map(|a| a.abs()).fold(0.0, f64::max);

        metrics.max_velocity.insert(name.clone(), max);
        metrics.avg_velocity.insert(name.clone(), avg);
        metrics.max_acceleration.insert(name.clone(), max_accel);
        velocities.insert(name, series);
    }

    AnalysisReport {
        session_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        start_time,
        duration,
        frame_count: posed.len(),
        fps,
        joint_angles: angle_series
            .into_iter()
            .map(|(kind, series)| (kind.name().to_string(), series))
            .collect(),
        velocities,
        trajectories,
        metrics,
    }
}

/// Analyses the session's recording, or its live window when nothing was recorded.
pub fn analyze_session(session: &MotionSession, smoothing_window: Option<usize>) -> AnalysisReport {
    let options = AnalysisOptions {
        tracked_joints: session.tracked_joints().to_vec(),
        smoothing_window,
    };
    let trajectories = session.trajectories().cloned().collect();

    if session.recorded_frames().is_empty() {
        analyze(&session.frame_buffer().to_vec(), trajectories, &options)
    } else {
        analyze(session.recorded_frames(), trajectories, &options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{HolisticFrame, Landmark, PoseFrame};
    use crate::session::SessionConfig;
    use crate::skeleton::{HAND_LANDMARK_COUNT, POSE_LANDMARK_COUNT};
    use assert_approx_eq::assert_approx_eq;

    /// Arms bent at the given elbow angles (degrees), everything else stacked.
    fn posed(timestamp: f64, left_elbow: f64, right_elbow: f64, wrist_x: f64) -> Frame {
        let mut lm = vec![Landmark::new(0.5, 0.5, 0.0); POSE_LANDMARK_COUNT];
        let arm = |lm: &mut Vec<Landmark>, shoulder: PoseJoint, elbow: PoseJoint, wrist: PoseJoint, deg: f64| {
            lm[shoulder.index()] = Landmark::new(0.5, 0.3, 0.0);
            lm[elbow.index()] = Landmark::new(0.5, 0.4, 0.0);
            let rad = deg.to_radians();
            lm[wrist.index()] = Landmark::new(0.5 + 0.1 * rad.sin() + wrist_x, 0.4 - 0.1 * rad.cos(), 0.0);
        };
        arm(&mut lm, PoseJoint::LeftShoulder, PoseJoint::LeftElbow, PoseJoint::LeftWrist, left_elbow);
        arm(&mut lm, PoseJoint::RightShoulder, PoseJoint::RightElbow, PoseJoint::RightWrist, right_elbow);
        Frame::Pose(PoseFrame::new(timestamp, lm))
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(SymmetryStatus::from_score(100.0), SymmetryStatus::Good);
        assert_eq!(SymmetryStatus::from_score(80.0), SymmetryStatus::Good);
        assert_eq!(SymmetryStatus::from_score(79.9), SymmetryStatus::Warning);
        assert_eq!(SymmetryStatus::from_score(60.0), SymmetryStatus::Warning);
        assert_eq!(SymmetryStatus::from_score(10.0), SymmetryStatus::Bad);
    }

    #[test]
    fn live_metrics_without_frames() {
        let session = MotionSession::default();
        let metrics = LiveMetrics::from_session(&session, 10);
        assert!(metrics.angles.is_none());
        assert_eq!(metrics.symmetry_score, 100.0);
        assert_eq!(metrics.left_wrist_speed, 0.0);
        assert_eq!(metrics.symmetry_status, SymmetryStatus::Good);
    }

    #[test]
    fn live_metrics_read_current_pose() {
        let mut session = MotionSession::new(SessionConfig::default());
        session.add_frame(posed(0.0, 90.0, 90.0, 0.0));
        session.add_frame(posed(1000.0, 90.0, 90.0, 0.3));

        let metrics = LiveMetrics::from_session(&session, 10);
        let angles = metrics.angles.as_ref().unwrap();
        assert_approx_eq!(angles[&JointAngleKind::LeftElbow], 90.0, 1e-6);
        assert_approx_eq!(metrics.left_wrist_speed, 0.3, 1e-9);
        assert_approx_eq!(metrics.symmetry_score, 100.0, 1e-6);
        assert_eq!(metrics.buffered_frames, 2);
    }

    #[test]
    fn live_metrics_include_hands_when_present() {
        let mut session = MotionSession::default();
        let mut frame = HolisticFrame::empty(0.0);
        frame.left_hand = Some(vec![Landmark::new(0.5, 0.5, 0.0); HAND_LANDMARK_COUNT]);
        session.add_frame(Frame::Holistic(frame));

        let metrics = LiveMetrics::from_session(&session, 10);
        assert!(metrics.angles.is_none());
        assert_eq!(metrics.left_hand.map(|h| h.fingers.len()), Some(5));
        assert!(metrics.right_hand.is_none());
    }

    #[test]
    fn report_covers_angles_and_speeds() {
        let frames: Vec<Frame> = (0..5)
            .map(|i| posed(i as f64 * 100.0, 60.0 + i as f64 * 20.0, 60.0 + i as f64 * 20.0, 0.0))
            .chain(std::iter::once(Frame::Holistic(HolisticFrame::empty(450.0))))
            .collect();

        let report = analyze(
            &frames,
            Vec::new(),
            &AnalysisOptions {
                tracked_joints: vec![15],
                smoothing_window: None,
            },
        );

        assert_eq!(report.frame_count, 5);
        assert_eq!(report.duration, 400.0);
        assert_approx_eq!(report.fps, 10.0);
        assert_eq!(report.joint_angles["left_elbow"].len(), 5);

        let rom = report.metrics.range_of_motion["left_elbow"];
        assert_approx_eq!(rom.min, 60.0, 1e-6);
        assert_approx_eq!(rom.range, 80.0, 1e-6);
        assert_approx_eq!(report.metrics.symmetry_score.unwrap(), 100.0, 1e-6);
        assert_eq!(report.velocities["left_wrist"].len(), 4);
        assert!(report.metrics.max_velocity["left_wrist"] > 0.0);
    }

    #[test]
    fn empty_report_is_neutral() {
        let report = analyze(&[], Vec::new(), &AnalysisOptions::default());
        assert_eq!(report.frame_count, 0);
        assert_eq!(report.fps, 0.0);
        assert!(report.metrics.symmetry_score.is_none());
        assert!(report.velocities.is_empty());
    }

    #[test]
    fn smoothing_flattens_a_spike() {
        let frames: Vec<Frame> = [90.0, 90.0, 150.0, 90.0, 90.0]
            .iter()
            .enumerate()
            .map(|(i, &deg)| posed(i as f64 * 33.0, deg, 90.0, 0.0))
            .collect();

        let raw = analyze(&frames, Vec::new(), &AnalysisOptions::default());
        let smooth = analyze(
            &frames,
            Vec::new(),
            &AnalysisOptions {
                tracked_joints: Vec::new(),
                smoothing_window: Some(3),
            },
        );
        assert!(smooth.metrics.range_of_motion["left_elbow"].range < raw.metrics.range_of_motion["left_elbow"].range);
        assert_eq!(raw.metrics.peaks["left_elbow"], vec![2]);
    }
}

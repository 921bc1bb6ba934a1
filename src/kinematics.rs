// src/kinematics.rs - Angles, speeds and derived metrics over landmark frames
//
// Everything here is a pure function. Degenerate input (zero-length rays,
// non-positive time steps, empty series) yields a neutral value instead of
// NaN, infinity or a panic.
use crate::frame::{Frame, Landmark};
use crate::skeleton::{hand, PoseJoint, HAND_LANDMARK_COUNT, POSE_LANDMARK_COUNT};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mean left/right angle difference (degrees) at which symmetry drops to 0.
pub const SYMMETRY_TOLERANCE_DEG: f64 = 30.0;

pub fn distance_3d(a: &Landmark, b: &Landmark) -> f64 {
    (b.position() - a.position()).norm()
}

/// Angle between two vectors in radians, or 0 if either has zero length.
fn angle_between_vectors(v1: &Vector3<f64>, v2: &Vector3<f64>) -> f64 {
    let mag1 = v1.norm();
    let mag2 = v2.norm();

    if mag1 == 0.0 || mag2 == 0.0 {
        return 0.0;
    }

    let cos_angle = v1.dot(v2) / (mag1 * mag2);
    if !cos_angle.is_finite() {
        return 0.0;
    }
    cos_angle.clamp(-1.0, 1.0).acos()
}

/// Angle at `vertex` between the rays to `a` and `c`, in degrees `[0, 180]`.
///
/// Returns 0 when either ray has zero length.
pub fn joint_angle(a: &Landmark, vertex: &Landmark, c: &Landmark) -> f64 {
    let v1 = a.position() - vertex.position();
    let v2 = c.position() - vertex.position();
    angle_between_vectors(&v1, &v2).to_degrees()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointAngleKind {
    LeftElbow,
    RightElbow,
    LeftShoulder,
    RightShoulder,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
}

impl JointAngleKind {
    pub const ALL: [JointAngleKind; 8] = [
        JointAngleKind::LeftElbow,
        JointAngleKind::RightElbow,
        JointAngleKind::LeftShoulder,
        JointAngleKind::RightShoulder,
        JointAngleKind::LeftHip,
        JointAngleKind::RightHip,
        JointAngleKind::LeftKnee,
        JointAngleKind::RightKnee,
    ];

    /// (ray end, vertex, ray end) for this angle.
    pub fn triple(self) -> (PoseJoint, PoseJoint, PoseJoint) {
        use PoseJoint::*;
        match self {
            JointAngleKind::LeftElbow => (LeftShoulder, LeftElbow, LeftWrist),
            JointAngleKind::RightElbow => (RightShoulder, RightElbow, RightWrist),
            JointAngleKind::LeftShoulder => (LeftHip, LeftShoulder, LeftElbow),
            JointAngleKind::RightShoulder => (RightHip, RightShoulder, RightElbow),
            JointAngleKind::LeftHip => (LeftShoulder, LeftHip, LeftKnee),
            JointAngleKind::RightHip => (RightShoulder, RightHip, RightKnee),
            JointAngleKind::LeftKnee => (LeftHip, LeftKnee, LeftAnkle),
            JointAngleKind::RightKnee => (RightHip, RightKnee, RightAnkle),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            JointAngleKind::LeftElbow => "left_elbow",
            JointAngleKind::RightElbow => "right_elbow",
            JointAngleKind::LeftShoulder => "left_shoulder",
            JointAngleKind::RightShoulder => "right_shoulder",
            JointAngleKind::LeftHip => "left_hip",
            JointAngleKind::RightHip => "right_hip",
            JointAngleKind::LeftKnee => "left_knee",
            JointAngleKind::RightKnee => "right_knee",
        }
    }

    /// The same joint on the other side of the body.
    pub fn mirrored(self) -> Self {
        match self {
            JointAngleKind::LeftElbow => JointAngleKind::RightElbow,
            JointAngleKind::RightElbow => JointAngleKind::LeftElbow,
            JointAngleKind::LeftShoulder => JointAngleKind::RightShoulder,
            JointAngleKind::RightShoulder => JointAngleKind::LeftShoulder,
            JointAngleKind::LeftHip => JointAngleKind::RightHip,
            JointAngleKind::RightHip => JointAngleKind::LeftHip,
            JointAngleKind::LeftKnee => JointAngleKind::RightKnee,
            JointAngleKind::RightKnee => JointAngleKind::LeftKnee,
        }
    }

    pub fn is_left(self) -> bool {
        matches!(
            self,
            JointAngleKind::LeftElbow
                | JointAngleKind::LeftShoulder
                | JointAngleKind::LeftHip
                | JointAngleKind::LeftKnee
        )
    }
}

pub type JointAngles = BTreeMap<JointAngleKind, f64>;

/// Elbow, shoulder, hip and knee angles for both sides.
///
/// Each angle is computed on its own: a degenerate landmark zeroes only the
/// angles that use it. A sequence that is not a full 33-point pose counts as
/// no detection and every angle is 0.
pub fn joint_angle_set(landmarks: &[Landmark]) -> JointAngles {
    let detected = landmarks.len() == POSE_LANDMARK_COUNT;
    JointAngleKind::ALL
        .iter()
        .map(|&kind| {
            let (a, vertex, c) = kind.triple();
            let angle = if detected {
                joint_angle(&landmarks[a.index()], &landmarks[vertex.index()], &landmarks[c.index()])
            } else {
                0.0
            };
            (kind, angle)
        })
        .collect()
}

/// Speed of one joint between two frames, in normalized units per second.
///
/// Returns 0 when the elapsed time is not positive or the joint is missing
/// from either frame.
pub fn velocity(prev: &Frame, curr: &Frame, joint_index: usize) -> f64 {
    let dt = (curr.timestamp() - prev.timestamp()) / 1000.0;
    if dt.is_nan() || dt <= 0.0 {
        return 0.0;
    }

    match (prev.landmark(joint_index), curr.landmark(joint_index)) {
        (Some(p1), Some(p2)) => distance_3d(p1, p2) / dt,
        _ => 0.0,
    }
}

/// Pairwise speeds across consecutive frames; empty for fewer than two frames.
pub fn velocity_series<'a, I>(frames: I, joint_index: usize) -> Vec<f64>
where
    I: IntoIterator<Item = &'a Frame>,
{
    let mut series = Vec::new();
    let mut prev: Option<&Frame> = None;
    for frame in frames {
        if let Some(p) = prev {
            series.push(velocity(p, frame, joint_index));
        }
        prev = Some(frame);
    }
    series
}

/// Finite difference of `series` over `timestamps` (milliseconds).
///
/// Output has one element per consecutive pair; a pair with a non-positive
/// time step contributes 0.
pub fn acceleration(series: &[f64], timestamps: &[f64]) -> Vec<f64> {
    let n = series.len().min(timestamps.len());
    (1..n)
        .map(|i| {
            let dt = (timestamps[i] - timestamps[i - 1]) / 1000.0;
            if dt > 0.0 {
                (series[i] - series[i - 1]) / dt
            } else {
                0.0
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeOfMotion {
    pub min: f64,
    pub max: f64,
    pub range: f64,
}

pub fn range_of_motion(angles: &[f64]) -> RangeOfMotion {
    if angles.is_empty() {
        return RangeOfMotion::default();
    }

    let min = angles.iter().copied().fold(f64::INFINITY, f64::min);
    let max = angles.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    RangeOfMotion {
        min,
        max,
        range: max - min,
    }
}

/// Left/right similarity in `[0, 100]`.
///
/// Compares element-wise up to the shorter input. Empty input is treated as
/// symmetric (100); a mean difference of 30 degrees or more scores 0.
pub fn symmetry_score(left: &[f64], right: &[f64]) -> f64 {
    let len = left.len().min(right.len());
    if len == 0 {
        return 100.0;
    }

    let total_diff: f64 = left
        .iter()
        .zip(right.iter())
        .map(|(l, r)| (l - r).abs())
        .sum();
    let mean_diff = total_diff / len as f64;

    (100.0 - (mean_diff / SYMMETRY_TOLERANCE_DEG) * 100.0).max(0.0)
}

/// Centred moving average; the window is clipped at both ends.
///
/// A series shorter than the window is returned unchanged.
pub fn moving_average_smooth(series: &[f64], window_size: usize) -> Vec<f64> {
    if series.len() < window_size {
        return series.to_vec();
    }

    let half = window_size / 2;
    (0..series.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half).min(series.len() - 1);
            let window = &series[start..=end];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect()
}

/// Indices of strict local maxima above `threshold`; endpoints never qualify.
pub fn detect_peaks(series: &[f64], threshold: f64) -> Vec<usize> {
    if series.len() < 3 {
        return Vec::new();
    }

    (1..series.len() - 1)
        .filter(|&i| {
            series[i] > series[i - 1] && series[i] > series[i + 1] && series[i] > threshold
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    /// Base-to-tip landmark chain of four hand indices.
    pub fn chain(self) -> [usize; 4] {
        match self {
            Finger::Thumb => [hand::THUMB_CMC, hand::THUMB_MCP, hand::THUMB_IP, hand::THUMB_TIP],
            Finger::Index => [hand::INDEX_MCP, hand::INDEX_PIP, hand::INDEX_DIP, hand::INDEX_TIP],
            Finger::Middle => [hand::MIDDLE_MCP, hand::MIDDLE_PIP, hand::MIDDLE_DIP, hand::MIDDLE_TIP],
            Finger::Ring => [hand::RING_MCP, hand::RING_PIP, hand::RING_DIP, hand::RING_TIP],
            Finger::Pinky => [hand::PINKY_MCP, hand::PINKY_PIP, hand::PINKY_DIP, hand::PINKY_TIP],
        }
    }
}

/// Mean bend between consecutive finger segments, in degrees.
///
/// 0 for a straight finger or a hand that is not a full 21-point detection.
pub fn finger_flexion(hand_landmarks: &[Landmark], finger: Finger) -> f64 {
    if hand_landmarks.len() != HAND_LANDMARK_COUNT {
        return 0.0;
    }

    let [base, mid, distal, tip] = finger.chain().map(|i| hand_landmarks[i].position());
    let v1 = mid - base;
    let v2 = distal - mid;
    let v3 = tip - distal;

    let bend1 = angle_between_vectors(&v1, &v2);
    let bend2 = angle_between_vectors(&v2, &v3);
    ((bend1 + bend2) / 2.0).to_degrees()
}

/// Bend of the middle finger relative to the wrist-to-knuckle line, in degrees.
pub fn wrist_flexion(hand_landmarks: &[Landmark]) -> f64 {
    if hand_landmarks.len() != HAND_LANDMARK_COUNT {
        return 0.0;
    }

    let wrist = hand_landmarks[hand::WRIST].position();
    let mcp = hand_landmarks[hand::MIDDLE_MCP].position();
    let tip = hand_landmarks[hand::MIDDLE_TIP].position();

    angle_between_vectors(&(mcp - wrist), &(tip - mcp)).to_degrees()
}

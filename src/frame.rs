// src/frame.rs - Detection samples produced by the landmark detector
use crate::skeleton::{FACE_LANDMARK_COUNT, HAND_LANDMARK_COUNT, POSE_LANDMARK_COUNT, VISIBILITY_THRESHOLD};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Nominal capture rate used to derive frame numbers from timestamps.
pub const NOMINAL_FPS: f64 = 30.0;

/// A detected point in normalized image space.
///
/// `x` and `y` are in `[0, 1]` relative to the frame, `z` is relative depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Landmark {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility: None,
        }
    }

    pub const fn with_visibility(x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility: Some(visibility),
        }
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Missing visibility counts as fully visible.
    pub fn is_visible(&self) -> bool {
        self.visibility.unwrap_or(1.0) >= VISIBILITY_THRESHOLD
    }
}

/// A pose landmark paired with its metric world-space position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldLandmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
    pub world_x: f64,
    pub world_y: f64,
    pub world_z: f64,
}

impl WorldLandmark {
    pub fn from_parts(image: Landmark, world: Vector3<f64>) -> Self {
        Self {
            x: image.x,
            y: image.y,
            z: image.z,
            visibility: image.visibility,
            world_x: world.x,
            world_y: world.y,
            world_z: world.z,
        }
    }

    pub fn world_position(&self) -> Vector3<f64> {
        Vector3::new(self.world_x, self.world_y, self.world_z)
    }
}

/// Body pose detection for one video frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseFrame {
    /// Milliseconds on the capture clock.
    pub timestamp: f64,
    pub frame_index: u64,
    pub landmarks: Vec<Landmark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_landmarks: Option<Vec<WorldLandmark>>,
}

impl PoseFrame {
    pub fn new(timestamp: f64, landmarks: Vec<Landmark>) -> Self {
        Self {
            timestamp,
            frame_index: frame_index_for(timestamp),
            landmarks,
            world_landmarks: None,
        }
    }
}

/// Which side a hand belongs to, from the subject's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Pose,
    LeftHand,
    RightHand,
    Face,
}

impl Modality {
    pub const ALL: [Modality; 4] = [
        Modality::Pose,
        Modality::LeftHand,
        Modality::RightHand,
        Modality::Face,
    ];

    pub const fn landmark_count(self) -> usize {
        match self {
            Modality::Pose => POSE_LANDMARK_COUNT,
            Modality::LeftHand | Modality::RightHand => HAND_LANDMARK_COUNT,
            Modality::Face => FACE_LANDMARK_COUNT,
        }
    }
}

/// Pose, hands and face detected together for one video frame.
///
/// Each modality is present or absent independently of the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolisticFrame {
    pub timestamp: f64,
    #[serde(default)]
    pub pose: Option<Vec<Landmark>>,
    #[serde(default)]
    pub left_hand: Option<Vec<Landmark>>,
    #[serde(default)]
    pub right_hand: Option<Vec<Landmark>>,
    #[serde(default)]
    pub face: Option<Vec<Landmark>>,
}

impl HolisticFrame {
    pub fn empty(timestamp: f64) -> Self {
        Self {
            timestamp,
            pose: None,
            left_hand: None,
            right_hand: None,
            face: None,
        }
    }

    /// Landmarks for a modality, or `None` if it was not detected in this frame.
    pub fn modality(&self, modality: Modality) -> Option<&[Landmark]> {
        let landmarks = match modality {
            Modality::Pose => self.pose.as_deref(),
            Modality::LeftHand => self.left_hand.as_deref(),
            Modality::RightHand => self.right_hand.as_deref(),
            Modality::Face => self.face.as_deref(),
        };
        canonical(landmarks, modality.landmark_count())
    }

    pub fn hand(&self, side: Side) -> Option<&[Landmark]> {
        match side {
            Side::Left => self.modality(Modality::LeftHand),
            Side::Right => self.modality(Modality::RightHand),
        }
    }

    pub fn face(&self) -> Option<&[Landmark]> {
        self.modality(Modality::Face)
    }

    pub fn detected(&self) -> Vec<Modality> {
        Modality::ALL
            .into_iter()
            .filter(|m| self.modality(*m).is_some())
            .collect()
    }
}

/// One timestamped detection sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    Pose(PoseFrame),
    Holistic(HolisticFrame),
}

impl Frame {
    pub fn timestamp(&self) -> f64 {
        match self {
            Frame::Pose(frame) => frame.timestamp,
            Frame::Holistic(frame) => frame.timestamp,
        }
    }

    /// The 33 body landmarks, or `None` when the pose was not detected.
    ///
    /// A sequence of the wrong length is treated as not detected.
    pub fn pose_landmarks(&self) -> Option<&[Landmark]> {
        match self {
            Frame::Pose(frame) => canonical(Some(frame.landmarks.as_slice()), POSE_LANDMARK_COUNT),
            Frame::Holistic(frame) => frame.modality(Modality::Pose),
        }
    }

    pub fn landmark(&self, joint_index: usize) -> Option<&Landmark> {
        self.pose_landmarks()?.get(joint_index)
    }

    pub fn as_holistic(&self) -> Option<&HolisticFrame> {
        match self {
            Frame::Holistic(frame) => Some(frame),
            Frame::Pose(_) => None,
        }
    }
}

impl From<PoseFrame> for Frame {
    fn from(frame: PoseFrame) -> Self {
        Frame::Pose(frame)
    }
}

impl From<HolisticFrame> for Frame {
    fn from(frame: HolisticFrame) -> Self {
        Frame::Holistic(frame)
    }
}

pub fn frame_index_for(timestamp_ms: f64) -> u64 {
    if timestamp_ms <= 0.0 || !timestamp_ms.is_finite() {
        return 0;
    }
    (timestamp_ms * NOMINAL_FPS / 1000.0).floor() as u64
}

fn canonical(landmarks: Option<&[Landmark]>, expected: usize) -> Option<&[Landmark]> {
    landmarks.filter(|l| l.len() == expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full(count: usize) -> Vec<Landmark> {
        vec![Landmark::new(0.5, 0.5, 0.0); count]
    }

    #[test]
    fn short_pose_counts_as_not_detected() {
        let frame = Frame::Pose(PoseFrame::new(0.0, full(12)));
        assert!(frame.pose_landmarks().is_none());
        assert!(frame.landmark(5).is_none());

        let frame = Frame::Pose(PoseFrame::new(0.0, full(POSE_LANDMARK_COUNT)));
        assert_eq!(frame.pose_landmarks().map(<[_]>::len), Some(POSE_LANDMARK_COUNT));
    }

    #[test]
    fn holistic_modalities_are_independent() {
        let mut frame = HolisticFrame::empty(10.0);
        frame.right_hand = Some(full(HAND_LANDMARK_COUNT));
        frame.face = Some(full(100));

        assert_eq!(frame.detected(), vec![Modality::RightHand]);
        assert!(frame.hand(Side::Left).is_none());
        assert!(frame.hand(Side::Right).is_some());
        assert!(frame.face().is_none());
        assert!(Frame::Holistic(frame).pose_landmarks().is_none());
    }

    #[test]
    fn frame_index_follows_nominal_rate() {
        assert_eq!(frame_index_for(0.0), 0);
        assert_eq!(frame_index_for(33.0), 0);
        assert_eq!(frame_index_for(34.0), 1);
        assert_eq!(frame_index_for(1000.0), 30);
        assert_eq!(frame_index_for(-5.0), 0);
    }

    #[test]
    fn frames_serialize_with_camel_case_fields() {
        let mut pose = PoseFrame::new(66.7, full(POSE_LANDMARK_COUNT));
        pose.world_landmarks = Some(vec![WorldLandmark::from_parts(
            Landmark::with_visibility(0.1, 0.2, 0.3, 0.9),
            Vector3::new(1.0, 2.0, 3.0),
        )]);
        let json = serde_json::to_value(Frame::Pose(pose)).unwrap();

        assert_eq!(json["kind"], "pose");
        assert_eq!(json["frameIndex"], 2);
        assert_eq!(json["worldLandmarks"][0]["worldY"], 2.0);
        assert!(json["landmarks"][0].get("visibility").is_none());
    }
}

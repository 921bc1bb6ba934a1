// src/skeleton.rs - Canonical landmark indices and connection tables
//
// Every module that needs a joint index goes through this file. The pose
// indices follow the 33-point body model; the hand and face tables follow the
// 21-point hand and 468-point face mesh models.
use crate::frame::Landmark;
use serde::{Deserialize, Serialize};

pub const POSE_LANDMARK_COUNT: usize = 33;
pub const HAND_LANDMARK_COUNT: usize = 21;
pub const FACE_LANDMARK_COUNT: usize = 468;

/// Landmarks below this visibility are not drawn as bones or joints.
pub const VISIBILITY_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseJoint {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl PoseJoint {
    /// All joints in index order; `ALL[i].index() == i`.
    pub const ALL: [PoseJoint; POSE_LANDMARK_COUNT] = [
        PoseJoint::Nose,
        PoseJoint::LeftEyeInner,
        PoseJoint::LeftEye,
        PoseJoint::LeftEyeOuter,
        PoseJoint::RightEyeInner,
        PoseJoint::RightEye,
        PoseJoint::RightEyeOuter,
        PoseJoint::LeftEar,
        PoseJoint::RightEar,
        PoseJoint::MouthLeft,
        PoseJoint::MouthRight,
        PoseJoint::LeftShoulder,
        PoseJoint::RightShoulder,
        PoseJoint::LeftElbow,
        PoseJoint::RightElbow,
        PoseJoint::LeftWrist,
        PoseJoint::RightWrist,
        PoseJoint::LeftPinky,
        PoseJoint::RightPinky,
        PoseJoint::LeftIndex,
        PoseJoint::RightIndex,
        PoseJoint::LeftThumb,
        PoseJoint::RightThumb,
        PoseJoint::LeftHip,
        PoseJoint::RightHip,
        PoseJoint::LeftKnee,
        PoseJoint::RightKnee,
        PoseJoint::LeftAnkle,
        PoseJoint::RightAnkle,
        PoseJoint::LeftHeel,
        PoseJoint::RightHeel,
        PoseJoint::LeftFootIndex,
        PoseJoint::RightFootIndex,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            PoseJoint::Nose => "nose",
            PoseJoint::LeftEyeInner => "left_eye_inner",
            PoseJoint::LeftEye => "left_eye",
            PoseJoint::LeftEyeOuter => "left_eye_outer",
            PoseJoint::RightEyeInner => "right_eye_inner",
            PoseJoint::RightEye => "right_eye",
            PoseJoint::RightEyeOuter => "right_eye_outer",
            PoseJoint::LeftEar => "left_ear",
            PoseJoint::RightEar => "right_ear",
            PoseJoint::MouthLeft => "mouth_left",
            PoseJoint::MouthRight => "mouth_right",
            PoseJoint::LeftShoulder => "left_shoulder",
            PoseJoint::RightShoulder => "right_shoulder",
            PoseJoint::LeftElbow => "left_elbow",
            PoseJoint::RightElbow => "right_elbow",
            PoseJoint::LeftWrist => "left_wrist",
            PoseJoint::RightWrist => "right_wrist",
            PoseJoint::LeftPinky => "left_pinky",
            PoseJoint::RightPinky => "right_pinky",
            PoseJoint::LeftIndex => "left_index",
            PoseJoint::RightIndex => "right_index",
            PoseJoint::LeftThumb => "left_thumb",
            PoseJoint::RightThumb => "right_thumb",
            PoseJoint::LeftHip => "left_hip",
            PoseJoint::RightHip => "right_hip",
            PoseJoint::LeftKnee => "left_knee",
            PoseJoint::RightKnee => "right_knee",
            PoseJoint::LeftAnkle => "left_ankle",
            PoseJoint::RightAnkle => "right_ankle",
            PoseJoint::LeftHeel => "left_heel",
            PoseJoint::RightHeel => "right_heel",
            PoseJoint::LeftFootIndex => "left_foot_index",
            PoseJoint::RightFootIndex => "right_foot_index",
        }
    }

    pub fn group(self) -> JointGroup {
        let i = self.index();
        match i {
            0..=10 => JointGroup::Face,
            11 | 12 | 23 | 24 => JointGroup::Torso,
            13..=22 if i % 2 == 1 => JointGroup::LeftArm,
            13..=22 => JointGroup::RightArm,
            25..=32 if i % 2 == 1 => JointGroup::LeftLeg,
            _ => JointGroup::RightLeg,
        }
    }
}

/// Body region a pose joint belongs to, used for colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointGroup {
    Face,
    Torso,
    LeftArm,
    RightArm,
    LeftLeg,
    RightLeg,
}

impl JointGroup {
    pub fn color(self) -> &'static str {
        match self {
            JointGroup::Face => "#ffcc00",
            JointGroup::Torso => "#ffffff",
            JointGroup::LeftArm => "#ff6b6b",
            JointGroup::RightArm => "#4ecdc4",
            JointGroup::LeftLeg => "#ff8c42",
            JointGroup::RightLeg => "#45b7d1",
        }
    }
}

/// Pose bones as (from, to) joint pairs.
pub const SKELETON_CONNECTIONS: [(PoseJoint, PoseJoint); 30] = {
    use PoseJoint::*;
    [
        // face
        (Nose, LeftEye),
        (Nose, RightEye),
        (LeftEye, LeftEar),
        (RightEye, RightEar),
        // torso
        (LeftShoulder, RightShoulder),
        (LeftShoulder, LeftHip),
        (RightShoulder, RightHip),
        (LeftHip, RightHip),
        // left arm
        (LeftShoulder, LeftElbow),
        (LeftElbow, LeftWrist),
        (LeftWrist, LeftPinky),
        (LeftWrist, LeftIndex),
        (LeftWrist, LeftThumb),
        (LeftPinky, LeftIndex),
        // right arm
        (RightShoulder, RightElbow),
        (RightElbow, RightWrist),
        (RightWrist, RightPinky),
        (RightWrist, RightIndex),
        (RightWrist, RightThumb),
        (RightPinky, RightIndex),
        // left leg
        (LeftHip, LeftKnee),
        (LeftKnee, LeftAnkle),
        (LeftAnkle, LeftHeel),
        (LeftAnkle, LeftFootIndex),
        (LeftHeel, LeftFootIndex),
        // right leg
        (RightHip, RightKnee),
        (RightKnee, RightAnkle),
        (RightAnkle, RightHeel),
        (RightAnkle, RightFootIndex),
        (RightHeel, RightFootIndex),
    ]
};

/// Hand landmark indices (21-point model).
pub mod hand {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_DIP: usize = 7;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_DIP: usize = 11;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_PIP: usize = 14;
    pub const RING_DIP: usize = 15;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;

    pub const FINGER_TIPS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];
}

pub const HAND_CONNECTIONS: [(usize, usize); 23] = [
    // thumb
    (0, 1), (1, 2), (2, 3), (3, 4),
    // index
    (0, 5), (5, 6), (6, 7), (7, 8),
    // middle
    (0, 9), (9, 10), (10, 11), (11, 12),
    // ring
    (0, 13), (13, 14), (14, 15), (15, 16),
    // pinky
    (0, 17), (17, 18), (18, 19), (19, 20),
    // palm
    (5, 9), (9, 13), (13, 17),
];

/// Named subsets of the 468-point face mesh.
pub mod face {
    pub const OVAL: [usize; 36] = [
        10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377,
        152, 148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
    ];
    pub const LEFT_EYE: [usize; 16] = [
        33, 7, 163, 144, 145, 153, 154, 155, 133, 173, 157, 158, 159, 160, 161, 246,
    ];
    pub const RIGHT_EYE: [usize; 16] = [
        362, 382, 381, 380, 374, 373, 390, 249, 263, 466, 388, 387, 386, 385, 384, 398,
    ];
    pub const LEFT_EYEBROW: [usize; 10] = [46, 53, 52, 65, 55, 70, 63, 105, 66, 107];
    pub const RIGHT_EYEBROW: [usize; 10] = [276, 283, 282, 295, 285, 300, 293, 334, 296, 336];
    pub const NOSE: [usize; 11] = [1, 2, 98, 327, 4, 5, 6, 168, 197, 195, 5];
    pub const LIPS_OUTER: [usize; 20] = [
        61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291, 409, 270, 269, 267, 0, 37, 39, 40, 185,
    ];
    pub const LIPS_INNER: [usize; 20] = [
        78, 95, 88, 178, 87, 14, 317, 402, 318, 324, 308, 415, 310, 311, 312, 13, 82, 81, 80, 191,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceRegion {
    Oval,
    LeftEye,
    RightEye,
    LeftEyebrow,
    RightEyebrow,
    Nose,
    LipsOuter,
    LipsInner,
}

impl FaceRegion {
    pub const ALL: [FaceRegion; 8] = [
        FaceRegion::Oval,
        FaceRegion::LeftEye,
        FaceRegion::RightEye,
        FaceRegion::LeftEyebrow,
        FaceRegion::RightEyebrow,
        FaceRegion::Nose,
        FaceRegion::LipsOuter,
        FaceRegion::LipsInner,
    ];

    pub fn indices(self) -> &'static [usize] {
        match self {
            FaceRegion::Oval => &face::OVAL,
            FaceRegion::LeftEye => &face::LEFT_EYE,
            FaceRegion::RightEye => &face::RIGHT_EYE,
            FaceRegion::LeftEyebrow => &face::LEFT_EYEBROW,
            FaceRegion::RightEyebrow => &face::RIGHT_EYEBROW,
            FaceRegion::Nose => &face::NOSE,
            FaceRegion::LipsOuter => &face::LIPS_OUTER,
            FaceRegion::LipsInner => &face::LIPS_INNER,
        }
    }
}

/// A bone ready for drawing: both endpoints are visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bone {
    pub from: PoseJoint,
    pub to: PoseJoint,
    pub color: &'static str,
}

/// Bones of a 33-point pose whose endpoints are both visible.
///
/// Returns an empty list when `landmarks` is not a full pose.
pub fn visible_bones(landmarks: &[Landmark]) -> Vec<Bone> {
    if landmarks.len() != POSE_LANDMARK_COUNT {
        return Vec::new();
    }

    SKELETON_CONNECTIONS
        .iter()
        .filter(|(from, to)| {
            landmarks[from.index()].is_visible() && landmarks[to.index()].is_visible()
        })
        .map(|&(from, to)| Bone {
            from,
            to,
            color: from.group().color(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joint_table_is_in_index_order() {
        for (i, joint) in PoseJoint::ALL.iter().enumerate() {
            assert_eq!(joint.index(), i);
            assert_eq!(PoseJoint::from_index(i), Some(*joint));
        }
        assert_eq!(PoseJoint::from_index(POSE_LANDMARK_COUNT), None);
        assert_eq!(PoseJoint::RightFootIndex.index(), 32);
        assert_eq!(PoseJoint::LeftWrist.index(), 15);
    }

    #[test]
    fn joint_groups_match_body_regions() {
        assert_eq!(PoseJoint::Nose.group(), JointGroup::Face);
        assert_eq!(PoseJoint::RightHip.group(), JointGroup::Torso);
        assert_eq!(PoseJoint::LeftElbow.group(), JointGroup::LeftArm);
        assert_eq!(PoseJoint::RightThumb.group(), JointGroup::RightArm);
        assert_eq!(PoseJoint::LeftFootIndex.group(), JointGroup::LeftLeg);
        assert_eq!(PoseJoint::RightKnee.group(), JointGroup::RightLeg);
    }

    #[test]
    fn connection_tables_stay_inside_their_models() {
        assert_eq!(SKELETON_CONNECTIONS.len(), 30);
        for (from, to) in SKELETON_CONNECTIONS {
            assert_ne!(from, to);
        }
        // every body joint below the face hangs off at least one bone
        for joint in &PoseJoint::ALL[11..] {
            assert!(SKELETON_CONNECTIONS
                .iter()
                .any(|&(from, to)| from == *joint || to == *joint));
        }
        for (from, to) in HAND_CONNECTIONS {
            assert!(from < HAND_LANDMARK_COUNT && to < HAND_LANDMARK_COUNT);
        }
        for region in FaceRegion::ALL {
            assert!(region.indices().iter().all(|&i| i < FACE_LANDMARK_COUNT));
        }
    }

    #[test]
    fn hidden_endpoints_drop_their_bones() {
        let mut landmarks = vec![Landmark::new(0.5, 0.5, 0.0); POSE_LANDMARK_COUNT];
        assert_eq!(visible_bones(&landmarks).len(), SKELETON_CONNECTIONS.len());

        landmarks[PoseJoint::LeftElbow.index()].visibility = Some(0.2);
        let bones = visible_bones(&landmarks);
        assert_eq!(bones.len(), SKELETON_CONNECTIONS.len() - 2);
        assert!(bones
            .iter()
            .all(|b| b.from != PoseJoint::LeftElbow && b.to != PoseJoint::LeftElbow));

        assert!(visible_bones(&landmarks[..10]).is_empty());
    }
}

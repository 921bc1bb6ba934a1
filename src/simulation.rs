// src/simulation.rs - Synthetic detector for demos and tests without a model
use crate::capture::{Detector, HandDetection, HolisticSource, VideoFrame};
use crate::frame::{Frame, Landmark, PoseFrame, Side};
use crate::kinematics::Finger;
use crate::skeleton::{PoseJoint, HAND_LANDMARK_COUNT, POSE_LANDMARK_COUNT};
use std::f64::consts::PI;

/// Generates a standing figure waving both arms and bending its knees.
///
/// Motion is a function of the frame's media position, so replaying the same
/// positions gives the same landmarks.
#[derive(Debug, Clone)]
pub struct SimulatedPose {
    /// Phase offset of the right arm relative to the left, in radians.
    pub right_phase: f64,
    /// Sway frequency in Hz.
    pub frequency: f64,
}

impl Default for SimulatedPose {
    fn default() -> Self {
        Self {
            right_phase: 1.5,
            frequency: 0.5,
        }
    }
}

impl SimulatedPose {
    pub fn landmarks_at(&self, seconds: f64) -> Vec<Landmark> {
        use PoseJoint::*;

        let t = seconds * self.frequency * 2.0 * PI;
        let mut lm = vec![Landmark::with_visibility(0.5, 0.5, 0.0, 0.2); POSE_LANDMARK_COUNT];
        let mut set = |joint: PoseJoint, x: f64, y: f64, z: f64, visibility: f64| {
            lm[joint.index()] = Landmark::with_visibility(x, y, z, visibility);
        };

        // Head
        set(Nose, 0.5, 0.15, -0.05, 0.99);
        set(LeftEye, 0.52, 0.13, -0.04, 0.98);
        set(RightEye, 0.48, 0.13, -0.04, 0.98);
        set(LeftEar, 0.55, 0.14, 0.0, 0.9);
        set(RightEar, 0.45, 0.14, 0.0, 0.9);
        set(MouthLeft, 0.52, 0.18, -0.04, 0.97);
        set(MouthRight, 0.48, 0.18, -0.04, 0.97);

        // Arms
        set(LeftShoulder, 0.6, 0.3, 0.0, 0.95);
        set(RightShoulder, 0.4, 0.3, 0.0, 0.95);
        set(LeftElbow, 0.65, 0.42 + 0.05 * t.sin(), 0.0, 0.9);
        set(RightElbow, 0.35, 0.42 + 0.05 * (t + self.right_phase).sin(), 0.0, 0.9);
        let lw = (0.7 + 0.08 * (t * 0.5).cos(), 0.52 + 0.1 * t.sin());
        let rw = (
            0.3 - 0.08 * (t * 0.5 + 1.0).cos(),
            0.52 + 0.1 * (t + self.right_phase).sin(),
        );
        set(LeftWrist, lw.0, lw.1, 0.0, 0.85);
        set(RightWrist, rw.0, rw.1, 0.0, 0.85);
        for (joint, (x, y)) in [(LeftPinky, lw), (LeftIndex, lw), (LeftThumb, lw)] {
            set(joint, x + 0.02, y + 0.03, 0.0, 0.7);
        }
        for (joint, (x, y)) in [(RightPinky, rw), (RightIndex, rw), (RightThumb, rw)] {
            set(joint, x - 0.02, y + 0.03, 0.0, 0.7);
        }

        // Legs
        let squat = 0.03 * (t * 0.5).sin().abs();
        set(LeftHip, 0.56, 0.55 + squat, 0.0, 0.95);
        set(RightHip, 0.44, 0.55 + squat, 0.0, 0.95);
        set(LeftKnee, 0.58 + squat, 0.72 + squat / 2.0, -0.02, 0.9);
        set(RightKnee, 0.42 - squat, 0.72 + squat / 2.0, -0.02, 0.9);
        set(LeftAnkle, 0.57, 0.9, 0.0, 0.85);
        set(RightAnkle, 0.43, 0.9, 0.0, 0.85);
        set(LeftHeel, 0.56, 0.92, 0.02, 0.8);
        set(RightHeel, 0.44, 0.92, 0.02, 0.8);
        set(LeftFootIndex, 0.58, 0.94, -0.04, 0.8);
        set(RightFootIndex, 0.42, 0.94, -0.04, 0.8);

        lm
    }

    /// A 21-point open hand around `wrist`, fingers curling with `curl` in `[0, 1]`.
    pub fn hand_at(wrist: (f64, f64), curl: f64) -> Vec<Landmark> {
        let mut points = vec![Landmark::new(wrist.0, wrist.1, 0.0); HAND_LANDMARK_COUNT];
        let bend = curl.clamp(0.0, 1.0) * PI / 4.0;

        for (slot, finger) in Finger::ALL.iter().enumerate() {
            let spread = (slot as f64 - 2.0) * 0.2;
            let (mut x, mut y) = wrist;
            let mut heading = -PI / 2.0 + spread;
            for (segment, index) in finger.chain().into_iter().enumerate() {
                let length = if segment == 0 { 0.04 } else { 0.02 };
                x += length * heading.cos();
                y += length * heading.sin();
                points[index] = Landmark::new(x, y, 0.0);
                heading += bend;
            }
        }
        points
    }
}

impl Detector for SimulatedPose {
    fn detect(&mut self, frame: &VideoFrame, timestamp_ms: f64) -> anyhow::Result<Option<Frame>> {
        Ok(Some(Frame::Pose(PoseFrame::new(
            timestamp_ms,
            self.landmarks_at(frame.position),
        ))))
    }
}

/// Pose plus two hands, reported with camera-view handedness labels.
#[derive(Debug, Clone, Default)]
pub struct SimulatedHolistic {
    pub pose: SimulatedPose,
}

impl HolisticSource for SimulatedHolistic {
    fn detect_pose(&mut self, frame: &VideoFrame, _timestamp_ms: f64) -> anyhow::Result<Option<Vec<Landmark>>> {
        Ok(Some(self.pose.landmarks_at(frame.position)))
    }

    fn detect_hands(&mut self, frame: &VideoFrame, _timestamp_ms: f64) -> anyhow::Result<Vec<HandDetection>> {
        let pose = self.pose.landmarks_at(frame.position);
        let curl = 0.5 + 0.5 * (frame.position * PI).sin();
        let wrist = |joint: PoseJoint| (pose[joint.index()].x, pose[joint.index()].y);

        // The camera sees the subject's left hand on its right.
        Ok(vec![
            HandDetection {
                label: Side::Right,
                landmarks: SimulatedPose::hand_at(wrist(PoseJoint::LeftWrist), curl),
            },
            HandDetection {
                label: Side::Left,
                landmarks: SimulatedPose::hand_at(wrist(PoseJoint::RightWrist), 1.0 - curl),
            },
        ])
    }

    fn detect_face(&mut self, _frame: &VideoFrame, _timestamp_ms: f64) -> anyhow::Result<Option<Vec<Landmark>>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureAdapter, HolisticDetector};
    use crate::kinematics::finger_flexion;
    use crate::session::MotionSession;
    use crate::skeleton::{hand, visible_bones};
    use image::DynamicImage;

    #[test]
    fn pose_is_complete_and_deterministic() {
        let sim = SimulatedPose::default();
        let a = sim.landmarks_at(1.25);
        assert_eq!(a.len(), POSE_LANDMARK_COUNT);
        assert_eq!(a, sim.landmarks_at(1.25));
        assert_ne!(a, sim.landmarks_at(1.5));
        assert!(visible_bones(&a).len() > 20);
    }

    #[test]
    fn curled_hand_flexes_more() {
        let open = SimulatedPose::hand_at((0.5, 0.5), 0.0);
        let closed = SimulatedPose::hand_at((0.5, 0.5), 1.0);
        assert!(finger_flexion(&closed, Finger::Index) > finger_flexion(&open, Finger::Index) + 10.0);
    }

    #[test]
    fn holistic_simulation_fills_both_hands() {
        let mut adapter = CaptureAdapter::new(HolisticDetector::new(SimulatedHolistic::default(), true));
        let mut session = MotionSession::default();
        let frame = VideoFrame::new(0, 0.5, DynamicImage::new_rgb8(2, 2));

        assert!(adapter.process(&frame, 500.0, &mut session));
        let holistic = session.current_frame().and_then(Frame::as_holistic).cloned().unwrap();
        assert_eq!(holistic.detected().len(), 3);
        // Mirroring puts the hand near the left wrist into the left slot.
        let left_wrist = session.current_frame().and_then(|f| f.landmark(PoseJoint::LeftWrist.index())).copied().unwrap();
        let left_hand = holistic.hand(Side::Left).unwrap();
        assert_eq!(left_hand[hand::WRIST].x, left_wrist.x);
    }
}

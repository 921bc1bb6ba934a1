// src/config.rs
use crate::error::{MotionError, Result};
use crate::skeleton::{PoseJoint, POSE_LANDMARK_COUNT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_MAX_BUFFER_SIZE: usize = 300; // ~10s at 30fps
pub const DEFAULT_TRAJECTORY_LENGTH: usize = 60; // ~2s of trail
pub const DEFAULT_RECENT_VELOCITY_FRAMES: usize = 10;

pub fn default_tracked_joints() -> Vec<usize> {
    vec![
        PoseJoint::LeftWrist.index(),
        PoseJoint::RightWrist.index(),
        PoseJoint::LeftAnkle.index(),
        PoseJoint::RightAnkle.index(),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Capacity of the live rolling frame window.
    pub max_buffer_size: usize,
    /// Points kept per joint trail.
    pub trajectory_length: usize,
    pub tracked_joints: Vec<usize>,
    /// Frames averaged for the live wrist speed readout.
    pub recent_velocity_frames: usize,
    /// Moving-average window applied to angle series before ROM and symmetry.
    pub smoothing_window: Option<usize>,
    /// Swap detector handedness labels (webcam input is mirrored).
    pub mirror_handedness: bool,
    pub output_directory: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            trajectory_length: DEFAULT_TRAJECTORY_LENGTH,
            tracked_joints: default_tracked_joints(),
            recent_velocity_frames: DEFAULT_RECENT_VELOCITY_FRAMES,
            smoothing_window: None,
            mirror_handedness: true,
            output_directory: directories::UserDirs::new()
                .and_then(|dirs| dirs.document_dir().map(|p| p.join("Motion3D")))
                .unwrap_or_else(|| PathBuf::from("./output")),
        }
    }
}

impl Settings {
    /// Defaults overridden by `MOTION3D_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(dir) = lookup("MOTION3D_OUTPUT_DIR") {
            settings.output_directory = PathBuf::from(dir);
        }
        if let Some(value) = lookup("MOTION3D_BUFFER_SIZE") {
            settings.max_buffer_size = parse_count("MOTION3D_BUFFER_SIZE", &value)?;
        }
        if let Some(value) = lookup("MOTION3D_TRAJECTORY_LENGTH") {
            settings.trajectory_length = parse_count("MOTION3D_TRAJECTORY_LENGTH", &value)?;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_buffer_size == 0 {
            return Err(MotionError::invalid_settings("max_buffer_size must be at least 1"));
        }
        if self.trajectory_length == 0 {
            return Err(MotionError::invalid_settings("trajectory_length must be at least 1"));
        }
        if self.recent_velocity_frames < 2 {
            return Err(MotionError::invalid_settings(
                "recent_velocity_frames must be at least 2",
            ));
        }
        if let Some(&index) = self.tracked_joints.iter().find(|&&i| i >= POSE_LANDMARK_COUNT) {
            return Err(MotionError::JointOutOfRange {
                index,
                count: POSE_LANDMARK_COUNT,
            });
        }
        Ok(())
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| MotionError::invalid_settings(format!("{} is not a count: {:?}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.max_buffer_size, 300);
        assert_eq!(settings.trajectory_length, 60);
        assert_eq!(settings.tracked_joints, vec![15, 16, 27, 28]);
    }

    #[test]
    fn environment_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("MOTION3D_BUFFER_SIZE", "120"),
            ("MOTION3D_TRAJECTORY_LENGTH", " 30 "),
            ("MOTION3D_OUTPUT_DIR", "/tmp/motion"),
        ]
        .into_iter()
        .collect();

        let settings = Settings::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(settings.max_buffer_size, 120);
        assert_eq!(settings.trajectory_length, 30);
        assert_eq!(settings.output_directory, PathBuf::from("/tmp/motion"));
    }

    #[test]
    fn bad_overrides_are_rejected() {
        let result = Settings::from_lookup(|k| (k == "MOTION3D_BUFFER_SIZE").then(|| "lots".into()));
        assert!(matches!(result, Err(MotionError::InvalidSettings(_))));

        let result = Settings::from_lookup(|k| (k == "MOTION3D_BUFFER_SIZE").then(|| "0".into()));
        assert!(matches!(result, Err(MotionError::InvalidSettings(_))));
    }

    #[test]
    fn out_of_range_joint_is_rejected() {
        let settings = Settings {
            tracked_joints: vec![15, 33],
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(MotionError::JointOutOfRange { index: 33, .. })
        ));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"trajectory_length": 12}"#).unwrap();
        assert_eq!(settings.trajectory_length, 12);
        assert_eq!(settings.max_buffer_size, DEFAULT_MAX_BUFFER_SIZE);
    }
}

// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Failures that can surface from the motion analysis library.
///
/// Buffer mutations and kinematics never fail; these cover configuration,
/// detector start-up and export only.
#[derive(Debug, Error)]
pub enum MotionError {
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("joint index {index} is outside the {count}-point pose model")]
    JointOutOfRange { index: usize, count: usize },

    #[error("detector failed to initialize: {0}")]
    DetectorInit(#[source] anyhow::Error),

    #[error("capture loop is already running")]
    CaptureRunning,

    #[error("capture task aborted")]
    CaptureAborted(#[from] tokio::task::JoinError),

    #[error("no frames to export")]
    NothingToExport,

    #[error("failed to write export to {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize export document")]
    Json(#[from] serde_json::Error),

    #[error("failed to write angle table")]
    Csv(#[from] csv::Error),
}

impl MotionError {
    pub fn invalid_settings(reason: impl Into<String>) -> Self {
        Self::InvalidSettings(reason.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MotionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joint_out_of_range_mentions_index() {
        let err = MotionError::JointOutOfRange { index: 40, count: 33 };
        assert!(err.to_string().contains("40"));
        assert!(err.to_string().contains("33"));
    }

    #[test]
    fn io_error_mentions_path() {
        let err = MotionError::io(
            "/tmp/out.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/out.json"));
    }
}

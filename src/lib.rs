// src/lib.rs
pub mod analysis;
pub mod buffer;
pub mod capture;
pub mod config;
pub mod error;
pub mod export;
pub mod frame;
pub mod kinematics;
pub mod session;
pub mod simulation;
pub mod skeleton;
pub mod trajectory;

pub use config::Settings;
pub use error::{MotionError, Result};
pub use frame::{Frame, HolisticFrame, Landmark, PoseFrame};
pub use session::{CaptureState, MotionSession, PlaybackState, SessionConfig};

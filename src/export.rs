// src/export.rs
use crate::error::{MotionError, Result};
use crate::frame::{Frame, Side};
use crate::kinematics::{finger_flexion, joint_angle_set, wrist_flexion, Finger, JointAngleKind};
use crate::session::MotionSession;
use chrono::{SecondsFormat, Utc};
use csv::Writer;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// The JSON document written by a frame export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    /// ISO-8601 UTC time of the export.
    pub exported_at: String,
    pub frame_count: usize,
    pub frames: Vec<Frame>,
}

impl ExportDocument {
    pub fn new(frames: Vec<Frame>) -> Result<Self> {
        if frames.is_empty() {
            return Err(MotionError::NothingToExport);
        }
        Ok(Self {
            exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            frame_count: frames.len(),
            frames,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Holistic documents get a separate file prefix.
    pub fn is_holistic(&self) -> bool {
        self.frames.iter().any(|f| f.as_holistic().is_some())
    }
}

/// The recording if there is one, otherwise the live window.
pub fn export_frames(session: &MotionSession) -> Vec<Frame> {
    if session.recorded_frames().is_empty() {
        session.frame_buffer().to_vec()
    } else {
        session.recorded_frames().to_vec()
    }
}

#[derive(Debug, Serialize)]
struct AngleRecord {
    timestamp: f64,
    frame: usize,

    left_elbow: Option<f64>,
    right_elbow: Option<f64>,
    left_shoulder: Option<f64>,
    right_shoulder: Option<f64>,
    left_hip: Option<f64>,
    right_hip: Option<f64>,
    left_knee: Option<f64>,
    right_knee: Option<f64>,

    // Left hand
    left_thumb_angle: Option<f64>,
    left_index_angle: Option<f64>,
    left_middle_angle: Option<f64>,
    left_ring_angle: Option<f64>,
    left_pinky_angle: Option<f64>,
    left_wrist_flexion: Option<f64>,

    // Right hand
    right_thumb_angle: Option<f64>,
    right_index_angle: Option<f64>,
    right_middle_angle: Option<f64>,
    right_ring_angle: Option<f64>,
    right_pinky_angle: Option<f64>,
    right_wrist_flexion: Option<f64>,
}

#[derive(Default)]
struct HandAngles {
    fingers: [Option<f64>; 5],
    wrist: Option<f64>,
}

impl HandAngles {
    fn of(frame: &Frame, side: Side) -> Self {
        match frame.as_holistic().and_then(|h| h.hand(side)) {
            Some(hand) => Self {
                fingers: Finger::ALL.map(|finger| Some(finger_flexion(hand, finger))),
                wrist: Some(wrist_flexion(hand)),
            },
            None => Self::default(),
        }
    }
}

impl AngleRecord {
    fn from_frame(frame_number: usize, frame: &Frame) -> Self {
        let angles = frame.pose_landmarks().map(joint_angle_set);
        let angle = |kind: JointAngleKind| angles.as_ref().map(|a| a[&kind]);
        let left = HandAngles::of(frame, Side::Left);
        let right = HandAngles::of(frame, Side::Right);

        Self {
            timestamp: frame.timestamp(),
            frame: frame_number,

            left_elbow: angle(JointAngleKind::LeftElbow),
            right_elbow: angle(JointAngleKind::RightElbow),
            left_shoulder: angle(JointAngleKind::LeftShoulder),
            right_shoulder: angle(JointAngleKind::RightShoulder),
            left_hip: angle(JointAngleKind::LeftHip),
            right_hip: angle(JointAngleKind::RightHip),
            left_knee: angle(JointAngleKind::LeftKnee),
            right_knee: angle(JointAngleKind::RightKnee),

            left_thumb_angle: left.fingers[0],
            left_index_angle: left.fingers[1],
            left_middle_angle: left.fingers[2],
            left_ring_angle: left.fingers[3],
            left_pinky_angle: left.fingers[4],
            left_wrist_flexion: left.wrist,

            right_thumb_angle: right.fingers[0],
            right_index_angle: right.fingers[1],
            right_middle_angle: right.fingers[2],
            right_ring_angle: right.fingers[3],
            right_pinky_angle: right.fingers[4],
            right_wrist_flexion: right.wrist,
        }
    }
}

/// Writes one CSV row of joint and finger angles per frame.
///
/// Columns for modalities missing from a frame are left empty.
pub fn write_angle_table<W: Write>(frames: &[Frame], out: W) -> Result<()> {
    let mut writer = Writer::from_writer(out);
    for (i, frame) in frames.iter().enumerate() {
        writer.serialize(AngleRecord::from_frame(i, frame))?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Writes export files into one output directory.
pub struct Exporter {
    output_dir: PathBuf,
}

impl Exporter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes `motion-data-<millis>.json` (or `holistic-data-<millis>.json`)
    /// and returns its path.
    pub fn export_json(&self, session: &MotionSession) -> Result<PathBuf> {
        let document = ExportDocument::new(export_frames(session))?;
        let prefix = if document.is_holistic() {
            "holistic-data"
        } else {
            "motion-data"
        };
        let (path, mut file) = self.create_file(prefix, "json")?;

        file.write_all(document.to_json()?.as_bytes())
            .map_err(|e| MotionError::io(&path, e))?;
        info!("Exported {} frames to {}", document.frame_count, path.display());
        Ok(path)
    }

    /// Writes `motion-angles-<millis>.csv` and returns its path.
    pub fn export_angle_csv(&self, session: &MotionSession) -> Result<PathBuf> {
        let frames = export_frames(session);
        if frames.is_empty() {
            return Err(MotionError::NothingToExport);
        }
        let (path, file) = self.create_file("motion-angles", "csv")?;
        write_angle_table(&frames, file)?;
        info!("Wrote angle table for {} frames to {}", frames.len(), path.display());
        Ok(path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<ExportDocument> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| MotionError::io(path, e))?;
        ExportDocument::from_json(&json)
    }

    fn create_file(&self, prefix: &str, extension: &str) -> Result<(PathBuf, File)> {
        fs::create_dir_all(&self.output_dir).map_err(|e| MotionError::io(&self.output_dir, e))?;
        create_unique(&self.output_dir, prefix, Utc::now().timestamp_millis(), extension)
    }
}

/// Creates `<prefix>-<millis>.<ext>`, or `<prefix>-<millis>-<n>.<ext>` when
/// an export from the same millisecond already exists. Never overwrites.
fn create_unique(dir: &Path, prefix: &str, millis: i64, extension: &str) -> Result<(PathBuf, File)> {
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{}-{}.{}", prefix, millis, extension)
        } else {
            format!("{}-{}-{}.{}", prefix, millis, attempt, extension)
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(MotionError::io(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{HolisticFrame, Landmark, PoseFrame};
    use crate::skeleton::{HAND_LANDMARK_COUNT, POSE_LANDMARK_COUNT};
    use chrono::DateTime;

    fn pose(timestamp: f64) -> Frame {
        Frame::Pose(PoseFrame::new(
            timestamp,
            vec![Landmark::with_visibility(0.25, 0.75, -0.1, 0.9); POSE_LANDMARK_COUNT],
        ))
    }

    #[test]
    fn empty_export_is_an_error() {
        assert!(matches!(
            ExportDocument::new(Vec::new()),
            Err(MotionError::NothingToExport)
        ));
    }

    #[test]
    fn exported_at_is_iso_8601() {
        let doc = ExportDocument::new(vec![pose(0.0)]).unwrap();
        assert!(DateTime::parse_from_rfc3339(&doc.exported_at).is_ok());
        assert!(doc.exported_at.ends_with('Z'));
        assert_eq!(doc.frame_count, 1);
    }

    #[test]
    fn document_json_round_trips() {
        let doc = ExportDocument::new(vec![pose(0.0), pose(33.4)]).unwrap();
        let json = doc.to_json().unwrap();
        assert!(json.contains("\"frameCount\": 2"));
        assert!(json.contains("\"exportedAt\""));
        assert_eq!(ExportDocument::from_json(&json).unwrap(), doc);
    }

    #[test]
    fn recording_takes_precedence_over_live_window() {
        let mut session = MotionSession::default();
        session.add_frame(pose(0.0));
        session.add_frame(pose(33.0));
        assert_eq!(export_frames(&session).len(), 2);

        session.start_recording();
        session.add_frame(pose(66.0));
        session.stop_recording();
        let frames = export_frames(&session);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].timestamp(), 66.0);
    }

    #[test]
    fn angle_table_leaves_missing_modalities_empty() {
        let mut holistic = HolisticFrame::empty(40.0);
        holistic.left_hand = Some(vec![Landmark::new(0.5, 0.5, 0.0); HAND_LANDMARK_COUNT]);
        let frames = vec![pose(0.0), Frame::Holistic(holistic)];

        let mut out = Vec::new();
        write_angle_table(&frames, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,frame,left_elbow"));
        let columns = lines[0].split(',').count();
        // pose frame: 8 joint angles filled, 12 hand columns empty
        assert_eq!(lines[1].split(',').filter(|c| c.is_empty()).count(), 12);
        // holistic frame without pose: joint angles and right hand empty
        assert_eq!(lines[2].split(',').count(), columns);
        assert_eq!(lines[2].split(',').filter(|c| c.is_empty()).count(), 14);
    }

    #[test]
    fn exporter_writes_prefixed_files() {
        let dir = std::env::temp_dir().join(format!("motion3d-export-{}", uuid::Uuid::new_v4()));
        let exporter = Exporter::new(&dir);

        let empty = MotionSession::default();
        assert!(matches!(exporter.export_json(&empty), Err(MotionError::NothingToExport)));

        let mut session = MotionSession::default();
        session.add_frame(pose(0.0));
        let path = exporter.export_json(&session).unwrap();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap().to_string();
        assert!(name.starts_with("motion-data-") && name.ends_with(".json"));
        assert_eq!(Exporter::load(&path).unwrap().frame_count, 1);

        session.add_frame(Frame::Holistic(HolisticFrame::empty(33.0)));
        let path = exporter.export_json(&session).unwrap();
        assert!(path.file_name().and_then(|n| n.to_str()).unwrap().starts_with("holistic-data-"));

        let csv = exporter.export_angle_csv(&session).unwrap();
        assert!(csv.exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn same_millisecond_exports_do_not_collide() {
        let dir = std::env::temp_dir().join(format!("motion3d-unique-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        let (first, mut file) = create_unique(&dir, "motion-data", 1_700_000_000_000, "json").unwrap();
        file.write_all(b"first").unwrap();
        let (second, _) = create_unique(&dir, "motion-data", 1_700_000_000_000, "json").unwrap();

        assert_ne!(first, second);
        assert!(second.ends_with("motion-data-1700000000000-1.json"));
        assert_eq!(fs::read_to_string(&first).unwrap(), "first");

        fs::remove_dir_all(&dir).unwrap();
    }
}

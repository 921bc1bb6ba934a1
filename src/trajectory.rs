// src/trajectory.rs - Per-joint motion paths in display space
use crate::buffer::RollingBuffer;
use crate::frame::Landmark;
use crate::skeleton::PoseJoint;
use serde::{Serialize, Serializer};

/// Trail colours, assigned by a joint's position in the tracked set.
pub const TRAJECTORY_COLORS: [&str; 6] = [
    "#ff6b6b", "#4ecdc4", "#45b7d1", "#96ceb4", "#ffeaa7", "#dfe6e9",
];

pub fn trajectory_color(slot: usize) -> &'static str {
    TRAJECTORY_COLORS[slot % TRAJECTORY_COLORS.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrajectoryPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub timestamp: f64,
}

/// Maps detector space (`[0, 1]`, y down) to a centred `[-1, 1]` space with y up.
pub fn to_display_space(landmark: &Landmark, timestamp: f64) -> TrajectoryPoint {
    TrajectoryPoint {
        x: (landmark.x - 0.5) * 2.0,
        y: -(landmark.y - 0.5) * 2.0,
        z: landmark.z * 2.0,
        timestamp,
    }
}

/// The recent path of one tracked joint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trajectory {
    pub joint: String,
    pub joint_index: usize,
    #[serde(serialize_with = "serialize_points")]
    points: RollingBuffer<TrajectoryPoint>,
    pub color: &'static str,
}

impl Trajectory {
    pub fn new(joint_index: usize, slot: usize, max_points: usize) -> Self {
        let joint = PoseJoint::from_index(joint_index)
            .map(|j| j.name().to_string())
            .unwrap_or_else(|| format!("joint_{}", joint_index));

        Self {
            joint,
            joint_index,
            points: RollingBuffer::new(max_points),
            color: trajectory_color(slot),
        }
    }

    pub fn push(&mut self, point: TrajectoryPoint) {
        self.points.push(point);
    }

    pub fn set_max_points(&mut self, max_points: usize) {
        self.points.set_capacity(max_points);
    }

    pub fn max_points(&self) -> usize {
        self.points.capacity()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&TrajectoryPoint> {
        self.points.latest()
    }

    pub fn points(&self) -> impl DoubleEndedIterator<Item = &TrajectoryPoint> + ExactSizeIterator + '_ {
        self.points.iter()
    }

    /// Total distance travelled along the trail, in display units.
    pub fn path_length(&self) -> f64 {
        self.points
            .iter()
            .zip(self.points.iter().skip(1))
            .map(|(a, b)| {
                let (dx, dy, dz) = (b.x - a.x, b.y - a.y, b.z - a.z);
                (dx * dx + dy * dy + dz * dz).sqrt()
            })
            .sum()
    }

    /// Per-point opacity for a fading trail: oldest near 0, newest 1.
    pub fn fade_alphas(&self) -> Vec<f64> {
        let n = self.points.len();
        (0..n).map(|i| (i + 1) as f64 / n as f64).collect()
    }
}

fn serialize_points<S>(points: &RollingBuffer<TrajectoryPoint>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(points.iter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn display_space_is_centred_with_y_up() {
        let p = to_display_space(&Landmark::new(0.5, 0.5, 0.0), 0.0);
        assert_eq!((p.x, p.y, p.z), (0.0, 0.0, 0.0));

        let p = to_display_space(&Landmark::new(1.0, 0.0, 0.25), 12.0);
        assert_approx_eq!(p.x, 1.0);
        assert_approx_eq!(p.y, 1.0);
        assert_approx_eq!(p.z, 0.5);
        assert_eq!(p.timestamp, 12.0);

        let p = to_display_space(&Landmark::new(0.0, 1.0, 0.0), 0.0);
        assert_approx_eq!(p.x, -1.0);
        assert_approx_eq!(p.y, -1.0);
    }

    #[test]
    fn trail_is_bounded_fifo() {
        let mut trail = Trajectory::new(15, 0, 4);
        for i in 0..10 {
            trail.push(TrajectoryPoint {
                x: i as f64,
                y: 0.0,
                z: 0.0,
                timestamp: i as f64,
            });
            assert!(trail.len() <= 4);
        }
        let xs: Vec<f64> = trail.points().map(|p| p.x).collect();
        assert_eq!(xs, vec![6.0, 7.0, 8.0, 9.0]);
        assert_approx_eq!(trail.path_length(), 3.0);
        assert_eq!(trail.joint, "left_wrist");
    }

    #[test]
    fn colours_cycle_by_slot() {
        assert_eq!(Trajectory::new(27, 1, 10).color, "#4ecdc4");
        assert_eq!(Trajectory::new(99, 6, 10).color, "#ff6b6b");
        assert_eq!(Trajectory::new(99, 6, 10).joint, "joint_99");
    }

    #[test]
    fn serializes_points_as_array() {
        let mut trail = Trajectory::new(16, 0, 3);
        trail.push(to_display_space(&Landmark::new(0.5, 0.5, 0.0), 5.0));
        let json = serde_json::to_value(&trail).unwrap();
        assert_eq!(json["jointIndex"], 16);
        assert_eq!(json["points"].as_array().map(Vec::len), Some(1));
    }
}

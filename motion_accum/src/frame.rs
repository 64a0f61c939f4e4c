//! Sensor frames and the hand poses they carry.

use nalgebra::{UnitQuaternion, Vector3};

// ════════════════════════════════════════════════════════════════════════════
// HandSide / HandPose
// ════════════════════════════════════════════════════════════════════════════

/// Which hand a pose belongs to.  Hands are matched across frames by side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandSide { Left, Right }

/// Pose of one tracked hand, in sensor space (millimetres).
#[derive(Clone, Debug, PartialEq)]
pub struct HandPose {
    pub side:             HandSide,
    pub palm_position:    Vector3<f32>,
    pub palm_orientation: UnitQuaternion<f32>,
    /// Thumb, index, middle, ring, pinky tip positions.
    pub fingertips:       [Vector3<f32>; 5],
    /// Tracking confidence reported by the device, 0.0–1.0.
    pub confidence:       f32,
}

impl HandPose {
    /// A flat, fully-confident hand at `palm_position` with fingertips
    /// fanned out `spread` mm in front of the palm.
    pub fn open(side: HandSide, palm_position: Vector3<f32>, spread: f32) -> Self {
        let fan = [-2.0_f32, -1.0, 0.0, 1.0, 2.0];
        let fingertips = fan.map(|k| {
            let angle = k * 0.35;
            palm_position + Vector3::new(angle.sin(), 0.0, -angle.cos()) * spread
        });
        HandPose {
            side,
            palm_position,
            palm_orientation: UnitQuaternion::identity(),
            fingertips,
            confidence: 1.0,
        }
    }

    /// Mean distance from the palm centre to each fingertip.
    pub fn finger_spread(&self) -> f32 {
        let sum: f32 = self.fingertips.iter()
            .map(|t| (t - self.palm_position).norm())
            .sum();
        sum / self.fingertips.len() as f32
    }

    /// Rigidly move this pose: rotate about the palm centre, then translate.
    pub fn transformed(&self, rotation: &UnitQuaternion<f32>, offset: &Vector3<f32>) -> Self {
        let palm = self.palm_position;
        let fingertips = self.fingertips.map(|t| palm + offset + rotation * (t - palm));
        HandPose {
            side:             self.side,
            palm_position:    palm + offset,
            palm_orientation: rotation * self.palm_orientation,
            fingertips,
            confidence:       self.confidence,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Frame
// ════════════════════════════════════════════════════════════════════════════

/// One immutable sensor capture.
///
/// Id `0` is reserved for the invalid (null) frame held by the application
/// before the first capture arrives.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub id:           u64,
    pub timestamp_us: i64,
    /// Device-reported (or producer-measured) frames per second.
    pub framerate:    f32,
    pub hands:        Vec<HandPose>,
}

impl Frame {
    pub fn new(id: u64, timestamp_us: i64, framerate: f32, hands: Vec<HandPose>) -> Self {
        Frame { id, timestamp_us, framerate, hands }
    }

    /// The null frame.
    pub fn invalid() -> Self {
        Frame { id: 0, timestamp_us: 0, framerate: 0.0, hands: Vec::new() }
    }

    pub fn is_valid(&self) -> bool { self.id != 0 }

    pub fn hand(&self, side: HandSide) -> Option<&HandPose> {
        self.hands.iter().find(|h| h.side == side)
    }
}

impl Default for Frame {
    fn default() -> Self { Frame::invalid() }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_frame_is_invalid() {
        assert!(!Frame::default().is_valid());
        assert!(Frame::new(7, 0, 60.0, vec![]).is_valid());
    }

    #[test]
    fn open_hand_spread_matches_request() {
        let h = HandPose::open(HandSide::Right, Vector3::new(10.0, 200.0, 0.0), 60.0);
        assert_relative_eq!(h.finger_spread(), 60.0, epsilon = 1e-4);
    }

    #[test]
    fn hand_lookup_by_side() {
        let l = HandPose::open(HandSide::Left, Vector3::zeros(), 50.0);
        let f = Frame::new(1, 0, 60.0, vec![l]);
        assert!(f.hand(HandSide::Left).is_some());
        assert!(f.hand(HandSide::Right).is_none());
    }

    #[test]
    fn transform_keeps_spread() {
        let h = HandPose::open(HandSide::Left, Vector3::new(0.0, 150.0, 0.0), 70.0);
        let q = UnitQuaternion::from_euler_angles(0.3, -0.2, 0.9);
        let moved = h.transformed(&q, &Vector3::new(5.0, -3.0, 1.0));
        assert_relative_eq!(moved.finger_spread(), 70.0, epsilon = 1e-3);
        assert_relative_eq!(moved.palm_position, Vector3::new(5.0, 147.0, 1.0), epsilon = 1e-5);
    }
}

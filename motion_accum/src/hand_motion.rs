//! [`FrameSource`] implementation derived from raw hand poses.
//!
//! Only hands present in both frames (matched by side) contribute.
//!
//! # Algorithm
//!
//! * **Translation**: mean palm displacement.
//! * **Rotation**: per-hand `q_curr · q_prev⁻¹`, averaged by sign-aligned
//!   normalised sum (adequate for the small angles seen between frames).
//! * **Scale**: ratio of hand spread.  With two hands the spread is the mean
//!   palm distance from the palms' centroid; with one it is the mean
//!   fingertip distance from the palm.
//! * **Probabilities**: each channel's magnitude is normalised by a
//!   reference magnitude; the share of the total is then weighted by the
//!   weakest hand's tracking confidence.  A frame pair with no motion at all
//!   reports zero everywhere.

use std::cell::Cell;

use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};

use crate::error::{MotionError, Result};
use crate::frame::{Frame, HandPose};
use crate::source::FrameSource;

const EPS: f32 = 1e-6;

// ════════════════════════════════════════════════════════════════════════════
// HandMotionConfig
// ════════════════════════════════════════════════════════════════════════════

/// Reference magnitudes: the per-frame motion that counts as "one unit" of
/// evidence for each channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandMotionConfig {
    /// Millimetres.
    pub translation_ref: f32,
    /// Radians.
    pub rotation_ref:    f32,
    /// Absolute log scale ratio.
    pub scale_ref:       f32,
}

impl Default for HandMotionConfig {
    fn default() -> Self {
        HandMotionConfig {
            translation_ref: 4.0,
            rotation_ref:    0.03,
            scale_ref:       0.015,
        }
    }
}

impl HandMotionConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("translation_ref", self.translation_ref),
            ("rotation_ref",    self.rotation_ref),
            ("scale_ref",       self.scale_ref),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(MotionError::InvalidReference { name, value });
            }
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HandMotion
// ════════════════════════════════════════════════════════════════════════════

/// `(id, timestamp)` of both frames in a pair.
type PairKey = (u64, i64, u64, i64);

/// Not `Sync`: the last analysis is cached in a [`Cell`].
#[derive(Clone, Debug, Default)]
pub struct HandMotion {
    config: HandMotionConfig,
    /// One accumulator tick asks every question about the same pair.
    last:   Cell<Option<(PairKey, Motion)>>,
}

/// Everything derived from one frame pair.
#[derive(Clone, Copy, Debug)]
struct Motion {
    translation: Vector3<f32>,
    rotation:    UnitQuaternion<f32>,
    scale:       f32,
    /// translation, rotation, scale
    probability: [f32; 3],
}

impl Motion {
    fn still() -> Self {
        Motion {
            translation: Vector3::zeros(),
            rotation:    UnitQuaternion::identity(),
            scale:       1.0,
            probability: [0.0; 3],
        }
    }
}

impl HandMotion {
    pub fn new(config: HandMotionConfig) -> Result<Self> {
        config.validate()?;
        Ok(HandMotion { config, last: Cell::new(None) })
    }

    pub fn config(&self) -> &HandMotionConfig { &self.config }

    /// Analysis of `(prev, curr)`, reusing the previous result for the same pair.
    fn motion(&self, prev: &Frame, curr: &Frame) -> Motion {
        let key = (prev.id, prev.timestamp_us, curr.id, curr.timestamp_us);
        if let Some((cached, motion)) = self.last.get() {
            if cached == key {
                return motion;
            }
        }
        let motion = self.analyse(prev, curr);
        self.last.set(Some((key, motion)));
        motion
    }

    fn analyse(&self, prev: &Frame, curr: &Frame) -> Motion {
        let pairs = common_hands(prev, curr);
        if pairs.is_empty() {
            return Motion::still();
        }

        let translation = mean_translation(&pairs);
        let rotation    = mean_rotation(&pairs);
        let scale       = spread_ratio(&pairs);

        let magnitude = [
            translation.norm() / self.config.translation_ref,
            rotation.angle() / self.config.rotation_ref,
            scale.ln().abs() / self.config.scale_ref,
        ];
        let total: f32 = magnitude.iter().sum();
        let probability = if total.is_finite() && total > EPS {
            let tracking = tracking_confidence(&pairs);
            magnitude.map(|m| (m / total * tracking).clamp(0.0, 1.0))
        } else {
            [0.0; 3]
        };

        Motion { translation, rotation, scale, probability }
    }
}

impl FrameSource for HandMotion {
    fn translation_probability(&self, prev: &Frame, curr: &Frame) -> f32 {
        self.motion(prev, curr).probability[0]
    }

    fn translation(&self, prev: &Frame, curr: &Frame) -> Vector3<f32> {
        self.motion(prev, curr).translation
    }

    fn rotation_probability(&self, prev: &Frame, curr: &Frame) -> f32 {
        self.motion(prev, curr).probability[1]
    }

    fn rotation_matrix(&self, prev: &Frame, curr: &Frame) -> Matrix3<f32> {
        self.motion(prev, curr).rotation.to_rotation_matrix().into_inner()
    }

    fn scale_probability(&self, prev: &Frame, curr: &Frame) -> f32 {
        self.motion(prev, curr).probability[2]
    }

    fn scale_factor(&self, prev: &Frame, curr: &Frame) -> f32 {
        self.motion(prev, curr).scale
    }

    fn current_frames_per_second(&self, frame: &Frame) -> f32 {
        frame.framerate
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// `(prev, curr)` pose pairs for hands tracked in both frames.
fn common_hands<'a>(prev: &'a Frame, curr: &'a Frame) -> Vec<(&'a HandPose, &'a HandPose)> {
    if !prev.is_valid() || !curr.is_valid() {
        return Vec::new();
    }
    curr.hands.iter()
        .filter_map(|c| prev.hand(c.side).map(|p| (p, c)))
        .collect()
}

fn mean_translation(pairs: &[(&HandPose, &HandPose)]) -> Vector3<f32> {
    let sum: Vector3<f32> = pairs.iter()
        .map(|(p, c)| c.palm_position - p.palm_position)
        .sum();
    sum / pairs.len() as f32
}

fn mean_rotation(pairs: &[(&HandPose, &HandPose)]) -> UnitQuaternion<f32> {
    let deltas: Vec<Quaternion<f32>> = pairs.iter()
        .map(|(p, c)| (c.palm_orientation * p.palm_orientation.inverse()).into_inner())
        .collect();
    let reference = deltas[0];
    let mut acc = Quaternion::new(0.0, 0.0, 0.0, 0.0);
    for q in &deltas {
        // q and -q are the same rotation; keep them on one hemisphere.
        if q.dot(&reference) < 0.0 { acc -= *q; } else { acc += *q; }
    }
    UnitQuaternion::try_new(acc, EPS).unwrap_or_else(UnitQuaternion::identity)
}

fn spread(hands: &[&HandPose]) -> f32 {
    match hands.len() {
        0 => 0.0,
        1 => hands[0].finger_spread(),
        n => {
            let centroid: Vector3<f32> = hands.iter()
                .map(|h| h.palm_position)
                .sum::<Vector3<f32>>() / n as f32;
            hands.iter()
                .map(|h| (h.palm_position - centroid).norm())
                .sum::<f32>() / n as f32
        }
    }
}

fn spread_ratio(pairs: &[(&HandPose, &HandPose)]) -> f32 {
    let before: Vec<&HandPose> = pairs.iter().map(|(p, _)| *p).collect();
    let after:  Vec<&HandPose> = pairs.iter().map(|(_, c)| *c).collect();
    let (s0, s1) = (spread(&before), spread(&after));
    if !s0.is_finite() || !s1.is_finite() || s0 < EPS {
        return 1.0;
    }
    s1.max(EPS) / s0
}

fn tracking_confidence(pairs: &[(&HandPose, &HandPose)]) -> f32 {
    pairs.iter()
        .flat_map(|(p, c)| [p.confidence, c.confidence])
        .fold(1.0_f32, f32::min)
        .clamp(0.0, 1.0)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::HandSide;
    use approx::assert_relative_eq;

    fn palm(x: f32) -> HandPose {
        HandPose::open(HandSide::Right, Vector3::new(x, 200.0, 0.0), 60.0)
    }

    fn two_hands(half_width: f32) -> Vec<HandPose> {
        vec![
            HandPose::open(HandSide::Left,  Vector3::new(-half_width, 200.0, 0.0), 60.0),
            HandPose::open(HandSide::Right, Vector3::new( half_width, 200.0, 0.0), 60.0),
        ]
    }

    #[test]
    fn no_common_hands_reports_nothing() {
        let src = HandMotion::default();
        let a = Frame::new(1, 0, 60.0, vec![palm(0.0)]);
        let b = Frame::new(2, 16_000, 60.0, vec![]);
        let d = src.delta(&a, &b);
        assert_eq!(d.translation_probability, 0.0);
        assert_eq!(d.rotation_probability, 0.0);
        assert_eq!(d.scale_probability, 0.0);
        assert_eq!(d.scale_factor, 1.0);
        assert_eq!(d.rotation, Matrix3::identity());
    }

    #[test]
    fn invalid_reference_frame_reports_nothing() {
        let src = HandMotion::default();
        let b = Frame::new(2, 16_000, 60.0, vec![palm(10.0)]);
        assert_eq!(src.translation_probability(&Frame::invalid(), &b), 0.0);
        assert_eq!(src.translation(&Frame::invalid(), &b), Vector3::zeros());
    }

    #[test]
    fn stationary_hand_reports_nothing() {
        let src = HandMotion::default();
        let a = Frame::new(1, 0, 60.0, vec![palm(5.0)]);
        let b = Frame::new(2, 16_000, 60.0, vec![palm(5.0)]);
        assert_eq!(src.delta(&a, &b).translation_probability, 0.0);
    }

    #[test]
    fn pure_translation() {
        let src = HandMotion::default();
        let a = Frame::new(1, 0, 60.0, vec![palm(0.0)]);
        let b = Frame::new(2, 16_000, 60.0, vec![palm(10.0)]);
        let d = src.delta(&a, &b);
        assert_relative_eq!(d.translation, Vector3::new(10.0, 0.0, 0.0), epsilon = 1e-4);
        assert!(d.translation_probability > 0.99);
        assert!(d.rotation_probability < 0.01);
        assert!(d.scale_probability < 0.01);
    }

    #[test]
    fn pure_rotation() {
        let src = HandMotion::default();
        let q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.1);
        let h = palm(0.0);
        let a = Frame::new(1, 0, 60.0, vec![h.clone()]);
        let b = Frame::new(2, 16_000, 60.0, vec![h.transformed(&q, &Vector3::zeros())]);
        let d = src.delta(&a, &b);
        assert_relative_eq!(d.rotation, q.to_rotation_matrix().into_inner(), epsilon = 1e-5);
        assert!(d.rotation_probability > 0.99);
        assert!(d.translation_probability < 0.01);
    }

    #[test]
    fn hands_moving_apart_scale_up() {
        let src = HandMotion::default();
        let a = Frame::new(1, 0, 60.0, two_hands(100.0));
        let b = Frame::new(2, 16_000, 60.0, two_hands(110.0));
        let d = src.delta(&a, &b);
        assert_relative_eq!(d.scale_factor, 1.1, epsilon = 1e-5);
        assert_relative_eq!(d.translation, Vector3::zeros(), epsilon = 1e-4);
        assert!(d.scale_probability > 0.99);
    }

    #[test]
    fn weak_tracking_caps_probability() {
        let src = HandMotion::default();
        let mut moved = palm(10.0);
        moved.confidence = 0.5;
        let a = Frame::new(1, 0, 60.0, vec![palm(0.0)]);
        let b = Frame::new(2, 16_000, 60.0, vec![moved]);
        assert_relative_eq!(src.translation_probability(&a, &b), 0.5, epsilon = 1e-4);
    }

    #[test]
    fn mean_rotation_ignores_quaternion_sign() {
        let q = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.2);
        let flipped = UnitQuaternion::new_unchecked(-q.into_inner());
        let l0 = HandPose { side: HandSide::Left, ..palm(0.0) };
        let r0 = palm(0.0);
        let l1 = HandPose { palm_orientation: q, ..l0.clone() };
        let r1 = HandPose { palm_orientation: flipped, ..r0.clone() };
        let avg = mean_rotation(&[(&l0, &l1), (&r0, &r1)]);
        assert_relative_eq!(avg.angle(), 0.2, epsilon = 1e-5);
    }

    #[test]
    fn analysis_is_cached_per_frame_pair() {
        let src = HandMotion::default();
        let a = Frame::new(1, 0, 60.0, vec![palm(0.0)]);
        let b = Frame::new(2, 16_000, 60.0, vec![palm(10.0)]);
        let c = Frame::new(3, 32_000, 60.0, vec![palm(10.0)]);

        assert!(src.translation_probability(&a, &b) > 0.99);
        assert_eq!(src.last.get().map(|(k, _)| k), Some((1, 0, 2, 16_000)));

        // A new pair replaces the cached one.
        assert_eq!(src.translation_probability(&b, &c), 0.0);
        assert_eq!(src.last.get().map(|(k, _)| k), Some((2, 16_000, 3, 32_000)));
        assert_relative_eq!(src.translation(&a, &b), Vector3::new(10.0, 0.0, 0.0), epsilon = 1e-4);
    }

    #[test]
    fn fps_comes_from_frame() {
        let f = Frame::new(3, 0, 114.5, vec![]);
        assert_eq!(HandMotion::default().current_frames_per_second(&f), 114.5);
    }

    #[test]
    fn config_rejects_non_positive_reference() {
        let cfg = HandMotionConfig { rotation_ref: 0.0, ..HandMotionConfig::default() };
        assert_eq!(
            HandMotion::new(cfg).unwrap_err(),
            MotionError::InvalidReference { name: "rotation_ref", value: 0.0 },
        );
    }
}

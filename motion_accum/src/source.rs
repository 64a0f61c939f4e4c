//! The frame-comparison surface consumed by the accumulator.
//!
//! A [`FrameSource`] answers "how did things move between these two frames,
//! and how sure are you?".  Hardware SDKs, simulated hands and test doubles
//! all plug in here; the accumulator never knows which it is talking to.

use nalgebra::{Matrix3, Vector3};

use crate::frame::Frame;

// ════════════════════════════════════════════════════════════════════════════
// FrameSource
// ════════════════════════════════════════════════════════════════════════════

/// Pairwise comparison of two frames.
///
/// Every delta is expressed relative to `prev` (the reference frame) in
/// sensor space.  Probabilities are nominally in `[0, 1]` but callers must
/// not rely on it.
pub trait FrameSource {
    fn translation_probability(&self, prev: &Frame, curr: &Frame) -> f32;
    fn translation(&self, prev: &Frame, curr: &Frame) -> Vector3<f32>;

    fn rotation_probability(&self, prev: &Frame, curr: &Frame) -> f32;
    fn rotation_matrix(&self, prev: &Frame, curr: &Frame) -> Matrix3<f32>;

    fn scale_probability(&self, prev: &Frame, curr: &Frame) -> f32;
    fn scale_factor(&self, prev: &Frame, curr: &Frame) -> f32;

    /// Telemetry only.
    fn current_frames_per_second(&self, frame: &Frame) -> f32;

    /// All six comparisons in one value.
    fn delta(&self, prev: &Frame, curr: &Frame) -> FrameDelta {
        FrameDelta {
            translation:             self.translation(prev, curr),
            translation_probability: self.translation_probability(prev, curr),
            rotation:                self.rotation_matrix(prev, curr),
            rotation_probability:    self.rotation_probability(prev, curr),
            scale_factor:            self.scale_factor(prev, curr),
            scale_probability:       self.scale_probability(prev, curr),
        }
    }
}

impl<S: FrameSource + ?Sized> FrameSource for &S {
    fn translation_probability(&self, p: &Frame, c: &Frame) -> f32 { (**self).translation_probability(p, c) }
    fn translation(&self, p: &Frame, c: &Frame) -> Vector3<f32>     { (**self).translation(p, c) }
    fn rotation_probability(&self, p: &Frame, c: &Frame) -> f32    { (**self).rotation_probability(p, c) }
    fn rotation_matrix(&self, p: &Frame, c: &Frame) -> Matrix3<f32> { (**self).rotation_matrix(p, c) }
    fn scale_probability(&self, p: &Frame, c: &Frame) -> f32       { (**self).scale_probability(p, c) }
    fn scale_factor(&self, p: &Frame, c: &Frame) -> f32            { (**self).scale_factor(p, c) }
    fn current_frames_per_second(&self, f: &Frame) -> f32          { (**self).current_frames_per_second(f) }
}

// ════════════════════════════════════════════════════════════════════════════
// FrameDelta
// ════════════════════════════════════════════════════════════════════════════

/// Derived comparison of a frame pair.  Never stored by the accumulator.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameDelta {
    pub translation:             Vector3<f32>,
    pub translation_probability: f32,
    pub rotation:                Matrix3<f32>,
    pub rotation_probability:    f32,
    pub scale_factor:            f32,
    pub scale_probability:       f32,
}

impl FrameDelta {
    /// No motion, no confidence.
    pub fn still() -> Self {
        FrameDelta {
            translation:             Vector3::zeros(),
            translation_probability: 0.0,
            rotation:                Matrix3::identity(),
            rotation_probability:    0.0,
            scale_factor:            1.0,
            scale_probability:       0.0,
        }
    }
}

impl Default for FrameDelta {
    fn default() -> Self { FrameDelta::still() }
}

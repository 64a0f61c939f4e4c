//! The motion accumulator: confidence-gated integration of frame deltas.
//!
//! Each call to [`MotionAccumulator::update`] runs three independent steps in
//! a fixed order:
//!
//! 1. **translation**: the sensor-space delta is mapped into object space
//!    with the inverse of the rotation *as it stood before this tick*, then
//!    added;
//! 2. **rotation**: the delta is right-multiplied onto the cumulative
//!    rotation;
//! 3. **scale**: the factor is multiplied in and clamped to the floor.
//!
//! A channel is applied only when its probability is strictly greater than
//! the threshold.  Nothing here fails at runtime: a source that has lost
//! tracking reports low probabilities and the state simply holds.
//!
//! The rotation is stored as a unit quaternion and renormalised after every
//! composition, so it stays orthonormal over arbitrarily long sessions.

use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3};
use tracing::trace;

use crate::error::{MotionError, Result};
use crate::frame::Frame;
use crate::source::FrameSource;

// ════════════════════════════════════════════════════════════════════════════
// AccumulatorConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AccumulatorConfig {
    /// A channel is integrated only when its probability is `> threshold`.
    pub confidence_threshold: f32,
    /// Floor for the cumulative scale.  There is no ceiling.
    pub min_scale:            f32,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        AccumulatorConfig {
            confidence_threshold: 0.4,
            min_scale:            0.1,
        }
    }
}

impl AccumulatorConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.confidence_threshold.is_finite() {
            return Err(MotionError::InvalidThreshold(self.confidence_threshold));
        }
        if !self.min_scale.is_finite() || self.min_scale <= 0.0 {
            return Err(MotionError::InvalidMinScale(self.min_scale));
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// MotionState
// ════════════════════════════════════════════════════════════════════════════

/// Cumulative transform.  Only [`MotionAccumulator`] mutates it.
#[derive(Clone, Debug, PartialEq)]
pub struct MotionState {
    pub rotation:    UnitQuaternion<f32>,
    pub translation: Vector3<f32>,
    pub scale:       f32,
}

impl Default for MotionState {
    fn default() -> Self {
        MotionState {
            rotation:    UnitQuaternion::identity(),
            translation: Vector3::zeros(),
            scale:       1.0,
        }
    }
}

/// Which channels passed the gate on one `update`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelUpdate {
    pub translation: bool,
    pub rotation:    bool,
    pub scale:       bool,
}

impl ChannelUpdate {
    pub fn any(&self) -> bool { self.translation || self.rotation || self.scale }
}

// ════════════════════════════════════════════════════════════════════════════
// MotionAccumulator
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct MotionAccumulator {
    config: AccumulatorConfig,
    state:  MotionState,
    ticks:  u64,
}

impl Default for MotionAccumulator {
    fn default() -> Self { MotionAccumulator::new() }
}

impl MotionAccumulator {
    /// Accumulator with the default threshold (0.4) and scale floor (0.1).
    pub fn new() -> Self {
        MotionAccumulator {
            config: AccumulatorConfig::default(),
            state:  MotionState::default(),
            ticks:  0,
        }
    }

    pub fn with_config(config: AccumulatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(MotionAccumulator { config, ..MotionAccumulator::new() })
    }

    /// Integrate the motion between `previous` and `current`.
    ///
    /// When `previous` is the null frame (first tick) nothing changes.
    pub fn update<S: FrameSource>(
        &mut self,
        source:   &S,
        previous: &Frame,
        current:  &Frame,
    ) -> ChannelUpdate {
        if !previous.is_valid() {
            return ChannelUpdate::default();
        }
        self.ticks += 1;

        // Order matters: translation must see the pre-tick rotation.
        let translation = self.integrate_translation(source, previous, current);
        let rotation    = self.integrate_rotation(source, previous, current);
        let scale       = self.integrate_scale(source, previous, current);

        ChannelUpdate { translation, rotation, scale }
    }

    /// Step 1.
    fn integrate_translation<S: FrameSource>(&mut self, source: &S, prev: &Frame, curr: &Frame) -> bool {
        let p = source.translation_probability(prev, curr);
        if !self.passes(p) {
            return false;
        }
        let delta = source.translation(prev, curr);
        let object_space = self.state.rotation.inverse_transform_vector(&delta);
        self.state.translation += object_space;
        trace!(probability = p, dx = object_space.x, dy = object_space.y, dz = object_space.z,
               "translation applied");
        true
    }

    /// Step 2.
    fn integrate_rotation<S: FrameSource>(&mut self, source: &S, prev: &Frame, curr: &Frame) -> bool {
        let p = source.rotation_probability(prev, curr);
        if !self.passes(p) {
            return false;
        }
        let delta = delta_quaternion(&source.rotation_matrix(prev, curr));
        self.state.rotation = self.state.rotation * delta;
        self.state.rotation.renormalize();
        trace!(probability = p, angle = delta.angle(), "rotation applied");
        true
    }

    /// Step 3.
    fn integrate_scale<S: FrameSource>(&mut self, source: &S, prev: &Frame, curr: &Frame) -> bool {
        let p = source.scale_probability(prev, curr);
        if !self.passes(p) {
            return false;
        }
        let factor = source.scale_factor(prev, curr);
        self.state.scale *= factor;
        if self.state.scale < self.config.min_scale {
            self.state.scale = self.config.min_scale;
        }
        trace!(probability = p, factor, scale = self.state.scale, "scale applied");
        true
    }

    /// The comparison is the whole gate: NaN and anything `<= threshold` fail.
    fn passes(&self, probability: f32) -> bool {
        probability > self.config.confidence_threshold
    }

    /// Back to identity / zero / 1.0.
    pub fn reset(&mut self) {
        self.state = MotionState::default();
        self.ticks = 0;
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn cumulative_rotation(&self) -> Matrix3<f32> {
        self.state.rotation.to_rotation_matrix().into_inner()
    }

    pub fn cumulative_translation(&self) -> Vector3<f32> { self.state.translation }
    pub fn cumulative_scale(&self)       -> f32          { self.state.scale }
    pub fn rotation(&self)               -> UnitQuaternion<f32> { self.state.rotation }
    pub fn state(&self)                  -> &MotionState { &self.state }
    pub fn config(&self)                 -> &AccumulatorConfig { &self.config }
    pub fn ticks(&self)                  -> u64          { self.ticks }

    /// Object-to-sensor transform `R · T · S`: rotate, then translate in the
    /// rotated frame, then scale.
    pub fn model_matrix(&self) -> Matrix4<f32> {
        self.state.rotation.to_homogeneous()
            * Matrix4::new_translation(&self.state.translation)
            * Matrix4::new_scaling(self.state.scale)
    }
}

/// Closed-form matrix → quaternion (Shepperd), valid through half turns.
/// Slightly non-orthonormal input is absorbed by the normalisation; a
/// non-finite or degenerate matrix counts as no rotation.
fn delta_quaternion(m: &Matrix3<f32>) -> UnitQuaternion<f32> {
    if !m.iter().all(|v| v.is_finite()) {
        return UnitQuaternion::identity();
    }
    let q = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*m));
    UnitQuaternion::try_new(q.into_inner(), 1e-6).unwrap_or_else(UnitQuaternion::identity)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

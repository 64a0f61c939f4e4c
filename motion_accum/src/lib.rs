//! # motion_accum
//!
//! Turns a stream of noisy, confidence-scored inter-frame hand motion into a
//! stable cumulative transform (translation, rotation, scale) suitable for
//! driving a rendered object.
//!
//! ## Pieces
//!
//! | Type | Role |
//! |---|---|
//! | [`Frame`] / [`HandPose`] | Immutable sensor snapshot |
//! | [`FrameSource`] | Pairwise frame comparison: deltas + probabilities |
//! | [`HandMotion`] | `FrameSource` derived from palm / fingertip poses |
//! | [`MotionAccumulator`] | The gated integrator owning [`MotionState`] |
//! | [`Telemetry`] | Text snapshot of the current state for an overlay |
//!
//! ## Quick start
//!
//! ```rust
//! use motion_accum::{Frame, HandMotion, MotionAccumulator};
//!
//! let source = HandMotion::default();
//! let mut acc = MotionAccumulator::new();
//!
//! let previous = Frame::invalid();
//! let current  = Frame::new(1, 0, 60.0, vec![]);
//!
//! // First call: the previous frame is the null frame, so nothing moves.
//! acc.update(&source, &previous, &current);
//! assert_eq!(acc.cumulative_scale(), 1.0);
//! ```
//!
//! ## Gating
//!
//! Each channel is integrated only when the source reports a probability
//! strictly greater than the configured threshold (0.4 by default).  The
//! three channels are decided independently, in the fixed order
//! translation → rotation → scale.

pub mod error;
pub mod frame;
pub mod source;
pub mod hand_motion;
pub mod accumulator;
pub mod telemetry;

pub use error::{MotionError, Result};
pub use frame::{Frame, HandPose, HandSide};
pub use source::{FrameDelta, FrameSource};
pub use hand_motion::{HandMotion, HandMotionConfig};
pub use accumulator::{AccumulatorConfig, ChannelUpdate, MotionAccumulator, MotionState};
pub use telemetry::Telemetry;

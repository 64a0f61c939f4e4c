//! Human-readable snapshot of the accumulator for an on-screen overlay.

use std::fmt;

use nalgebra::{Matrix3, Vector3};

use crate::accumulator::MotionAccumulator;

/// One tick's worth of numbers for the overlay.
#[derive(Clone, Debug, PartialEq)]
pub struct Telemetry {
    pub fps:         f32,
    pub translation: Vector3<f32>,
    pub rotation:    Matrix3<f32>,
    pub scale:       f32,
}

impl Telemetry {
    pub fn capture(fps: f32, acc: &MotionAccumulator) -> Self {
        Telemetry {
            fps,
            translation: acc.cumulative_translation(),
            rotation:    acc.cumulative_rotation(),
            scale:       acc.cumulative_scale(),
        }
    }
}

impl fmt::Display for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.translation;
        let r = &self.rotation;
        writeln!(f, "FPS         : {:.1}", self.fps)?;
        writeln!(f, "Translation : ({:.1}, {:.1}, {:.1})", t.x, t.y, t.z)?;
        write!(f, "Rotation    : [")?;
        for i in 0..3 {
            if i > 0 { write!(f, ", ")?; }
            write!(f, "({:.3}, {:.3}, {:.3})", r[(i, 0)], r[(i, 1)], r[(i, 2)])?;
        }
        writeln!(f, "]")?;
        write!(f, "Scale       : {:.3}", self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_accumulator_text() {
        let text = Telemetry::capture(59.94, &MotionAccumulator::new()).to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, [
            "FPS         : 59.9",
            "Translation : (0.0, 0.0, 0.0)",
            "Rotation    : [(1.000, 0.000, 0.000), (0.000, 1.000, 0.000), (0.000, 0.000, 1.000)]",
            "Scale       : 1.000",
        ]);
    }

    #[test]
    fn negative_values_keep_sign() {
        let t = Telemetry {
            fps:         120.0,
            translation: Vector3::new(-12.34, 5.0, 0.05),
            rotation:    Matrix3::identity(),
            scale:       0.1,
        };
        let text = t.to_string();
        assert!(text.contains("(-12.3, 5.0, 0.1)"), "{}", text);
        assert!(text.ends_with("Scale       : 0.100"));
    }
}

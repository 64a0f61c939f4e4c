//! # leap_cube
//!
//! LeapMotion hand-motion visualizer.  Frame-to-frame translation, rotation
//! and scale of the tracked hands are accumulated (via [`motion_accum`]) into
//! the transform of a colour cube, drawn with a live telemetry overlay.
//!
//! ## Gesture → Cube mapping
//!
//! | Hand motion | Channel | Cube |
//! |---|---|---|
//! | Move hands together | Translation | Cube moves (corrected for its current rotation) |
//! | Turn hands | Rotation | Cube turns |
//! | Spread / bring hands together | Scale | Cube grows / shrinks (never below 0.1×) |
//! | Hands leave the sensor | — | Cube holds still |
//!
//! A channel only moves the cube when the frame comparison is more than 40%
//! sure that channel explains the motion.
//!
//! ## Feature flags
//!
//! * (default) — **Simulation mode**: keyboard drives two virtual hands.
//! * `leap` — **Hardware mode**: polls a real LeapMotion controller via LeapC.
//!
//! ### Simulation keyboard shortcuts
//!
//! | Key | Motion |
//! |---|---|
//! | Arrows | Move left / right / up / down |
//! | `PgUp` / `PgDn` | Move away / toward |
//! | `J` / `L` | Yaw |
//! | `I` / `K` | Pitch |
//! | `U` / `O` | Roll |
//! | `=` / `-` | Spread / pinch (scale) |
//! | `H` | Toggle simulated tracking loss |
//! | `R` | Reset the cube |
//! | `Q` / `Escape` | Quit |

pub mod error;
pub mod source;
pub mod camera;
pub mod canvas;
pub mod renderer;
pub mod app;

pub use error::AppError;

//! Top-level application state and run loop.
//!
//! `AppState` owns the `MotionAccumulator`, the frame comparison and the
//! previous/current frame pair.  Each tick it swaps in the newest frame,
//! integrates the motion, and refreshes the telemetry text for the renderer.

use std::sync::mpsc::{self, Receiver, TryRecvError};

use motion_accum::{
    AccumulatorConfig, ChannelUpdate, Frame, FrameSource, HandMotion, HandMotionConfig,
    MotionAccumulator, Telemetry,
};
use tracing::{info, warn};

use crate::camera::Camera;
use crate::error::AppError;
use crate::renderer::{Renderer, WIN_H, WIN_W};
use crate::source::{spawn_frame_producer, SimConfig, SimInput, StopSignal};

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

/// Configuration for the full application.
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub accumulator: AccumulatorConfig,
    pub hand_motion: HandMotionConfig,
    /// Step sizes for the keyboard simulator (ignored with `--features leap`).
    pub sim:         SimConfig,
}

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

pub struct AppState {
    accumulator: MotionAccumulator,
    source:      HandMotion,
    previous:    Frame,
    current:     Frame,
    telemetry:   String,
}

impl AppState {
    pub fn new(cfg: &AppConfig) -> Result<Self, AppError> {
        let accumulator = MotionAccumulator::with_config(cfg.accumulator)?;
        let source = HandMotion::new(cfg.hand_motion)?;
        let telemetry = Telemetry::capture(0.0, &accumulator).to_string();
        Ok(AppState {
            accumulator,
            source,
            previous: Frame::invalid(),
            current:  Frame::invalid(),
            telemetry,
        })
    }

    // ── Per-frame tick ────────────────────────────────────────────────────

    /// Integrate `frame` (if one arrived) and refresh the telemetry.
    pub fn tick(&mut self, frame: Option<Frame>) -> ChannelUpdate {
        let applied = match frame {
            Some(next) => {
                self.previous = std::mem::replace(&mut self.current, next);
                self.accumulator.update(&self.source, &self.previous, &self.current)
            }
            None => ChannelUpdate::default(),
        };

        let fps = self.source.current_frames_per_second(&self.current);
        self.telemetry = Telemetry::capture(fps, &self.accumulator).to_string();
        applied
    }

    /// Back to the initial transform.  The frame pair is kept, so motion
    /// resumes from the next frame.
    pub fn reset(&mut self) {
        self.accumulator.reset();
        info!("motion state reset");
    }

    // ── Accessors for the render loop ─────────────────────────────────────

    pub fn accumulator(&self) -> &MotionAccumulator { &self.accumulator }
    pub fn telemetry(&self)   -> &str               { &self.telemetry }
    pub fn current(&self)     -> &Frame             { &self.current }
}

/// Drain everything queued and keep only the newest frame.
///
/// `Err` once the producer has gone away and nothing is left.
fn latest_frame(rx: &Receiver<Frame>) -> Result<Option<Frame>, TryRecvError> {
    let mut latest = None;
    loop {
        match rx.try_recv() {
            Ok(f) => latest = Some(f),
            Err(TryRecvError::Empty) => return Ok(latest),
            Err(TryRecvError::Disconnected) => {
                return if latest.is_some() { Ok(latest) } else { Err(TryRecvError::Disconnected) };
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run() — the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the full application.
///
/// This is the entry point called from `main.rs`.  It creates the renderer,
/// the frame producer (simulation by default, hardware with `--features
/// leap`), and drives the tick/render loop at ~60 fps.
pub fn run(cfg: AppConfig) -> Result<(), AppError> {
    // ── Sim input channel ─────────────────────────────────────────────────
    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
    let stop = StopSignal::new();

    #[cfg(not(feature = "leap"))]
    let frames = {
        info!("mode: keyboard simulation (use --features leap for hardware)");
        spawn_frame_producer(crate::source::SimFrameProducer::new(sim_rx, cfg.sim).with_stop(stop.clone()))
    };
    #[cfg(feature = "leap")]
    let frames = {
        info!("mode: LeapMotion hardware");
        drop(sim_rx);
        spawn_frame_producer(crate::source::LeapFrameProducer::new(stop.clone()))
    };

    // ── Renderer (owns the window and the sim input sender) ──────────────
    let mut renderer = Renderer::new(sim_tx)?;
    let camera = Camera::fixed(WIN_W, WIN_H);

    // ── App state ─────────────────────────────────────────────────────────
    let mut app = AppState::new(&cfg)?;
    let mut producer_alive = true;

    // ── Main loop ─────────────────────────────────────────────────────────
    while renderer.is_open() {
        // 1. Window input
        let input = renderer.poll_input();
        if input.quit { break; }
        if input.reset { app.reset(); }

        // 2. Newest frame, if any.  A dead producer just freezes the cube.
        let frame = match latest_frame(&frames) {
            Ok(f) => f,
            Err(_) => {
                if producer_alive {
                    warn!("frame producer stopped; holding last state");
                    producer_alive = false;
                }
                None
            }
        };

        // 3. Integrate
        app.tick(frame);

        // 4. Render
        renderer.render(&app.accumulator().model_matrix(), &camera, app.telemetry());
    }

    renderer.shutdown();
    stop.stop();
    info!(ticks = app.accumulator().ticks(), "visualizer closed");
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use motion_accum::{HandPose, HandSide, MotionError};
    use nalgebra::Vector3;

    fn make_app() -> AppState {
        AppState::new(&AppConfig::default()).unwrap()
    }

    fn hand_frame(id: u64, x: f32) -> Frame {
        let hand = HandPose::open(HandSide::Right, Vector3::new(x, 200.0, 0.0), 60.0);
        Frame::new(id, id as i64 * 16_667, 60.0, vec![hand])
    }

    #[test]
    fn first_frame_changes_nothing() {
        let mut app = make_app();
        let applied = app.tick(Some(hand_frame(1, 0.0)));
        assert!(!applied.any());
        assert_eq!(app.accumulator().cumulative_translation(), Vector3::zeros());
    }

    #[test]
    fn second_frame_integrates_motion() {
        let mut app = make_app();
        app.tick(Some(hand_frame(1, 0.0)));
        let applied = app.tick(Some(hand_frame(2, 8.0)));
        assert!(applied.translation);
        assert_relative_eq!(
            app.accumulator().cumulative_translation(),
            Vector3::new(8.0, 0.0, 0.0),
            epsilon = 1e-3,
        );
    }

    #[test]
    fn tick_without_frame_holds_state() {
        let mut app = make_app();
        app.tick(Some(hand_frame(1, 0.0)));
        app.tick(Some(hand_frame(2, 8.0)));
        let before = app.accumulator().state().clone();
        for _ in 0..10 { app.tick(None); }
        assert_eq!(app.accumulator().state(), &before);
        assert_eq!(app.current().id, 2);
    }

    #[test]
    fn reset_then_continue() {
        let mut app = make_app();
        app.tick(Some(hand_frame(1, 0.0)));
        app.tick(Some(hand_frame(2, 8.0)));
        app.reset();
        assert_eq!(app.accumulator().cumulative_translation(), Vector3::zeros());
        app.tick(Some(hand_frame(3, 13.0)));
        assert_relative_eq!(
            app.accumulator().cumulative_translation(),
            Vector3::new(5.0, 0.0, 0.0),
            epsilon = 1e-3,
        );
    }

    #[test]
    fn telemetry_tracks_frame_rate() {
        let mut app = make_app();
        app.tick(Some(Frame::new(1, 0, 114.0, vec![])));
        assert!(app.telemetry().starts_with("FPS         : 114.0"));
    }

    #[test]
    fn bad_threshold_is_rejected() {
        let cfg = AppConfig {
            accumulator: AccumulatorConfig { confidence_threshold: f32::NAN, ..AccumulatorConfig::default() },
            ..AppConfig::default()
        };
        assert!(matches!(
            AppState::new(&cfg),
            Err(AppError::Config(MotionError::InvalidThreshold(_)))
        ));
    }

    #[test]
    fn latest_frame_keeps_newest() {
        let (tx, rx) = mpsc::channel();
        for id in 1..=3 { tx.send(hand_frame(id, 0.0)).unwrap(); }
        assert_eq!(latest_frame(&rx).unwrap().map(|f| f.id), Some(3));
        assert_eq!(latest_frame(&rx).unwrap(), None);
        tx.send(hand_frame(4, 0.0)).unwrap();
        drop(tx);
        assert_eq!(latest_frame(&rx).unwrap().map(|f| f.id), Some(4));
        assert!(latest_frame(&rx).is_err());
    }
}

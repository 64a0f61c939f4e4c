//! Frame capture — from LeapMotion hardware or a keyboard-driven simulator.
//!
//! Producers run on their own thread and deliver immutable [`Frame`]s over an
//! `mpsc` channel.  The render loop doesn't need to know whether frames came
//! from real hardware or the simulator.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use motion_accum::{Frame, HandPose, HandSide};
use nalgebra::{UnitQuaternion, Vector3};
use tracing::{debug, warn};

// ════════════════════════════════════════════════════════════════════════════
// FrameProducer trait — unified interface for hw and sim
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver [`Frame`]s over a channel.
pub trait FrameProducer: Send + 'static {
    fn run(self: Box<Self>, tx: Sender<Frame>);
}

/// Spawn a producer on its own thread and return the receiving end.
pub fn spawn_frame_producer<P: FrameProducer>(producer: P) -> Receiver<Frame> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || Box::new(producer).run(tx));
    rx
}

/// Shared flag telling a producer thread to wind down.
///
/// Producers check it once per loop, so they exit even when nothing is
/// arriving to send.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self { Self::default() }

    pub fn stop(&self) { self.0.store(true, Ordering::Relaxed); }

    pub fn is_stopped(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

// ════════════════════════════════════════════════════════════════════════════
// FpsMeter
// ════════════════════════════════════════════════════════════════════════════

/// Smoothed frame rate from consecutive frame timestamps.
#[derive(Clone, Debug, Default)]
pub struct FpsMeter {
    last_us: Option<i64>,
    fps:     f32,
}

impl FpsMeter {
    const SMOOTHING: f32 = 0.1;

    pub fn new() -> Self { FpsMeter::default() }

    /// Record a frame timestamp (µs) and return the updated estimate.
    pub fn sample(&mut self, timestamp_us: i64) -> f32 {
        if let Some(last) = self.last_us {
            let dt = timestamp_us - last;
            if dt > 0 {
                let instant = 1_000_000.0 / dt as f32;
                self.fps = if self.fps == 0.0 {
                    instant
                } else {
                    self.fps + Self::SMOOTHING * (instant - self.fps)
                };
            }
        }
        self.last_us = Some(timestamp_us);
        self.fps
    }

    pub fn fps(&self) -> f32 { self.fps }
}

// ════════════════════════════════════════════════════════════════════════════
// LeapFrameProducer — real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Frame producer backed by a real LeapMotion controller.
///
/// Requires the `leap` feature flag and the LeapC shared library installed.
/// Each tracking event becomes one [`Frame`]: palm position, an orientation
/// built from the palm normal/direction basis, and distal fingertip joints.
#[cfg(feature = "leap")]
pub struct LeapFrameProducer {
    stop: StopSignal,
}

#[cfg(feature = "leap")]
impl LeapFrameProducer {
    pub fn new(stop: StopSignal) -> Self {
        LeapFrameProducer { stop }
    }
}

#[cfg(feature = "leap")]
impl FrameProducer for LeapFrameProducer {
    fn run(self: Box<Self>, tx: Sender<Frame>) {
        use leaprs::*;
        use tracing::{error, info};

        let mut connection = match Connection::create(ConnectionConfig::default()) {
            Ok(c)  => c,
            Err(e) => { error!("failed to create LeapC connection: {:?}", e); return; }
        };
        if let Err(e) = connection.open() {
            error!("failed to open LeapMotion device: {:?}", e);
            return;
        }
        info!("LeapC connection open");

        let start = Instant::now();
        let mut meter = FpsMeter::new();
        let mut next_id = 1u64;

        loop {
            if self.stop.is_stopped() {
                debug!("stop requested; closing LeapC producer");
                return;
            }
            let msg = match connection.poll(100) {
                Ok(m)  => m,
                Err(_) => continue,
            };

            if let Event::Tracking(frame) = msg.event() {
                let hands: Vec<HandPose> = frame.hands()
                    .map(|h| {
                        let side = if h.hand_type() == HandType::Left { HandSide::Left } else { HandSide::Right };
                        let p = h.palm().position();
                        let n = h.palm().normal();
                        let d = h.palm().direction();
                        let tips: Vec<Vector3<f32>> = h.digits()
                            .map(|digit| {
                                let t = digit.distal().next_joint();
                                Vector3::new(t.x, t.y, t.z)
                            })
                            .collect();
                        let palm_position = Vector3::new(p.x, p.y, p.z);
                        let mut fingertips = [palm_position; 5];
                        for (slot, tip) in fingertips.iter_mut().zip(tips) { *slot = tip; }
                        HandPose {
                            side,
                            palm_position,
                            palm_orientation: palm_basis(
                                Vector3::new(n.x, n.y, n.z),
                                Vector3::new(d.x, d.y, d.z),
                            ),
                            fingertips,
                            confidence: 1.0,
                        }
                    })
                    .collect();

                let ts = start.elapsed().as_micros() as i64;
                let fps = meter.sample(ts);
                let frame = Frame::new(next_id, ts, fps, hands);
                next_id += 1;
                if tx.send(frame).is_err() {
                    debug!("frame receiver dropped; stopping LeapC producer");
                    return;
                }
            }
        }
    }
}

/// Orientation whose Y axis is opposite the palm normal and whose Z axis is
/// opposite the finger direction (the LeapMotion hand basis).
#[cfg_attr(not(feature = "leap"), allow(dead_code))]
fn palm_basis(normal: Vector3<f32>, direction: Vector3<f32>) -> UnitQuaternion<f32> {
    use nalgebra::{Matrix3, Rotation3};

    let (Some(y), Some(z)) = ((-normal).try_normalize(1e-6), (-direction).try_normalize(1e-6)) else {
        return UnitQuaternion::identity();
    };
    let Some(x) = y.cross(&z).try_normalize(1e-6) else {
        return UnitQuaternion::identity();
    };
    // Re-derive z so the basis is exactly orthogonal.
    let z = x.cross(&y);
    let basis = Matrix3::from_columns(&[x, y, z]);
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(basis))
}

// ════════════════════════════════════════════════════════════════════════════
// SimFrameProducer — keyboard simulation (always available)
// ════════════════════════════════════════════════════════════════════════════

/// Raw input event from the simulation window.
#[derive(Clone, Debug, PartialEq)]
pub enum SimInput {
    KeyDown(SimKey),
    KeyUp(SimKey),
    /// Stop the simulator thread.
    Shutdown,
}

/// Simulated controls (mapped from minifb keys by the renderer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SimKey {
    MoveLeft,       // ←
    MoveRight,      // →
    MoveUp,         // ↑
    MoveDown,       // ↓
    MoveAway,       // PgUp
    MoveToward,     // PgDn
    YawLeft,        // J
    YawRight,       // L
    PitchUp,        // I
    PitchDown,      // K
    RollLeft,       // U
    RollRight,      // O
    Spread,         // =
    Pinch,          // -
    ToggleTracking, // H
}

/// Per-frame step sizes for the simulator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimConfig {
    pub move_mm:        f32,
    pub turn_rad:       f32,
    /// Multiplicative hand-spread change per frame.
    pub spread_step:    f32,
    pub frame_interval: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            move_mm:        3.0,
            turn_rad:       0.03,
            spread_step:    1.02,
            frame_interval: Duration::from_millis(16),
        }
    }
}

/// Two virtual hands held symmetrically about a centre point.
///
/// Moving shifts the centre; turning rotates both palms about the centre;
/// spreading changes their separation.  Each control therefore shows up on
/// exactly one channel of the frame comparison.
#[derive(Clone, Debug)]
pub struct SimHands {
    centre:      Vector3<f32>,
    orientation: UnitQuaternion<f32>,
    half_width:  f32,
    tracking:    bool,
    held:        HashSet<SimKey>,
}

impl Default for SimHands {
    fn default() -> Self {
        SimHands {
            centre:      Vector3::new(0.0, 200.0, 0.0),
            orientation: UnitQuaternion::identity(),
            half_width:  90.0,
            tracking:    true,
            held:        HashSet::new(),
        }
    }
}

impl SimHands {
    const MIN_HALF_WIDTH: f32 = 10.0;
    const MAX_HALF_WIDTH: f32 = 400.0;

    pub fn apply(&mut self, input: &SimInput) {
        match input {
            SimInput::KeyDown(SimKey::ToggleTracking) => {
                self.tracking = !self.tracking;
                if self.tracking {
                    warn!("simulated tracking regained");
                } else {
                    warn!("simulated tracking lost");
                }
            }
            SimInput::KeyDown(k) => { self.held.insert(*k); }
            SimInput::KeyUp(k)   => { self.held.remove(k); }
            SimInput::Shutdown   => {}
        }
    }

    pub fn is_tracking(&self) -> bool { self.tracking }

    /// Advance one frame according to the currently held keys.
    pub fn step(&mut self, cfg: &SimConfig) {
        let axis = |neg: SimKey, pos: SimKey| {
            (self.held.contains(&pos) as i8 - self.held.contains(&neg) as i8) as f32
        };

        let movement = Vector3::new(
            axis(SimKey::MoveLeft, SimKey::MoveRight),
            axis(SimKey::MoveDown, SimKey::MoveUp),
            axis(SimKey::MoveAway, SimKey::MoveToward),
        ) * cfg.move_mm;

        let turn = Vector3::new(
            axis(SimKey::PitchDown, SimKey::PitchUp),
            axis(SimKey::YawRight,  SimKey::YawLeft),
            axis(SimKey::RollRight, SimKey::RollLeft),
        ) * cfg.turn_rad;

        let spread = axis(SimKey::Pinch, SimKey::Spread);

        self.centre += movement;
        self.orientation = UnitQuaternion::from_scaled_axis(turn) * self.orientation;
        if spread != 0.0 {
            self.half_width = (self.half_width * cfg.spread_step.powf(spread))
                .clamp(Self::MIN_HALF_WIDTH, Self::MAX_HALF_WIDTH);
        }
    }

    /// Poses for the current state, or none while tracking is lost.
    pub fn hands(&self) -> Vec<HandPose> {
        if !self.tracking {
            return Vec::new();
        }
        [(HandSide::Left, -1.0_f32), (HandSide::Right, 1.0)]
            .into_iter()
            .map(|(side, sign)| {
                let flat = HandPose::open(side, Vector3::new(sign * self.half_width, 0.0, 0.0), 70.0);
                let placed = flat.transformed(&self.orientation, &Vector3::zeros());
                // `transformed` spins about the palm; also swing the palm about the centre.
                let swing = self.orientation * flat.palm_position - flat.palm_position;
                placed.transformed(&UnitQuaternion::identity(), &(self.centre + swing))
            })
            .collect()
    }
}

/// Frame producer driven by [`SimInput`] events (from the renderer's window).
pub struct SimFrameProducer {
    rx:     Receiver<SimInput>,
    config: SimConfig,
    hands:  SimHands,
    stop:   StopSignal,
}

impl SimFrameProducer {
    pub fn new(rx: Receiver<SimInput>, config: SimConfig) -> Self {
        SimFrameProducer { rx, config, hands: SimHands::default(), stop: StopSignal::new() }
    }

    /// Also stop when `stop` is raised, without waiting for [`SimInput::Shutdown`].
    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }
}

impl FrameProducer for SimFrameProducer {
    fn run(mut self: Box<Self>, tx: Sender<Frame>) {
        let start = Instant::now();
        let mut meter = FpsMeter::new();
        let mut next_id = 1u64;
        let mut last_emit = Instant::now();
        debug!("simulated frame producer started");

        loop {
            if self.stop.is_stopped() { break; }
            let wait = self.config.frame_interval.saturating_sub(last_emit.elapsed());
            match self.rx.recv_timeout(wait) {
                Ok(SimInput::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(input) => self.hands.apply(&input),
                Err(RecvTimeoutError::Timeout) => {}
            }

            if last_emit.elapsed() < self.config.frame_interval {
                continue;
            }
            last_emit = Instant::now();

            self.hands.step(&self.config);
            let ts = start.elapsed().as_micros() as i64;
            let fps = meter.sample(ts);
            let frame = Frame::new(next_id, ts, fps, self.hands.hands());
            next_id += 1;
            if tx.send(frame).is_err() { break; }
        }
        debug!("simulated frame producer stopped");
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use motion_accum::{FrameSource, HandMotion};

    fn frame_after(hands: &mut SimHands, keys: &[SimKey], id: u64) -> Frame {
        for k in keys { hands.apply(&SimInput::KeyDown(*k)); }
        hands.step(&SimConfig::default());
        for k in keys { hands.apply(&SimInput::KeyUp(*k)); }
        Frame::new(id, id as i64 * 16_000, 60.0, hands.hands())
    }

    #[test]
    fn fps_meter_converges() {
        let mut m = FpsMeter::new();
        for i in 0..200 { m.sample(i * 10_000); }
        assert_relative_eq!(m.fps(), 100.0, epsilon = 0.01);
    }

    #[test]
    fn fps_meter_ignores_repeated_timestamp() {
        let mut m = FpsMeter::new();
        m.sample(0);
        let f = m.sample(20_000);
        assert_eq!(m.sample(20_000), f);
    }

    #[test]
    fn sim_move_is_pure_translation() {
        let src = HandMotion::default();
        let mut hands = SimHands::default();
        let a = Frame::new(1, 0, 60.0, hands.hands());
        let b = frame_after(&mut hands, &[SimKey::MoveRight], 2);
        let d = src.delta(&a, &b);
        assert_relative_eq!(d.translation, Vector3::new(3.0, 0.0, 0.0), epsilon = 1e-3);
        assert!(d.translation_probability > 0.9);
        assert!(d.rotation_probability < 0.1);
        assert!(d.scale_probability < 0.1);
    }

    #[test]
    fn sim_turn_is_pure_rotation() {
        let src = HandMotion::default();
        let mut hands = SimHands::default();
        let a = Frame::new(1, 0, 60.0, hands.hands());
        let b = frame_after(&mut hands, &[SimKey::YawLeft], 2);
        let d = src.delta(&a, &b);
        assert_relative_eq!(d.translation, Vector3::zeros(), epsilon = 1e-3);
        assert!(d.rotation_probability > 0.9);
    }

    #[test]
    fn sim_spread_is_pure_scale() {
        let src = HandMotion::default();
        let mut hands = SimHands::default();
        let a = Frame::new(1, 0, 60.0, hands.hands());
        let b = frame_after(&mut hands, &[SimKey::Spread], 2);
        let d = src.delta(&a, &b);
        assert_relative_eq!(d.scale_factor, 1.02, epsilon = 1e-4);
        assert!(d.scale_probability > 0.9);
    }

    #[test]
    fn toggled_tracking_empties_frames() {
        let mut hands = SimHands::default();
        assert_eq!(hands.hands().len(), 2);
        hands.apply(&SimInput::KeyDown(SimKey::ToggleTracking));
        assert!(!hands.is_tracking());
        assert!(hands.hands().is_empty());
        hands.apply(&SimInput::KeyDown(SimKey::ToggleTracking));
        assert_eq!(hands.hands().len(), 2);
    }

    #[test]
    fn spread_is_clamped() {
        let mut hands = SimHands::default();
        hands.apply(&SimInput::KeyDown(SimKey::Pinch));
        for _ in 0..1000 { hands.step(&SimConfig::default()); }
        let l = hands.hands()[0].palm_position;
        let r = hands.hands()[1].palm_position;
        assert_relative_eq!((r - l).norm(), 2.0 * SimHands::MIN_HALF_WIDTH, epsilon = 1e-3);
    }

    #[test]
    fn palm_basis_of_flat_hand_is_identity() {
        // Flat hand over the sensor: palm faces down, fingers point away (-Z).
        let q = palm_basis(Vector3::new(0.0, -1.0, 0.0), Vector3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(q.angle(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn palm_basis_degenerate_falls_back() {
        let q = palm_basis(Vector3::zeros(), Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(q, UnitQuaternion::identity());
    }

    #[test]
    fn sim_producer_emits_frames_and_stops() {
        let (sim_tx, sim_rx) = mpsc::channel();
        let frames = spawn_frame_producer(SimFrameProducer::new(sim_rx, SimConfig {
            frame_interval: Duration::from_millis(2),
            ..SimConfig::default()
        }));
        let first  = frames.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = frames.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(second.id > first.id);
        assert_eq!(first.hands.len(), 2);
        sim_tx.send(SimInput::Shutdown).unwrap();
        // Drain until the producer hangs up.
        while frames.recv_timeout(Duration::from_secs(2)).is_ok() {}
    }

    #[test]
    fn stop_signal_ends_idle_producer() {
        // The input sender stays alive and no Shutdown is sent.
        let (_sim_tx, sim_rx) = mpsc::channel::<SimInput>();
        let stop = StopSignal::new();
        let frames = spawn_frame_producer(
            SimFrameProducer::new(sim_rx, SimConfig {
                frame_interval: Duration::from_millis(2),
                ..SimConfig::default()
            })
            .with_stop(stop.clone()),
        );
        frames.recv_timeout(Duration::from_secs(2)).unwrap();
        stop.stop();
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match frames.recv_timeout(Duration::from_millis(100)) {
                Ok(_) => {}
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
            assert!(Instant::now() < deadline, "producer ignored the stop signal");
        }
    }

    #[test]
    fn stop_signal_is_shared_between_clones() {
        let stop = StopSignal::new();
        let seen = stop.clone();
        assert!(!seen.is_stopped());
        stop.stop();
        assert!(seen.is_stopped());
    }
}

//! Software-rendered presenter using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ FPS         : 59.9                                           │
//! │ Translation : (…)          ┌────────┐                        │
//! │ Rotation    : [(…)]        │  cube  │                        │
//! │ Scale       : 1.000        └────────┘                        │
//! │                                                              │
//! │ key legend                                                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::sync::mpsc::Sender;

use minifb::{Key, KeyRepeat, Window, WindowOptions};
use nalgebra::{Matrix4, Point3};

use crate::camera::Camera;
use crate::canvas::{text_extent, Canvas, ScreenVertex};
use crate::error::AppError;
use crate::source::{SimInput, SimKey};

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_X:       isize = 50;
pub const WIN_Y:       isize = 50;
pub const WIN_W:       usize = 1280;
pub const WIN_H:       usize = 700;
const BG_COLOR:        u32   = 0xFF000000;
const TEXT_COLOR:      u32   = 0xFFFFFFFF;
const LEGEND_COLOR:    u32   = 0xFF888888;
const OVERLAY_ALPHA:   f32   = 0.5;
const TEXT_SCALE:      usize = 3;
const PAD:             usize = 8;

/// Half the cube's edge length, in sensor millimetres.
pub const CUBE_HALF: f32 = 50.0;

// ════════════════════════════════════════════════════════════════════════════
// Colour cube geometry
// ════════════════════════════════════════════════════════════════════════════

/// Corner `i` has bit 0 → +X, bit 1 → +Y, bit 2 → +Z.  Its colour is the same
/// bits read as RGB, so the cube shades from black at (-,-,-) to white at
/// (+,+,+).
fn corner(i: usize) -> ([f32; 3], [f32; 3]) {
    let bit = |b: usize| if i & (1 << b) != 0 { 1.0 } else { 0.0 };
    let pos = [
        (bit(0) * 2.0 - 1.0) * CUBE_HALF,
        (bit(1) * 2.0 - 1.0) * CUBE_HALF,
        (bit(2) * 2.0 - 1.0) * CUBE_HALF,
    ];
    (pos, [bit(0), bit(1), bit(2)])
}

/// Faces as corner indices, counter-clockwise seen from outside.
const FACES: [[usize; 4]; 6] = [
    [1, 3, 7, 5], // +X
    [0, 4, 6, 2], // -X
    [2, 6, 7, 3], // +Y
    [0, 1, 5, 4], // -Y
    [4, 5, 7, 6], // +Z
    [0, 2, 3, 1], // -Z
];

/// Project the cube under `model` and return the visible faces, farthest
/// first, ready to be painted in order.
pub fn visible_faces(model: &Matrix4<f32>, camera: &Camera) -> Vec<[ScreenVertex; 4]> {
    let mut projected: Vec<Option<(ScreenVertex, f32)>> = Vec::with_capacity(8);
    for i in 0..8 {
        let (p, color) = corner(i);
        let world = model.transform_point(&Point3::new(p[0], p[1], p[2]));
        projected.push(camera.project(&world).map(|(x, y, depth)| (ScreenVertex { x, y, color }, depth)));
    }

    let mut faces: Vec<(f32, [ScreenVertex; 4])> = FACES.iter()
        .filter_map(|face| {
            let mut quad = [ScreenVertex { x: 0.0, y: 0.0, color: [0.0; 3] }; 4];
            let mut depth = 0.0;
            for (slot, &idx) in quad.iter_mut().zip(face) {
                let (v, d) = projected[idx]?;
                *slot = v;
                depth += d;
            }
            // Screen y points down, so a front face winds clockwise on screen.
            if signed_area(&quad) >= 0.0 { return None; }
            Some((depth / 4.0, quad))
        })
        .collect();

    faces.sort_by(|a, b| b.0.total_cmp(&a.0));
    faces.into_iter().map(|(_, q)| q).collect()
}

/// Shoelace area in screen space; positive for counter-clockwise on screen.
fn signed_area(quad: &[ScreenVertex; 4]) -> f32 {
    let mut sum = 0.0;
    for i in 0..4 {
        let (a, b) = (quad[i], quad[(i + 1) % 4]);
        sum += a.x * b.y - b.x * a.y;
    }
    -0.5 * sum
}

// ════════════════════════════════════════════════════════════════════════════
// Renderer
// ════════════════════════════════════════════════════════════════════════════

/// What the user asked for this tick, beyond simulator motion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowInput {
    pub quit:  bool,
    pub reset: bool,
}

pub struct Renderer {
    window: Window,
    canvas: Canvas,
    sim_tx: Sender<SimInput>,
}

impl Renderer {
    pub fn new(sim_tx: Sender<SimInput>) -> Result<Self, AppError> {
        let mut window = Window::new(
            "Leap Cube — hand motion accumulator",
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        window.set_position(WIN_X, WIN_Y);
        window.limit_update_rate(Some(std::time::Duration::from_millis(16))); // ~60fps

        Ok(Renderer {
            window,
            canvas: Canvas::new(WIN_W, WIN_H, BG_COLOR),
            sim_tx,
        })
    }

    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Forward simulator keys and report quit / reset requests.
    pub fn poll_input(&mut self) -> WindowInput {
        let mut input = WindowInput::default();
        if !self.window.is_open() {
            input.quit = true;
            return input;
        }

        for key in self.window.get_keys_pressed(KeyRepeat::No) {
            match key {
                Key::Q | Key::Escape => input.quit = true,
                Key::R               => input.reset = true,
                k => if let Some(sk) = sim_key(k) {
                    let _ = self.sim_tx.send(SimInput::KeyDown(sk));
                },
            }
        }
        for key in self.window.get_keys_released() {
            if let Some(sk) = sim_key(key) {
                let _ = self.sim_tx.send(SimInput::KeyUp(sk));
            }
        }
        input
    }

    /// Render one frame: the cube under `model`, then the overlay text.
    pub fn render(&mut self, model: &Matrix4<f32>, camera: &Camera, overlay: &str) {
        self.canvas.clear(BG_COLOR);

        // ── Cube ──────────────────────────────────────────────────────────
        for [a, b, c, d] in visible_faces(model, camera) {
            self.canvas.fill_triangle(a, b, c);
            self.canvas.fill_triangle(a, c, d);
        }

        // ── Telemetry overlay ─────────────────────────────────────────────
        let (w, h) = text_extent(overlay, TEXT_SCALE);
        self.canvas.blend_rect(0, 0, w + 2 * PAD, h + 2 * PAD, BG_COLOR, OVERLAY_ALPHA);
        self.canvas.draw_text(overlay, PAD, PAD, TEXT_SCALE, TEXT_COLOR);

        // ── Key legend ────────────────────────────────────────────────────
        self.canvas.draw_text(
            "arrows/pgup/pgdn=move  j/l i/k u/o=turn  =/-=spread  h=tracking  r=reset  q=quit",
            PAD, WIN_H - 20, 2, LEGEND_COLOR,
        );

        self.window.update_with_buffer(&self.canvas.buf, WIN_W, WIN_H).ok();
    }

    /// Tell the simulator thread to stop.
    pub fn shutdown(&self) {
        let _ = self.sim_tx.send(SimInput::Shutdown);
    }
}

fn sim_key(key: Key) -> Option<SimKey> {
    Some(match key {
        Key::Left     => SimKey::MoveLeft,
        Key::Right    => SimKey::MoveRight,
        Key::Up       => SimKey::MoveUp,
        Key::Down     => SimKey::MoveDown,
        Key::PageUp   => SimKey::MoveAway,
        Key::PageDown => SimKey::MoveToward,
        Key::J        => SimKey::YawLeft,
        Key::L        => SimKey::YawRight,
        Key::I        => SimKey::PitchUp,
        Key::K        => SimKey::PitchDown,
        Key::U        => SimKey::RollLeft,
        Key::O        => SimKey::RollRight,
        Key::Equal    => SimKey::Spread,
        Key::Minus    => SimKey::Pinch,
        Key::H        => SimKey::ToggleTracking,
        _             => return None,
    })
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

//! Fixed perspective camera looking at the sensor origin.

use nalgebra::{Matrix4, Perspective3, Point3, Vector3};

#[derive(Clone, Debug)]
pub struct Camera {
    pub eye:    Point3<f32>,
    pub target: Point3<f32>,
    /// Vertical field of view, degrees.
    pub fov_y:  f32,
    pub near:   f32,
    pub far:    f32,
    width:      usize,
    height:     usize,
}

impl Camera {
    /// Eye 500 mm in front of the origin, 45° FOV, clip planes 5–3000.
    pub fn fixed(width: usize, height: usize) -> Self {
        Camera {
            eye:    Point3::new(0.0, 0.0, 500.0),
            target: Point3::origin(),
            fov_y:  45.0,
            near:   5.0,
            far:    3000.0,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f32 { self.width as f32 / self.height.max(1) as f32 }

    pub fn view(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.eye, &self.target, &Vector3::y())
    }

    pub fn projection(&self) -> Matrix4<f32> {
        Perspective3::new(self.aspect(), self.fov_y.to_radians(), self.near, self.far).to_homogeneous()
    }

    pub fn view_projection(&self) -> Matrix4<f32> { self.projection() * self.view() }

    /// World point → `(x, y, depth)` in pixels, depth in NDC (-1 near, 1 far).
    /// `None` when the point is behind the near plane.
    pub fn project(&self, world: &Point3<f32>) -> Option<(f32, f32, f32)> {
        let clip = self.view_projection() * world.to_homogeneous();
        if clip.w < self.near { return None; }
        let ndc = clip.xyz() / clip.w;
        let x = (ndc.x + 1.0) * 0.5 * self.width as f32;
        let y = (1.0 - ndc.y) * 0.5 * self.height as f32;
        Some((x, y, ndc.z))
    }
}

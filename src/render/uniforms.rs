//! Per-frame shader uniforms.
//!
//! The viewer uses a fixed camera: a 90° perspective looking down -Z at a
//! mesh pushed two units away.

use glam::{Mat3, Mat4, Vec3};

pub const FIELD_OF_VIEW_DEGREES: f32 = 90.0;
pub const Z_NEAR: f32 = 0.1;
pub const Z_FAR: f32 = 10.0;
pub const CAMERA_DISTANCE: f32 = 2.0;

/// Uniform names the demo shaders declare.
pub const PROJECTION_UNIFORM: &str = "uPMatrix";
pub const MODEL_VIEW_UNIFORM: &str = "uMVMatrix";
pub const NORMAL_MATRIX_UNIFORM: &str = "uNMatrix";
pub const TIME_UNIFORM: &str = "uTime";

/// Drawable area in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height; 1.0 for a degenerate viewport.
    pub fn aspect(&self) -> f32 {
        if self.width == 0 || self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneUniforms {
    pub projection: Mat4,
    pub model_view: Mat4,
    /// Inverse transpose of the model-view's upper 3x3.
    pub normal_matrix: Mat3,
    /// Seconds since the render context started.
    pub time: f32,
}

impl SceneUniforms {
    pub fn new(viewport: Viewport, time: f32) -> Self {
        let projection = Mat4::perspective_rh_gl(
            FIELD_OF_VIEW_DEGREES.to_radians(),
            viewport.aspect(),
            Z_NEAR,
            Z_FAR,
        );
        let model_view = Mat4::from_translation(Vec3::new(0.0, 0.0, -CAMERA_DISTANCE));
        let normal_matrix = Mat3::from_mat4(model_view).inverse().transpose();

        Self {
            projection,
            model_view,
            normal_matrix,
            time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn fixed_camera() {
        let u = SceneUniforms::new(Viewport::new(800, 600), 1.5);
        assert_eq!(u.time, 1.5);
        assert_eq!(u.normal_matrix, Mat3::IDENTITY);
        assert_eq!(
            u.model_view.transform_point3(Vec3::ZERO),
            Vec3::new(0.0, 0.0, -CAMERA_DISTANCE)
        );

        // A point on the near plane maps to NDC z = -1.
        let clip = u.projection * Vec4::new(0.0, 0.0, -Z_NEAR, 1.0);
        assert!((clip.z / clip.w + 1.0).abs() < 1e-5);
    }

    #[test]
    fn aspect_ratio() {
        assert_eq!(Viewport::new(800, 400).aspect(), 2.0);
        assert_eq!(Viewport::new(0, 400).aspect(), 1.0);

        // With a 90° field of view the vertical focal length is 1.
        let u = SceneUniforms::new(Viewport::new(200, 100), 0.0);
        assert!((u.projection.y_axis.y - 1.0).abs() < 1e-5);
        assert!((u.projection.x_axis.x - 0.5).abs() < 1e-5);
    }
}

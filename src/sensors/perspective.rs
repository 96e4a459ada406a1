// Copyright @yucwang 2026

use crate::core::sensor::Sensor;
use crate::math::bitmap::Bitmap;
use crate::math::constants::{Float, Vector2f, Vector3f, FLOAT_MAX};
use crate::math::ray::Ray3f;

use std::sync::Mutex;

struct PixelSplat {
    sum: Vector3f,
    count: u32,
}

/// Pinhole camera with a per-pixel accumulation buffer.
pub struct PerspectiveCamera {
    origin: Vector3f,
    forward: Vector3f,
    right: Vector3f,
    up: Vector3f,
    tan_half_fov_y: Float,
    aspect: Float,
    width: usize,
    height: usize,
    splats: Mutex<Vec<PixelSplat>>,
}

impl PerspectiveCamera {
    pub fn new(
        origin: Vector3f,
        target: Vector3f,
        up: Vector3f,
        fov_y_radians: Float,
        width: usize,
        height: usize,
    ) -> Self {
        let forward = (target - origin).normalize();
        let right = forward.cross(&up).normalize();
        let up = right.cross(&forward).normalize();

        let mut splats = Vec::with_capacity(width * height);
        for _ in 0..width * height {
            splats.push(PixelSplat { sum: Vector3f::zeros(), count: 0 });
        }

        Self {
            origin,
            forward,
            right,
            up,
            tan_half_fov_y: (0.5 * fov_y_radians).tan(),
            aspect: width as Float / height as Float,
            width,
            height,
            splats: Mutex::new(splats),
        }
    }
}

impl Sensor for PerspectiveCamera {
    fn sample_ray(&self, uv: &Vector2f) -> Ray3f {
        let px = (2.0 * uv.x - 1.0) * self.aspect * self.tan_half_fov_y;
        let py = (1.0 - 2.0 * uv.y) * self.tan_half_fov_y;

        let dir = (self.right * px + self.up * py + self.forward).normalize();
        Ray3f::new(self.origin, dir, Some(0.0), Some(FLOAT_MAX))
    }

    fn resolution(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn add_samples(&self, x: usize, y: usize, c: &Vector3f, sample_count: u32) {
        let mut splats = self.splats.lock().unwrap();
        let splat = &mut splats[x + y * self.width];
        splat.sum += *c;
        splat.count += sample_count;
    }

    fn image(&self) -> Bitmap {
        let splats = self.splats.lock().unwrap();
        let mut bitmap = Bitmap::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let splat = &splats[x + y * self.width];
                if splat.count > 0 {
                    bitmap[(x, y)] = splat.sum / splat.count as Float;
                }
            }
        }
        bitmap
    }

    fn clear_samples(&self) {
        let mut splats = self.splats.lock().unwrap();
        for splat in splats.iter_mut() {
            splat.sum = Vector3f::zeros();
            splat.count = 0;
        }
    }
}

/* Tests for PerspectiveCamera */

// Copyright @yucwang 2026

use crate::math::bitmap::Bitmap;
use crate::math::constants::Vector2f;
use crate::math::ray::Ray3f;

/// Camera contract. `add_samples` is called concurrently by render workers
/// and must be safe under shared access; accumulation is per pixel so the
/// final value does not depend on tile execution order.
pub trait Sensor: Send + Sync {
    /// Primary ray through the image-plane point `uv` in [0, 1)^2.
    fn sample_ray(&self, uv: &Vector2f) -> Ray3f;

    fn resolution(&self) -> (usize, usize);

    /// Splats the sum `c` of `sample_count` radiance samples onto a pixel.
    fn add_samples(&self, x: usize, y: usize, c: &crate::math::constants::Vector3f, sample_count: u32);

    /// Current estimate: per-pixel sample mean.
    fn image(&self) -> Bitmap;

    /// Drops all accumulated samples.
    fn clear_samples(&self);
}

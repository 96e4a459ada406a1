// Copyright @yucwang 2026

use crate::core::bsdf::Bsdf;
use crate::math::constants::{Float, Vector2f, Vector3f};
use std::sync::Arc;

/// Raw hit data recorded during traversal, before shading information is
/// resolved. The geometric normal is intentionally left unnormalized.
#[derive(Debug, Clone, Copy)]
pub struct IntersectionTemporary {
    pub ng: Vector3f,
    pub u: Float,
    pub v: Float,
    pub primitive: usize,
    pub triangle: u32,
    pub back_side: bool,
}

impl Default for IntersectionTemporary {
    fn default() -> Self {
        Self {
            ng: Vector3f::zeros(),
            u: 0.0,
            v: 0.0,
            primitive: 0,
            triangle: 0,
            back_side: false,
        }
    }
}

/// Shading-ready intersection data.
#[derive(Clone)]
pub struct IntersectionInfo {
    pub p: Vector3f,
    /// Normalized geometric normal.
    pub ng: Vector3f,
    /// Shading normal (smoothed when the mesh requests it).
    pub ns: Vector3f,
    pub uv: Vector2f,
    pub t: Float,
    pub primitive: usize,
    pub bsdf: Arc<dyn Bsdf>,
}

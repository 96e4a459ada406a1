// Copyright @yucwang 2026

use crate::math::constants::{Float, Vector2f};
use crate::math::spectrum::RGBSpectrum;

/// Jacobian applied when building a texture's importance distribution:
/// planar for flat mappings, spherical when the texture wraps a sphere and
/// rows compress by sin(theta).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureMapJacobian {
    Planar = 0,
    Spherical = 1,
}

pub const JACOBIAN_COUNT: usize = 2;

pub trait Texture: Send + Sync {
    fn eval(&self, uv: Vector2f) -> RGBSpectrum;

    /// (d/du, d/dv) of the scalar projection of the texture.
    fn derivatives(&self, _uv: Vector2f) -> Vector2f {
        Vector2f::zeros()
    }

    fn minimum(&self) -> RGBSpectrum;
    fn maximum(&self) -> RGBSpectrum;
    fn average(&self) -> RGBSpectrum;

    /// Builds the importance distribution for `jacobian`; idempotent.
    fn make_samplable(&mut self, _jacobian: TextureMapJacobian) {}

    fn is_samplable(&self, _jacobian: TextureMapJacobian) -> bool {
        false
    }

    /// Warps a uniform uv sample toward bright texels. Callers must only
    /// rely on the density being the one reported by `pdf`.
    fn sample(&self, _jacobian: TextureMapJacobian, uv: Vector2f) -> Vector2f {
        uv
    }

    /// Density on the unit uv square.
    fn pdf(&self, _jacobian: TextureMapJacobian, _uv: Vector2f) -> Float {
        1.0
    }
}

// Copyright @yucwang 2026

use super::constants::{Float, Vector2f, Vector3f, INV_PI, PI};

pub fn sample_uniform_sphere(u: &Vector2f) -> Vector3f {
    let z = 1.0 - 2.0 * u.x;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * u.y;

    Vector3f::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn sample_uniform_sphere_pdf() -> Float {
    INV_PI * 0.25
}

pub fn sample_uniform_disk_concentric(u: &Vector2f) -> Vector2f {
    let r1 = 2.0 * u.x - 1.0;
    let r2 = 2.0 * u.y - 1.0;

    let phi: Float;
    let r: Float;

    if r1 == 0.0 && r2 == 0.0 {
        r = 0.0;
        phi = 0.0;
    } else if r1 * r1 > r2 * r2 {
        r = r1;
        phi = (PI / 4.0) * (r2 / r1);
    } else {
        r = r2;
        phi = (PI / 2.0) - (r1 / r2) * (PI / 4.0);
    }

    let (sin_phi, cos_phi) = phi.sin_cos();

    Vector2f::new(r * cos_phi, r * sin_phi)
}

pub fn sample_cosine_hemisphere(u: &Vector2f) -> Vector3f {
    let p = sample_uniform_disk_concentric(u);
    let z = (1.0 - p.x * p.x - p.y * p.y).max(0.0).sqrt();

    Vector3f::new(p.x, p.y, z)
}

pub fn sample_cosine_hemisphere_pdf(cos_theta: Float) -> Float {
    cos_theta * INV_PI
}

/// Uniform point on a triangle from a 2D sample.
pub fn sample_uniform_triangle(u: &Vector2f, p0: &Vector3f, p1: &Vector3f, p2: &Vector3f) -> Vector3f {
    let mut a = u.x;
    let mut b = u.y;
    if a + b > 1.0 {
        a = 1.0 - a;
        b = 1.0 - b;
    }

    p0 + (p1 - p0) * a + (p2 - p0) * b
}

pub fn triangle_area(p0: &Vector3f, p1: &Vector3f, p2: &Vector3f) -> Float {
    0.5 * (p1 - p0).cross(&(p2 - p0)).norm()
}

/* Tests for sample warps */

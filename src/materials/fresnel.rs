// Copyright @yucwang 2026

use crate::math::constants::Float;

/// Unpolarized Fresnel reflectance for a dielectric boundary. `eta` is the
/// ratio of the incident medium's index over the transmitted one; a
/// negative `cos_theta_i` flips the interface.
pub fn dielectric_reflectance(eta: Float, cos_theta_i: Float) -> Float {
    dielectric_reflectance_t(eta, cos_theta_i).0
}

/// Same, also returning cos of the transmitted angle (0 under total
/// internal reflection).
pub fn dielectric_reflectance_t(mut eta: Float, mut cos_theta_i: Float) -> (Float, Float) {
    if cos_theta_i < 0.0 {
        eta = 1.0 / eta;
        cos_theta_i = -cos_theta_i;
    }

    let sin_theta_t_sq = eta * eta * (1.0 - cos_theta_i * cos_theta_i);
    if sin_theta_t_sq > 1.0 {
        return (1.0, 0.0);
    }
    let cos_theta_t = (1.0 - sin_theta_t_sq).max(0.0).sqrt();

    let rs = (eta * cos_theta_i - cos_theta_t) / (eta * cos_theta_i + cos_theta_t);
    let rp = (eta * cos_theta_t - cos_theta_i) / (eta * cos_theta_t + cos_theta_i);

    ((rs * rs + rp * rp) * 0.5, cos_theta_t)
}

/// Hemispherical integral of the Fresnel reflectance against a cosine
/// distribution, by trapezoidal quadrature over cos^2.
pub fn compute_diffuse_fresnel(ior: Float, sample_count: u32) -> Float {
    let mut diffuse_fresnel = 0.0f64;
    let mut fb = dielectric_reflectance(ior, 0.0);
    for i in 1..=sample_count {
        let cos_theta_sq = i as Float / sample_count as Float;
        let fa = dielectric_reflectance(ior, cos_theta_sq.sqrt().min(1.0));
        diffuse_fresnel += (fa + fb) as f64 * (0.5 / sample_count as f64);
        fb = fa;
    }

    diffuse_fresnel as Float
}

/* Tests for Fresnel terms */

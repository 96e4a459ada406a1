// Copyright @yucwang 2026

use crate::core::bsdf::{Bsdf, BsdfLobes, SurfaceScatterEvent};
use crate::core::intersection::IntersectionInfo;
use crate::core::texture::Texture;
use crate::materials::fresnel;
use crate::math::constants::{Float, Vector3f, INV_PI};
use crate::math::spectrum::RGBSpectrum;
use crate::math::warp::{sample_cosine_hemisphere, sample_cosine_hemisphere_pdf};
use crate::sampling::sample_generator::SampleGenerator;

const DIFFUSE_FRESNEL_SAMPLES: u32 = 1_000_000;

/// Smooth plastic: a specular dielectric coat over a Lambertian substrate,
/// with optional absorption in the coating layer.
pub struct PlasticBsdf {
    albedo: Box<dyn Texture>,
    ior: Float,
    thickness: Float,
    sigma_a: RGBSpectrum,
    scaled_sigma_a: RGBSpectrum,
    avg_transmittance: Float,
    diffuse_fresnel: Float,
}

impl PlasticBsdf {
    pub fn new(albedo: Box<dyn Texture>, ior: Float, thickness: Float, sigma_a: RGBSpectrum) -> Self {
        let scaled_sigma_a = sigma_a * thickness;
        let avg_transmittance = (-2.0 * scaled_sigma_a.avg()).exp();
        let diffuse_fresnel = fresnel::compute_diffuse_fresnel(ior, DIFFUSE_FRESNEL_SAMPLES);

        Self {
            albedo,
            ior,
            thickness,
            sigma_a,
            scaled_sigma_a,
            avg_transmittance,
            diffuse_fresnel,
        }
    }

    pub fn ior(&self) -> Float {
        self.ior
    }

    pub fn thickness(&self) -> Float {
        self.thickness
    }

    pub fn sigma_a(&self) -> RGBSpectrum {
        self.sigma_a
    }

    fn specular_probability(&self, fi: Float) -> Float {
        let substrate_weight = self.avg_transmittance * (1.0 - fi);
        fi / (fi + substrate_weight)
    }

    // Transmission through the coat, into and out of the substrate.
    fn substrate_attenuation(&self, wi_z: Float, wo_z: Float) -> RGBSpectrum {
        if self.scaled_sigma_a.max_component() > 0.0 {
            (self.scaled_sigma_a * (-1.0 / wo_z - 1.0 / wi_z)).exp()
        } else {
            RGBSpectrum::from_scalar(1.0)
        }
    }
}

impl Bsdf for PlasticBsdf {
    fn lobes(&self) -> BsdfLobes {
        BsdfLobes::SPECULAR_REFLECTION.union(BsdfLobes::DIFFUSE_REFLECTION)
    }

    fn albedo(&self, info: &IntersectionInfo) -> RGBSpectrum {
        self.albedo.eval(info.uv)
    }

    fn sample(&self, event: &mut SurfaceScatterEvent, sampler: &mut dyn SampleGenerator) -> bool {
        if event.wi.z <= 0.0 {
            return false;
        }

        let sample_r = event.requested_lobes.test(BsdfLobes::SPECULAR_REFLECTION);
        let sample_t = event.requested_lobes.test(BsdfLobes::DIFFUSE_REFLECTION);
        if !sample_r && !sample_t {
            return false;
        }

        let wi = event.wi;
        let eta = 1.0 / self.ior;
        let fi = fresnel::dielectric_reflectance(eta, wi.z);
        let specular_probability = self.specular_probability(fi);

        if sample_r && (sampler.next_1d() < specular_probability || !sample_t) {
            event.wo = Vector3f::new(-wi.x, -wi.y, wi.z);
            event.pdf = 0.0;
            event.throughput = if sample_t {
                RGBSpectrum::from_scalar(fi / specular_probability)
            } else {
                RGBSpectrum::from_scalar(fi)
            };
            event.sampled_lobe = BsdfLobes::SPECULAR_REFLECTION;
        } else {
            let wo = sample_cosine_hemisphere(&sampler.next_2d());
            let fo = fresnel::dielectric_reflectance(eta, wo.z);
            let diffuse_albedo = self.albedo(event.info);

            event.wo = wo;
            event.throughput = diffuse_albedo
                / (RGBSpectrum::from_scalar(1.0) - diffuse_albedo * self.diffuse_fresnel)
                * ((1.0 - fi) * (1.0 - fo) * eta * eta);
            event.throughput *= self.substrate_attenuation(wi.z, wo.z);

            event.pdf = sample_cosine_hemisphere_pdf(wo.z);
            if sample_r {
                event.pdf *= 1.0 - specular_probability;
                event.throughput /= 1.0 - specular_probability;
            }
            event.sampled_lobe = BsdfLobes::DIFFUSE_REFLECTION;
        }

        true
    }

    fn eval(&self, event: &SurfaceScatterEvent) -> RGBSpectrum {
        if !event.requested_lobes.test(BsdfLobes::DIFFUSE_REFLECTION) {
            return RGBSpectrum::default();
        }
        if event.wi.z <= 0.0 || event.wo.z <= 0.0 {
            return RGBSpectrum::default();
        }

        let eta = 1.0 / self.ior;
        let fi = fresnel::dielectric_reflectance(eta, event.wi.z);
        let fo = fresnel::dielectric_reflectance(eta, event.wo.z);
        let diffuse_albedo = self.albedo(event.info);

        let mut brdf = diffuse_albedo
            / (RGBSpectrum::from_scalar(1.0) - diffuse_albedo * self.diffuse_fresnel)
            * ((1.0 - fi) * (1.0 - fo) * eta * eta * event.wo.z * INV_PI);
        brdf *= self.substrate_attenuation(event.wi.z, event.wo.z);
        brdf
    }

    fn pdf(&self, event: &SurfaceScatterEvent) -> Float {
        if event.wi.z <= 0.0 || event.wo.z <= 0.0 {
            return 0.0;
        }

        let sample_r = event.requested_lobes.test(BsdfLobes::SPECULAR_REFLECTION);
        let sample_t = event.requested_lobes.test(BsdfLobes::DIFFUSE_REFLECTION);
        if !sample_t {
            return 0.0;
        }

        let mut pdf = sample_cosine_hemisphere_pdf(event.wo.z);
        if sample_r {
            let fi = fresnel::dielectric_reflectance(1.0 / self.ior, event.wi.z);
            pdf *= 1.0 - self.specular_probability(fi);
        }
        pdf
    }
}

/* Tests for PlasticBsdf */

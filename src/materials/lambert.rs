// Copyright @yucwang 2026

use crate::core::bsdf::{Bsdf, BsdfLobes, SurfaceScatterEvent};
use crate::core::intersection::IntersectionInfo;
use crate::core::texture::Texture;
use crate::math::constants::{Float, INV_PI};
use crate::math::spectrum::RGBSpectrum;
use crate::math::warp::{sample_cosine_hemisphere, sample_cosine_hemisphere_pdf};
use crate::sampling::sample_generator::SampleGenerator;

pub struct LambertBsdf {
    albedo: Box<dyn Texture>,
}

impl LambertBsdf {
    pub fn new(albedo: Box<dyn Texture>) -> Self {
        Self { albedo }
    }
}

impl Bsdf for LambertBsdf {
    fn lobes(&self) -> BsdfLobes {
        BsdfLobes::DIFFUSE_REFLECTION
    }

    fn albedo(&self, info: &IntersectionInfo) -> RGBSpectrum {
        self.albedo.eval(info.uv)
    }

    fn sample(&self, event: &mut SurfaceScatterEvent, sampler: &mut dyn SampleGenerator) -> bool {
        if !event.requested_lobes.test(BsdfLobes::DIFFUSE_REFLECTION) {
            return false;
        }
        if event.wi.z <= 0.0 {
            return false;
        }

        event.wo = sample_cosine_hemisphere(&sampler.next_2d());
        event.pdf = sample_cosine_hemisphere_pdf(event.wo.z);
        // f * cos / pdf collapses to the albedo under cosine sampling.
        event.throughput = self.albedo(event.info);
        event.sampled_lobe = BsdfLobes::DIFFUSE_REFLECTION;
        true
    }

    fn eval(&self, event: &SurfaceScatterEvent) -> RGBSpectrum {
        if !event.requested_lobes.test(BsdfLobes::DIFFUSE_REFLECTION) {
            return RGBSpectrum::default();
        }
        if event.wi.z <= 0.0 || event.wo.z <= 0.0 {
            return RGBSpectrum::default();
        }

        self.albedo(event.info) * (event.wo.z * INV_PI)
    }

    fn pdf(&self, event: &SurfaceScatterEvent) -> Float {
        if !event.requested_lobes.test(BsdfLobes::DIFFUSE_REFLECTION) {
            return 0.0;
        }
        if event.wi.z <= 0.0 || event.wo.z <= 0.0 {
            return 0.0;
        }

        sample_cosine_hemisphere_pdf(event.wo.z)
    }
}

/* Tests for LambertBsdf */

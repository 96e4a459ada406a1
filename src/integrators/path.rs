// Copyright @yucwang 2026

use crate::core::bsdf::{Bsdf, BsdfLobes, SurfaceScatterEvent};
use crate::core::integrator::Integrator;
use crate::core::primitive::Primitive;
use crate::core::scene::Scene;
use crate::core::sensor::Sensor;
use crate::math::constants::{Float, Vector2f, Vector3f, EPSILON};
use crate::math::frame::TangentFrame;
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::sampling::sample_generator::SampleGenerator;

use std::sync::Arc;

fn power_heuristic(pdf_a: Float, pdf_b: Float) -> Float {
    let a2 = pdf_a * pdf_a;
    let b2 = pdf_b * pdf_b;
    if a2 + b2 == 0.0 {
        0.0
    } else {
        a2 / (a2 + b2)
    }
}

/// Unidirectional path tracer with next event estimation and multiple
/// importance sampling. Clones share the scene handle and nothing else.
pub struct PathIntegrator {
    scene: Arc<Scene>,
    max_depth: u32,
}

impl PathIntegrator {
    pub fn new(scene: Arc<Scene>, max_depth: u32) -> Self {
        Self { scene, max_depth }
    }

    fn offset_origin(p: Vector3f, ng: Vector3f, d: Vector3f) -> Vector3f {
        if d.dot(&ng) >= 0.0 {
            p + ng * EPSILON
        } else {
            p - ng * EPSILON
        }
    }

    fn trace_path(
        &self,
        mut ray: Ray3f,
        sampler: &mut dyn SampleGenerator,
        supplemental: &mut dyn SampleGenerator,
    ) -> RGBSpectrum {
        let scene = self.scene.as_ref();
        let mut radiance = RGBSpectrum::default();
        let mut throughput = RGBSpectrum::from_scalar(1.0);
        let mut prev_bsdf_pdf: Float = 0.0;
        let mut prev_specular = true;

        for bounce in 0..self.max_depth {
            let hit = scene.intersect(&mut ray);

            let (data, info) = match hit {
                Some(h) => h,
                None => {
                    if let Some(environment) = scene.environment() {
                        let le = environment.eval_direction(&ray.dir());
                        if !le.is_black() {
                            // When the environment is importance-sampled by
                            // next event estimation, bsdf-sampled hits are
                            // weighted against that strategy.
                            let weight = if prev_specular || !environment.is_samplable() {
                                1.0
                            } else {
                                let env_pdf = environment.pdf_direction(&ray.dir());
                                power_heuristic(prev_bsdf_pdf, env_pdf)
                            };
                            radiance += throughput * le * weight;
                        }
                    }
                    break;
                }
            };

            // Emission picked up by hitting an emitter with the bsdf sample.
            let emission = scene.objects()[info.primitive].emission;
            if !emission.is_black() && !data.back_side {
                let weight = if prev_specular {
                    1.0
                } else if scene.emitters().contains(&info.primitive) {
                    let light_pdf = scene.objects()[info.primitive]
                        .primitive
                        .inbound_pdf(&info, ray.origin(), ray.dir())
                        / scene.emitters().len() as Float;
                    power_heuristic(prev_bsdf_pdf, light_pdf)
                } else {
                    1.0
                };
                radiance += throughput * emission * weight;
            }

            let frame = TangentFrame::from_normal(&info.ns);
            let wi_local = frame.to_local(&(-ray.dir()));

            // Next event estimation, skipped on the last bounce.
            if bounce + 1 < self.max_depth {
                radiance += throughput * self.sample_direct(&info, &frame, wi_local, sampler, supplemental);
            }

            let mut event = SurfaceScatterEvent::new(&info, wi_local, BsdfLobes::ALL);
            if !info.bsdf.sample(&mut event, sampler) {
                break;
            }
            if event.throughput.is_black() {
                break;
            }

            throughput *= event.throughput;
            prev_specular = event.pdf == 0.0;
            prev_bsdf_pdf = event.pdf;

            if bounce >= 2 {
                let survival = throughput.max_component().min(0.95).max(0.05);
                if supplemental.next_1d() > survival {
                    break;
                }
                throughput /= survival;
            }

            let wo_world = frame.to_global(&event.wo);
            let origin = Self::offset_origin(info.p, info.ng, wo_world);
            ray = Ray3f::new(origin, wo_world, Some(0.0), None);
        }

        radiance
    }

    /// Direct lighting at one vertex: one sample from the area emitters and
    /// one from the environment map, each weighted against bsdf sampling.
    fn sample_direct(
        &self,
        info: &crate::core::intersection::IntersectionInfo,
        frame: &TangentFrame,
        wi_local: Vector3f,
        sampler: &mut dyn SampleGenerator,
        supplemental: &mut dyn SampleGenerator,
    ) -> RGBSpectrum {
        let scene = self.scene.as_ref();
        let mut direct = RGBSpectrum::default();

        let emitters = scene.emitters();
        if !emitters.is_empty() {
            let pick = (supplemental.next_1d() * emitters.len() as Float) as usize;
            let emitter_idx = emitters[pick.min(emitters.len() - 1)];
            let object = &scene.objects()[emitter_idx];

            if let Some(sample) = object.primitive.sample_inbound(info.p, sampler) {
                let light_pdf = sample.pdf / emitters.len() as Float;
                if light_pdf > 0.0 {
                    let wo_local = frame.to_local(&sample.d);
                    let event = SurfaceScatterEvent::with_wo(info, wi_local, wo_local, BsdfLobes::ALL);
                    let f = info.bsdf.eval(&event);
                    if !f.is_black() && !self.shadowed(info, sample.d, Some(sample.dist)) {
                        let weight = power_heuristic(light_pdf, info.bsdf.pdf(&event));
                        direct += object.emission * f * (weight / light_pdf);
                    }
                }
            }
        }

        if let Some(environment) = scene.environment() {
            if environment.is_samplable() {
                if let Some((d, env_pdf)) = environment.sample_direction(sampler.next_2d()) {
                    let wo_local = frame.to_local(&d);
                    let event = SurfaceScatterEvent::with_wo(info, wi_local, wo_local, BsdfLobes::ALL);
                    let f = info.bsdf.eval(&event);
                    if !f.is_black() && !self.shadowed(info, d, None) {
                        let le = environment.eval_direction(&d);
                        let weight = power_heuristic(env_pdf, info.bsdf.pdf(&event));
                        direct += le * f * (weight / env_pdf);
                    }
                }
            }
        }

        direct
    }

    fn shadowed(
        &self,
        info: &crate::core::intersection::IntersectionInfo,
        d: Vector3f,
        dist: Option<Float>,
    ) -> bool {
        let origin = Self::offset_origin(info.p, info.ng, d);
        let max_t = dist.map(|t| t - 2.0 * EPSILON);
        let shadow_ray = Ray3f::new(origin, d, Some(0.0), max_t);
        self.scene.occluded(&shadow_ray)
    }
}

impl Integrator for PathIntegrator {
    fn trace_sample(
        &mut self,
        pixel: (u32, u32),
        sampler: &mut dyn SampleGenerator,
        supplemental: &mut dyn SampleGenerator,
    ) -> RGBSpectrum {
        let (w, h) = self.scene.sensor().resolution();
        let jitter = sampler.next_2d();
        let uv = Vector2f::new(
            (pixel.0 as Float + jitter.x) / w as Float,
            (pixel.1 as Float + jitter.y) / h as Float,
        );
        let ray = self.scene.sensor().sample_ray(&uv);
        self.trace_path(ray, sampler, supplemental)
    }

    fn clone_for_worker(&self, _worker_id: u32) -> Box<dyn Integrator> {
        Box::new(Self { scene: Arc::clone(&self.scene), max_depth: self.max_depth })
    }
}

/* Tests for the path integrator */

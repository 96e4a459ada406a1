// Copyright @yucwang 2026

use crate::core::integrator::Integrator;
use crate::core::scene::Scene;
use crate::core::sensor::Sensor;
use crate::core::thread_pool::{TaskGroup, ThreadPool};
use crate::math::bitmap::Bitmap;
use crate::math::constants::{Float, Vector3f};
use crate::renderers::sample_record::SampleRecord;
use crate::sampling::sample_generator::{hash_32, SampleGenerator, SobolSampler, UniformSampler};

use std::sync::{Arc, Mutex};

/// Side length of one work-unit tile.
pub const TILE_SIZE: u32 = 16;
/// Side length of one variance-aggregation tile. Must divide TILE_SIZE so
/// a sample record is written by exactly one worker per pass.
pub const VARIANCE_TILE_SIZE: u32 = 4;
/// Minimum uniform spp before adaptive scheduling activates.
pub const ADAPTIVE_THRESHOLD: u32 = 16;

const MASTER_SEED: u32 = 0xBA5E_BA11;
const MIN_VARIANCE_SCALE: Float = 1e-5;

/// One rectangular block of pixels, with its own sample generators. The
/// supplemental sampler stays uniform regardless of the primary choice so
/// secondary decisions do not correlate with pixel dimensions.
struct ImageTile {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    sampler: Box<dyn SampleGenerator>,
    supplemental: UniformSampler,
}

/// Drives the Monte-Carlo estimator across a worker pool: dices the image
/// into tiles, schedules per-record sample counts (uniform first, then
/// variance-adaptive) and accumulates pixel estimates into the camera.
pub struct Renderer {
    scene: Arc<Scene>,
    pool: Arc<ThreadPool>,
    integrators: Vec<Mutex<Box<dyn Integrator>>>,
    tiles: Vec<Mutex<ImageTile>>,
    samples: Vec<Mutex<SampleRecord>>,
    w: u32,
    h: u32,
    variance_w: u32,
    variance_h: u32,
    sampler: Mutex<UniformSampler>,
    group: Mutex<Option<Arc<TaskGroup>>>,
}

impl Renderer {
    pub fn new(scene: Arc<Scene>, integrator: &dyn Integrator, pool: Arc<ThreadPool>) -> Self {
        let (w, h) = scene.sensor().resolution();
        let (w, h) = (w as u32, h as u32);
        let variance_w = (w + VARIANCE_TILE_SIZE - 1) / VARIANCE_TILE_SIZE;
        let variance_h = (h + VARIANCE_TILE_SIZE - 1) / VARIANCE_TILE_SIZE;

        let integrators = (0..pool.thread_count())
            .map(|i| Mutex::new(integrator.clone_for_worker(i as u32)))
            .collect();

        let mut renderer = Self {
            scene,
            pool,
            integrators,
            tiles: Vec::new(),
            samples: (0..variance_w * variance_h)
                .map(|_| Mutex::new(SampleRecord::default()))
                .collect(),
            w,
            h,
            variance_w,
            variance_h,
            sampler: Mutex::new(UniformSampler::new(MASTER_SEED)),
            group: Mutex::new(None),
        };
        renderer.dice_tiles();
        renderer
    }

    fn dice_tiles(&mut self) {
        let use_sobol = self.scene.settings().use_sobol;
        let mut master = self.sampler.lock().unwrap();

        let mut y = 0;
        while y < self.h {
            let mut x = 0;
            while x < self.w {
                let sampler: Box<dyn SampleGenerator> = if use_sobol {
                    Box::new(SobolSampler::new(0))
                } else {
                    Box::new(UniformSampler::new(hash_32(master.next_u32())))
                };
                let supplemental = UniformSampler::new(hash_32(master.next_u32()));

                self.tiles.push(Mutex::new(ImageTile {
                    x,
                    y,
                    w: TILE_SIZE.min(self.w - x),
                    h: TILE_SIZE.min(self.h - y),
                    sampler,
                    supplemental,
                }));
                x += TILE_SIZE;
            }
            y += TILE_SIZE;
        }
    }

    /// Refreshes every record's adaptive weight from its error estimate and
    /// returns the 95th percentile of the positive ones (0 when none).
    fn error_percentile_95(&self) -> Float {
        let mut errors = Vec::with_capacity(self.samples.len());
        for record in &self.samples {
            let mut record = record.lock().unwrap();
            record.adaptive_weight = record.error_estimate();
            if record.adaptive_weight > 0.0 {
                errors.push(record.adaptive_weight);
            }
        }
        if errors.is_empty() {
            return 0.0;
        }
        errors.sort_by(|a, b| a.partial_cmp(b).unwrap());
        errors[(errors.len() * 95) / 100]
    }

    /// Two-pass max filter over the 4-neighborhood, bleeding each record's
    /// weight one tile outward from hot regions.
    fn dilate_adaptive_weights(&self) {
        let (vw, vh) = (self.variance_w as usize, self.variance_h as usize);
        let mut weights: Vec<Float> = self
            .samples
            .iter()
            .map(|r| r.lock().unwrap().adaptive_weight)
            .collect();

        for y in 0..vh {
            for x in 0..vw {
                let idx = x + y * vw;
                if y < vh - 1 {
                    weights[idx] = weights[idx].max(weights[idx + vw]);
                }
                if x < vw - 1 {
                    weights[idx] = weights[idx].max(weights[idx + 1]);
                }
            }
        }
        for y in (0..vh).rev() {
            for x in (0..vw).rev() {
                let idx = x + y * vw;
                if y > 0 {
                    weights[idx] = weights[idx].max(weights[idx - vw]);
                }
                if x > 0 {
                    weights[idx] = weights[idx].max(weights[idx - 1]);
                }
            }
        }

        for (record, weight) in self.samples.iter().zip(weights) {
            record.lock().unwrap().adaptive_weight = weight;
        }
    }

    /// Splits the adaptive budget across records in proportion to their
    /// weights, with stochastic rounding of the fractional parts. Every
    /// record keeps a +1 floor so no tile starves.
    fn distribute_adaptive_samples(&self, spp_count: u32) {
        let mut total_weight = 0.0f64;
        for record in &self.samples {
            total_weight += record.lock().unwrap().adaptive_weight as f64;
        }

        let adaptive_budget = (spp_count as u64 - 1) * self.w as u64 * self.h as u64;
        let budget_per_tile = adaptive_budget / (VARIANCE_TILE_SIZE * VARIANCE_TILE_SIZE) as u64;
        let weight_to_sample_factor = budget_per_tile as f64 / total_weight;

        let mut master = self.sampler.lock().unwrap();
        let mut pixel_pdf: Float = 0.0;
        for record in &self.samples {
            let mut record = record.lock().unwrap();
            let fractional = (record.adaptive_weight as f64 * weight_to_sample_factor) as Float;
            let mut adaptive_samples = fractional as u32;
            pixel_pdf += fractional - adaptive_samples as Float;
            if master.next_1d() < pixel_pdf {
                adaptive_samples += 1;
                pixel_pdf -= 1.0;
            }
            record.next_sample_count = adaptive_samples + 1;
        }
    }

    /// Plans the next pass. Returns false when the render has converged
    /// and no further work exists.
    pub fn generate_work(&self, spp_from: u32, spp_to: u32) -> bool {
        for record in &self.samples {
            let mut record = record.lock().unwrap();
            record.sample_index += record.next_sample_count;
        }

        let spp_count = spp_to - spp_from;
        let enable_adaptive = self.scene.settings().use_adaptive_sampling;

        if enable_adaptive && spp_from >= ADAPTIVE_THRESHOLD {
            let max_error = self.error_percentile_95();
            if max_error == 0.0 {
                return false;
            }

            // Cap outliers so a single fireflied record cannot swallow the
            // whole budget.
            for record in &self.samples {
                let mut record = record.lock().unwrap();
                record.adaptive_weight = record.adaptive_weight.min(max_error);
            }

            self.dilate_adaptive_weights();
            self.distribute_adaptive_samples(spp_count);
        } else {
            for record in &self.samples {
                record.lock().unwrap().next_sample_count = spp_count;
            }
        }

        true
    }

    fn render_tile(&self, worker_id: u32, tile_id: u32) {
        let mut tile = self.tiles[tile_id as usize].lock().unwrap();
        let (tile_x, tile_y, tile_w, tile_h) = (tile.x, tile.y, tile.w, tile.h);
        let ImageTile { sampler, supplemental, .. } = &mut *tile;
        let mut integrator = self.integrators[worker_id as usize].lock().unwrap();

        for y in 0..tile_h {
            for x in 0..tile_w {
                let px = tile_x + x;
                let py = tile_y + y;
                let pixel_index = px + py * self.w;
                let variance_index =
                    px / VARIANCE_TILE_SIZE + py / VARIANCE_TILE_SIZE * self.variance_w;

                let mut record = self.samples[variance_index as usize].lock().unwrap();
                let spp = record.next_sample_count;
                let mut c = Vector3f::zeros();
                for i in 0..spp {
                    sampler.setup(pixel_index, record.sample_index + i);
                    let mut s = integrator.trace_sample((px, py), sampler.as_mut(), supplemental);
                    record.add_sample(s.avg());
                    if !s.is_finite() {
                        log::warn!(
                            "non-finite radiance at pixel ({}, {}), sample {}; dropping",
                            px,
                            py,
                            record.sample_index + i
                        );
                        s = crate::math::spectrum::RGBSpectrum::default();
                    }
                    c += s.to_vector();
                }

                self.scene.sensor().add_samples(px as usize, py as usize, &c, spp);
            }
        }
    }

    /// Kicks off one pass over [spp_from, spp_to). The callback fires when
    /// every tile has finished, or immediately if the render converged.
    /// Takes a clone of the renderer handle; workers keep it alive for the
    /// duration of the pass.
    pub fn start_render(
        self: Arc<Self>,
        completion: impl FnOnce() + Send + 'static,
        spp_from: u32,
        spp_to: u32,
    ) {
        if !self.generate_work(spp_from, spp_to) {
            completion();
            return;
        }

        let renderer = Arc::clone(&self);
        let group = self.pool.enqueue(
            Arc::new(move |tile_id, worker_id| renderer.render_tile(worker_id, tile_id)),
            self.tiles.len() as u32,
            completion,
        );
        *self.group.lock().unwrap() = Some(group);
    }

    pub fn wait_for_completion(&self) {
        let group = self.group.lock().unwrap().take();
        if let Some(group) = group {
            group.wait();
        }
    }

    pub fn abort_render(&self) {
        let group = self.group.lock().unwrap().take();
        if let Some(group) = group {
            group.abort();
            group.wait();
        }
    }

    /// Error estimates normalized against the (freshly computed) 95th
    /// percentile, clamped to [0, 1]. One pixel per variance tile.
    pub fn get_variance_image(&self) -> Bitmap {
        let max_error = self.error_percentile_95().max(MIN_VARIANCE_SCALE);
        let mut image = Bitmap::new(self.variance_w as usize, self.variance_h as usize);
        for y in 0..self.variance_h as usize {
            for x in 0..self.variance_w as usize {
                let record = self.samples[x + y * self.variance_w as usize].lock().unwrap();
                let v = (record.error_estimate() / max_error).clamp(0.0, 1.0);
                image[(x, y)] = Vector3f::new(v, v, v);
            }
        }
        image
    }

    pub fn image(&self) -> Bitmap {
        self.scene.sensor().image()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.abort_render();
    }
}

/* Tests for the renderer */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scene::{RendererSettings, Scene};
    use crate::math::spectrum::RGBSpectrum;
    use crate::sensors::perspective::PerspectiveCamera;

    struct ConstIntegrator {
        value: Float,
    }

    impl Integrator for ConstIntegrator {
        fn trace_sample(
            &mut self,
            _pixel: (u32, u32),
            _sampler: &mut dyn SampleGenerator,
            _supplemental: &mut dyn SampleGenerator,
        ) -> RGBSpectrum {
            RGBSpectrum::from_scalar(self.value)
        }

        fn clone_for_worker(&self, _worker_id: u32) -> Box<dyn Integrator> {
            Box::new(ConstIntegrator { value: self.value })
        }
    }

    // Integrator whose variance depends on the image half: left pixels are
    // noisy, right pixels constant.
    struct HalfNoisyIntegrator;

    impl Integrator for HalfNoisyIntegrator {
        fn trace_sample(
            &mut self,
            pixel: (u32, u32),
            sampler: &mut dyn SampleGenerator,
            _supplemental: &mut dyn SampleGenerator,
        ) -> RGBSpectrum {
            if pixel.0 < 16 {
                RGBSpectrum::from_scalar(if sampler.next_1d() < 0.5 { 0.0 } else { 1.0 })
            } else {
                RGBSpectrum::from_scalar(0.5)
            }
        }

        fn clone_for_worker(&self, _worker_id: u32) -> Box<dyn Integrator> {
            Box::new(HalfNoisyIntegrator)
        }
    }

    fn empty_scene(w: usize, h: usize, settings: RendererSettings) -> Arc<Scene> {
        let camera = PerspectiveCamera::new(
            Vector3f::zeros(),
            Vector3f::new(0.0, 0.0, -1.0),
            Vector3f::new(0.0, 1.0, 0.0),
            1.0,
            w,
            h,
        );
        Arc::new(Scene::new(Box::new(camera), settings))
    }

    fn uniform_settings() -> RendererSettings {
        RendererSettings {
            use_sobol: false,
            use_adaptive_sampling: false,
            spp: 8,
            variance_image_output: None,
        }
    }

    #[test]
    fn test_constant_integrator_exact_means() {
        // Per-pixel sums must be exact regardless of worker count: every
        // pixel is written by exactly one task per pass.
        let scene = empty_scene(32, 32, uniform_settings());
        let pool = Arc::new(ThreadPool::new(2));
        let renderer = Arc::new(Renderer::new(scene, &ConstIntegrator { value: 0.25 }, pool));

        Arc::clone(&renderer).start_render(|| {}, 0, 4);
        renderer.wait_for_completion();
        Arc::clone(&renderer).start_render(|| {}, 4, 8);
        renderer.wait_for_completion();

        let image = renderer.image();
        for y in 0..32 {
            for x in 0..32 {
                let c = image[(x, y)];
                assert_eq!(c, Vector3f::new(0.25, 0.25, 0.25), "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_uniform_pass_sets_every_record() {
        let scene = empty_scene(40, 24, uniform_settings());
        let pool = Arc::new(ThreadPool::new(1));
        let renderer = Renderer::new(scene, &ConstIntegrator { value: 1.0 }, pool);

        assert!(renderer.generate_work(0, 4));
        for record in &renderer.samples {
            let record = record.lock().unwrap();
            assert_eq!(record.next_sample_count, 4);
            assert_eq!(record.sample_index, 0);
        }

        // The next plan advances the per-record sample cursor.
        assert!(renderer.generate_work(4, 8));
        for record in &renderer.samples {
            assert_eq!(record.lock().unwrap().sample_index, 4);
        }
    }

    #[test]
    fn test_edge_tiles_are_clipped() {
        let scene = empty_scene(40, 24, uniform_settings());
        let pool = Arc::new(ThreadPool::new(1));
        let renderer = Renderer::new(scene, &ConstIntegrator { value: 1.0 }, pool);

        // 40x24 dices into 3x2 tiles with clipped right edges.
        assert_eq!(renderer.tiles.len(), 6);
        let mut covered = 0;
        for tile in &renderer.tiles {
            let tile = tile.lock().unwrap();
            assert!(tile.x + tile.w <= 40);
            assert!(tile.y + tile.h <= 24);
            covered += tile.w * tile.h;
        }
        assert_eq!(covered, 40 * 24);
    }

    #[test]
    fn test_adaptive_budget_conservation() {
        // Identical error everywhere: the budget spreads evenly and sums to
        // the tile count plus the integer budget.
        let scene = empty_scene(
            32,
            32,
            RendererSettings {
                use_sobol: false,
                use_adaptive_sampling: true,
                spp: 32,
                variance_image_output: None,
            },
        );
        let pool = Arc::new(ThreadPool::new(1));
        let renderer = Renderer::new(scene, &ConstIntegrator { value: 1.0 }, pool);

        for record in &renderer.samples {
            let mut record = record.lock().unwrap();
            record.add_sample(0.0);
            record.add_sample(1.0);
        }

        assert!(renderer.generate_work(16, 20));

        let record_count = renderer.samples.len() as u32;
        let budget = (4 - 1) * 32 * 32 / (VARIANCE_TILE_SIZE * VARIANCE_TILE_SIZE);
        let total: u32 = renderer
            .samples
            .iter()
            .map(|r| r.lock().unwrap().next_sample_count)
            .sum();
        assert!(
            (total as i64 - (record_count + budget) as i64).abs() <= 1,
            "total = {}, expected ~{}",
            total,
            record_count + budget
        );

        // Identical errors: identical counts up to stochastic rounding.
        let first = renderer.samples[0].lock().unwrap().next_sample_count;
        for record in &renderer.samples {
            let count = record.lock().unwrap().next_sample_count;
            assert!((count as i64 - first as i64).abs() <= 1);
        }
    }

    #[test]
    fn test_converged_render_generates_no_work() {
        let scene = empty_scene(
            32,
            32,
            RendererSettings {
                use_sobol: false,
                use_adaptive_sampling: true,
                spp: 32,
                variance_image_output: None,
            },
        );
        let pool = Arc::new(ThreadPool::new(1));
        let renderer = Arc::new(Renderer::new(scene, &ConstIntegrator { value: 1.0 }, pool));

        // Zero variance in every record.
        for record in &renderer.samples {
            let mut record = record.lock().unwrap();
            for _ in 0..32 {
                record.add_sample(0.5);
            }
        }

        assert!(!renderer.generate_work(16, 32));

        // start_render still fires the completion callback.
        let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        renderer.start_render(
            move || flag.store(true, std::sync::atomic::Ordering::Relaxed),
            16,
            32,
        );
        assert!(fired.load(std::sync::atomic::Ordering::Relaxed));
    }

    #[test]
    fn test_dilation_monotonicity() {
        let scene = empty_scene(64, 64, uniform_settings());
        let pool = Arc::new(ThreadPool::new(1));
        let renderer = Renderer::new(scene, &ConstIntegrator { value: 1.0 }, pool);

        let (vw, vh) = (renderer.variance_w as usize, renderer.variance_h as usize);
        let before: Vec<Float> = (0..vw * vh)
            .map(|i| ((i * 2654435761) % 97) as Float / 97.0)
            .collect();
        for (record, weight) in renderer.samples.iter().zip(&before) {
            record.lock().unwrap().adaptive_weight = *weight;
        }

        renderer.dilate_adaptive_weights();

        let after: Vec<Float> = renderer
            .samples
            .iter()
            .map(|r| r.lock().unwrap().adaptive_weight)
            .collect();
        for y in 0..vh {
            for x in 0..vw {
                let idx = x + y * vw;
                assert!(after[idx] >= before[idx]);
                if x > 0 {
                    assert!(after[idx] >= before[idx - 1]);
                }
                if x < vw - 1 {
                    assert!(after[idx] >= before[idx + 1]);
                }
                if y > 0 {
                    assert!(after[idx] >= before[idx - vw]);
                }
                if y < vh - 1 {
                    assert!(after[idx] >= before[idx + vw]);
                }
            }
        }
    }

    #[test]
    fn test_adaptive_focuses_on_noisy_half() {
        let scene = empty_scene(
            32,
            32,
            RendererSettings {
                use_sobol: false,
                use_adaptive_sampling: true,
                spp: 64,
                variance_image_output: None,
            },
        );
        let pool = Arc::new(ThreadPool::new(2));
        let renderer = Arc::new(Renderer::new(scene, &HalfNoisyIntegrator, pool));

        Arc::clone(&renderer).start_render(|| {}, 0, ADAPTIVE_THRESHOLD);
        renderer.wait_for_completion();
        assert!(renderer.generate_work(ADAPTIVE_THRESHOLD, ADAPTIVE_THRESHOLD + 16));

        // The noisy left half must be granted more samples than the
        // constant right half. Dilation bleeds one variance tile across
        // the split, so compare the outermost columns.
        let vw = renderer.variance_w as usize;
        let left: u32 = (0..renderer.variance_h as usize)
            .map(|y| renderer.samples[y * vw].lock().unwrap().next_sample_count)
            .sum();
        let right: u32 = (0..renderer.variance_h as usize)
            .map(|y| renderer.samples[vw - 1 + y * vw].lock().unwrap().next_sample_count)
            .sum();
        assert!(left > right, "left = {}, right = {}", left, right);

        // The variance image mirrors the same split.
        let variance = renderer.get_variance_image();
        let left_err = variance[(0, 4)][0];
        let right_err = variance[(vw - 1, 4)][0];
        assert!(left_err > right_err);
    }

    #[test]
    fn test_render_determinism_across_runs() {
        let render_once = |use_sobol: bool| -> Bitmap {
            let scene = empty_scene(
                32,
                32,
                RendererSettings {
                    use_sobol,
                    use_adaptive_sampling: false,
                    spp: 4,
                    variance_image_output: None,
                },
            );
            let pool = Arc::new(ThreadPool::new(3));
            let renderer = Arc::new(Renderer::new(scene, &HalfNoisyIntegrator, pool));
            Arc::clone(&renderer).start_render(|| {}, 0, 4);
            renderer.wait_for_completion();
            renderer.image()
        };

        for use_sobol in [false, true] {
            let a = render_once(use_sobol);
            let b = render_once(use_sobol);
            for y in 0..32 {
                for x in 0..32 {
                    assert_eq!(a[(x, y)], b[(x, y)], "pixel ({}, {})", x, y);
                }
            }
        }
    }

    #[test]
    fn test_abort_leaves_usable_state() {
        let scene = empty_scene(64, 64, uniform_settings());
        let pool = Arc::new(ThreadPool::new(2));
        let renderer = Arc::new(Renderer::new(scene, &ConstIntegrator { value: 1.0 }, pool));

        Arc::clone(&renderer).start_render(|| {}, 0, 8);
        renderer.abort_render();

        // Whatever completed is still a valid partial image.
        let image = renderer.image();
        for y in 0..64 {
            for x in 0..64 {
                let c = image[(x, y)][0];
                assert!(c == 0.0 || c == 1.0);
            }
        }
    }
}

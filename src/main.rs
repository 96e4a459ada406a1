// Copyright @yucwang 2026

use praline::core::bsdf::Bsdf;
use praline::core::bvh::BvhAccel;
use praline::core::scene::{Environment, RendererSettings, Scene, SceneObject};
use praline::core::thread_pool::ThreadPool;
use praline::integrators::path::PathIntegrator;
use praline::io::exr_utils;
use praline::materials::lambert::LambertBsdf;
use praline::materials::plastic::PlasticBsdf;
use praline::math::constants::{Float, Vector3f};
use praline::math::spectrum::RGBSpectrum;
use praline::math::transform::Transform;
use praline::renderers::renderer::Renderer;
use praline::sensors::perspective::PerspectiveCamera;
use praline::shapes::triangle_mesh::{TriangleI, TriangleMesh, Vertex};
use praline::textures::constant::ConstantTexture;

use indicatif::{ProgressBar, ProgressStyle};

use std::env;
use std::sync::Arc;

fn quad(corners: [[Float; 3]; 4], bsdf: Arc<dyn Bsdf>) -> TriangleMesh {
    let verts = corners
        .iter()
        .map(|c| Vertex::new(Vector3f::new(c[0], c[1], c[2])))
        .collect();
    let tris = vec![TriangleI::new(0, 1, 2), TriangleI::new(0, 2, 3)];
    TriangleMesh::new(verts, tris, vec![bsdf], false, false)
}

// Plastic sphere on a diffuse floor, lit by a quad emitter and a dim
// constant environment.
fn build_demo_scene(width: usize, height: usize, settings: RendererSettings) -> Scene {
    let camera = PerspectiveCamera::new(
        Vector3f::new(0.0, 1.2, 3.5),
        Vector3f::new(0.0, 0.5, 0.0),
        Vector3f::new(0.0, 1.0, 0.0),
        0.9,
        width,
        height,
    );

    let floor_bsdf: Arc<dyn Bsdf> = Arc::new(LambertBsdf::new(Box::new(ConstantTexture::new(
        RGBSpectrum::from_scalar(0.7),
    ))));
    let light_bsdf: Arc<dyn Bsdf> = Arc::new(LambertBsdf::new(Box::new(ConstantTexture::new(
        RGBSpectrum::from_scalar(0.0),
    ))));
    let sphere_bsdf: Arc<dyn Bsdf> = Arc::new(PlasticBsdf::new(
        Box::new(ConstantTexture::new(RGBSpectrum::new(0.2, 0.3, 0.7))),
        1.5,
        1.0,
        RGBSpectrum::new(0.1, 0.1, 0.02),
    ));

    let floor = quad(
        [[-4.0, 0.0, -4.0], [-4.0, 0.0, 4.0], [4.0, 0.0, 4.0], [4.0, 0.0, -4.0]],
        floor_bsdf,
    );

    // Winding points the emitter down at the sphere.
    let light = quad(
        [[-0.8, 3.0, -0.8], [0.8, 3.0, -0.8], [0.8, 3.0, 0.8], [-0.8, 3.0, 0.8]],
        light_bsdf,
    );

    let mut sphere = TriangleMesh::make_sphere(0.5, sphere_bsdf, true);
    sphere.set_transform(Transform::translate(Vector3f::new(0.0, 0.5, 0.0)));

    let mut scene = Scene::new(Box::new(camera), settings);
    scene.add_object(SceneObject::new(Box::new(floor)));
    scene.add_object(SceneObject::with_emission(
        Box::new(light),
        RGBSpectrum::from_scalar(12.0),
    ));
    scene.add_object(SceneObject::new(Box::new(sphere)));
    scene.set_environment(Environment::new(Box::new(ConstantTexture::new(
        RGBSpectrum::from_scalar(0.05),
    ))));
    scene
}

fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage: {} <output.exr> [--spp N] [--max-depth N] [--threads N] \
             [--width N] [--height N] [--uniform] [--no-adaptive] [--variance <path.exr>]",
            args[0]
        );
        std::process::exit(1);
    }

    let output_path = args[1].clone();
    let mut settings = RendererSettings::default();
    let mut max_depth: u32 = 16;
    let mut threads: usize = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let mut width: usize = 512;
    let mut height: usize = 512;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--spp" => {
                i += 1;
                settings.spp = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(settings.spp);
            }
            "--max-depth" => {
                i += 1;
                max_depth = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(max_depth);
            }
            "--threads" => {
                i += 1;
                threads = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(threads);
            }
            "--width" => {
                i += 1;
                width = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(width);
            }
            "--height" => {
                i += 1;
                height = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(height);
            }
            "--uniform" => {
                settings.use_sobol = false;
            }
            "--no-adaptive" => {
                settings.use_adaptive_sampling = false;
            }
            "--variance" => {
                i += 1;
                settings.variance_image_output = args.get(i).map(|v| v.into());
            }
            other => {
                log::warn!("ignoring unknown argument '{}'", other);
            }
        }
        i += 1;
    }

    let spp = settings.spp;
    let variance_output = settings.variance_image_output.clone();

    let mut scene = build_demo_scene(width, height, settings);
    scene.prepare_for_render(&BvhAccel);
    let scene = Arc::new(scene);

    let pool = Arc::new(ThreadPool::new(threads));
    let integrator = PathIntegrator::new(Arc::clone(&scene), max_depth);
    let renderer = Arc::new(Renderer::new(Arc::clone(&scene), &integrator, pool));

    log::info!(
        "rendering {}x{} at {} spp on {} threads",
        width,
        height,
        spp,
        threads
    );

    let progress = ProgressBar::new(spp as u64);
    progress.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} spp")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    // Render in growing waves so a preview is available early.
    let mut current = 0u32;
    let mut step = 4u32;
    while current < spp {
        let next = (current + step).min(spp);
        Arc::clone(&renderer).start_render(|| {}, current, next);
        renderer.wait_for_completion();
        progress.set_position(next as u64);
        current = next;
        step = (step * 2).min(64);
    }
    progress.finish_and_clear();

    if let Err(err) = exr_utils::write_exr_to_file(&renderer.image(), &output_path) {
        log::error!("{}", err);
        std::process::exit(1);
    }

    if let Some(path) = variance_output {
        if let Err(err) = exr_utils::write_exr_to_file(&renderer.get_variance_image(), &path) {
            log::error!("{}", err);
        }
    }
}

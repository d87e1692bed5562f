//! The top-level per-iteration orchestration (spec.md §4.8
//! "VertexCacheBidir", §5 "Parallelism"): rebuild the light-path cache,
//! render every pixel's camera subpath, splat every cached light vertex
//! onto the image plane, and fold all three passes into the shared
//! [`FrameBuffer`]/[`TechniquePyramid`] state. Grounded in the teacher's
//! `RenderCoordinator`, which hands out fixed-size pixel blocks across
//! threads from a shared atomic counter; here the block is simply "one
//! pixel", left to `rayon`'s own work-stealing rather than a hand-rolled
//! counter, since the teacher's own coordinator exists only to approximate
//! exactly that scheduling.

use cgmath::Point2;
use rayon::prelude::*;

use crate::bidir_base;
use crate::config::RenderConfig;
use crate::float::Float;
use crate::frame_buffer::{FrameBuffer, Splat, TechniquePyramid};
use crate::light_path_cache::{self, ROOT_MATERIAL};
use crate::mis::MisContext;
use crate::path_cache::PathCache;
use crate::sampling::{self, Rng, ShadingFrame};
use crate::scene::Scene;

fn mis_context(scene: &Scene, config: &RenderConfig, cache: &PathCache) -> MisContext {
    MisContext {
        enable_hitting: config.flags.enable_hitting,
        enable_connections: config.flags.enable_connections,
        enable_light_tracer: config.flags.enable_light_tracer,
        bidir_select_density: crate::mis::bidir_select_density(cache, config.num_connections, config.num_light_paths),
        num_light_paths: config.num_light_paths as Float,
    }
}

/// Render one full iteration into `frame` (and, if present, `pyramid`)
/// (spec.md §4.8, §4.9). `iteration` seeds every per-pixel and per-path RNG
/// stream so repeated calls with the same index reproduce the same
/// samples (spec.md §6.3).
pub fn render_iteration(scene: &Scene, config: &RenderConfig, iteration: u32, frame: &FrameBuffer, pyramid: Option<&TechniquePyramid>) {
    frame.start_iteration();
    if let Some(p) = pyramid {
        p.start_iteration();
    }

    let cache = light_path_cache::trace_light_paths(scene, config, iteration);
    let ctx = mis_context(scene, config, &cache);

    render_camera_pass(scene, config, &ctx, &cache, iteration, frame, pyramid);

    if config.flags.enable_light_tracer {
        render_light_tracer_pass(scene, config, &ctx, &cache, iteration, frame, pyramid);
    }

    frame.end_iteration();
    if let Some(p) = pyramid {
        p.end_iteration();
    }
}

fn render_camera_pass(scene: &Scene, config: &RenderConfig, ctx: &MisContext, cache: &PathCache, iteration: u32, frame: &FrameBuffer, pyramid: Option<&TechniquePyramid>) {
    let width = config.width;
    let height = config.height;

    let work = |pixel_index: u32| {
        let px = pixel_index % width;
        let py = pixel_index / width;
        let pixel_seed = pixel_index as u64;
        let mut rng = Rng::new(config.base_seed_camera, pixel_seed, iteration as u64);
        let jitter = rng.next_float2();
        let film_pos = Point2::new(px as Float + jitter.0, py as Float + jitter.1);
        let radiance = bidir_base::render_camera_path(scene, config, ctx, cache, film_pos, (px, py), pyramid, pixel_seed, iteration, &mut rng);
        Splat { pixel: (px, py), value: radiance }
    };

    if config.deterministic {
        let mut splats: Vec<Splat> = (0..width * height).into_par_iter().map(work).collect();
        splats.sort_by_key(|s| (s.pixel.1, s.pixel.0));
        frame.splat_ordered(&splats);
    } else {
        (0..width * height).into_par_iter().for_each(|pixel_index| {
            let s = work(pixel_index);
            frame.splat(s.pixel, s.value);
        });
    }
}

/// `SplatLightVertices` (spec.md §4.7): the fourth MIS technique, iterating
/// every populated, non-root cached light vertex and connecting it
/// directly to the camera's lens.
fn render_light_tracer_pass(scene: &Scene, config: &RenderConfig, ctx: &MisContext, cache: &PathCache, iteration: u32, frame: &FrameBuffer, pyramid: Option<&TechniquePyramid>) {
    let camera = match scene.camera.as_ref() {
        Some(c) => c.as_ref(),
        None => return,
    };
    let num_light_paths = config.num_light_paths.max(1) as Float;

    let splat_one = |path: usize, index: u32, rng: &mut Rng, pyramid: Option<&TechniquePyramid>| -> Option<Splat> {
        let vertex = cache.vertex(path, index);
        if vertex.material == ROOT_MATERIAL {
            return None;
        }
        let camera_pos = camera.position();
        let shadow = crate::geometry::Ray::shadow(&vertex.point, camera_pos);
        if scene.intersector.is_occluded(&shadow) {
            return None;
        }
        let response = camera.sample_response(vertex.point.p, rng)?;
        if response.weight.is_black() {
            return None;
        }

        let light_material = &scene.materials[vertex.material];
        let light_ancestor = cache.vertex(path, vertex.ancestor);
        let frame_light = ShadingFrame::new(vertex.point.ns);
        let out_local = frame_light.world_to_shading((light_ancestor.point.p - vertex.point.p).normalize());
        let in_local = frame_light.world_to_shading(shadow.dir);
        let bsdf = light_material.evaluate_with_cosine(out_local, in_local, true);
        if bsdf.is_black() {
            return None;
        }

        let pdf_cam_to_primary = response.pdf_emit * sampling::surface_area_to_solid_angle(camera_pos, vertex.point.p, vertex.point.ns);
        let pdf_reverse = vertex.pdf_to_ancestor;
        let pdf_next_event = if vertex.depth == 2 { vertex.next_event_pdf_ancestor.unwrap_or(0.0) } else { 0.0 };

        let weight = crate::mis::light_tracer_mis(cache, path, index, vertex.ancestor, vertex.depth, pdf_cam_to_primary, pdf_reverse, pdf_next_event, ctx);
        let contribution = (vertex.throughput * bsdf * response.weight * weight / num_light_paths).clamped_or_black();
        if contribution.is_black() {
            return None;
        }
        if let Some(pyramid) = pyramid {
            pyramid.splat(0, vertex.depth + 1, response.pixel, contribution);
        }
        Some(Splat { pixel: response.pixel, value: contribution })
    };

    let num_paths = cache.num_paths();
    let work = |path: usize| -> Vec<Splat> {
        let len = cache.path_len(path);
        if len == 0 {
            return Vec::new();
        }
        let mut rng = Rng::new(config.base_seed_light ^ 0x4C54, path as u64, iteration as u64);
        (0..len).filter_map(|index| splat_one(path, index, &mut rng, pyramid)).collect()
    };

    if config.deterministic {
        let mut splats: Vec<Splat> = (0..num_paths).into_par_iter().flat_map(|p| work(p)).collect();
        splats.sort_by_key(|s| (s.pixel.1, s.pixel.0));
        frame.splat_ordered(&splats);
    } else {
        (0..num_paths).into_par_iter().for_each(|path| {
            for s in work(path) {
                frame.splat(s.pixel, s.value);
            }
        });
    }
}

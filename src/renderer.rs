//! Top-level iteration driver (spec.md §7 "per-iteration worker errors",
//! §4.9 preview-sink hook). Grounded in the teacher's `RenderCoordinator`
//! iteration counter (`pt_renderer/mod.rs`), reworked to own a `rayon`
//! thread pool directly, sized with `num_cpus` the same way the teacher
//! sizes its manual thread pool in `pt_renderer::PTRenderer::start_render`
//! (`num_cpus::get_physical()`), rather than spawning raw `std::thread`
//! workers over `mpsc` channels.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::frame_buffer::{FrameBuffer, TechniquePyramid};
use crate::preview::PreviewSink;
use crate::scene::Scene;
use crate::vertex_cache_bidir;

#[derive(Debug)]
struct IterationPanic(String);

impl fmt::Display for IterationPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IterationPanic {}

fn panic_message(payload: &(dyn Any + Send + 'static)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked with a non-string payload".to_string()
    }
}

/// Runs `config.num_iterations` full iterations into `frame` (and, if
/// present, `pyramid`), forwarding one progress line per iteration to
/// `preview` if given (spec.md §4.9). A worker panic part-way through an
/// iteration is caught and reported as `RenderError::Iteration` instead of
/// unwinding into the caller (spec.md §7 "Per-iteration exception in a
/// worker"): the frame buffer already reflects whatever partial splats
/// landed before the panic, since there is no buffering stage to roll back.
pub fn render(scene: &Scene, config: &RenderConfig, frame: &FrameBuffer, pyramid: Option<&TechniquePyramid>, mut preview: Option<&mut dyn PreviewSink>) -> Result<(), RenderError> {
    if let Some(sink) = preview.as_deref_mut() {
        if let Err(e) = sink.send_name("vcm_bidir") {
            log::warn!("preview sink failed to send its opening name message: {}", e);
        }
    }
    log::info!(
        "starting render: {}x{}, {} iterations, {} light paths/iteration, max_depth {}",
        config.width,
        config.height,
        config.num_iterations,
        config.num_light_paths,
        config.max_depth
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get())
        .build()
        .map_err(|e| RenderError::Iteration { iteration: 0, source: Box::new(IterationPanic(e.to_string())) })?;

    for iteration in 0..config.num_iterations {
        let start = Instant::now();
        let outcome = pool.install(|| panic::catch_unwind(AssertUnwindSafe(|| vertex_cache_bidir::render_iteration(scene, config, iteration, frame, pyramid))));
        if let Err(payload) = outcome {
            let message = panic_message(payload.as_ref());
            log::warn!("iteration {} panicked: {}", iteration, message);
            return Err(RenderError::Iteration { iteration, source: Box::new(IterationPanic(message)) });
        }
        let elapsed = start.elapsed();
        log::debug!("iteration {} finished in {:.3}s", iteration, elapsed.as_secs_f64());
        if let Some(sink) = preview.as_deref_mut() {
            if let Err(e) = sink.send_update(iteration, elapsed, frame) {
                log::warn!("preview sink write failed: {}", e);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::UniformBackground;
    use crate::camera::PinholeCamera;
    use crate::color::Color;
    use crate::geometry::Ray;
    use crate::scene::{Hit, Intersector};
    use cgmath::{Point3, Vector3};

    struct MissIntersector;

    impl Intersector for MissIntersector {
        fn trace(&self, _ray: &Ray) -> Option<Hit> {
            None
        }
        fn is_occluded(&self, _shadow_ray: &Ray) -> bool {
            false
        }
        fn leaves_scene(&self, _ray: &Ray) -> bool {
            true
        }
    }

    fn furnace_scene() -> Scene {
        let mut scene = Scene::new(Box::new(MissIntersector));
        scene.with_camera(Box::new(PinholeCamera::new(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 1.0, 0.0), crate::consts::PI / 2.0, 4, 4)));
        scene.with_background(Box::new(UniformBackground::new(Color::gray(1.0))));
        scene.set_bounds(Point3::new(0.0, 0.0, 0.0), 10.0);
        scene
    }

    #[test]
    fn render_runs_requested_iterations_without_error() {
        let mut scene = furnace_scene();
        scene.prepare().unwrap();
        let config = RenderConfig { width: 4, height: 4, num_iterations: 2, num_light_paths: 4, max_depth: 1, ..RenderConfig::default() };
        let frame = FrameBuffer::new(config.width, config.height);
        render(&scene, &config, &frame, None, None).unwrap();
        assert!(frame.sample_count((0, 0)) > 0);
    }
}

//! Camera-side half of the vertex-cache bidirectional estimator (spec.md
//! §4.7 "BidirBase"). Drives one camera subpath with [`crate::walk::walk`]
//! and, at every vertex, dispatches to the three camera-anchored
//! techniques: a direct emitter hit, next-event estimation, and zero or
//! more connections to the cached light subpaths. The fourth technique —
//! splatting a cached light vertex onto the image plane — iterates the
//! light cache instead of a camera path, so it lives in
//! `vertex_cache_bidir` alongside the iteration driver.

use cgmath::prelude::*;
use cgmath::{Point2, Vector3};

use crate::color::Color;
use crate::config::RenderConfig;
use crate::float::Float;
use crate::frame_buffer::TechniquePyramid;
use crate::geometry::{Ray, SurfacePoint};
use crate::light_path_cache::{compute_background_pdf, compute_emitter_pdf, ROOT_MATERIAL};
use crate::material::GenericMaterial;
use crate::mis::{self, CameraPath, MisContext};
use crate::path_cache::PathCache;
use crate::sampling::{self, Rng, ShadingFrame};
use crate::scene::Scene;
use crate::vertex_selector;
use crate::walk::{self, WalkObserver, WalkStep, WalkVertex};

struct CameraVertexInfo {
    point: SurfacePoint,
}

/// Where a finished technique's contribution should be filed in the
/// diagnostic `(camera length, light length)` grid (spec.md §4.9
/// [SUPPLEMENT] "technique pyramid"), alongside the pixel it splats to.
struct PyramidSink<'a> {
    pyramid: &'a TechniquePyramid,
    pixel: (u32, u32),
}

/// Drives one camera subpath and folds every technique's contribution into
/// a single running radiance for the pixel the path was spawned for
/// (spec.md §4.7 "OnCameraHit"). Continuation sampling is driven by
/// `walk::walk`'s own `rng`; this observer keeps a second, independent
/// stream for the side samples (next-event directions, connection
/// selection) so the two draws never alias each other mid-walk.
struct CameraWalkObserver<'a> {
    scene: &'a Scene,
    cache: &'a PathCache,
    config: &'a RenderConfig,
    ctx: &'a MisContext,
    pyramid: Option<PyramidSink<'a>>,
    side_rng: Rng,
    primary_dir: Vector3<Float>,
    vertices: Vec<CameraVertexInfo>,
    camera_path: CameraPath,
    radiance: Color,
}

impl<'a> WalkObserver for CameraWalkObserver<'a> {
    fn on_hit(&mut self, vertex: &WalkVertex) -> WalkStep {
        self.camera_path.pdf_from_ancestor.push(vertex.pdf_from_ancestor);
        self.camera_path.pdf_to_ancestor.push(0.0);

        let out_dir_world = match self.vertices.last() {
            Some(prev) => (prev.point.p - vertex.hit.point.p).normalize(),
            None => -self.primary_dir,
        };
        let ancestor_point = self.vertices.last().map(|v| v.point.clone());

        if vertex.hit.emitter.is_some() {
            let c = emitter_hit_contribution(self.scene, self.config, self.ctx, &self.camera_path, vertex, out_dir_world, ancestor_point.as_ref());
            self.add(c, 0);
        }

        if vertex.depth >= self.config.min_depth && vertex.hit.material != ROOT_MATERIAL {
            let material = &self.scene.materials[vertex.hit.material];
            let nee = next_event_estimation(self.scene, self.config, self.ctx, &self.camera_path, vertex, material, out_dir_world, ancestor_point.as_ref(), &mut self.side_rng);
            self.add(nee, 1);

            for _ in 0..self.config.num_connections {
                let (c, light_len) = bidir_connection(self.scene, self.ctx, self.cache, &self.camera_path, vertex, material, out_dir_world, ancestor_point.as_ref(), &mut self.side_rng);
                self.add(c, light_len);
            }
        }

        self.vertices.push(CameraVertexInfo { point: vertex.hit.point.clone() });
        WalkStep::Continue
    }

    fn on_continue(&mut self, ancestor_depth: u32, pdf_to_ancestor: Float) {
        // `ancestor_depth` is the walk's 1-indexed depth counter for the
        // vertex whose reverse pdf is now known; unlike the light cache
        // (which reserves index 0 for the emitter root), a camera path has
        // no such offset, so vertex depth `d` lives at slot `d - 1`.
        if ancestor_depth == 0 {
            return;
        }
        if let Some(slot) = self.camera_path.pdf_to_ancestor.get_mut((ancestor_depth - 1) as usize) {
            *slot = pdf_to_ancestor;
        }
    }

    fn on_invalid_hit(&mut self, _depth: u32) {}
}

impl<'a> CameraWalkObserver<'a> {
    fn add(&mut self, contribution: Color, light_len: u32) {
        let contribution = contribution.clamped_or_black();
        if !contribution.is_black() {
            self.radiance += contribution;
            if let Some(sink) = self.pyramid.as_ref() {
                sink.pyramid.splat(self.camera_path.len() as u32, light_len, sink.pixel, contribution);
            }
        }
    }
}

/// Traces one camera subpath for `film_pos` and returns the combined
/// radiance of every enabled camera-anchored technique (spec.md §4.7).
/// Empty (black) if the scene has no camera. `pixel`/`pyramid` are only
/// needed to additionally file each technique's contribution into the
/// diagnostic technique pyramid (spec.md §4.9 [SUPPLEMENT]); pass `None`
/// to skip that bookkeeping.
#[allow(clippy::too_many_arguments)]
pub fn render_camera_path(scene: &Scene, config: &RenderConfig, ctx: &MisContext, cache: &PathCache, film_pos: Point2<Float>, pixel: (u32, u32), pyramid: Option<&TechniquePyramid>, pixel_seed: u64, iteration: u32, rng: &mut Rng) -> Color {
    let start = match walk::start_from_camera(scene, film_pos, rng) {
        Some(s) => s,
        None => return Color::black(),
    };
    let primary_dir = start.ray.dir;

    let mut observer = CameraWalkObserver {
        scene,
        cache,
        config,
        ctx,
        pyramid: pyramid.map(|p| PyramidSink { pyramid: p, pixel }),
        side_rng: Rng::new(config.base_seed_camera, pixel_seed, iteration as u64),
        primary_dir,
        vertices: Vec::new(),
        camera_path: CameraPath::default(),
        radiance: Color::black(),
    };
    walk::walk(scene, start, config.max_depth, false, config.russian_roulette, rng, &mut observer);

    if let Some(background) = scene.background.as_ref() {
        if observer.camera_path.is_empty() {
            // The primary ray escaped the scene entirely; this is handled by
            // walk's on_invalid_hit at depth 1, which never calls on_hit, so
            // the background's own direct-visibility radiance is folded in
            // here rather than inside the observer. There is no camera
            // subpath vertex at all, so this occupies the pyramid's
            // `(1, 0)` cell (the lens ray itself, no bounce, no light
            // subpath) rather than `(0, 0)`.
            let contribution = background.emitted_radiance(primary_dir).clamped_or_black();
            if !contribution.is_black() {
                observer.radiance += contribution;
                if let Some(sink) = observer.pyramid.as_ref() {
                    sink.pyramid.splat(1, 0, sink.pixel, contribution);
                }
            }
        }
    }

    observer.radiance.clamped_or_black()
}

/// `EmitterHit` (spec.md §4.7): the camera subpath's last vertex carries
/// emission directly.
fn emitter_hit_contribution(scene: &Scene, config: &RenderConfig, ctx: &MisContext, camera_path: &CameraPath, vertex: &WalkVertex, out_dir_world: Vector3<Float>, ancestor: Option<&SurfacePoint>) -> Color {
    if !config.flags.enable_hitting {
        return Color::black();
    }
    let emitter_idx = match vertex.hit.emitter {
        Some(i) => i,
        None => return Color::black(),
    };
    let emitter = &scene.emitters[emitter_idx];
    let emission = emitter.emitted_radiance(vertex.hit.point.ns, out_dir_world);
    if emission.is_black() {
        return Color::black();
    }

    if camera_path.len() <= 1 {
        return vertex.throughput * emission;
    }

    let num_emitters = scene.emitters.len();
    let background_prob = scene.background_probability();
    let pdf_next_event = compute_emitter_pdf(emitter.pdf_area(), num_emitters, background_prob);

    let pdf_emit = match ancestor {
        Some(anc) => {
            let dir_to_ancestor = (anc.p - vertex.hit.point.p).normalize();
            let cos_at_emitter = vertex.hit.point.ns.dot(dir_to_ancestor).max(0.0);
            let solid_angle_pdf = emitter.pdf_ray(cos_at_emitter) * (1.0 / num_emitters.max(1) as Float) * (1.0 - background_prob);
            solid_angle_pdf * sampling::surface_area_to_solid_angle(vertex.hit.point.p, anc.p, anc.ns)
        }
        None => 0.0,
    };

    let weight = mis::emitter_hit_mis(camera_path, pdf_emit, pdf_next_event, ctx);
    vertex.throughput * emission * weight
}

/// `NextEventEstimation` (spec.md §4.7): shadow-test towards a uniformly
/// chosen emitter or, with probability `scene.background_probability()`,
/// towards a sampled background direction. Averages `config.num_shadow_rays`
/// independent shadow rays.
#[allow(clippy::too_many_arguments)]
fn next_event_estimation(scene: &Scene, config: &RenderConfig, ctx: &MisContext, camera_path: &CameraPath, vertex: &WalkVertex, material: &GenericMaterial, out_dir_world: Vector3<Float>, ancestor: Option<&SurfacePoint>, rng: &mut Rng) -> Color {
    let n = config.num_shadow_rays.max(1);
    let mut total = Color::black();
    for _ in 0..n {
        total += next_event_sample(scene, ctx, camera_path, vertex, material, out_dir_world, ancestor, rng);
    }
    total / n as Float
}

#[allow(clippy::too_many_arguments)]
fn next_event_sample(scene: &Scene, ctx: &MisContext, camera_path: &CameraPath, vertex: &WalkVertex, material: &GenericMaterial, out_dir_world: Vector3<Float>, ancestor: Option<&SurfacePoint>, rng: &mut Rng) -> Color {
    let num_emitters = scene.emitters.len();
    let background_prob = scene.background_probability();
    let use_background = scene.background.is_some() && (num_emitters == 0 || rng.next_float() < background_prob);
    let frame = ShadingFrame::new(vertex.hit.point.ns);
    let out_local = frame.world_to_shading(out_dir_world);

    let reverse_area_pdf = |in_local: Vector3<Float>| -> Float {
        match ancestor {
            Some(anc) => {
                let (_, rev) = material.pdf(out_local, in_local, false);
                rev * sampling::surface_area_to_solid_angle(vertex.hit.point.p, anc.p, anc.ns)
            }
            None => 0.0,
        }
    };

    if use_background {
        let background = match scene.background.as_ref() {
            Some(b) => b,
            None => return Color::black(),
        };
        let sample = background.sample_direction(rng.next_float2());
        if sample.pdf <= 0.0 {
            return Color::black();
        }
        let shadow = Ray::new(vertex.hit.point.offset_origin(sample.dir), sample.dir);
        if !scene.intersector.leaves_scene(&shadow) {
            return Color::black();
        }
        let in_local = frame.world_to_shading(sample.dir);
        let bsdf = material.evaluate_with_cosine(out_local, in_local, false);
        if bsdf.is_black() {
            return Color::black();
        }
        let (pdf_hit_solid, _) = material.pdf(out_local, in_local, false);
        let pdf_next_event = compute_background_pdf(sample.pdf, background_prob);
        if pdf_next_event <= 0.0 {
            return Color::black();
        }
        let emission = background.emitted_radiance(sample.dir);
        let pdf_reverse = reverse_area_pdf(in_local);
        let weight = mis::next_event_mis(camera_path, 0.0, pdf_next_event, pdf_hit_solid, pdf_reverse, ctx);
        return vertex.throughput * bsdf * emission * weight / pdf_next_event;
    }

    if num_emitters == 0 {
        return Color::black();
    }
    let light_index = rng.next_int(0, num_emitters);
    let emitter = &scene.emitters[light_index];
    let area_sample = emitter.sample_area(rng.next_float2());
    if area_sample.pdf <= 0.0 {
        return Color::black();
    }
    let light_point = SurfacePoint {
        p: area_sample.point,
        ng: area_sample.geometric_normal,
        ns: area_sample.shading_normal,
        uv: Point2::new(0.0, 0.0),
        primitive_id: u32::MAX,
        t_hit: 0.0,
        error_bound: 1e-4,
    };
    let shadow = Ray::shadow_between(&vertex.hit.point, &light_point);
    if scene.intersector.is_occluded(&shadow) {
        return Color::black();
    }
    let dir_to_light = shadow.dir;
    let in_local = frame.world_to_shading(dir_to_light);
    let bsdf = material.evaluate_with_cosine(out_local, in_local, false);
    if bsdf.is_black() {
        return Color::black();
    }
    let emission = emitter.emitted_radiance(area_sample.shading_normal, -dir_to_light);
    if emission.is_black() {
        return Color::black();
    }
    let (pdf_hit_solid, _) = material.pdf(out_local, in_local, false);
    let jacobian = sampling::surface_area_to_solid_angle(vertex.hit.point.p, area_sample.point, area_sample.shading_normal);
    let pdf_hit_area = pdf_hit_solid * jacobian;
    let pdf_next_event = compute_emitter_pdf(area_sample.pdf, num_emitters, background_prob);
    if pdf_next_event <= 0.0 {
        return Color::black();
    }

    let cos_at_emitter = area_sample.shading_normal.dot(-dir_to_light).max(0.0);
    let solid_angle_pdf = emitter.pdf_ray(cos_at_emitter) * (1.0 / num_emitters as Float) * (1.0 - background_prob);
    let pdf_emit = solid_angle_pdf * sampling::surface_area_to_solid_angle(area_sample.point, vertex.hit.point.p, vertex.hit.point.ns);

    let pdf_reverse = reverse_area_pdf(in_local);
    let weight = mis::next_event_mis(camera_path, pdf_emit, pdf_next_event, pdf_hit_area, pdf_reverse, ctx);
    vertex.throughput * bsdf * emission * weight / pdf_next_event
}

/// `BidirConnections` (spec.md §4.7): connect the camera vertex to a
/// uniformly selected vertex from across the whole light-path cache.
/// Returns the weighted contribution together with the connected vertex's
/// position in its light subpath (root = 0), for the caller's technique
/// pyramid bookkeeping.
#[allow(clippy::too_many_arguments)]
fn bidir_connection(scene: &Scene, ctx: &MisContext, cache: &PathCache, camera_path: &CameraPath, vertex: &WalkVertex, material: &GenericMaterial, out_dir_world: Vector3<Float>, cam_ancestor: Option<&SurfacePoint>, rng: &mut Rng) -> (Color, u32) {
    let selected = match vertex_selector::select_vertex(cache, rng) {
        Some(s) => s,
        None => return (Color::black(), 0),
    };
    let light_vertex = cache.vertex(selected.path, selected.index);
    if light_vertex.material == ROOT_MATERIAL {
        // Connecting straight to the emitter's own sampled point has no
        // BSDF on the light side; that technique is covered by
        // next-event estimation instead.
        return (Color::black(), 0);
    }
    let light_len = light_vertex.depth + 1;

    let shadow = Ray::shadow_between(&vertex.hit.point, &light_vertex.point);
    if scene.intersector.is_occluded(&shadow) {
        return (Color::black(), 0);
    }
    let dist2 = (light_vertex.point.p - vertex.hit.point.p).magnitude2();
    if dist2 <= 0.0 {
        return (Color::black(), 0);
    }
    let dir_to_light = shadow.dir;

    let cam_frame = ShadingFrame::new(vertex.hit.point.ns);
    let cam_out_local = cam_frame.world_to_shading(out_dir_world);
    let cam_in_local = cam_frame.world_to_shading(dir_to_light);
    let cam_bsdf = material.evaluate_with_cosine(cam_out_local, cam_in_local, false);
    if cam_bsdf.is_black() {
        return (Color::black(), 0);
    }
    let (cam_pdf_fwd, cam_pdf_rev) = material.pdf(cam_out_local, cam_in_local, false);

    let light_ancestor = cache.vertex(selected.path, light_vertex.ancestor);
    let light_material = &scene.materials[light_vertex.material];
    let light_frame = ShadingFrame::new(light_vertex.point.ns);
    let light_out_local = light_frame.world_to_shading((light_ancestor.point.p - light_vertex.point.p).normalize());
    let light_in_local = light_frame.world_to_shading(-dir_to_light);
    let light_bsdf = light_material.evaluate_with_cosine(light_out_local, light_in_local, true);
    if light_bsdf.is_black() {
        return (Color::black(), 0);
    }
    let (light_pdf_fwd, light_pdf_rev) = light_material.pdf(light_out_local, light_in_local, true);

    let geometry_term = 1.0 / dist2;
    let select_prob = selected.select_prob;
    if select_prob <= 0.0 {
        return (Color::black(), 0);
    }
    let unweighted = vertex.throughput * cam_bsdf * light_bsdf * light_vertex.throughput * (geometry_term / select_prob);
    if !unweighted.is_finite() {
        return (Color::black(), 0);
    }

    let k = camera_path.len() - 1;
    let pdf_camera_to_light = cam_pdf_fwd * sampling::surface_area_to_solid_angle(vertex.hit.point.p, light_vertex.point.p, light_vertex.point.ns);
    let pdf_camera_reverse = match cam_ancestor {
        Some(anc) => cam_pdf_rev * sampling::surface_area_to_solid_angle(vertex.hit.point.p, anc.p, anc.ns),
        None => 0.0,
    };
    let pdf_light_to_camera = light_vertex.pdf_from_ancestor;
    let pdf_light_reverse = light_pdf_rev * sampling::surface_area_to_solid_angle(light_vertex.point.p, light_ancestor.point.p, light_ancestor.point.ns);
    let pdf_next_event = if light_vertex.depth == 2 { light_vertex.next_event_pdf_ancestor.unwrap_or(0.0) } else { 0.0 };

    let weight = mis::bidir_connect_mis(
        camera_path,
        cache,
        selected.path,
        light_vertex.depth,
        light_vertex.ancestor,
        pdf_camera_reverse,
        pdf_camera_to_light,
        pdf_light_reverse,
        pdf_light_to_camera,
        pdf_next_event,
        ctx,
    );
    let _ = light_pdf_fwd;
    (unweighted * weight, light_len)
}

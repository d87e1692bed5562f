//! Traces every light path for one iteration and populates the
//! [`PathCache`] (spec.md §4.6). Each path is independent, so paths are
//! traced with a `rayon` work-stealing parallel-for (spec.md §5) and
//! folded into the cache once every path has finished.

use rayon::prelude::*;

use crate::color::Color;
use crate::config::RenderConfig;
use crate::float::Float;
use crate::path_cache::{PathCache, PathVertex};
use crate::sampling::{self, Rng};
use crate::scene::Scene;
use crate::walk::{self, WalkObserver, WalkStart, WalkStep, WalkVertex};

/// Sentinel material index stored on a path's root vertex (the emitter
/// point itself, which has no BSDF to shade).
pub const ROOT_MATERIAL: usize = usize::MAX;

/// `ComputeEmitterPdf(emitter, point, outDir, jacobian)`: the area-measure
/// pdf of choosing a given emitter point via next-event estimation. Our
/// emitter list is sampled uniformly, so this is independent of the query
/// point and direction; the caller applies `jacobian` to convert to solid
/// angle at whatever reference point it needs.
pub fn compute_emitter_pdf(emitter_pdf_area: Float, num_emitters: usize, background_prob: Float) -> Float {
    emitter_pdf_area * (1.0 / num_emitters.max(1) as Float) * (1.0 - background_prob)
}

/// `ComputeBackgroundPdf(origin, dir)`: the ray-measure pdf of the
/// background having been chosen by next-event estimation.
pub fn compute_background_pdf(background_ray_pdf: Float, background_prob: Float) -> Float {
    background_ray_pdf * background_prob
}

struct LightPathBuilder {
    num_emitters: usize,
    background_prob: Float,
    vertices: Vec<PathVertex>,
    /// Whether `vertices[0]` is an actual `DiffuseEmitter` sample (as
    /// opposed to the background's virtual point on the scene bounding
    /// sphere). The depth-2 next-event-pdf stash below only has meaning
    /// for an emitter root: NextEventEstimation towards the background
    /// samples a direction, not this specific cached point, so there is
    /// no analogous cross term to record for a background-rooted path.
    root_is_emitter: bool,
}

impl WalkObserver for LightPathBuilder {
    fn on_hit(&mut self, vertex: &WalkVertex) -> WalkStep {
        // `vertices` always holds at least the root pushed before the walk
        // started (spec.md §4.6), whether that root is a real emitter
        // sample or the background's bounding-sphere point, so this never
        // underflows.
        let ancestor = self.vertices.len() as u32 - 1;
        let mut path_vertex = PathVertex {
            point: vertex.hit.point.clone(),
            material: vertex.hit.material,
            depth: vertex.depth,
            pdf_from_ancestor: vertex.pdf_from_ancestor,
            pdf_to_ancestor: 0.0,
            throughput: vertex.throughput,
            ancestor,
            next_event_pdf_ancestor: None,
        };

        // spec.md §4.6: once the third cached vertex (root, first bounce,
        // second bounce = depth 2) lands, the next-event pdf of the root
        // as seen from the first bounce is known and is stashed here.
        if vertex.depth == 2 && self.root_is_emitter && self.vertices.len() >= 2 {
            let root = &self.vertices[0];
            let first_bounce = &self.vertices[1];
            let jacobian = sampling::surface_area_to_solid_angle(first_bounce.point.p, root.point.p, root.point.ns);
            let pdf = compute_emitter_pdf(root.pdf_from_ancestor, self.num_emitters, self.background_prob) * jacobian;
            path_vertex.next_event_pdf_ancestor = Some(pdf);
        }

        self.vertices.push(path_vertex);
        WalkStep::Continue
    }

    fn on_continue(&mut self, ancestor_depth: u32, pdf_to_ancestor: Float) {
        if let Some(v) = self.vertices.get_mut(ancestor_depth as usize) {
            v.pdf_to_ancestor = pdf_to_ancestor;
        }
    }

    fn on_invalid_hit(&mut self, _depth: u32) {}
}

/// Traces `config.num_light_paths` independent light paths for `iteration`
/// and returns a freshly populated [`PathCache`] (spec.md §4.6).
pub fn trace_light_paths(scene: &Scene, config: &RenderConfig, iteration: u32) -> PathCache {
    let num_emitters = scene.emitters.len();
    let background_prob = scene.background_probability();

    let paths: Vec<Vec<PathVertex>> = (0..config.num_light_paths)
        .into_par_iter()
        .map(|path_index| trace_one_light_path(scene, config, iteration, path_index, num_emitters, background_prob))
        .collect();

    let mut cache = PathCache::new(config.num_light_paths as usize, config.max_depth);
    for (path_index, vertices) in paths.into_iter().enumerate() {
        for v in vertices {
            cache.push(path_index, v);
        }
    }
    cache
}

fn trace_one_light_path(
    scene: &Scene,
    config: &RenderConfig,
    iteration: u32,
    path_index: u32,
    num_emitters: usize,
    background_prob: Float,
) -> Vec<PathVertex> {
    let mut rng = Rng::new(config.base_seed_light, path_index as u64, iteration as u64);
    if num_emitters == 0 && scene.background.is_none() {
        return Vec::new();
    }

    let use_background = scene.background.is_some() && (num_emitters == 0 || rng.next_float() < background_prob);

    let (root, root_is_emitter, mut walk_start) = if let Some(background) = use_background.then(|| scene.background.as_deref()).flatten() {
        let sample = background.sample_ray(rng.next_float2(), rng.next_float2());
        // The root vertex of a background-started path is the virtual
        // point where the sampled ray crosses the scene's bounding sphere
        // (spec.md §4.5 "Two starts"); it carries `ROOT_MATERIAL` just
        // like an emitter root since it has no BSDF either. Its "normal"
        // points back along the ray so the area<->solid-angle jacobian
        // below behaves the same way it does for an emitter root.
        let root = PathVertex {
            point: crate::geometry::SurfacePoint {
                p: sample.ray.origin,
                ng: -sample.ray.dir,
                ns: -sample.ray.dir,
                uv: cgmath::Point2::new(0.0, 0.0),
                primitive_id: u32::MAX,
                t_hit: 0.0,
                error_bound: 1e-4,
            },
            material: ROOT_MATERIAL,
            depth: 0,
            pdf_from_ancestor: sample.pdf,
            pdf_to_ancestor: 0.0,
            throughput: Color::white(),
            ancestor: 0,
            next_event_pdf_ancestor: None,
        };
        let walk_start = WalkStart { ray: sample.ray, pdf_area: sample.pdf, weight: sample.weight };
        (root, false, walk_start)
    } else {
        let light_index = rng.next_int(0, num_emitters);
        let emitter = &scene.emitters[light_index];
        let u_area = rng.next_float2();
        let area_sample = emitter.sample_area(u_area);
        let u_dir = rng.next_float2();
        let ray_sample = emitter.sample_ray(u_area, u_dir);
        let root = PathVertex {
            point: crate::geometry::SurfacePoint {
                p: area_sample.point,
                ng: area_sample.geometric_normal,
                ns: area_sample.shading_normal,
                uv: cgmath::Point2::new(0.0, 0.0),
                primitive_id: u32::MAX,
                t_hit: 0.0,
                error_bound: 1e-4,
            },
            material: ROOT_MATERIAL,
            depth: 0,
            pdf_from_ancestor: area_sample.pdf,
            pdf_to_ancestor: 0.0,
            throughput: Color::white(),
            ancestor: 0,
            next_event_pdf_ancestor: None,
        };
        // Vertex1's area pdf is `pdf_dir` converted through the root ->
        // hit1 jacobian; that needs hit1's geometry, resolved below.
        let walk_start = WalkStart { ray: ray_sample.ray, pdf_area: ray_sample.pdf_dir, weight: ray_sample.weight };
        (root, true, walk_start)
    };

    match scene.intersector.trace(&walk_start.ray) {
        Some(hit1) => {
            let jacobian = sampling::surface_area_to_solid_angle(root.point.p, hit1.point.p, hit1.point.ns);
            walk_start.pdf_area *= jacobian;
        }
        None => return vec![root],
    }

    let vertices = vec![root];
    let mut builder = LightPathBuilder { num_emitters, background_prob, vertices, root_is_emitter };
    walk::walk(scene, walk_start, config.max_depth, true, config.russian_roulette, &mut rng, &mut builder);
    builder.vertices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::emitter::{DiffuseEmitter, Emitter};
    use crate::geometry::{Ray, SurfacePoint};
    use crate::material::{GenericMaterial, MaterialParams};
    use crate::mesh::{Mesh, Triangle};
    use crate::scene::{Hit, Intersector, Scene};
    use cgmath::{Point2, Point3, Vector3};

    struct FloorIntersector {
        material: usize,
    }

    impl Intersector for FloorIntersector {
        fn trace(&self, ray: &Ray) -> Option<Hit> {
            if ray.dir.y >= 0.0 {
                return None;
            }
            let t = -ray.origin.y / ray.dir.y;
            if t <= ray.t_min || t > ray.t_max {
                return None;
            }
            let p = ray.at(t);
            if p.x.abs() > 50.0 || p.z.abs() > 50.0 {
                return None;
            }
            Some(Hit {
                point: SurfacePoint {
                    p,
                    ng: Vector3::new(0.0, 1.0, 0.0),
                    ns: Vector3::new(0.0, 1.0, 0.0),
                    uv: Point2::new(0.0, 0.0),
                    primitive_id: 0,
                    t_hit: t,
                    error_bound: 1e-4,
                },
                material: self.material,
                emitter: None,
            })
        }

        fn is_occluded(&self, ray: &Ray) -> bool {
            self.trace(ray).is_some()
        }

        fn leaves_scene(&self, ray: &Ray) -> bool {
            self.trace(ray).is_none()
        }
    }

    fn ceiling_light_scene() -> Scene {
        let mut scene = Scene::new(Box::new(FloorIntersector { material: 0 }));
        scene.add_material(GenericMaterial::new(MaterialParams::default()));
        let n = Vector3::new(0.0, -1.0, 0.0);
        let y = 5.0;
        let mesh = Mesh::new(vec![
            Triangle {
                p0: Point3::new(-1.0, y, -1.0),
                p1: Point3::new(1.0, y, -1.0),
                p2: Point3::new(1.0, y, 1.0),
                n0: n,
                n1: n,
                n2: n,
            },
            Triangle {
                p0: Point3::new(-1.0, y, -1.0),
                p1: Point3::new(1.0, y, 1.0),
                p2: Point3::new(-1.0, y, 1.0),
                n0: n,
                n1: n,
                n2: n,
            },
        ]);
        scene.add_emitter(Emitter::Diffuse(DiffuseEmitter::new(mesh, Color::gray(10.0))));
        scene
    }

    #[test]
    fn traced_paths_root_on_the_emitter_surface() {
        let scene = ceiling_light_scene();
        let config = RenderConfig { num_light_paths: 8, max_depth: 4, ..RenderConfig::default() };
        let cache = trace_light_paths(&scene, &config, 0);
        let mut saw_any_root = false;
        for path in 0..cache.num_paths() {
            if cache.path_len(path) == 0 {
                continue;
            }
            let root = cache.vertex(path, 0);
            assert_eq!(root.depth, 0);
            assert!((root.point.p.y - 5.0).abs() < 1e-6);
            saw_any_root = true;
        }
        assert!(saw_any_root);
    }

    #[test]
    fn third_vertex_carries_a_next_event_pdf_ancestor() {
        let scene = ceiling_light_scene();
        let config = RenderConfig { num_light_paths: 64, max_depth: 5, ..RenderConfig::default() };
        let cache = trace_light_paths(&scene, &config, 1);
        let mut saw_one = false;
        for path in 0..cache.num_paths() {
            if cache.path_len(path) >= 3 {
                let v = cache.vertex(path, 2);
                assert!(v.next_event_pdf_ancestor.is_some());
                assert!(v.next_event_pdf_ancestor.unwrap() > 0.0);
                saw_one = true;
            }
        }
        assert!(saw_one, "expected at least one path to reach depth 2 with 64 samples");
    }

    #[test]
    fn background_started_path_that_hits_geometry_gets_a_valid_root() {
        // Regression test: a background-rooted path used to compute its
        // first hit's ancestor as `vertices.len() as u32 - 1` against an
        // empty `vertices`, underflowing. A scene with both a background
        // and a floor (unlike the open-sky scenarios elsewhere, whose
        // intersector never reports a hit) forces that code path.
        let mut scene = Scene::new(Box::new(FloorIntersector { material: 0 }));
        scene.add_material(GenericMaterial::new(MaterialParams::default()));
        scene.with_background(Box::new(crate::background::UniformBackground::new(Color::gray(1.0))));
        scene.set_bounds(Point3::new(0.0, 5.0, 0.0), 20.0);
        scene.prepare().expect("scene with only a background must prepare");

        let config = RenderConfig { num_light_paths: 64, max_depth: 4, ..RenderConfig::default() };
        let cache = trace_light_paths(&scene, &config, 0);

        let mut saw_background_root = false;
        let mut saw_surface_hit = false;
        for path in 0..cache.num_paths() {
            let len = cache.path_len(path);
            if len == 0 {
                continue;
            }
            let root = cache.vertex(path, 0);
            assert_eq!(root.material, ROOT_MATERIAL);
            assert_eq!(root.depth, 0);
            saw_background_root = true;

            for i in 0..len {
                let v = cache.vertex(path, i);
                assert!(v.ancestor < i || i == 0, "vertex {} in path {} has out-of-range ancestor {}", i, path, v.ancestor);
                if i > 0 && v.material != ROOT_MATERIAL {
                    saw_surface_hit = true;
                }
            }
        }
        assert!(saw_background_root, "expected at least one background-started path to be recorded");
        assert!(saw_surface_hit, "expected at least one background-started path to reach the floor with 64 samples");
    }

    #[test]
    fn ancestor_pdf_to_ancestor_is_filled_in_one_step_late() {
        let scene = ceiling_light_scene();
        let config = RenderConfig { num_light_paths: 64, max_depth: 5, ..RenderConfig::default() };
        let cache = trace_light_paths(&scene, &config, 2);
        for path in 0..cache.num_paths() {
            let len = cache.path_len(path);
            if len < 2 {
                continue;
            }
            // Every non-terminal vertex except the very last should have
            // had its reverse pdf filled by the successor that followed it.
            for i in 0..len - 1 {
                let v = cache.vertex(path, i);
                assert!(v.pdf_to_ancestor >= 0.0);
            }
        }
    }
}

//! Generic random-walk engine (spec.md §4.5). A template method: intersect,
//! report the hit, sample a continuation direction from the material,
//! update throughput, loop. Termination is by depth in the core spec;
//! Russian roulette is an optional extension point (spec.md §9 Open
//! Question, `RenderConfig::russian_roulette`).

use cgmath::{Point2, Vector3};

use crate::background::Background;
use crate::color::Color;
use crate::emitter::Emitter;
use crate::float::Float;
use crate::geometry::Ray;
use crate::sampling::{self, Rng, ShadingFrame};
use crate::scene::{Hit, Scene};

/// A successfully intersected vertex of the walk, with its forward pdf
/// already converted to area measure (spec.md §3 "Path vertex").
pub struct WalkVertex {
    pub hit: Hit,
    pub pdf_from_ancestor: Float,
    pub throughput: Color,
    pub depth: u32,
}

pub enum WalkStep {
    Continue,
    Stop,
}

/// Callbacks driven by [`walk`]. `on_hit` is called once per intersected
/// vertex; `on_continue` fills in the *ancestor's* reverse pdf exactly one
/// step late, once the new vertex's position and normal make the area
/// conversion possible (spec.md §3 "Camera path" invariant: "reverse pdf
/// at position i is set only after the walk has advanced past vertex
/// i+1").
pub trait WalkObserver {
    fn on_hit(&mut self, vertex: &WalkVertex) -> WalkStep;
    fn on_continue(&mut self, ancestor_depth: u32, pdf_to_ancestor: Float);
    fn on_invalid_hit(&mut self, depth: u32);
}

/// Initial conditions for a walk (spec.md §4.5 "Two starts").
pub struct WalkStart {
    pub ray: Ray,
    pub pdf_area: Float,
    pub weight: Color,
}

pub fn start_from_camera(scene: &Scene, film_pos: Point2<Float>, rng: &mut Rng) -> Option<WalkStart> {
    let camera = scene.camera.as_ref()?;
    let g = camera.generate_ray(film_pos, rng);
    Some(WalkStart { ray: g.ray, pdf_area: g.pdf_area, weight: g.weight })
}

pub fn start_from_emitter(emitter: &Emitter, rng: &mut Rng) -> WalkStart {
    let sample = emitter.sample_ray(rng.next_float2(), rng.next_float2());
    WalkStart { ray: sample.ray, pdf_area: sample.pdf_area, weight: sample.weight }
}

pub fn start_from_background(background: &dyn Background, rng: &mut Rng) -> WalkStart {
    let sample = background.sample_ray(rng.next_float2(), rng.next_float2());
    WalkStart { ray: sample.ray, pdf_area: sample.pdf, weight: sample.weight }
}

fn apply_russian_roulette(throughput: Color, depth: u32, rr: Option<Float>, rng: &mut Rng) -> Option<Color> {
    let start_prob = match rr {
        None => return Some(throughput),
        Some(p) => p,
    };
    if depth < 3 {
        return Some(throughput);
    }
    let survival = throughput.luma().clamp(start_prob, 1.0);
    if survival <= 0.0 {
        return None;
    }
    if rng.next_float() < survival {
        Some(throughput / survival)
    } else {
        None
    }
}

/// Drive the walk to completion, calling back into `observer` per vertex.
/// `is_on_light_subpath` is threaded through to every BSDF call so
/// non-reciprocal lobes (microfacet transmission) shade correctly.
pub fn walk(
    scene: &Scene,
    start: WalkStart,
    max_depth: u32,
    is_on_light_subpath: bool,
    russian_roulette: Option<Float>,
    rng: &mut Rng,
    observer: &mut dyn WalkObserver,
) {
    let mut ray = start.ray;
    let mut throughput = start.weight;
    let mut pending_pdf = start.pdf_area;
    let mut pending_reverse_solid_angle: Option<Float> = None;
    let mut prev_hit: Option<Hit> = None;
    let mut depth = 1u32;

    loop {
        let hit = match scene.intersector.trace(&ray) {
            Some(h) => h,
            None => {
                observer.on_invalid_hit(depth);
                break;
            }
        };

        let pdf_from_ancestor = match &prev_hit {
            Some(prev) => pending_pdf * sampling::surface_area_to_solid_angle(prev.point.p, hit.point.p, hit.point.ns),
            None => pending_pdf,
        };

        if let (Some(prev), Some(rev_solid_angle)) = (&prev_hit, pending_reverse_solid_angle) {
            let pdf_to_ancestor = rev_solid_angle * sampling::surface_area_to_solid_angle(hit.point.p, prev.point.p, prev.point.ns);
            observer.on_continue(depth - 1, pdf_to_ancestor);
        }

        if !pdf_from_ancestor.is_finite() || pdf_from_ancestor <= 0.0 {
            observer.on_invalid_hit(depth);
            break;
        }

        let vertex = WalkVertex { hit: hit.clone(), pdf_from_ancestor, throughput, depth };
        if matches!(observer.on_hit(&vertex), WalkStep::Stop) || depth >= max_depth {
            break;
        }

        let frame = ShadingFrame::new(hit.point.ns);
        let out_dir_local = frame.world_to_shading(-ray.dir);
        let material = &scene.materials[hit.material];

        let sample = match material.sample(out_dir_local, is_on_light_subpath, rng.next_float2()) {
            Some(s) if s.pdf_forward > 0.0 => s,
            _ => break,
        };
        let bsdf_value = material.evaluate(out_dir_local, sample.in_dir, is_on_light_subpath);
        if bsdf_value.is_black() {
            break;
        }
        let cos_in = sampling::abs_cos_theta(sample.in_dir);
        let stepped = (throughput * bsdf_value * cos_in) / sample.pdf_forward;
        if !stepped.is_finite() {
            break;
        }
        let stepped = match apply_russian_roulette(stepped, depth, russian_roulette, rng) {
            Some(t) => t,
            None => break,
        };

        let in_dir_world = frame.shading_to_world(sample.in_dir);
        ray = Ray::spawn(&hit.point, in_dir_world);
        throughput = stepped;
        pending_pdf = sample.pdf_forward;
        pending_reverse_solid_angle = Some(sample.pdf_reverse);
        prev_hit = Some(hit);
        depth += 1;
    }
}

/// Cosine at the shading normal between the incoming ray and outgoing
/// direction; exposed for integrators that need it outside the walk loop
/// (e.g. to bias a spawned shadow ray).
pub fn shading_cosine(normal: Vector3<Float>, dir: Vector3<Float>) -> Float {
    normal.dot(dir).abs()
}

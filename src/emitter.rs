//! Area-light emitters (spec.md §4.4). The environment is a distinct
//! collaborator (`background::Background`, spec.md §6.1) reached through
//! its own trait — only mesh-backed diffuse lights live in the scene's
//! emitter arena.

use cgmath::prelude::*;
use cgmath::{Point3, Vector3};

use crate::color::Color;
use crate::consts;
use crate::float::Float;
use crate::geometry::Ray;
use crate::mesh::Mesh;
use crate::sampling::{self, ShadingFrame};

/// Result of [`DiffuseEmitter::sample_area`]: enough to evaluate emission,
/// shadow-test, and invert the sample.
#[derive(Clone, Copy, Debug)]
pub struct AreaSample {
    pub triangle: usize,
    pub point: Point3<Float>,
    pub shading_normal: Vector3<Float>,
    pub geometric_normal: Vector3<Float>,
    pub pdf: Float,
}

/// Result of [`DiffuseEmitter::sample_ray`].
#[derive(Clone, Debug)]
pub struct RaySample {
    pub ray: Ray,
    pub weight: Color,
    pub pdf_area: Float,
    pub pdf_dir: Float,
}

#[derive(Clone, Debug)]
pub struct DiffuseEmitter {
    pub mesh: Mesh,
    pub radiance: Color,
}

impl DiffuseEmitter {
    pub fn new(mesh: Mesh, radiance: Color) -> Self {
        Self { mesh, radiance }
    }

    /// Radiance leaving `point` towards `outgoing`, zero outside the front
    /// hemisphere of the shading normal (spec.md §4.4).
    pub fn emitted_radiance(&self, shading_normal: Vector3<Float>, outgoing: Vector3<Float>) -> Color {
        if shading_normal.dot(outgoing) > 0.0 {
            self.radiance
        } else {
            Color::black()
        }
    }

    /// Uniform-area pdf, independent of any reference point — this
    /// invariant is load-bearing (spec.md §9 possible-bug note): `EmitterHit`
    /// queries it with a zero-initialized "previous point" and relies on
    /// the result not depending on that argument.
    pub fn pdf_area(&self) -> Float {
        1.0 / self.mesh.surface_area()
    }

    pub fn sample_area(&self, u: (Float, Float)) -> AreaSample {
        let (triangle, point, shading_normal, geometric_normal, pdf) = self.mesh.sample_area(u);
        AreaSample { triangle, point, shading_normal, geometric_normal, pdf }
    }

    pub fn sample_area_inverse(&self, sample: &AreaSample) -> (Float, Float) {
        self.mesh.sample_area_inverse(sample.triangle, sample.point)
    }

    /// Directional pdf implied by emission sampling: uniform area times a
    /// cosine-hemisphere direction pdf (spec.md §4.4).
    pub fn pdf_ray(&self, cos_theta: Float) -> Float {
        self.pdf_area() * cos_theta.max(0.0) * consts::FRAC_1_PI
    }

    /// Samples an emission point and a cosine-weighted direction in its
    /// local frame. `Weight = radiance * pi / posPdf` — the outgoing
    /// cosine cancels against the cosine-hemisphere direction pdf.
    pub fn sample_ray(&self, u_area: (Float, Float), u_dir: (Float, Float)) -> RaySample {
        let area = self.sample_area(u_area);
        let frame = ShadingFrame::new(area.shading_normal);
        let (local_dir, pdf_dir) = sampling::to_cos_hemisphere(u_dir.0, u_dir.1);
        let dir = frame.shading_to_world(local_dir);
        let ray = Ray::new(area.point + area.geometric_normal * consts::EPSILON * dir.dot(area.geometric_normal).signum(), dir);
        let weight = self.radiance * (consts::PI / area.pdf);
        RaySample { ray, weight, pdf_area: area.pdf, pdf_dir }
    }

    /// Mathematical inverse of [`DiffuseEmitter::sample_ray`].
    pub fn sample_ray_inverse(&self, sample: &AreaSample, dir: Vector3<Float>) -> ((Float, Float), (Float, Float)) {
        let frame = ShadingFrame::new(sample.shading_normal);
        let local_dir = frame.world_to_shading(dir);
        let u_dir = sampling::from_cos_hemisphere(local_dir);
        (self.sample_area_inverse(sample), u_dir)
    }

    pub fn total_power(&self) -> Color {
        self.radiance * (consts::PI * self.mesh.surface_area())
    }
}

/// Tagged emitter variants (spec.md §9 "tagged variants for the closed
/// set"). Only `Diffuse` exists today; the enum leaves room for future
/// emitter kinds (e.g. point/spot lights) without disturbing callers that
/// already match on it exhaustively.
#[derive(Clone, Debug)]
pub enum Emitter {
    Diffuse(DiffuseEmitter),
}

impl Emitter {
    pub fn emitted_radiance(&self, shading_normal: Vector3<Float>, outgoing: Vector3<Float>) -> Color {
        match self {
            Emitter::Diffuse(e) => e.emitted_radiance(shading_normal, outgoing),
        }
    }

    pub fn pdf_area(&self) -> Float {
        match self {
            Emitter::Diffuse(e) => e.pdf_area(),
        }
    }

    pub fn sample_area(&self, u: (Float, Float)) -> AreaSample {
        match self {
            Emitter::Diffuse(e) => e.sample_area(u),
        }
    }

    pub fn sample_area_inverse(&self, sample: &AreaSample) -> (Float, Float) {
        match self {
            Emitter::Diffuse(e) => e.sample_area_inverse(sample),
        }
    }

    pub fn pdf_ray(&self, cos_theta: Float) -> Float {
        match self {
            Emitter::Diffuse(e) => e.pdf_ray(cos_theta),
        }
    }

    pub fn sample_ray(&self, u_area: (Float, Float), u_dir: (Float, Float)) -> RaySample {
        match self {
            Emitter::Diffuse(e) => e.sample_ray(u_area, u_dir),
        }
    }

    pub fn total_power(&self) -> Color {
        match self {
            Emitter::Diffuse(e) => e.total_power(),
        }
    }
}

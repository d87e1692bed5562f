//! The environment collaborator (spec.md §4.4, §6.1). Image-based
//! importance-sampled environment maps are explicitly out of scope
//! (spec.md §1); this module defines the trait external implementations
//! plug into, plus a constant-radiance reference implementation used by
//! this crate's own tests and the white-furnace scenario.

use cgmath::{Point3, Vector3};

use crate::color::Color;
use crate::consts;
use crate::float::Float;
use crate::geometry::Ray;
use crate::sampling;

/// Result of [`Background::sample_direction`].
#[derive(Clone, Copy, Debug)]
pub struct DirectionSample {
    pub dir: Vector3<Float>,
    pub pdf: Float,
    pub weight: Color,
}

/// Result of [`Background::sample_ray`]: a ray starting on the scene's
/// bounding sphere, pointed inward.
#[derive(Clone, Debug)]
pub struct BackgroundRaySample {
    pub ray: Ray,
    pub weight: Color,
    pub pdf: Float,
}

/// The environment/background collaborator (spec.md §6.1). Rays emitted
/// from the background originate on the scene's bounding sphere, so
/// `Background::prepare` receives the scene center and radius once, at
/// `Scene::prepare` time.
pub trait Background: Send + Sync {
    fn prepare(&mut self, scene_center: Point3<Float>, scene_radius: Float);

    fn sample_direction(&self, u: (Float, Float)) -> DirectionSample;
    fn direction_pdf(&self, dir: Vector3<Float>) -> Float;

    /// `SampleRay`: area pdf on the bounding sphere times the direction
    /// pdf, returned together as a single ray-space pdf (spec.md §4.4:
    /// `pdf_dir * 1/(pi * R^2)`).
    fn sample_ray(&self, u_pos: (Float, Float), u_dir: (Float, Float)) -> BackgroundRaySample;
    fn ray_pdf(&self, point: Point3<Float>, dir: Vector3<Float>) -> Float;

    fn emitted_radiance(&self, dir: Vector3<Float>) -> Color;
}

/// Reference `Background`: uniform directional sampling, constant
/// radiance. Exists so the integrator, its property tests, and the
/// white-furnace end-to-end scenario (spec.md §8 #3) are runnable without
/// an external environment-importance-table collaborator — it is a
/// stand-in, not the product surface (spec.md §4.4 [SUPPLEMENT]).
#[derive(Clone, Copy, Debug)]
pub struct UniformBackground {
    pub radiance: Color,
    scene_center: Point3<Float>,
    scene_radius: Float,
}

impl UniformBackground {
    pub fn new(radiance: Color) -> Self {
        Self { radiance, scene_center: Point3::new(0.0, 0.0, 0.0), scene_radius: 1.0 }
    }
}

impl Background for UniformBackground {
    fn prepare(&mut self, scene_center: Point3<Float>, scene_radius: Float) {
        self.scene_center = scene_center;
        self.scene_radius = scene_radius.max(consts::EPSILON);
    }

    fn sample_direction(&self, u: (Float, Float)) -> DirectionSample {
        let dir = sampling::uniform_sample_sphere(u.0, u.1);
        let pdf = sampling::uniform_sphere_pdf();
        DirectionSample { dir, pdf, weight: self.radiance / pdf }
    }

    fn direction_pdf(&self, _dir: Vector3<Float>) -> Float {
        sampling::uniform_sphere_pdf()
    }

    fn sample_ray(&self, u_pos: (Float, Float), u_dir: (Float, Float)) -> BackgroundRaySample {
        let origin_dir = sampling::uniform_sample_sphere(u_pos.0, u_pos.1);
        let origin = self.scene_center + origin_dir * self.scene_radius;
        let dir = -origin_dir;
        let pdf_dir = sampling::uniform_sphere_pdf();
        let pdf_pos = 1.0 / (consts::PI * self.scene_radius * self.scene_radius);
        BackgroundRaySample { ray: Ray::new(origin, dir), weight: self.radiance / (pdf_dir * pdf_pos).max(1e-12), pdf: pdf_dir * pdf_pos }
    }

    fn ray_pdf(&self, _point: Point3<Float>, _dir: Vector3<Float>) -> Float {
        sampling::uniform_sphere_pdf() / (consts::PI * self.scene_radius * self.scene_radius)
    }

    fn emitted_radiance(&self, _dir: Vector3<Float>) -> Color {
        self.radiance
    }
}

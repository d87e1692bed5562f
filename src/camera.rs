//! A pinhole camera (spec.md §4.4, §6.1), grounded in the teacher's
//! `Camera`/`PTCamera` importance function (`we`, `pdf_dir`, `clip_pos`)
//! but reworked as a value implementing the [`crate::scene::Camera`]
//! collaborator trait instead of a concrete renderer type.

use cgmath::prelude::*;
use cgmath::{Point2, Point3, Vector3};

use crate::color::Color;
use crate::consts;
use crate::float::{Float, ToFloat};
use crate::geometry::Ray;
use crate::sampling::Rng;
use crate::scene::{Camera, CameraResponse, GeneratedRay};

/// A distortion-free pinhole camera with a rectangular film. The lens is a
/// single point, so unlike [`crate::emitter::DiffuseEmitter`] there is no
/// positional pdf to sample: every generated ray has `pdf_area = 1` and an
/// importance weight of exactly one (spec.md §4.4 "Camera"; derivation
/// below).
#[derive(Clone, Debug)]
pub struct PinholeCamera {
    position: Point3<Float>,
    forward: Vector3<Float>,
    right: Vector3<Float>,
    up: Vector3<Float>,
    width: u32,
    height: u32,
    tan_half_fov_x: Float,
    tan_half_fov_y: Float,
    /// Area of the virtual image plane at unit distance, `4 * tanX * tanY`.
    area: Float,
}

impl PinholeCamera {
    /// `fov_y` is the full vertical field of view, in radians.
    pub fn new(position: Point3<Float>, look_at: Point3<Float>, up_hint: Vector3<Float>, fov_y: Float, width: u32, height: u32) -> Self {
        let forward = (look_at - position).normalize();
        let right = forward.cross(up_hint).normalize();
        let up = right.cross(forward);
        let tan_half_fov_y = (fov_y / 2.0).tan();
        let aspect = width.to_float() / height.to_float();
        let tan_half_fov_x = tan_half_fov_y * aspect;
        let area = 4.0 * tan_half_fov_x * tan_half_fov_y;
        Self { position, forward, right, up, width, height, tan_half_fov_x, tan_half_fov_y, area }
    }

    fn to_local(&self, dir: Vector3<Float>) -> Vector3<Float> {
        Vector3::new(dir.dot(self.right), dir.dot(self.up), dir.dot(self.forward))
    }

    fn film_to_dir(&self, film_pos: Point2<Float>) -> Vector3<Float> {
        let ndc_x = (film_pos.x / self.width.to_float()) * 2.0 - 1.0;
        let ndc_y = 1.0 - (film_pos.y / self.height.to_float()) * 2.0;
        let local = Vector3::new(ndc_x * self.tan_half_fov_x, ndc_y * self.tan_half_fov_y, 1.0);
        (self.right * local.x + self.up * local.y + self.forward * local.z).normalize()
    }

    /// `None` if `dir` does not land inside the film rectangle. Returns the
    /// cosine at the camera together with the plane-local `(x, y)`
    /// coordinates, shared by `world_to_film` and `we`/`pdf_dir`.
    fn ndc_for_dir(&self, dir: Vector3<Float>) -> Option<(Float, Float, Float)> {
        let local = self.to_local(dir);
        let cos_theta = local.z;
        if cos_theta <= consts::EPSILON {
            return None;
        }
        let ndc_x = local.x / cos_theta;
        let ndc_y = local.y / cos_theta;
        if ndc_x.abs() > self.tan_half_fov_x || ndc_y.abs() > self.tan_half_fov_y {
            return None;
        }
        Some((cos_theta, ndc_x, ndc_y))
    }

    fn pixel_for_ndc(&self, ndc_x: Float, ndc_y: Float) -> (u32, u32) {
        let px = ((ndc_x / self.tan_half_fov_x + 1.0) * 0.5 * self.width.to_float()).floor();
        let py = ((1.0 - ndc_y / self.tan_half_fov_y) * 0.5 * self.height.to_float()).floor();
        (px.clamp(0.0, (self.width - 1).to_float()) as u32, py.clamp(0.0, (self.height - 1).to_float()) as u32)
    }

    /// The pinhole importance function `We(dir)` (spec.md §4.4), zero
    /// outside the frustum.
    fn we(&self, cos_theta: Float) -> Float {
        1.0 / (self.area * cos_theta.powi(4))
    }

    /// Solid-angle pdf of sampling `dir` by uniformly sampling the film
    /// (spec.md §4.4), zero outside the frustum.
    fn pdf_dir(&self, cos_theta: Float) -> Float {
        1.0 / (self.area * cos_theta.powi(3))
    }
}

impl Camera for PinholeCamera {
    fn generate_ray(&self, film_pos: Point2<Float>, _rng: &mut Rng) -> GeneratedRay {
        let dir = self.film_to_dir(film_pos);
        // We(dir) * cos_theta / pdf_dir(dir) == 1 identically for a pinhole
        // camera: the importance function and the uniform-over-film sampling
        // pdf are reciprocal by construction, exactly as a cosine-weighted
        // hemisphere sample cancels a Lambertian BRDF's cosine term.
        GeneratedRay { ray: Ray::new(self.position, dir), pdf_area: 1.0, weight: Color::white() }
    }

    fn sample_response(&self, point: Point3<Float>, _rng: &mut Rng) -> Option<CameraResponse> {
        let delta = point - self.position;
        let dist2 = delta.magnitude2();
        if dist2 <= 0.0 {
            return None;
        }
        let dist = dist2.sqrt();
        let dir = delta / dist;
        let (cos_theta, ndc_x, ndc_y) = self.ndc_for_dir(dir)?;
        let pixel = self.pixel_for_ndc(ndc_x, ndc_y);
        let we = self.we(cos_theta);
        // Bundles the camera-side geometry term (cos_theta / dist^2) into
        // the response weight, the way `DiffuseEmitter::sample_ray` bundles
        // its positional pdf conversion into its returned weight: callers
        // only need to supply the light-path vertex's own cosine and BSDF.
        let weight = Color::white() * (we * cos_theta / dist2);
        Some(CameraResponse { pixel, pdf_emit: self.pdf_dir(cos_theta), weight })
    }

    fn world_to_film(&self, point: Point3<Float>) -> Option<Point2<Float>> {
        let delta = point - self.position;
        let dist = delta.magnitude();
        if dist <= 0.0 {
            return None;
        }
        let (_, ndc_x, ndc_y) = self.ndc_for_dir(delta / dist)?;
        let (px, py) = self.pixel_for_ndc(ndc_x, ndc_y);
        Some(Point2::new(px.to_float(), py.to_float()))
    }

    fn solid_angle_to_pixel_jacobian(&self, dir: Vector3<Float>) -> Float {
        match self.ndc_for_dir(dir) {
            Some((cos_theta, _, _)) => (self.area * cos_theta.powi(3)) / (self.width.to_float() * self.height.to_float()),
            None => 0.0,
        }
    }

    fn position(&self) -> Point3<Float> {
        self.position
    }
}

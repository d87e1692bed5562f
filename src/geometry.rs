//! Rays and intersected surface points (spec.md §3 "Surface point", "Ray").

use cgmath::prelude::*;
use cgmath::{Point2, Point3, Vector3};

use crate::consts;
use crate::float::Float;

#[derive(Clone, Debug)]
pub struct Ray {
    pub origin: Point3<Float>,
    pub dir: Vector3<Float>,
    /// Minimum travel distance; strictly positive for rays spawned from a
    /// surface (spec.md §3 "Ray" invariant).
    pub t_min: Float,
    pub t_max: Float,
}

impl Ray {
    pub fn new(origin: Point3<Float>, dir: Vector3<Float>) -> Self {
        Self { origin, dir, t_min: 0.0, t_max: consts::INFINITY }
    }

    /// A ray leaving `from` (already offset along its error bound) towards
    /// `dir`, used for continuing a random walk.
    pub fn spawn(from: &SurfacePoint, dir: Vector3<Float>) -> Self {
        let origin = from.offset_origin(dir);
        Self { origin, dir, t_min: consts::EPSILON, t_max: consts::INFINITY }
    }

    /// A finite shadow ray between two surface points, biased off both
    /// ends to avoid self-intersection.
    pub fn shadow(from: &SurfacePoint, to: Point3<Float>) -> Self {
        let dp = to - from.p;
        let dist = dp.magnitude();
        let dir = dp / dist;
        let origin = from.offset_origin(dir);
        Self { origin, dir, t_min: consts::EPSILON, t_max: dist - consts::EPSILON }
    }

    /// A finite shadow ray between two surface points, biased off both ends.
    pub fn shadow_between(from: &SurfacePoint, to: &SurfacePoint) -> Self {
        let dp = to.p - from.p;
        let dist = dp.magnitude();
        let dir = dp / dist;
        let origin = from.offset_origin(dir);
        let target = to.offset_origin(-dir);
        let trimmed = (target - origin).magnitude();
        Self { origin, dir, t_min: consts::EPSILON, t_max: trimmed.max(0.0) }
    }

    pub fn at(&self, t: Float) -> Point3<Float> {
        self.origin + t * self.dir
    }
}

/// An intersected surface location (spec.md §3 "Surface point").
///
/// Invariant: `ns` is unit length; `ng` is unit length and faces outward
/// (i.e. away from the side the ray entered from, per the owning
/// `Intersector`'s convention).
#[derive(Clone, Debug)]
pub struct SurfacePoint {
    pub p: Point3<Float>,
    pub ng: Vector3<Float>,
    pub ns: Vector3<Float>,
    pub uv: Point2<Float>,
    pub primitive_id: u32,
    pub t_hit: Float,
    /// Numerical error bound used to displace spawned rays off the surface.
    pub error_bound: Float,
}

impl SurfacePoint {
    /// Displace a ray origin at this point along the geometric normal on
    /// the same side as `dir`, so continuation/shadow rays do not
    /// self-intersect (spec.md §3 "Surface point").
    pub fn offset_origin(&self, dir: Vector3<Float>) -> Point3<Float> {
        let sign = if self.ng.dot(dir) >= 0.0 { 1.0 } else { -1.0 };
        self.p + sign * self.error_bound.max(consts::EPSILON) * self.ng
    }
}

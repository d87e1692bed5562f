//! Minimal triangle-mesh storage backing `DiffuseEmitter` area sampling
//! (spec.md §4.4). Rasterization, acceleration structures and texture
//! lookups are the `Intersector`'s concern, not this crate's (spec.md §1).

use cgmath::prelude::*;
use cgmath::{Point3, Vector3};

use crate::float::Float;

#[derive(Clone, Copy, Debug)]
pub struct Triangle {
    pub p0: Point3<Float>,
    pub p1: Point3<Float>,
    pub p2: Point3<Float>,
    pub n0: Vector3<Float>,
    pub n1: Vector3<Float>,
    pub n2: Vector3<Float>,
}

impl Triangle {
    pub fn area(&self) -> Float {
        0.5 * (self.p1 - self.p0).cross(self.p2 - self.p0).magnitude()
    }

    /// Barycentric sample via `sqrt(u.x)` (Shirley's low-distortion map).
    /// Returns `(point, interpolated shading normal, geometric normal)`.
    fn sample(&self, u: (Float, Float)) -> (Point3<Float>, Vector3<Float>, Vector3<Float>) {
        let (b0, b1) = barycentric_from_u(u);
        let b2 = 1.0 - b0 - b1;
        let p = Point3::new(
            b0 * self.p0.x + b1 * self.p1.x + b2 * self.p2.x,
            b0 * self.p0.y + b1 * self.p1.y + b2 * self.p2.y,
            b0 * self.p0.z + b1 * self.p1.z + b2 * self.p2.z,
        );
        let ns = (b0 * self.n0 + b1 * self.n1 + b2 * self.n2).normalize();
        let ng = (self.p1 - self.p0).cross(self.p2 - self.p0).normalize();
        (p, ns, ng)
    }
}

fn barycentric_from_u(u: (Float, Float)) -> (Float, Float) {
    let sqrt_u0 = u.0.max(0.0).sqrt();
    let b0 = 1.0 - sqrt_u0;
    let b1 = u.1 * sqrt_u0;
    (b0, b1)
}

/// Inverse of [`Triangle::sample`]'s barycentric map.
fn barycentric_to_u(b0: Float, b1: Float) -> (Float, Float) {
    let sqrt_u0 = (1.0 - b0).clamp(0.0, 1.0);
    let u0 = sqrt_u0 * sqrt_u0;
    let u1 = if sqrt_u0 > 1e-12 { (b1 / sqrt_u0).clamp(0.0, 1.0) } else { 0.0 };
    (u0, u1)
}

/// An append-only collection of triangles with a discrete-cumulative-area
/// table for uniform-area sampling.
#[derive(Clone, Debug)]
pub struct Mesh {
    triangles: Vec<Triangle>,
    cumulative_area: Vec<Float>,
    total_area: Float,
}

impl Mesh {
    pub fn new(triangles: Vec<Triangle>) -> Self {
        let mut cumulative_area = Vec::with_capacity(triangles.len());
        let mut acc = 0.0;
        for t in &triangles {
            acc += t.area();
            cumulative_area.push(acc);
        }
        Self { triangles, cumulative_area, total_area: acc }
    }

    pub fn surface_area(&self) -> Float {
        self.total_area
    }

    pub fn triangle(&self, index: usize) -> &Triangle {
        &self.triangles[index]
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    fn triangle_index_for(&self, target_area: Float) -> usize {
        match self.cumulative_area.binary_search_by(|a| a.partial_cmp(&target_area).unwrap()) {
            Ok(i) | Err(i) => i.min(self.triangles.len() - 1),
        }
    }

    /// Uniform-area sample: `(triangle index, point, shading normal,
    /// geometric normal, pdf)`. `pdf` is constant: `1 / SurfaceArea`.
    pub fn sample_area(&self, u: (Float, Float)) -> (usize, Point3<Float>, Vector3<Float>, Vector3<Float>, Float) {
        debug_assert!(!self.triangles.is_empty());
        let target = u.0 * self.total_area;
        let index = self.triangle_index_for(target);
        let prev = if index == 0 { 0.0 } else { self.cumulative_area[index - 1] };
        let span = (self.cumulative_area[index] - prev).max(1e-12);
        let local_u0 = ((target - prev) / span).clamp(0.0, 1.0 - Float::EPSILON);
        let (p, ns, ng) = self.triangles[index].sample((local_u0, u.1));
        (index, p, ns, ng, 1.0 / self.total_area)
    }

    /// Mathematical inverse of [`Mesh::sample_area`], given the triangle
    /// the point lies on.
    pub fn sample_area_inverse(&self, index: usize, point: Point3<Float>) -> (Float, Float) {
        let t = &self.triangles[index];
        let b0 = barycentric_of(t, point);
        let (local_u0, u1) = barycentric_to_u(b0.0, b0.1);
        let prev = if index == 0 { 0.0 } else { self.cumulative_area[index - 1] };
        let span = (self.cumulative_area[index] - prev).max(1e-12);
        let u0 = ((prev + local_u0 * span) / self.total_area).clamp(0.0, 1.0 - Float::EPSILON);
        (u0, u1)
    }
}

fn barycentric_of(t: &Triangle, p: Point3<Float>) -> (Float, Float) {
    let v0 = t.p1 - t.p0;
    let v1 = t.p2 - t.p0;
    let v2 = p - t.p0;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < 1e-18 {
        return (1.0, 0.0);
    }
    let b1 = (d11 * d20 - d01 * d21) / denom;
    let b2 = (d00 * d21 - d01 * d20) / denom;
    (1.0 - b1 - b2, b1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_quad() -> Mesh {
        let n = Vector3::new(0.0, 0.0, 1.0);
        Mesh::new(vec![
            Triangle {
                p0: Point3::new(0.0, 0.0, 0.0),
                p1: Point3::new(1.0, 0.0, 0.0),
                p2: Point3::new(1.0, 1.0, 0.0),
                n0: n,
                n1: n,
                n2: n,
            },
            Triangle {
                p0: Point3::new(0.0, 0.0, 0.0),
                p1: Point3::new(1.0, 1.0, 0.0),
                p2: Point3::new(0.0, 1.0, 0.0),
                n0: n,
                n1: n,
                n2: n,
            },
        ])
    }

    #[test]
    fn surface_area_matches_two_triangles() {
        let mesh = unit_quad();
        assert_relative_eq!(mesh.surface_area(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn sample_area_inverse_recovers_primary_sample() {
        let mesh = unit_quad();
        for u in [(0.1, 0.2), (0.5, 0.5), (0.9, 0.01), (0.3, 0.99)] {
            let (index, p, _, _, _) = mesh.sample_area(u);
            let (u0, u1) = mesh.sample_area_inverse(index, p);
            assert_relative_eq!(u0, u.0, epsilon = 1e-4);
            assert_relative_eq!(u1, u.1, epsilon = 1e-4);
        }
    }

    #[test]
    fn pdf_area_is_reciprocal_of_surface_area() {
        let mesh = unit_quad();
        let (_, _, _, _, pdf) = mesh.sample_area((0.37, 0.81));
        assert_relative_eq!(pdf, 1.0 / mesh.surface_area(), epsilon = 1e-9);
    }
}

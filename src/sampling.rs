//! Sampling primitives: the hash-based RNG, hemisphere/disc warps,
//! shading-space trig helpers and the area<->solid-angle Jacobian
//! (spec.md §4.1).

use cgmath::prelude::*;
use cgmath::{Point3, Vector3};

use crate::consts;
use crate::float::Float;

/// Counter-based hash RNG (SplitMix64). Deterministic given its seed, so
/// that two renders with identical `(base_seed, stream, sequence)` triples
/// draw identical numbers regardless of thread scheduling (spec.md §6.3).
#[derive(Clone, Debug)]
pub struct Rng {
    state: u64,
}

impl Rng {
    /// `stream` separates uncorrelated sequences (e.g. camera vs. light
    /// paths); `sequence` is the per-path/per-pixel index within a stream.
    pub fn new(base_seed: u64, stream: u64, sequence: u64) -> Self {
        let mixed = Self::mix(base_seed ^ Self::mix(stream.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ sequence));
        Self { state: mixed }
    }

    fn mix(mut z: u64) -> u64 {
        z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        Self::mix(self.state)
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_float(&mut self) -> Float {
        // Top 53 bits give a uniform f64 in [0, 1).
        let bits = self.next_u64() >> 11;
        (bits as Float) * (1.0 / (1u64 << 53) as Float)
    }

    pub fn next_float2(&mut self) -> (Float, Float) {
        (self.next_float(), self.next_float())
    }

    pub fn next_float3(&mut self) -> (Float, Float, Float) {
        (self.next_float(), self.next_float(), self.next_float())
    }

    /// Uniform integer in `[lo, hi)`.
    pub fn next_int(&mut self, lo: usize, hi: usize) -> usize {
        debug_assert!(hi > lo);
        lo + (self.next_float() * (hi - lo) as Float) as usize
    }
}

/// Map `(u, v)` in `[0,1)^2` to a direction on the positive-z hemisphere
/// with density `cos(theta) / pi` (spec.md §4.1 `ToCosHemisphere`).
pub fn to_cos_hemisphere(u: Float, v: Float) -> (Vector3<Float>, Float) {
    let (dx, dy) = concentric_disc(u, v);
    let z = (1.0 - dx * dx - dy * dy).max(0.0).sqrt();
    (Vector3::new(dx, dy, z), cos_hemisphere_pdf(z))
}

pub fn cos_hemisphere_pdf(cos_theta: Float) -> Float {
    cos_theta.abs() * consts::FRAC_1_PI
}

/// Inverse of [`to_cos_hemisphere`]: recovers the primary sample that would
/// have produced `dir` (spec.md §4.1 `FromCosHemisphere`).
pub fn from_cos_hemisphere(dir: Vector3<Float>) -> (Float, Float) {
    concentric_disc_inverse(dir.x, dir.y)
}

/// Shirley-Chiu concentric disc mapping, biased towards the positive
/// hemisphere so [`to_cos_hemisphere`] stays well-conditioned near the pole.
fn concentric_disc(u: Float, v: Float) -> (Float, Float) {
    let ox = 2.0 * u - 1.0;
    let oy = 2.0 * v - 1.0;
    if ox == 0.0 && oy == 0.0 {
        return (0.0, 0.0);
    }
    let (r, theta) = if ox.abs() > oy.abs() {
        (ox, consts::PI / 4.0 * (oy / ox))
    } else {
        (oy, consts::PI / 2.0 - consts::PI / 4.0 * (ox / oy))
    };
    (r * theta.cos(), r * theta.sin())
}

fn concentric_disc_inverse(x: Float, y: Float) -> (Float, Float) {
    if x == 0.0 && y == 0.0 {
        return (0.5, 0.5);
    }
    let r = x.hypot(y);
    let angle = y.atan2(x);
    let quarter = consts::PI / 4.0;
    // Each of the four sectors below corresponds to one sign combination of
    // (branch, sign(r)) in the forward map; solve the piecewise theta(u,v)
    // relation backwards within the sector the angle falls into.
    let (ox, oy) = if angle.abs() <= quarter {
        let theta = angle;
        let ox = r;
        let oy = ox * theta * 4.0 / consts::PI;
        (ox, oy)
    } else if angle > quarter && angle <= 3.0 * quarter {
        let theta = angle;
        let oy = r;
        let ox = oy * (2.0 - 4.0 * theta / consts::PI);
        (ox, oy)
    } else if angle > 3.0 * quarter || angle <= -3.0 * quarter {
        let theta = angle - consts::PI * angle.signum();
        let ox = -r;
        let oy = ox * theta * 4.0 / consts::PI;
        (ox, oy)
    } else {
        let theta = angle + consts::PI;
        let oy = -r;
        let ox = oy * (2.0 - 4.0 * theta / consts::PI);
        (ox, oy)
    };
    (0.5 * (ox + 1.0), 0.5 * (oy + 1.0))
}

/// Branchless orthonormal basis construction (Duff et al. 2017), used to
/// build a right-handed `(tangent, binormal, normal)` frame from a single
/// normal (spec.md §4.1 `ComputeBasisVectors`).
pub fn compute_basis_vectors(normal: Vector3<Float>) -> (Vector3<Float>, Vector3<Float>) {
    let sign = (1.0_f64).copysign(normal.z as f64) as Float;
    let a = -1.0 / (sign + normal.z);
    let b = normal.x * normal.y * a;
    let tangent = Vector3::new(1.0 + sign * normal.x * normal.x * a, sign * b, -sign * normal.x);
    let binormal = Vector3::new(b, sign + normal.y * normal.y * a, -normal.y);
    (tangent, binormal)
}

/// Right-handed local frame with `+z` aligned to the shading normal.
#[derive(Clone, Copy, Debug)]
pub struct ShadingFrame {
    pub tangent: Vector3<Float>,
    pub binormal: Vector3<Float>,
    pub normal: Vector3<Float>,
}

impl ShadingFrame {
    pub fn new(normal: Vector3<Float>) -> Self {
        let (tangent, binormal) = compute_basis_vectors(normal);
        Self { tangent, binormal, normal }
    }

    pub fn world_to_shading(&self, v: Vector3<Float>) -> Vector3<Float> {
        Vector3::new(v.dot(self.tangent), v.dot(self.binormal), v.dot(self.normal))
    }

    pub fn shading_to_world(&self, v: Vector3<Float>) -> Vector3<Float> {
        v.x * self.tangent + v.y * self.binormal + v.z * self.normal
    }
}

// Shading-space trig helpers. All operate on a vector already expressed in
// the local frame, where z is the shading normal.
pub fn cos_theta(w: Vector3<Float>) -> Float {
    w.z
}

pub fn abs_cos_theta(w: Vector3<Float>) -> Float {
    w.z.abs()
}

pub fn cos2_theta(w: Vector3<Float>) -> Float {
    w.z * w.z
}

pub fn sin2_theta(w: Vector3<Float>) -> Float {
    (1.0 - cos2_theta(w)).max(0.0)
}

pub fn sin_theta(w: Vector3<Float>) -> Float {
    sin2_theta(w).sqrt()
}

pub fn tan2_theta(w: Vector3<Float>) -> Float {
    sin2_theta(w) / cos2_theta(w)
}

pub fn cos_phi(w: Vector3<Float>) -> Float {
    let s = sin_theta(w);
    if s == 0.0 { 1.0 } else { (w.x / s).clamp(-1.0, 1.0) }
}

pub fn sin_phi(w: Vector3<Float>) -> Float {
    let s = sin_theta(w);
    if s == 0.0 { 0.0 } else { (w.y / s).clamp(-1.0, 1.0) }
}

pub fn cos2_phi(w: Vector3<Float>) -> Float {
    cos_phi(w).powi(2)
}

pub fn sin2_phi(w: Vector3<Float>) -> Float {
    sin_phi(w).powi(2)
}

pub fn same_hemisphere(a: Vector3<Float>, b: Vector3<Float>) -> bool {
    a.z * b.z > 0.0
}

/// Uniform sample over the full sphere of directions; density `1/(4*pi)`.
pub fn uniform_sample_sphere(u: Float, v: Float) -> Vector3<Float> {
    let z = 1.0 - 2.0 * u;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * consts::PI * v;
    Vector3::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn uniform_sphere_pdf() -> Float {
    1.0 / (4.0 * consts::PI)
}

/// Inverse of [`uniform_sample_sphere`].
pub fn uniform_sphere_inverse(dir: Vector3<Float>) -> (Float, Float) {
    let u = (1.0 - dir.z) / 2.0;
    let mut v = dir.y.atan2(dir.x) / (2.0 * consts::PI);
    if v < 0.0 {
        v += 1.0;
    }
    (u, v)
}

/// Converts the surface-area pdf of sampling `to` into the solid-angle pdf
/// of the ray `from -> to`, measured at `from` (spec.md §4.1).
pub fn surface_area_to_solid_angle(
    from: Point3<Float>,
    to: Point3<Float>,
    normal_at_to: Vector3<Float>,
) -> Float {
    let d = from - to;
    let dist2 = d.magnitude2();
    if dist2 <= 0.0 {
        return 0.0;
    }
    let cos_to = normal_at_to.dot(d.normalize()).abs();
    cos_to / dist2
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rng_is_deterministic_for_same_seed() {
        let mut a = Rng::new(7, 1, 3);
        let mut b = Rng::new(7, 1, 3);
        for _ in 0..16 {
            assert_eq!(a.next_float(), b.next_float());
        }
    }

    #[test]
    fn rng_streams_are_uncorrelated_sequences() {
        let mut a = Rng::new(7, 1, 3);
        let mut b = Rng::new(7, 2, 3);
        let va: Vec<_> = (0..8).map(|_| a.next_float()).collect();
        let vb: Vec<_> = (0..8).map(|_| b.next_float()).collect();
        assert_ne!(va, vb);
    }

    #[test]
    fn next_float_is_in_unit_range() {
        let mut rng = Rng::new(1, 0, 0);
        for _ in 0..10_000 {
            let f = rng.next_float();
            assert!((0.0..1.0).contains(&f));
        }
    }

    #[test]
    fn basis_vectors_are_orthonormal_right_handed() {
        for normal in &[
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::new(1.0, 1.0, 1.0).normalize(),
            Vector3::new(-0.3, 0.8, -0.1).normalize(),
        ] {
            let (t, b) = compute_basis_vectors(*normal);
            assert_relative_eq!(t.magnitude(), 1.0, epsilon = 1e-9);
            assert_relative_eq!(b.magnitude(), 1.0, epsilon = 1e-9);
            assert_relative_eq!(t.dot(b), 0.0, epsilon = 1e-9);
            assert_relative_eq!(t.dot(*normal), 0.0, epsilon = 1e-9);
            assert_relative_eq!(b.dot(*normal), 0.0, epsilon = 1e-9);
            assert_relative_eq!(t.cross(b).dot(*normal), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn shading_frame_round_trips() {
        let frame = ShadingFrame::new(Vector3::new(0.2, 0.9, 0.1).normalize());
        let v = Vector3::new(1.0, -2.0, 3.0);
        let local = frame.world_to_shading(v);
        let back = frame.shading_to_world(local);
        assert_relative_eq!(back.x, v.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, v.y, epsilon = 1e-9);
        assert_relative_eq!(back.z, v.z, epsilon = 1e-9);
    }

    #[test]
    fn surface_area_to_solid_angle_matches_cosine_identity() {
        let from = Point3::new(0.0, 0.0, 0.0);
        let to = Point3::new(1.0, 1.0, 1.0);
        let normal = Vector3::new(0.0, 0.0, 1.0);
        let jacobian = surface_area_to_solid_angle(from, to, normal);
        let dir_to_from = (from - to).normalize();
        let cos_theta_b = normal.dot(dir_to_from).abs();
        let dist2 = (from - to).magnitude2();
        assert_relative_eq!(jacobian * dist2, cos_theta_b, epsilon = 1e-9);
    }
}

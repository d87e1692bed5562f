//! Shading-space BSDF lobes (spec.md §4.2). All directions passed to a
//! lobe are already expressed in the local shading frame, where `(0,0,1)`
//! is the shading normal, and point away from the surface (standard BRDF
//! convention): `out_dir` towards the previous vertex on the subpath,
//! `in_dir` towards the next one.

pub mod diffuse;
pub mod diffuse_transmission;
pub mod fresnel;
pub mod ggx;
pub mod microfacet;
pub mod retro;

use cgmath::prelude::*;
use cgmath::Vector3;

use crate::color::Color;
use crate::float::Float;
use crate::sampling;

/// A single additive term of a `GenericMaterial` (spec.md §4.2).
///
/// `is_on_light_subpath` flips non-reciprocal shading corrections (e.g. the
/// microfacet transmission radiance-compression factor); purely diffuse
/// lobes ignore it.
pub trait Lobe {
    fn eval(&self, out_dir: Vector3<Float>, in_dir: Vector3<Float>, is_on_light_subpath: bool) -> Color;

    /// Sample `in_dir` given `out_dir`. Returns `None` on a degenerate
    /// sample (spec.md §4.2 "Degenerate samples").
    fn sample(
        &self,
        out_dir: Vector3<Float>,
        is_on_light_subpath: bool,
        u: (Float, Float),
    ) -> Option<Vector3<Float>>;

    /// `(forward, reverse)` pdf: forward is the pdf of sampling `in_dir`
    /// given `out_dir`; reverse is the pdf of sampling `out_dir` given
    /// `in_dir`, both in the lobe's own sampling convention.
    fn pdf(&self, out_dir: Vector3<Float>, in_dir: Vector3<Float>, is_on_light_subpath: bool) -> (Float, Float);
}

/// Mirror a cosine-hemisphere sample (always generated on `+z`) into the
/// hemisphere containing `out_dir`, as used by the diffuse and retro
/// lobes (spec.md §4.2).
pub(crate) fn cosine_sample_matching_hemisphere(out_dir: Vector3<Float>, u: (Float, Float)) -> (Vector3<Float>, Float) {
    let (dir, pdf) = sampling::to_cos_hemisphere(u.0, u.1);
    if out_dir.z < 0.0 {
        (Vector3::new(dir.x, dir.y, -dir.z), pdf)
    } else {
        (dir, pdf)
    }
}

/// Reflect `wo` about the (shading-space) normal `wh`.
pub(crate) fn reflect(wo: Vector3<Float>, wh: Vector3<Float>) -> Vector3<Float> {
    -wo + 2.0 * wo.dot(wh) * wh
}

/// Refract `wo` through the half vector `wh` with relative ior `eta = eta_i
/// / eta_t`, where `eta_i` is the medium on the `wo` side. Returns `None`
/// on total internal reflection.
pub(crate) fn refract(wo: Vector3<Float>, wh: Vector3<Float>, eta: Float) -> Option<Vector3<Float>> {
    // Orient the half vector to the same side as wo so cos_i is positive.
    let n = if wo.dot(wh) >= 0.0 { wh } else { -wh };
    let cos_i = wo.dot(n);
    let sin2_i = (1.0 - cos_i * cos_i).max(0.0);
    let sin2_t = eta * eta * sin2_i;
    if sin2_t >= 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    Some(-eta * wo + (eta * cos_i - cos_t) * n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflect_preserves_angle_to_normal() {
        let wo = Vector3::new(0.3, 0.0, 0.9).normalize();
        let wh = Vector3::new(0.0, 0.0, 1.0);
        let wi = reflect(wo, wh);
        assert!((wi.z - wo.z).abs() < 1e-9);
        assert!((wi.x + wo.x).abs() < 1e-9);
    }
}

//! Anisotropic GGX / Trowbridge-Reitz microfacet distribution with
//! visible-normal sampling (spec.md §4.2 "GGX distribution").

use cgmath::prelude::*;
use cgmath::Vector3;

use crate::consts::{self, MIN_ALPHA};
use crate::float::Float;
use crate::sampling;

#[derive(Clone, Copy, Debug)]
pub struct GgxDistribution {
    pub alpha_x: Float,
    pub alpha_y: Float,
}

impl GgxDistribution {
    pub fn new(alpha_x: Float, alpha_y: Float) -> Self {
        Self { alpha_x: alpha_x.max(MIN_ALPHA), alpha_y: alpha_y.max(MIN_ALPHA) }
    }

    pub fn is_smooth(&self) -> bool {
        self.alpha_x.max(self.alpha_y) <= MIN_ALPHA
    }

    /// Normal distribution function D(wh).
    pub fn d(&self, wh: Vector3<Float>) -> Float {
        let tan2 = sampling::tan2_theta(wh);
        if !tan2.is_finite() {
            return 0.0;
        }
        let cos4 = sampling::cos2_theta(wh).powi(2);
        if cos4 == 0.0 {
            return 0.0;
        }
        let e = tan2
            * (sampling::cos2_phi(wh) / (self.alpha_x * self.alpha_x)
                + sampling::sin2_phi(wh) / (self.alpha_y * self.alpha_y));
        1.0 / (consts::PI * self.alpha_x * self.alpha_y * cos4 * (1.0 + e).powi(2))
    }

    fn lambda(&self, w: Vector3<Float>) -> Float {
        let abs_tan = sampling::tan2_theta(w).sqrt().abs();
        if !abs_tan.is_finite() {
            return 0.0;
        }
        let alpha2 = sampling::cos2_phi(w) * self.alpha_x.powi(2) + sampling::sin2_phi(w) * self.alpha_y.powi(2);
        let a2_tan2 = (alpha2 * abs_tan * abs_tan).max(0.0);
        ((1.0 + a2_tan2).sqrt() - 1.0) / 2.0
    }

    /// Masking term `G1(w) = 1 / (1 + Lambda(w))`.
    pub fn g1(&self, w: Vector3<Float>) -> Float {
        1.0 / (1.0 + self.lambda(w))
    }

    /// Separable masking-shadowing `G2(wo, wi)` (spec.md §4.2).
    pub fn g(&self, wo: Vector3<Float>, wi: Vector3<Float>) -> Float {
        1.0 / (1.0 + self.lambda(wo) + self.lambda(wi))
    }

    /// Sample a microfacet normal from the distribution of visible normals.
    pub fn sample_wh(&self, wo: Vector3<Float>, u: Float, v: Float) -> Vector3<Float> {
        let flip = wo.z < 0.0;
        let wo_hemi = if flip { -wo } else { wo };
        let wo_stretched = Vector3::new(self.alpha_x * wo_hemi.x, self.alpha_y * wo_hemi.y, wo_hemi.z).normalize();
        let (mut slope_x, mut slope_y) = sample_slope(sampling::cos_theta(wo_stretched), u, v);
        let cos_phi = sampling::cos_phi(wo_stretched);
        let sin_phi = sampling::sin_phi(wo_stretched);
        let tmp = cos_phi * slope_x - sin_phi * slope_y;
        slope_y = sin_phi * slope_x + cos_phi * slope_y;
        slope_x = tmp;
        slope_x *= self.alpha_x;
        slope_y *= self.alpha_y;
        let wh = Vector3::new(-slope_x, -slope_y, 1.0).normalize();
        if flip { -wh } else { wh }
    }

    /// Pdf of the visible-normal sample returned by [`sample_wh`].
    pub fn pdf_wh(&self, wo: Vector3<Float>, wh: Vector3<Float>) -> Float {
        self.g1(wo) * wo.dot(wh).abs() * self.d(wh) / sampling::abs_cos_theta(wo).max(1e-12)
    }
}

/// PBRT-v3 polynomial approximation of the stretched-normal inverse CDF,
/// with a uniform-disc fallback at grazing incidence (`cos_theta >
/// 0.9999`), per spec.md §4.2 "Sample11".
fn sample_slope(cos_theta: Float, u1: Float, u2: Float) -> (Float, Float) {
    if cos_theta > 0.9999 {
        let r = (u1 / (1.0 - u1)).max(0.0).sqrt();
        let phi = 2.0 * consts::PI * u2;
        return (r * phi.cos(), r * phi.sin());
    }
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let tan_theta = sin_theta / cos_theta;
    let a = 1.0 / tan_theta;
    let g1 = 2.0 / (1.0 + (1.0 + 1.0 / (a * a)).sqrt());

    let aa = 2.0 * u1 / g1 - 1.0;
    let mut tmp = 1.0 / (aa * aa - 1.0);
    if tmp > 1e10 {
        tmp = 1e10;
    }
    let b = tan_theta;
    let d = (b * b * tmp * tmp - (aa * aa - b * b) * tmp).max(0.0).sqrt();
    let slope_x_1 = b * tmp - d;
    let slope_x_2 = b * tmp + d;
    let slope_x = if aa < 0.0 || slope_x_2 > 1.0 / tan_theta { slope_x_1 } else { slope_x_2 };

    let (s, u2p) = if u2 > 0.5 { (1.0, 2.0 * (u2 - 0.5)) } else { (-1.0, 2.0 * (0.5 - u2)) };
    let z = (u2p * (u2p * (u2p * 0.273_850_24 - 0.733_690_9) + 0.463_410_89))
        / (u2p * (u2p * (u2p * 0.093_073_02 + 0.309_420_3) - 1.0) + 0.597_999_0);
    let slope_y = s * z * (1.0 + slope_x * slope_x).sqrt();
    (slope_x, slope_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn clamps_alpha_to_minimum() {
        let d = GgxDistribution::new(0.0, 0.0);
        assert_relative_eq!(d.alpha_x, MIN_ALPHA);
        assert_relative_eq!(d.alpha_y, MIN_ALPHA);
    }

    #[test]
    fn d_is_finite_at_minimum_alpha() {
        let d = GgxDistribution::new(0.0, 0.0);
        let wh = Vector3::new(0.0, 0.0, 1.0);
        assert!(d.d(wh).is_finite());
    }

    #[test]
    fn sampled_normal_is_unit_length() {
        let dist = GgxDistribution::new(0.3, 0.3);
        let wo = Vector3::new(0.2, 0.1, 0.96).normalize();
        for (u, v) in [(0.1, 0.2), (0.5, 0.5), (0.99, 0.01)] {
            let wh = dist.sample_wh(wo, u, v);
            assert_relative_eq!(wh.magnitude(), 1.0, epsilon = 1e-6);
        }
    }
}

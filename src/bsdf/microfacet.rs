//! GGX microfacet reflection and transmission lobes (spec.md §4.2).

use cgmath::prelude::*;
use cgmath::Vector3;

use crate::color::Color;
use crate::float::Float;
use crate::sampling;

use super::fresnel;
use super::ggx::GgxDistribution;
use super::{reflect, refract, Lobe};

#[derive(Clone, Copy, Debug)]
pub struct MicrofacetReflection {
    pub color: Color,
    pub distribution: GgxDistribution,
    /// R0 used by the tinted Schlick Fresnel (spec.md §4.3).
    pub r0: Color,
}

impl Lobe for MicrofacetReflection {
    fn eval(&self, out_dir: Vector3<Float>, in_dir: Vector3<Float>, _is_on_light_subpath: bool) -> Color {
        if !sampling::same_hemisphere(out_dir, in_dir) {
            return Color::black();
        }
        let cos_o = sampling::cos_theta(out_dir);
        let cos_i = sampling::cos_theta(in_dir);
        if cos_o.abs() < 1e-7 || cos_i.abs() < 1e-7 {
            return Color::black();
        }
        let wh = out_dir + in_dir;
        if wh.magnitude2() == 0.0 {
            return Color::black();
        }
        let wh = wh.normalize();
        let d = self.distribution.d(wh);
        let g = self.distribution.g(out_dir, in_dir);
        let f = fresnel::schlick(in_dir.dot(wh), self.r0);
        self.color * f * (d * g / (4.0 * cos_o.abs() * cos_i.abs()))
    }

    fn sample(&self, out_dir: Vector3<Float>, _is_on_light_subpath: bool, u: (Float, Float)) -> Option<Vector3<Float>> {
        if sampling::cos_theta(out_dir) == 0.0 {
            return None;
        }
        let wh = if self.distribution.is_smooth() {
            Vector3::new(0.0, 0.0, out_dir.z.signum())
        } else {
            self.distribution.sample_wh(out_dir, u.0, u.1)
        };
        if out_dir.dot(wh) < 0.0 {
            return None;
        }
        let in_dir = reflect(out_dir, wh);
        if !sampling::same_hemisphere(out_dir, in_dir) {
            return None;
        }
        Some(in_dir)
    }

    fn pdf(&self, out_dir: Vector3<Float>, in_dir: Vector3<Float>, _is_on_light_subpath: bool) -> (Float, Float) {
        if !sampling::same_hemisphere(out_dir, in_dir) {
            return (0.0, 0.0);
        }
        let wh = out_dir + in_dir;
        if wh.magnitude2() == 0.0 {
            return (0.0, 0.0);
        }
        let wh = wh.normalize();
        let fwd = self.distribution.pdf_wh(out_dir, wh) / (4.0 * out_dir.dot(wh).abs()).max(1e-12);
        let rev = self.distribution.pdf_wh(in_dir, wh) / (4.0 * in_dir.dot(wh).abs()).max(1e-12);
        (fwd, rev)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MicrofacetTransmission {
    pub color: Color,
    pub distribution: GgxDistribution,
    /// Index of refraction of the material, relative to the medium the
    /// surface is embedded in (assumed to be vacuum/air, ior = 1).
    pub ior: Float,
}

impl MicrofacetTransmission {
    fn eta_for(&self, out_dir: Vector3<Float>) -> (Float, Float) {
        // (eta_i, eta_t): medium containing out_dir, medium beyond the surface.
        if sampling::cos_theta(out_dir) > 0.0 { (1.0, self.ior) } else { (self.ior, 1.0) }
    }
}

impl Lobe for MicrofacetTransmission {
    fn eval(&self, out_dir: Vector3<Float>, in_dir: Vector3<Float>, is_on_light_subpath: bool) -> Color {
        if sampling::same_hemisphere(out_dir, in_dir) {
            return Color::black();
        }
        let cos_o = sampling::cos_theta(out_dir);
        let cos_i = sampling::cos_theta(in_dir);
        if cos_o == 0.0 || cos_i == 0.0 {
            return Color::black();
        }
        let (eta_i, eta_t) = self.eta_for(out_dir);
        let mut wh = (out_dir * eta_i + in_dir * eta_t);
        if wh.magnitude2() == 0.0 {
            return Color::black();
        }
        wh = wh.normalize();
        if wh.z < 0.0 {
            wh = -wh;
        }
        if out_dir.dot(wh) * in_dir.dot(wh) > 0.0 {
            // Same-side half vector: not a valid transmission configuration.
            return Color::black();
        }
        let f = fresnel::dielectric(out_dir.dot(wh), eta_i, eta_t);
        let d = self.distribution.d(wh);
        let g = self.distribution.g(out_dir, in_dir);
        let sqrt_denom = eta_i * out_dir.dot(wh) + eta_t * in_dir.dot(wh);
        if sqrt_denom == 0.0 {
            return Color::black();
        }
        // Radiance transported along a light subpath is compressed/expanded
        // by eta^2 across the interface; importance (camera subpath) is not.
        let transport_scale = if is_on_light_subpath { (eta_i / eta_t).powi(2) } else { 1.0 };
        let factor = (1.0 - f) * d * g * (eta_t * eta_t) * transport_scale
            * (in_dir.dot(wh) * out_dir.dot(wh) / (cos_i * cos_o)).abs()
            / sqrt_denom.powi(2);
        self.color * factor.abs()
    }

    fn sample(&self, out_dir: Vector3<Float>, _is_on_light_subpath: bool, u: (Float, Float)) -> Option<Vector3<Float>> {
        if sampling::cos_theta(out_dir) == 0.0 {
            return None;
        }
        let wh = if self.distribution.is_smooth() {
            Vector3::new(0.0, 0.0, out_dir.z.signum())
        } else {
            self.distribution.sample_wh(out_dir, u.0, u.1)
        };
        if out_dir.dot(wh) < 0.0 {
            return None;
        }
        let (eta_i, eta_t) = self.eta_for(out_dir);
        let in_dir = refract(out_dir, wh, eta_i / eta_t)?;
        if sampling::same_hemisphere(out_dir, in_dir) {
            return None;
        }
        Some(in_dir)
    }

    fn pdf(&self, out_dir: Vector3<Float>, in_dir: Vector3<Float>, _is_on_light_subpath: bool) -> (Float, Float) {
        if sampling::same_hemisphere(out_dir, in_dir) {
            return (0.0, 0.0);
        }
        let (eta_i, eta_t) = self.eta_for(out_dir);
        let mut wh = (out_dir * eta_i + in_dir * eta_t);
        if wh.magnitude2() == 0.0 {
            return (0.0, 0.0);
        }
        wh = wh.normalize();
        if wh.z < 0.0 {
            wh = -wh;
        }
        let denom_fwd = (eta_i * out_dir.dot(wh) + eta_t * in_dir.dot(wh)).powi(2);
        if denom_fwd == 0.0 {
            return (0.0, 0.0);
        }
        let jacobian_fwd = (eta_t * eta_t * in_dir.dot(wh).abs()) / denom_fwd;
        let fwd = self.distribution.pdf_wh(out_dir, wh) * jacobian_fwd;

        let (eta_i_rev, eta_t_rev) = self.eta_for(in_dir);
        let denom_rev = (eta_i_rev * in_dir.dot(wh) + eta_t_rev * out_dir.dot(wh)).powi(2);
        let rev = if denom_rev == 0.0 {
            0.0
        } else {
            self.distribution.pdf_wh(in_dir, wh) * (eta_t_rev * eta_t_rev * out_dir.dot(wh).abs()) / denom_rev
        };
        (fwd, rev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflection_is_zero_across_hemispheres() {
        let lobe = MicrofacetReflection {
            color: Color::white(),
            distribution: GgxDistribution::new(0.2, 0.2),
            r0: Color::gray(0.04),
        };
        let wo = Vector3::new(0.0, 0.0, 1.0);
        let wi = Vector3::new(0.0, 0.0, -1.0);
        assert!(lobe.eval(wo, wi, false).is_black());
    }

    #[test]
    fn transmission_rejects_same_hemisphere() {
        let lobe = MicrofacetTransmission {
            color: Color::white(),
            distribution: GgxDistribution::new(0.2, 0.2),
            ior: 1.5,
        };
        let wo = Vector3::new(0.0, 0.0, 1.0);
        let wi = Vector3::new(0.1, 0.0, 0.9).normalize();
        assert!(lobe.eval(wo, wi, false).is_black());
    }
}

//! Fresnel terms used by the microfacet lobes and by `GenericMaterial`'s
//! reflection/transmission split (spec.md §4.2, §4.3).

use crate::color::Color;
use crate::float::Float;

/// Unpolarized dielectric Fresnel reflectance for a cosine of the angle of
/// incidence measured on the side of `eta_i`.
pub fn dielectric(cos_theta_i: Float, eta_i: Float, eta_t: Float) -> Float {
    let cos_i = cos_theta_i.clamp(-1.0, 1.0);
    let (eta_i, eta_t, cos_i) = if cos_i > 0.0 {
        (eta_i, eta_t, cos_i)
    } else {
        (eta_t, eta_i, -cos_i)
    };
    let sin2_t = (eta_i / eta_t).powi(2) * (1.0 - cos_i * cos_i).max(0.0);
    if sin2_t >= 1.0 {
        return 1.0;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    let r_parl = (eta_t * cos_i - eta_i * cos_t) / (eta_t * cos_i + eta_i * cos_t);
    let r_perp = (eta_i * cos_i - eta_t * cos_t) / (eta_i * cos_i + eta_t * cos_t);
    (r_parl * r_parl + r_perp * r_perp) / 2.0
}

/// Schlick's approximation, used for the tinted specular Fresnel in
/// `GenericMaterial` (spec.md §4.3).
pub fn schlick(cos_theta: Float, r0: Color) -> Color {
    let m = (1.0 - cos_theta.abs()).clamp(0.0, 1.0);
    let weight = m.powi(5);
    r0 + (Color::white() - r0) * weight
}

/// `R0` reflectance at normal incidence for a dielectric interface of the
/// given index of refraction.
pub fn schlick_r0_from_ior(ior: Float) -> Float {
    ((ior - 1.0) / (ior + 1.0)).powi(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normal_incidence_matches_r0() {
        let ior = 1.5;
        let r0 = schlick_r0_from_ior(ior);
        assert_relative_eq!(dielectric(1.0, 1.0, ior), r0, epsilon = 1e-6);
    }

    #[test]
    fn grazing_incidence_is_total_reflection() {
        assert_relative_eq!(dielectric(0.0, 1.0, 1.5), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn schlick_at_grazing_reaches_white() {
        let c = schlick(0.0, Color::black());
        assert_relative_eq!(c.r(), 1.0, epsilon = 1e-9);
    }
}

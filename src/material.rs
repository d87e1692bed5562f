//! `GenericMaterial`: a Disney-style uber-material composing the lobes in
//! `bsdf/` by value, with a single discrete selection distribution used
//! both to importance-sample a lobe and to recompute the aggregate
//! forward/reverse pdf the bidirectional integrator needs (spec.md §4.3).

use cgmath::Vector3;

use crate::bsdf::diffuse::DisneyDiffuse;
use crate::bsdf::diffuse_transmission::DiffuseTransmission;
use crate::bsdf::fresnel;
use crate::bsdf::ggx::GgxDistribution;
use crate::bsdf::microfacet::{MicrofacetReflection, MicrofacetTransmission};
use crate::bsdf::retro::DisneyRetro;
use crate::bsdf::Lobe;
use crate::color::Color;
use crate::float::Float;
use crate::sampling;

/// All recognized scalar parameters of the uber-material. No texture
/// lookup is modeled here; a texture layer is an external collaborator's
/// concern (it would resolve to one of these values per hit before the
/// material is evaluated).
#[derive(Clone, Copy, Debug)]
pub struct MaterialParams {
    pub base_color: Color,
    pub roughness: Float,
    pub anisotropic: Float,
    pub metallic: Float,
    pub specular_tint_strength: Float,
    pub index_of_refraction: Float,
    pub specular_transmittance: Float,
    pub diffuse_transmittance: Float,
    pub thin: bool,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            base_color: Color::gray(0.5),
            roughness: 0.5,
            anisotropic: 0.0,
            metallic: 0.0,
            specular_tint_strength: 0.0,
            index_of_refraction: 1.5,
            specular_transmittance: 0.0,
            diffuse_transmittance: 0.0,
            thin: false,
        }
    }
}

/// Result of `GenericMaterial::sample`.
#[derive(Clone, Copy, Debug)]
pub struct MaterialSample {
    pub in_dir: Vector3<Float>,
    pub pdf_forward: Float,
    pub pdf_reverse: Float,
}

/// The five lobes a `GenericMaterial` composes, plus the (fixed) selection
/// weights for the non-directional lobes and the ingredients needed to
/// recompute the directional reflection/transmission split at any cosine.
#[derive(Clone, Copy, Debug)]
pub struct GenericMaterial {
    diffuse: DisneyDiffuse,
    retro: DisneyRetro,
    diffuse_transmission: DiffuseTransmission,
    reflection: MicrofacetReflection,
    transmission: MicrofacetTransmission,

    diffuse_weight: Float,
    retro_weight: Float,
    diffuse_transmission_weight: Float,
    /// `1 - diffuse_weight`, split between reflection/transmission lobes by
    /// the Fresnel term evaluated at the relevant cosine.
    specular_weight: Float,
    r0: Color,
}

impl GenericMaterial {
    pub fn new(p: MaterialParams) -> Self {
        let diffuse_weight = (1.0 - p.metallic) * (1.0 - p.specular_transmittance);
        let diffuse_transmission_weight = if p.thin { diffuse_weight * p.diffuse_transmittance } else { 0.0 };
        let remaining = diffuse_weight - diffuse_transmission_weight;
        let retro_weight = remaining / 2.0;
        let diffuse_lobe_weight = remaining / 2.0;
        let specular_weight = 1.0 - diffuse_weight;

        let color_tint = p.base_color.tint();
        let specular_tint = Color::white().lerp(color_tint, p.specular_tint_strength);
        let r0_dielectric = specular_tint * fresnel::schlick_r0_from_ior(p.index_of_refraction);
        let r0 = r0_dielectric.lerp(p.base_color, p.metallic);

        let aspect = (1.0 - 0.9 * p.anisotropic).max(0.0).sqrt();
        let alpha = p.roughness * p.roughness;
        let alpha_x = alpha / aspect.max(1e-4);
        let alpha_y = alpha * aspect;
        let reflection_distribution = GgxDistribution::new(alpha_x, alpha_y);

        // Burley 2015: thin surfaces re-roughen the transmission lobe so a
        // single-sided thin shell looks plausible without real refraction.
        let transmission_distribution = if p.thin {
            let factor = (0.65 * p.index_of_refraction - 0.35).max(0.0);
            GgxDistribution::new(alpha_x * factor, alpha_y * factor)
        } else {
            reflection_distribution
        };

        Self {
            diffuse: DisneyDiffuse { reflectance: p.base_color },
            retro: DisneyRetro { reflectance: p.base_color, roughness: p.roughness },
            diffuse_transmission: DiffuseTransmission { transmittance: p.base_color },
            reflection: MicrofacetReflection { color: Color::white(), distribution: reflection_distribution, r0 },
            transmission: MicrofacetTransmission {
                color: p.base_color,
                distribution: transmission_distribution,
                ior: p.index_of_refraction,
            },
            diffuse_weight: diffuse_lobe_weight,
            retro_weight,
            diffuse_transmission_weight,
            specular_weight,
            r0,
        }
    }

    /// `(diffuse, retro, diffuse_transmission, reflection, transmission)`
    /// selection weights at the given shading-space cosine; sums to one.
    fn weights_at(&self, cos: Float) -> [Float; 5] {
        let f = fresnel::schlick(cos, self.r0).luma().clamp(0.0, 1.0);
        let reflection = self.specular_weight * f;
        let transmission = self.specular_weight * (1.0 - f);
        [self.diffuse_weight, self.retro_weight, self.diffuse_transmission_weight, reflection, transmission]
    }

    fn eval_lobe(&self, i: usize, out_dir: Vector3<Float>, in_dir: Vector3<Float>, light: bool) -> Color {
        match i {
            0 => self.diffuse.eval(out_dir, in_dir, light),
            1 => self.retro.eval(out_dir, in_dir, light),
            2 => self.diffuse_transmission.eval(out_dir, in_dir, light),
            3 => self.reflection.eval(out_dir, in_dir, light),
            _ => self.transmission.eval(out_dir, in_dir, light),
        }
    }

    fn sample_lobe(&self, i: usize, out_dir: Vector3<Float>, light: bool, u: (Float, Float)) -> Option<Vector3<Float>> {
        match i {
            0 => self.diffuse.sample(out_dir, light, u),
            1 => self.retro.sample(out_dir, light, u),
            2 => self.diffuse_transmission.sample(out_dir, light, u),
            3 => self.reflection.sample(out_dir, light, u),
            _ => self.transmission.sample(out_dir, light, u),
        }
    }

    fn pdf_lobe(&self, i: usize, out_dir: Vector3<Float>, in_dir: Vector3<Float>, light: bool) -> (Float, Float) {
        match i {
            0 => self.diffuse.pdf(out_dir, in_dir, light),
            1 => self.retro.pdf(out_dir, in_dir, light),
            2 => self.diffuse_transmission.pdf(out_dir, in_dir, light),
            3 => self.reflection.pdf(out_dir, in_dir, light),
            _ => self.transmission.pdf(out_dir, in_dir, light),
        }
    }

    /// Sum of every lobe's `Evaluate`, unweighted (spec.md §4.3 "BSDFs
    /// compose additively").
    pub fn evaluate(&self, out_dir: Vector3<Float>, in_dir: Vector3<Float>, is_on_light_subpath: bool) -> Color {
        (0..5).fold(Color::black(), |acc, i| acc + self.eval_lobe(i, out_dir, in_dir, is_on_light_subpath))
    }

    pub fn evaluate_with_cosine(&self, out_dir: Vector3<Float>, in_dir: Vector3<Float>, is_on_light_subpath: bool) -> Color {
        self.evaluate(out_dir, in_dir, is_on_light_subpath) * sampling::abs_cos_theta(in_dir)
    }

    /// Aggregate forward/reverse pdf, matching `sample`'s selection scheme.
    pub fn pdf(&self, out_dir: Vector3<Float>, in_dir: Vector3<Float>, is_on_light_subpath: bool) -> (Float, Float) {
        let fwd_weights = self.weights_at(sampling::cos_theta(out_dir));
        let rev_weights = self.weights_at(sampling::cos_theta(in_dir));
        let mut fwd = 0.0;
        let mut rev = 0.0;
        for i in 0..5 {
            let (f, r) = self.pdf_lobe(i, out_dir, in_dir, is_on_light_subpath);
            fwd += fwd_weights[i] * f;
            rev += rev_weights[i] * r;
        }
        (fwd, rev)
    }

    /// Draw a lobe by the weighted CDF on `u.0`, delegate sampling to it,
    /// then recompute the aggregate forward/reverse pdf so it matches
    /// [`GenericMaterial::pdf`] exactly (spec.md §4.3, required for MIS).
    pub fn sample(&self, out_dir: Vector3<Float>, is_on_light_subpath: bool, u: (Float, Float)) -> Option<MaterialSample> {
        let weights = self.weights_at(sampling::cos_theta(out_dir));
        let total: Float = weights.iter().sum();
        if total <= 0.0 {
            return None;
        }
        let target = u.0 * total;
        let mut cursor = 0.0;
        let mut chosen = 4;
        let mut local_u0 = u.0;
        for (i, w) in weights.iter().enumerate() {
            if *w <= 0.0 {
                continue;
            }
            if target < cursor + w || i == 4 {
                chosen = i;
                local_u0 = ((target - cursor) / w).clamp(0.0, 1.0 - Float::EPSILON);
                break;
            }
            cursor += w;
        }

        let in_dir = self.sample_lobe(chosen, out_dir, is_on_light_subpath, (local_u0, u.1))?;
        let (pdf_forward, pdf_reverse) = self.pdf(out_dir, in_dir, is_on_light_subpath);
        if pdf_forward <= 0.0 {
            return None;
        }
        Some(MaterialSample { in_dir, pdf_forward, pdf_reverse })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::Rng;

    fn diffuse_material() -> GenericMaterial {
        GenericMaterial::new(MaterialParams { base_color: Color::gray(0.5), roughness: 0.8, ..Default::default() })
    }

    #[test]
    fn sample_produces_consistent_forward_pdf() {
        let mat = diffuse_material();
        let out_dir = Vector3::new(0.0, 0.0, 1.0);
        let mut rng = Rng::new(3, 0, 0);
        for _ in 0..32 {
            let u = rng.next_float2();
            if let Some(s) = mat.sample(out_dir, false, u) {
                let (fwd, _) = mat.pdf(out_dir, s.in_dir, false);
                assert!((fwd - s.pdf_forward).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn fully_metallic_material_has_no_diffuse_contribution() {
        let mat = GenericMaterial::new(MaterialParams { metallic: 1.0, ..Default::default() });
        let out_dir = Vector3::new(0.1, 0.0, 0.99);
        let in_dir = Vector3::new(-0.1, 0.0, 0.99);
        assert_eq!(mat.diffuse_weight, 0.0);
        assert_eq!(mat.retro_weight, 0.0);
        let diffuse_contribution = mat.diffuse.eval(out_dir, in_dir, false);
        assert!(diffuse_contribution.is_finite());
    }

    #[test]
    fn grazing_incidence_does_not_produce_nan() {
        let mat = diffuse_material();
        let out_dir = Vector3::new((1.0 - 1e-14_f64).sqrt(), 0.0, 1e-7);
        let in_dir = Vector3::new(0.0, (1.0 - 1e-14_f64).sqrt(), 1e-7);
        let (fwd, rev) = mat.pdf(out_dir, in_dir, false);
        assert!(fwd.is_finite());
        assert!(rev.is_finite());
    }
}

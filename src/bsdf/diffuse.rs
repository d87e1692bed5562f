//! Disney diffuse lobe (spec.md §4.2).

use cgmath::Vector3;

use crate::color::Color;
use crate::consts::FRAC_1_PI;
use crate::float::Float;
use crate::sampling;

use super::{cosine_sample_matching_hemisphere, Lobe};

fn schlick_weight(cos_theta: Float) -> Float {
    (1.0 - cos_theta.abs()).clamp(0.0, 1.0).powi(5)
}

#[derive(Clone, Copy, Debug)]
pub struct DisneyDiffuse {
    pub reflectance: Color,
}

impl Lobe for DisneyDiffuse {
    fn eval(&self, out_dir: Vector3<Float>, in_dir: Vector3<Float>, _is_on_light_subpath: bool) -> Color {
        if !sampling::same_hemisphere(out_dir, in_dir) {
            return Color::black();
        }
        let fo = schlick_weight(sampling::cos_theta(out_dir));
        let fi = schlick_weight(sampling::cos_theta(in_dir));
        self.reflectance * (FRAC_1_PI * (1.0 - fo / 2.0) * (1.0 - fi / 2.0))
    }

    fn sample(&self, out_dir: Vector3<Float>, _is_on_light_subpath: bool, u: (Float, Float)) -> Option<Vector3<Float>> {
        let (dir, _) = cosine_sample_matching_hemisphere(out_dir, u);
        Some(dir)
    }

    fn pdf(&self, out_dir: Vector3<Float>, in_dir: Vector3<Float>, _is_on_light_subpath: bool) -> (Float, Float) {
        if !sampling::same_hemisphere(out_dir, in_dir) {
            return (0.0, 0.0);
        }
        (sampling::cos_hemisphere_pdf(sampling::cos_theta(in_dir)), sampling::cos_hemisphere_pdf(sampling::cos_theta(out_dir)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::Rng;

    #[test]
    fn sample_matches_forward_pdf_statistically() {
        let lobe = DisneyDiffuse { reflectance: Color::gray(0.5) };
        let out_dir = Vector3::new(0.0, 0.0, 1.0);
        let mut rng = Rng::new(1, 0, 0);
        for _ in 0..64 {
            let u = rng.next_float2();
            let wi = lobe.sample(out_dir, false, u).unwrap();
            let (fwd, _) = lobe.pdf(out_dir, wi, false);
            assert!(fwd > 0.0);
            assert!(wi.z > 0.0);
        }
    }
}

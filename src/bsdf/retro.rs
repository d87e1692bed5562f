//! Disney retro-reflection lobe (spec.md §4.2).

use cgmath::prelude::*;
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
pub struct DisneyRetro {
    pub reflectance: Color,
    pub roughness: Float,
}

impl Lobe for DisneyRetro {
    fn eval(&self, out_dir: Vector3<Float>, in_dir: Vector3<Float>, _is_on_light_subpath: bool) -> Color {
        if !sampling::same_hemisphere(out_dir, in_dir) {
            return Color::black();
        }
        let h = (in_dir + out_dir);
        if h.magnitude2() == 0.0 {
            return Color::black();
        }
        let h = h.normalize();
        let r_r = 2.0 * self.roughness * in_dir.dot(h).powi(2);
        let fo = schlick_weight(sampling::cos_theta(out_dir));
        let fi = schlick_weight(sampling::cos_theta(in_dir));
        self.reflectance * (FRAC_1_PI * r_r * (fo + fi + fo * fi * (r_r - 1.0)))
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

//! Thin-surface diffuse transmission lobe (spec.md §4.2).

use cgmath::Vector3;

use crate::color::Color;
use crate::consts::FRAC_1_PI;
use crate::float::Float;
use crate::sampling;

use super::Lobe;

#[derive(Clone, Copy, Debug)]
pub struct DiffuseTransmission {
    pub transmittance: Color,
}

impl Lobe for DiffuseTransmission {
    fn eval(&self, out_dir: Vector3<Float>, in_dir: Vector3<Float>, _is_on_light_subpath: bool) -> Color {
        if sampling::same_hemisphere(out_dir, in_dir) {
            return Color::black();
        }
        self.transmittance * FRAC_1_PI
    }

    fn sample(&self, out_dir: Vector3<Float>, _is_on_light_subpath: bool, u: (Float, Float)) -> Option<Vector3<Float>> {
        // Cosine-hemisphere sample on the hemisphere opposite out_dir.
        let (dir, _) = sampling::to_cos_hemisphere(u.0, u.1);
        let dir = if out_dir.z > 0.0 { Vector3::new(dir.x, dir.y, -dir.z) } else { dir };
        Some(dir)
    }

    fn pdf(&self, out_dir: Vector3<Float>, in_dir: Vector3<Float>, _is_on_light_subpath: bool) -> (Float, Float) {
        if sampling::same_hemisphere(out_dir, in_dir) {
            return (0.0, 0.0);
        }
        // Reciprocal: the pdf is symmetric in out_dir/in_dir.
        let pdf = sampling::cos_hemisphere_pdf(sampling::cos_theta(in_dir));
        (pdf, pdf)
    }
}

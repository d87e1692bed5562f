use crate::float::Float;

/// Offset used to bias ray origins off a surface to avoid self-intersection.
pub const EPSILON: Float = 1e-5;
pub const INFINITY: Float = std::f64::INFINITY as Float;
pub const PI: Float = std::f64::consts::PI as Float;
pub const FRAC_1_PI: Float = std::f64::consts::FRAC_1_PI as Float;

/// Minimum roughness the GGX distribution is allowed to decay to; see
/// spec.md §4.2 "GGX distribution".
pub const MIN_ALPHA: Float = 0.001;

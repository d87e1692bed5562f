//! Floating point conversion that enables switching the engine's primary
//! float type between f64 and f32 by changing a single alias.

/// Alias for the float type used throughout the renderer.
pub type Float = f64;

pub trait ToFloat {
    fn to_float(self) -> Float;
}

impl ToFloat for f32 {
    fn to_float(self) -> Float {
        self.into()
    }
}

impl ToFloat for u32 {
    fn to_float(self) -> Float {
        Float::from(self)
    }
}

impl ToFloat for usize {
    fn to_float(self) -> Float {
        self as Float
    }
}

impl ToFloat for i32 {
    fn to_float(self) -> Float {
        Float::from(self)
    }
}

//! 16.16 fixed-point conversions.
//!
//! Callers on integer-only targets pack attributes as `i32` values holding
//! `real * 65536`; the pipeline converts at the boundary and works in `f32`
//! internally.

/// A 16.16 fixed-point value.
pub type Fixed = i32;

/// 1.0 in 16.16 fixed point.
pub const FIXED_ONE: Fixed = 1 << 16;

/// Decode a 16.16 fixed-point value to `f32`.
#[inline]
pub fn fixed_to_f32(x: Fixed) -> f32 {
    x as f32 / FIXED_ONE as f32
}

/// Encode an `f32` as 16.16 fixed point, rounding to the nearest step.
#[inline]
pub fn f32_to_fixed(f: f32) -> Fixed {
    (f * FIXED_ONE as f32).round() as Fixed
}

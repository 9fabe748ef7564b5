//! Small numeric helpers shared by the components.

/// Tolerance used when comparing doses against pump steps.
pub const DOSE_EPSILON: f64 = 1e-6;

/// Return `v` when finite, otherwise `fallback`.
#[inline]
pub fn finite_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() { v } else { fallback }
}

/// Median of three finite values.
#[inline]
pub fn median3(a: f64, b: f64, c: f64) -> f64 {
    a.max(b).min(a.min(b).max(c))
}

/// Clamp `v` into `[lo, hi]`, tolerating swapped bounds.
#[inline]
pub fn clamp_between(v: f64, lo: f64, hi: f64) -> f64 {
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    v.clamp(lo, hi)
}

//! Pump-step quantization for SMB doses.

use crate::util::{DOSE_EPSILON, clamp_between};

/// Clamp `units` into `[min_u, max_u]` and round to the nearest multiple of `step`.
///
/// - Non-finite `units` are treated as `min_u`.
/// - When rounding would leave the bounds, the nearest in-bounds multiple is used.
/// - When no multiple of `step` fits inside the bounds, the clamped value is returned.
/// - Results within 1e-6 of zero snap to exactly 0.0.
///
/// The function is idempotent: quantizing an already quantized value is a no-op.
pub fn quantize(units: f64, step: f64, min_u: f64, max_u: f64) -> f64 {
    let (lo, hi) = if min_u <= max_u {
        (min_u, max_u)
    } else {
        (max_u, min_u)
    };
    let units = if units.is_finite() { units } else { lo };
    let clamped = clamp_between(units, lo, hi);
    if !(step.is_finite() && step > 0.0) {
        return snap_zero(clamped);
    }

    let mut n = (clamped / step).round();
    if n * step > hi + DOSE_EPSILON {
        n = (hi / step).floor();
    }
    if n * step < lo - DOSE_EPSILON {
        n = (lo / step).ceil();
    }
    let q = n * step;
    if q > hi + DOSE_EPSILON || q < lo - DOSE_EPSILON {
        return snap_zero(clamped);
    }
    snap_zero(clamp_between(q, lo, hi))
}

#[inline]
fn snap_zero(v: f64) -> f64 {
    if v.abs() < DOSE_EPSILON { 0.0 } else { v }
}

/// True when `units` is a multiple of `step` within floating-point tolerance.
pub fn is_step_multiple(units: f64, step: f64) -> bool {
    if !(step > 0.0) {
        return false;
    }
    let n = (units / step).round();
    (units - n * step).abs() <= DOSE_EPSILON
}

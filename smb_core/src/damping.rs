//! Multiplicative SMB dampers with a full audit trail.

use serde::Serialize;

use crate::config::DampingCfg;

/// Outcome of the damping stage.
///
/// Each `*_mult` is the factor actually applied (1.0 when the damper did not
/// fire), so `out / tail_mult` reconstructs the dose without the tail damper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SmbDampingResult {
    pub out: f64,
    pub tail_hit: bool,
    pub tail_mult: f64,
    pub exercise_hit: bool,
    pub exercise_mult: f64,
    pub late_fat_hit: bool,
    pub late_fat_mult: f64,
    /// Damping skipped entirely on request.
    pub bypassed: bool,
}

impl SmbDampingResult {
    /// Pass-through result used when damping is bypassed.
    pub fn bypassed(dose: f64) -> Self {
        Self {
            out: dose,
            tail_hit: false,
            tail_mult: 1.0,
            exercise_hit: false,
            exercise_mult: 1.0,
            late_fat_hit: false,
            late_fat_mult: 1.0,
            bypassed: true,
        }
    }

    /// Product of all applied factors.
    pub fn combined_mult(&self) -> f64 {
        self.tail_mult * self.exercise_mult * self.late_fat_mult
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DampingPolicy {
    cfg: DampingCfg,
}

impl DampingPolicy {
    pub fn new(cfg: DampingCfg) -> Self {
        Self { cfg }
    }

    /// Apply tail, post-exercise and late fatty-meal dampers in that order.
    ///
    /// A non-finite `smb` is treated as 0.0; a non-finite tail fraction never
    /// triggers the tail damper.
    pub fn damp_with_audit(
        &self,
        smb: f64,
        iob_tail_frac: f64,
        exercise: bool,
        suspected_late_fat_meal: bool,
    ) -> SmbDampingResult {
        let smb = if smb.is_finite() { smb } else { 0.0 };
        let tail_hit = iob_tail_frac.is_finite() && iob_tail_frac > self.cfg.tail_threshold;
        let tail_mult = if tail_hit { self.cfg.tail_mult } else { 1.0 };
        let exercise_mult = if exercise { self.cfg.exercise_mult } else { 1.0 };
        let late_fat_mult = if suspected_late_fat_meal {
            self.cfg.late_fat_mult
        } else {
            1.0
        };
        let out = smb * tail_mult * exercise_mult * late_fat_mult;
        tracing::debug!(
            smb,
            out,
            tail_hit,
            exercise,
            late_fat = suspected_late_fat_meal,
            "smb damped"
        );
        SmbDampingResult {
            out,
            tail_hit,
            tail_mult,
            exercise_hit: exercise,
            exercise_mult,
            late_fat_hit: suspected_late_fat_meal,
            late_fat_mult,
            bypassed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_damper_fires_on_neutral_input() {
        let r = DampingPolicy::default().damp_with_audit(1.0, 0.1, false, false);
        assert_eq!(r.out, 1.0);
        assert!(!r.tail_hit && !r.exercise_hit && !r.late_fat_hit && !r.bypassed);
        assert_eq!(r.combined_mult(), 1.0);
    }

    #[test]
    fn all_dampers_compose() {
        let r = DampingPolicy::default().damp_with_audit(1.0, 0.3, true, true);
        assert!((r.out - 0.5 * 0.6 * 0.7).abs() < 1e-12);
        assert_eq!((r.tail_mult, r.exercise_mult, r.late_fat_mult), (0.5, 0.6, 0.7));
    }

    #[test]
    fn tail_threshold_is_exclusive() {
        let r = DampingPolicy::default().damp_with_audit(1.0, 0.25, false, false);
        assert!(!r.tail_hit);
    }

    #[test]
    fn audit_reports_triggers_even_on_zero_dose() {
        let r = DampingPolicy::default().damp_with_audit(0.0, 0.9, true, false);
        assert!(r.tail_hit && r.exercise_hit);
        assert_eq!(r.out, 0.0);
    }

    #[test]
    fn nan_inputs_degrade_to_neutral() {
        let r = DampingPolicy::default().damp_with_audit(f64::NAN, f64::NAN, false, false);
        assert_eq!(r.out, 0.0);
        assert!(!r.tail_hit);
    }

    #[test]
    fn bypass_result_passes_dose_through() {
        let r = SmbDampingResult::bypassed(0.8);
        assert!(r.bypassed);
        assert_eq!(r.out, 0.8);
        assert_eq!(r.combined_mult(), 1.0);
    }
}

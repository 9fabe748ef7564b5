//! Fusion of profile, TDD-derived and PK/PD-scaled insulin sensitivity.
//!
//! The fused value is the median of the three candidates, pushed toward the
//! PK/PD candidate only in the direction the PK/PD scale points, clamped to a
//! band around the TDD-derived ISF and finally rate-limited against the
//! previous cycle.

use serde::{Deserialize, Serialize};

use crate::config::FusionCfg;
use crate::util::{clamp_between, median3};

/// Persisted rate-limiter state: the previously fused ISF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IsfFusionState {
    pub previous: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IsfFusion {
    cfg: FusionCfg,
}

impl IsfFusion {
    pub fn new(cfg: FusionCfg) -> Self {
        Self { cfg }
    }

    pub fn cfg(&self) -> &FusionCfg {
        &self.cfg
    }

    /// Fuse the three ISF sources and record the result in `state`.
    ///
    /// Inputs must be finite with `tdd_isf > 0`; otherwise the previous fused
    /// value (or the profile ISF on a fresh state) is returned and the state is
    /// left untouched.
    pub fn fused(
        &self,
        state: &mut IsfFusionState,
        profile_isf: f64,
        tdd_isf: f64,
        pkpd_scale: f64,
    ) -> f64 {
        if !(profile_isf.is_finite() && tdd_isf.is_finite() && pkpd_scale.is_finite())
            || tdd_isf <= 0.0
        {
            tracing::warn!(profile_isf, tdd_isf, pkpd_scale, "isf fusion skipped on invalid input");
            return state.previous.unwrap_or(profile_isf);
        }

        let pkpd_isf = (tdd_isf * pkpd_scale).max(1.0);
        let base = median3(profile_isf, tdd_isf, pkpd_isf);
        let directed = if pkpd_scale >= 1.0 {
            base.max(pkpd_isf)
        } else {
            base.min(pkpd_isf)
        };
        let banded = clamp_between(
            directed,
            tdd_isf * self.cfg.min_factor,
            tdd_isf * self.cfg.max_factor,
        );

        let out = match state.previous {
            Some(prev) if prev.is_finite() && prev > 0.0 => {
                let max_step = prev * self.cfg.max_change_per_5min;
                clamp_between(banded, prev - max_step, prev + max_step)
            }
            _ => banded,
        };
        tracing::debug!(profile_isf, tdd_isf, pkpd_isf, base, fused = out, "isf fused");
        state.previous = Some(out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_instance_pushes_toward_pkpd_when_resistant() {
        let f = IsfFusion::default();
        let mut st = IsfFusionState::default();
        let v = f.fused(&mut st, 50.0, 45.0, 1.2);
        assert!((33.75..=56.25).contains(&v));
        assert!((v - 54.0).abs() < 1e-9);
        assert_eq!(st.previous, Some(v));
    }

    #[test]
    fn sensitive_scale_caps_at_pkpd_candidate() {
        let f = IsfFusion::default();
        let mut st = IsfFusionState::default();
        // pkpd = 36, median {60,40,36} = 40, capped at 36, band [30, 50]
        let v = f.fused(&mut st, 60.0, 40.0, 0.9);
        assert!((v - 36.0).abs() < 1e-9);
    }

    #[test]
    fn band_clamps_extreme_profile() {
        let f = IsfFusion::default();
        let mut st = IsfFusionState::default();
        // pkpd = 80 * 1.0 = 80, median {200,80,80} = 80; scale == 1.0 pushes up to >= 80
        let v = f.fused(&mut st, 200.0, 80.0, 1.0);
        assert!((v - 80.0).abs() < 1e-9);
        // strong resistance: pkpd = 120 -> band max 100
        let mut st = IsfFusionState::default();
        let v = f.fused(&mut st, 90.0, 80.0, 1.5);
        assert!((v - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rate_limits_against_previous() {
        let f = IsfFusion::default();
        let mut st = IsfFusionState {
            previous: Some(40.0),
        };
        let v = f.fused(&mut st, 50.0, 45.0, 1.2);
        assert!((v - 41.2).abs() < 1e-9);
        let v2 = f.fused(&mut st, 50.0, 45.0, 1.2);
        assert!((v2 - 41.2 * 1.03).abs() < 1e-9);
    }

    #[test]
    fn invalid_input_keeps_previous() {
        let f = IsfFusion::default();
        let mut st = IsfFusionState {
            previous: Some(42.0),
        };
        assert_eq!(f.fused(&mut st, f64::NAN, 45.0, 1.0), 42.0);
        assert_eq!(f.fused(&mut st, 50.0, 0.0, 1.0), 42.0);
        assert_eq!(st.previous, Some(42.0));
    }

    #[test]
    fn pkpd_candidate_floor_is_one() {
        let f = IsfFusion::new(FusionCfg {
            min_factor: 0.01,
            ..FusionCfg::default()
        });
        let mut st = IsfFusionState::default();
        // pkpd = max(1, 2 * 0.1) = 1; median {0.5,2,1} = 1; capped at 1; band [0.02, 2.5]
        let v = f.fused(&mut st, 0.5, 2.0, 0.1);
        assert!((v - 1.0).abs() < 1e-12);
    }
}

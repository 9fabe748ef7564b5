//! Hormonal cycle phase tracking with per-phase online learning.
//!
//! The applied multiplier is `base × learned`, where `base` comes from a static
//! per-phase table and `learned` is an exponential moving average of observed
//! effective need. Both the learned pair and the applied pair are clamped.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{CycleCfg, LearnerCfg};
use crate::util::clamp_between;

/// Days of menstruation counted from the period start.
const MENSTRUATION_DAYS: u32 = 5;
/// Ovulation is placed this many days before the end of the cycle.
const LUTEAL_LENGTH_DAYS: u32 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Menstruation,
    Follicular,
    Ovulation,
    Luteal,
    Unknown,
}

impl CyclePhase {
    /// Phase for a 1-based day within a cycle of `length` days.
    pub fn from_day(day: u32, length: u32) -> Self {
        if day == 0 || day > length {
            return CyclePhase::Unknown;
        }
        let ovulation_day = length.saturating_sub(LUTEAL_LENGTH_DAYS).max(1);
        if day <= MENSTRUATION_DAYS {
            CyclePhase::Menstruation
        } else if day + 1 >= ovulation_day && day <= ovulation_day + 1 {
            CyclePhase::Ovulation
        } else if day < ovulation_day {
            CyclePhase::Follicular
        } else {
            CyclePhase::Luteal
        }
    }

    /// Static `(basal, smb)` multipliers for the phase.
    pub fn base_multipliers(self) -> (f64, f64) {
        match self {
            CyclePhase::Menstruation => (0.95, 0.95),
            CyclePhase::Follicular => (1.0, 1.0),
            CyclePhase::Ovulation => (1.05, 1.03),
            CyclePhase::Luteal => (1.12, 1.10),
            CyclePhase::Unknown => (1.0, 1.0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CyclePhase::Menstruation => "menstruation",
            CyclePhase::Follicular => "follicular",
            CyclePhase::Ovulation => "ovulation",
            CyclePhase::Luteal => "luteal",
            CyclePhase::Unknown => "unknown",
        }
    }
}

/// EMA pair for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseEma {
    pub basal: f64,
    pub smb: f64,
    pub samples: u32,
}

impl Default for PhaseEma {
    fn default() -> Self {
        Self {
            basal: 1.0,
            smb: 1.0,
            samples: 0,
        }
    }
}

/// Persisted per-phase learning state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseLearner {
    phases: BTreeMap<CyclePhase, PhaseEma>,
}

impl PhaseLearner {
    /// Fold one observation of effective basal/SMB need into the phase EMA.
    ///
    /// `ema_new = ema_old + alpha × (observed − ema_old)`, starting from 1.0 on
    /// the first observation of a phase. Returns false (and learns nothing) for
    /// the unknown phase, a non-positive alpha, or non-finite/non-positive
    /// observations.
    pub fn observe(&mut self, phase: CyclePhase, basal_need: f64, smb_need: f64, alpha: f64) -> bool {
        if phase == CyclePhase::Unknown {
            return false;
        }
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !(valid(basal_need) && valid(smb_need) && valid(alpha)) {
            tracing::warn!(?phase, basal_need, smb_need, "phase observation ignored");
            return false;
        }
        let a = alpha.min(1.0);
        let ema = self.phases.entry(phase).or_default();
        ema.basal += a * (basal_need - ema.basal);
        ema.smb += a * (smb_need - ema.smb);
        ema.samples = ema.samples.saturating_add(1);
        tracing::debug!(?phase, basal = ema.basal, smb = ema.smb, samples = ema.samples, "phase learned");
        true
    }

    /// Clamped `(basal, smb)` learned multipliers; neutral for unseen phases.
    pub fn learned_multipliers(&self, phase: CyclePhase, clamp_min: f64, clamp_max: f64) -> (f64, f64) {
        let ema = self.phases.get(&phase).copied().unwrap_or_default();
        (
            clamp_between(ema.basal, clamp_min, clamp_max),
            clamp_between(ema.smb, clamp_min, clamp_max),
        )
    }

    pub fn samples(&self, phase: CyclePhase) -> u32 {
        self.phases.get(&phase).map_or(0, |e| e.samples)
    }
}

/// Snapshot of the cycle adjustment for one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WCycleInfo {
    pub enabled: bool,
    pub phase: CyclePhase,
    pub day_in_cycle: Option<u32>,
    pub base_basal: f64,
    pub base_smb: f64,
    pub learned_basal: f64,
    pub learned_smb: f64,
    pub applied_basal: f64,
    pub applied_smb: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CycleAdjuster {
    cfg: CycleCfg,
    learner: LearnerCfg,
}

impl CycleAdjuster {
    pub fn new(cfg: CycleCfg, learner: LearnerCfg) -> Self {
        Self { cfg, learner }
    }

    /// 1-based day within the current cycle, or None when tracking is off.
    pub fn day_in_cycle(&self, today: NaiveDate) -> Option<u32> {
        if !self.cfg.enabled || self.cfg.length_days == 0 {
            return None;
        }
        let start = self.cfg.last_period_start?;
        let days = (today - start).num_days();
        if days < 0 {
            return None;
        }
        let len = i64::from(self.cfg.length_days);
        u32::try_from(days % len + 1).ok()
    }

    pub fn phase(&self, today: NaiveDate) -> CyclePhase {
        self.day_in_cycle(today)
            .map_or(CyclePhase::Unknown, |d| CyclePhase::from_day(d, self.cfg.length_days))
    }

    pub fn get_info(&self, learner: &PhaseLearner, today: NaiveDate) -> WCycleInfo {
        let day = self.day_in_cycle(today);
        let phase = self.phase(today);
        let (base_basal, base_smb) = phase.base_multipliers();
        let (learned_basal, learned_smb) =
            learner.learned_multipliers(phase, self.cfg.clamp_min, self.cfg.clamp_max);
        WCycleInfo {
            enabled: self.cfg.enabled,
            phase,
            day_in_cycle: day,
            base_basal,
            base_smb,
            learned_basal,
            learned_smb,
            applied_basal: clamp_between(base_basal * learned_basal, self.cfg.clamp_min, self.cfg.clamp_max),
            applied_smb: clamp_between(base_smb * learned_smb, self.cfg.clamp_min, self.cfg.clamp_max),
        }
    }

    /// Record one day's observed effective need for the current phase.
    pub fn learn(&self, learner: &mut PhaseLearner, today: NaiveDate, basal_need: f64, smb_need: f64) -> bool {
        learner.observe(self.phase(today), basal_need, smb_need, self.learner.alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn adjuster() -> CycleAdjuster {
        CycleAdjuster::new(
            CycleCfg {
                enabled: true,
                last_period_start: Some(date("2026-10-01")),
                ..CycleCfg::default()
            },
            LearnerCfg::default(),
        )
    }

    #[test]
    fn phases_over_a_28_day_cycle() {
        assert_eq!(CyclePhase::from_day(1, 28), CyclePhase::Menstruation);
        assert_eq!(CyclePhase::from_day(5, 28), CyclePhase::Menstruation);
        assert_eq!(CyclePhase::from_day(6, 28), CyclePhase::Follicular);
        assert_eq!(CyclePhase::from_day(12, 28), CyclePhase::Follicular);
        assert_eq!(CyclePhase::from_day(13, 28), CyclePhase::Ovulation);
        assert_eq!(CyclePhase::from_day(15, 28), CyclePhase::Ovulation);
        assert_eq!(CyclePhase::from_day(16, 28), CyclePhase::Luteal);
        assert_eq!(CyclePhase::from_day(28, 28), CyclePhase::Luteal);
        assert_eq!(CyclePhase::from_day(0, 28), CyclePhase::Unknown);
        assert_eq!(CyclePhase::from_day(29, 28), CyclePhase::Unknown);
    }

    #[test]
    fn day_in_cycle_wraps() {
        let a = adjuster();
        assert_eq!(a.day_in_cycle(date("2026-10-01")), Some(1));
        assert_eq!(a.day_in_cycle(date("2026-10-28")), Some(28));
        assert_eq!(a.day_in_cycle(date("2026-10-29")), Some(1));
        assert_eq!(a.day_in_cycle(date("2026-09-30")), None);
    }

    #[test]
    fn disabled_tracking_is_neutral() {
        let a = CycleAdjuster::default();
        let info = a.get_info(&PhaseLearner::default(), date("2026-10-19"));
        assert!(!info.enabled);
        assert_eq!(info.phase, CyclePhase::Unknown);
        assert_eq!((info.applied_basal, info.applied_smb), (1.0, 1.0));
    }

    #[test]
    fn ema_starts_at_one_and_moves_by_alpha() {
        let mut l = PhaseLearner::default();
        assert!(l.observe(CyclePhase::Luteal, 1.2, 0.9, 0.1));
        let (b, s) = l.learned_multipliers(CyclePhase::Luteal, 0.5, 2.0);
        assert!((b - 1.02).abs() < 1e-12);
        assert!((s - 0.99).abs() < 1e-12);
        assert!(l.observe(CyclePhase::Luteal, 1.2, 0.9, 0.1));
        let (b, _) = l.learned_multipliers(CyclePhase::Luteal, 0.5, 2.0);
        assert!((b - (1.02 + 0.1 * (1.2 - 1.02))).abs() < 1e-12);
        assert_eq!(l.samples(CyclePhase::Luteal), 2);
        assert_eq!(l.samples(CyclePhase::Follicular), 0);
    }

    #[test]
    fn learner_rejects_unknown_phase_and_bad_values() {
        let mut l = PhaseLearner::default();
        assert!(!l.observe(CyclePhase::Unknown, 1.1, 1.1, 0.1));
        assert!(!l.observe(CyclePhase::Luteal, f64::NAN, 1.1, 0.1));
        assert!(!l.observe(CyclePhase::Luteal, 1.1, -1.0, 0.1));
        assert_eq!(l, PhaseLearner::default());
    }

    #[test]
    fn applied_multiplier_is_double_clamped() {
        let mut l = PhaseLearner::default();
        for _ in 0..200 {
            l.observe(CyclePhase::Luteal, 3.0, 3.0, 0.5);
        }
        let a = adjuster();
        // 2026-10-20 is day 20: luteal
        let info = a.get_info(&l, date("2026-10-20"));
        assert_eq!(info.phase, CyclePhase::Luteal);
        assert_eq!(info.learned_basal, 1.25);
        assert_eq!(info.applied_basal, 1.25);
        assert!((info.base_basal - 1.12).abs() < 1e-12);
    }

    #[test]
    fn learn_uses_current_phase() {
        let a = adjuster();
        let mut l = PhaseLearner::default();
        assert!(a.learn(&mut l, date("2026-10-02"), 1.1, 1.1));
        assert_eq!(l.samples(CyclePhase::Menstruation), 1);
    }
}

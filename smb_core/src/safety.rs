//! Safety overrides: aggressive dosing on high glucose, and the basal-first gate.
//!
//! Both are pure predicates evaluated fresh every cycle; neither keeps state.

use serde::Serialize;

use crate::config::{BasalFirstCfg, OverrideCfg};
use crate::quantizer::quantize;

/// Result of the high-glucose override.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SafetyOverrideResult {
    pub dose: f64,
    pub fired: bool,
    /// Forced minutes until the next dosing decision; 0 means immediately.
    pub forced_interval_min: Option<u32>,
}

impl SafetyOverrideResult {
    fn passthrough(dose: f64) -> Self {
        Self {
            dose,
            fired: false,
            forced_interval_min: None,
        }
    }
}

/// Glucose readings the override compares against the hypo guard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlucoseReadings {
    pub bg: f64,
    pub delta: f64,
    pub predicted_bg: f64,
    pub eventual_bg: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HighBgOverride {
    cfg: OverrideCfg,
}

impl HighBgOverride {
    pub fn new(cfg: OverrideCfg) -> Self {
        Self { cfg }
    }

    /// Whether the override would fire for these readings.
    ///
    /// Requires high or fast-rising glucose, every reading above `hypo_guard`,
    /// and IOB below `max_smb`. Any non-finite input keeps the override off.
    pub fn should_fire(&self, g: &GlucoseReadings, hypo_guard: f64, iob: f64, max_smb: f64) -> bool {
        let inputs = [g.bg, g.delta, g.predicted_bg, g.eventual_bg, hypo_guard, iob, max_smb];
        if inputs.iter().any(|v| !v.is_finite()) {
            return false;
        }
        let high = g.bg >= self.cfg.high_bg
            || (g.bg >= self.cfg.rising_bg && g.delta >= self.cfg.rising_delta);
        let lowest = g.bg.min(g.predicted_bg).min(g.eventual_bg);
        let no_hypo_risk = lowest > hypo_guard;
        let headroom = iob < max_smb;
        high && no_hypo_risk && headroom
    }

    /// Apply the override to `current_dose`.
    ///
    /// When firing, the dose is clamped into `[pump_step, max_smb]` on the pump
    /// grid and the next interval is forced to 0. Otherwise the dose passes
    /// through unchanged.
    pub fn apply(
        &self,
        g: &GlucoseReadings,
        hypo_guard: f64,
        iob: f64,
        max_smb: f64,
        current_dose: f64,
        pump_step: f64,
    ) -> SafetyOverrideResult {
        if !self.should_fire(g, hypo_guard, iob, max_smb) {
            return SafetyOverrideResult::passthrough(current_dose);
        }
        let floor = pump_step.min(max_smb).max(0.0);
        let dose = quantize(current_dose, pump_step, floor, max_smb);
        tracing::info!(
            bg = g.bg,
            delta = g.delta,
            iob,
            proposed = current_dose,
            dose,
            "high-bg override fired"
        );
        SafetyOverrideResult {
            dose,
            fired: true,
            forced_interval_min: Some(0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BasalFirstGate {
    cfg: BasalFirstCfg,
}

impl BasalFirstGate {
    pub fn new(cfg: BasalFirstCfg) -> Self {
        Self { cfg }
    }

    /// True when bolus dosing should give way to basal adjustment.
    ///
    /// Opens on low learner confidence or on low, falling glucose, unless a
    /// meal-advisor one-shot override is active. A non-finite confidence counts
    /// as low.
    pub fn is_active(&self, learner_confidence: f64, bg: f64, delta: f64, one_shot_active: bool) -> bool {
        if one_shot_active {
            return false;
        }
        let low_confidence =
            !learner_confidence.is_finite() || learner_confidence < self.cfg.min_confidence;
        let low_and_falling = bg < self.cfg.low_bg && delta < 0.0;
        low_confidence || low_and_falling
    }
}

//! Condition-aware multipliers (thyroid status, skin inflammation) and their
//! composition with the cycle adjustment.

use serde::Serialize;

use crate::cycle::{CyclePhase, WCycleInfo};

/// Bounds for the composed cycle × inflammation multipliers.
pub const COMPOSED_MIN: f64 = 0.7;
pub const COMPOSED_MAX: f64 = 1.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThyroidStatus {
    #[default]
    Normal,
    Hypo,
    Hyper,
}

/// Severity of a chronic skin/soft-tissue inflammatory flare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SkinInflammation {
    #[default]
    None,
    Mild,
    Moderate,
    Severe,
}

/// Multipliers from one set of condition flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InflammationResult {
    pub basal_mult: f64,
    pub smb_mult: f64,
    pub isf_mult: f64,
    /// Contributing non-neutral factors, comma separated; empty when neutral.
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InflammationAdjuster {
    pub thyroid: ThyroidStatus,
    pub skin: SkinInflammation,
}

impl InflammationAdjuster {
    pub fn new(thyroid: ThyroidStatus, skin: SkinInflammation) -> Self {
        Self { thyroid, skin }
    }

    pub fn evaluate(&self) -> InflammationResult {
        // (basal, smb, isf)
        let thyroid = match self.thyroid {
            ThyroidStatus::Normal => (1.0, 1.0, 1.0),
            ThyroidStatus::Hypo => (0.95, 0.95, 1.05),
            ThyroidStatus::Hyper => (1.10, 1.05, 0.95),
        };
        let skin = match self.skin {
            SkinInflammation::None => (1.0, 1.0, 1.0),
            SkinInflammation::Mild => (1.05, 1.03, 0.97),
            SkinInflammation::Moderate => (1.10, 1.06, 0.94),
            SkinInflammation::Severe => (1.20, 1.10, 0.90),
        };

        let mut reasons = Vec::new();
        if self.thyroid != ThyroidStatus::Normal {
            reasons.push(format!("thyroid={}", thyroid_name(self.thyroid)));
        }
        if self.skin != SkinInflammation::None {
            reasons.push(format!("skin={}", skin_name(self.skin)));
        }
        InflammationResult {
            basal_mult: thyroid.0 * skin.0,
            smb_mult: thyroid.1 * skin.1,
            isf_mult: thyroid.2 * skin.2,
            reason: reasons.join(", "),
        }
    }
}

fn thyroid_name(t: ThyroidStatus) -> &'static str {
    match t {
        ThyroidStatus::Normal => "normal",
        ThyroidStatus::Hypo => "hypo",
        ThyroidStatus::Hyper => "hyper",
    }
}

fn skin_name(s: SkinInflammation) -> &'static str {
    match s {
        SkinInflammation::None => "none",
        SkinInflammation::Mild => "mild",
        SkinInflammation::Moderate => "moderate",
        SkinInflammation::Severe => "severe",
    }
}

/// Final basal/SMB/ISF multipliers after composing cycle and conditions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposedAdjustment {
    pub basal: f64,
    pub smb: f64,
    pub isf: f64,
    pub reason: String,
}

/// `final = cycle × inflammation`, clamped to `[COMPOSED_MIN, COMPOSED_MAX]`.
pub fn compose(cycle: &WCycleInfo, inflam: &InflammationResult) -> ComposedAdjustment {
    let mut parts = Vec::new();
    if cycle.enabled && cycle.phase != CyclePhase::Unknown {
        match cycle.day_in_cycle {
            Some(day) => parts.push(format!("cycle={} (day {day})", cycle.phase.as_str())),
            None => parts.push(format!("cycle={}", cycle.phase.as_str())),
        }
    }
    if !inflam.reason.is_empty() {
        parts.push(inflam.reason.clone());
    }
    ComposedAdjustment {
        basal: (cycle.applied_basal * inflam.basal_mult).clamp(COMPOSED_MIN, COMPOSED_MAX),
        smb: (cycle.applied_smb * inflam.smb_mult).clamp(COMPOSED_MIN, COMPOSED_MAX),
        isf: inflam.isf_mult.clamp(COMPOSED_MIN, COMPOSED_MAX),
        reason: if parts.is_empty() {
            "neutral".to_string()
        } else {
            parts.join(", ")
        },
    }
}

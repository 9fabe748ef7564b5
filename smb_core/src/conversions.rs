//! `From` implementations bridging `smb_config` types to `smb_core` types.

use crate::config::{
    BasalFirstCfg, CycleCfg, DampingCfg, FusionCfg, LearnerCfg, MealAdvisorCfg, OverrideCfg,
    PkPdCfg, PumpLimits,
};
use crate::inflammation::{SkinInflammation, ThyroidStatus};

// ── PumpLimits ───────────────────────────────────────────────────────────────

impl From<&smb_config::Pump> for PumpLimits {
    fn from(c: &smb_config::Pump) -> Self {
        Self {
            bolus_step: c.bolus_step,
            max_smb: c.max_smb,
            max_basal: c.max_basal,
            max_iob: c.max_iob,
        }
    }
}

// ── FusionCfg ────────────────────────────────────────────────────────────────

impl From<&smb_config::Fusion> for FusionCfg {
    fn from(c: &smb_config::Fusion) -> Self {
        Self {
            min_factor: c.min_factor,
            max_factor: c.max_factor,
            max_change_per_5min: c.max_change_per_5min,
        }
    }
}

// ── DampingCfg ───────────────────────────────────────────────────────────────

impl From<&smb_config::Damping> for DampingCfg {
    fn from(c: &smb_config::Damping) -> Self {
        Self {
            tail_threshold: c.tail_threshold,
            tail_mult: c.tail_mult,
            exercise_mult: c.exercise_mult,
            late_fat_mult: c.late_fat_mult,
        }
    }
}

// ── Safety ───────────────────────────────────────────────────────────────────

impl From<&smb_config::Safety> for OverrideCfg {
    fn from(c: &smb_config::Safety) -> Self {
        Self {
            high_bg: c.high_bg,
            rising_bg: c.rising_bg,
            rising_delta: c.rising_delta,
        }
    }
}

impl From<&smb_config::Safety> for BasalFirstCfg {
    fn from(c: &smb_config::Safety) -> Self {
        Self {
            min_confidence: c.basal_first_confidence,
            low_bg: c.basal_first_bg,
        }
    }
}

// ── PkPdCfg ──────────────────────────────────────────────────────────────────

impl From<&smb_config::PkPd> for PkPdCfg {
    fn from(c: &smb_config::PkPd) -> Self {
        Self {
            dia_hours: c.dia_hours,
            peak_minutes: c.peak_minutes,
            smb_ratio: c.smb_ratio,
            scale_min: c.scale_min,
            scale_max: c.scale_max,
        }
    }
}

// ── MealAdvisorCfg ───────────────────────────────────────────────────────────

impl From<&smb_config::Meal> for MealAdvisorCfg {
    fn from(c: &smb_config::Meal) -> Self {
        Self {
            min_rise_above_target: c.min_rise_above_target,
            iob_fraction: c.iob_fraction,
            min_factor: c.min_factor,
        }
    }
}

// ── Cycle & conditions ───────────────────────────────────────────────────────

impl From<&smb_config::Cycle> for CycleCfg {
    fn from(c: &smb_config::Cycle) -> Self {
        Self {
            enabled: c.enabled,
            last_period_start: c.last_period_start,
            length_days: c.length_days,
            clamp_min: c.clamp_min,
            clamp_max: c.clamp_max,
        }
    }
}

impl From<smb_config::Thyroid> for ThyroidStatus {
    fn from(t: smb_config::Thyroid) -> Self {
        match t {
            smb_config::Thyroid::Normal => Self::Normal,
            smb_config::Thyroid::Hypo => Self::Hypo,
            smb_config::Thyroid::Hyper => Self::Hyper,
        }
    }
}

impl From<smb_config::SkinInflammation> for SkinInflammation {
    fn from(s: smb_config::SkinInflammation) -> Self {
        match s {
            smb_config::SkinInflammation::None => Self::None,
            smb_config::SkinInflammation::Mild => Self::Mild,
            smb_config::SkinInflammation::Moderate => Self::Moderate,
            smb_config::SkinInflammation::Severe => Self::Severe,
        }
    }
}

// ── LearnerCfg ───────────────────────────────────────────────────────────────

impl From<&smb_config::Learner> for LearnerCfg {
    fn from(c: &smb_config::Learner) -> Self {
        Self { alpha: c.alpha }
    }
}

#[cfg(test)]
mod tests {
    use crate::pipeline::SmbPipelineBuilder;

    #[test]
    fn toml_config_builds_a_pipeline() {
        let cfg = smb_config::load_toml(
            r#"
[pump]
bolus_step = 0.1
max_smb = 1.5

[cycle]
thyroid = "hyper"
skin_inflammation = "mild"
"#,
        )
        .unwrap();
        let pipeline = SmbPipelineBuilder::from_config(&cfg).build().unwrap();
        assert_eq!(pipeline.pump().bolus_step, 0.1);
        assert_eq!(pipeline.pump().max_smb, 1.5);
        let r = pipeline.inflammation().evaluate();
        assert_eq!(r.reason, "thyroid=hyper, skin=mild");
    }
}

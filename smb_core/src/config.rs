//! Configuration types for the decision pipeline.
//!
//! These are the runtime configuration structs used by the components.
//! They are separate from the TOML-deserialized config in `smb_config`.

/// Pump delivery limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpLimits {
    /// Smallest deliverable bolus increment (U).
    pub bolus_step: f64,
    /// Upper bound for a single SMB (U).
    pub max_smb: f64,
    /// Upper bound for the temp basal rate (U/h).
    pub max_basal: f64,
    /// Insulin-on-board ceiling (U).
    pub max_iob: f64,
}

impl Default for PumpLimits {
    fn default() -> Self {
        Self {
            bolus_step: 0.05,
            max_smb: 2.0,
            max_basal: 3.0,
            max_iob: 6.0,
        }
    }
}

/// ISF fusion bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionCfg {
    /// Lower band as a fraction of the TDD-derived ISF.
    pub min_factor: f64,
    /// Upper band as a fraction of the TDD-derived ISF.
    pub max_factor: f64,
    /// Largest relative change allowed against the previous fused value.
    pub max_change_per_5min: f64,
}

impl Default for FusionCfg {
    fn default() -> Self {
        Self {
            min_factor: 0.75,
            max_factor: 1.25,
            max_change_per_5min: 0.03,
        }
    }
}

/// SMB damper thresholds and factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DampingCfg {
    /// Tail damper fires when the IOB tail fraction exceeds this.
    pub tail_threshold: f64,
    pub tail_mult: f64,
    pub exercise_mult: f64,
    pub late_fat_mult: f64,
}

impl Default for DampingCfg {
    fn default() -> Self {
        Self {
            tail_threshold: 0.25,
            tail_mult: 0.5,
            exercise_mult: 0.6,
            late_fat_mult: 0.7,
        }
    }
}

/// High-glucose override thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverrideCfg {
    pub high_bg: f64,
    pub rising_bg: f64,
    pub rising_delta: f64,
}

impl Default for OverrideCfg {
    fn default() -> Self {
        Self {
            high_bg: 180.0,
            rising_bg: 150.0,
            rising_delta: 1.5,
        }
    }
}

/// Basal-first conservatism gate thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasalFirstCfg {
    pub min_confidence: f64,
    pub low_bg: f64,
}

impl Default for BasalFirstCfg {
    fn default() -> Self {
        Self {
            min_confidence: 0.75,
            low_bg: 110.0,
        }
    }
}

/// Reference PK/PD model parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PkPdCfg {
    pub dia_hours: f64,
    pub peak_minutes: f64,
    /// Fraction of the insulin requirement proposed as one SMB.
    pub smb_ratio: f64,
    pub scale_min: f64,
    pub scale_max: f64,
}

impl Default for PkPdCfg {
    fn default() -> Self {
        Self {
            dia_hours: 5.0,
            peak_minutes: 75.0,
            smb_ratio: 0.5,
            scale_min: 0.7,
            scale_max: 1.3,
        }
    }
}

/// Meal/high-IOB relaxation thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MealAdvisorCfg {
    pub min_rise_above_target: f64,
    pub iob_fraction: f64,
    pub min_factor: f64,
}

impl Default for MealAdvisorCfg {
    fn default() -> Self {
        Self {
            min_rise_above_target: 20.0,
            iob_fraction: 0.7,
            min_factor: 0.3,
        }
    }
}

/// Hormonal cycle tracking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleCfg {
    pub enabled: bool,
    pub last_period_start: Option<chrono::NaiveDate>,
    pub length_days: u32,
    /// Bounds applied to learned and applied multipliers.
    pub clamp_min: f64,
    pub clamp_max: f64,
}

impl Default for CycleCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            last_period_start: None,
            length_days: 28,
            clamp_min: 0.8,
            clamp_max: 1.25,
        }
    }
}

/// Phase learner smoothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnerCfg {
    /// EMA smoothing factor in (0.0, 1.0].
    pub alpha: f64,
}

impl Default for LearnerCfg {
    fn default() -> Self {
        Self { alpha: 0.1 }
    }
}

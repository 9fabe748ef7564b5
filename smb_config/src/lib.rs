#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the SMB decision loop.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section is optional; absent sections take the clinical defaults
//!   used by `smb_core`.
use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pump {
    /// Smallest deliverable bolus increment (U)
    pub bolus_step: f64,
    /// Upper bound for a single SMB (U)
    pub max_smb: f64,
    /// Upper bound for the temp basal rate (U/h)
    pub max_basal: f64,
    /// Insulin-on-board ceiling used by the meal relaxation advisor (U)
    pub max_iob: f64,
}

impl Default for Pump {
    fn default() -> Self {
        Self {
            bolus_step: 0.05,
            max_smb: 2.0,
            max_basal: 3.0,
            max_iob: 6.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Fusion {
    pub min_factor: f64,
    pub max_factor: f64,
    /// Largest relative change of the fused ISF between two cycles
    pub max_change_per_5min: f64,
}

impl Default for Fusion {
    fn default() -> Self {
        Self {
            min_factor: 0.75,
            max_factor: 1.25,
            max_change_per_5min: 0.03,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Damping {
    pub tail_threshold: f64,
    pub tail_mult: f64,
    pub exercise_mult: f64,
    pub late_fat_mult: f64,
}

impl Default for Damping {
    fn default() -> Self {
        Self {
            tail_threshold: 0.25,
            tail_mult: 0.5,
            exercise_mult: 0.6,
            late_fat_mult: 0.7,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Safety {
    /// Override fires at or above this glucose (mg/dL)
    pub high_bg: f64,
    /// Override also fires at or above this glucose when rising fast
    pub rising_bg: f64,
    /// Minimum 5-minute delta counted as rising fast
    pub rising_delta: f64,
    /// Basal-first gate opens below this learner confidence
    pub basal_first_confidence: f64,
    /// Basal-first gate opens below this glucose while falling
    pub basal_first_bg: f64,
}

impl Default for Safety {
    fn default() -> Self {
        Self {
            high_bg: 180.0,
            rising_bg: 150.0,
            rising_delta: 1.5,
            basal_first_confidence: 0.75,
            basal_first_bg: 110.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PkPd {
    pub dia_hours: f64,
    pub peak_minutes: f64,
    /// Fraction of the insulin requirement proposed as one SMB
    pub smb_ratio: f64,
    pub scale_min: f64,
    pub scale_max: f64,
}

impl Default for PkPd {
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Meal {
    /// Relaxation needs glucose this far above target (mg/dL)
    pub min_rise_above_target: f64,
    /// Relaxation needs IOB at or above this fraction of max IOB
    pub iob_fraction: f64,
    pub min_factor: f64,
}

impl Default for Meal {
    fn default() -> Self {
        Self {
            min_rise_above_target: 20.0,
            iob_fraction: 0.7,
            min_factor: 0.3,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Thyroid {
    #[default]
    Normal,
    Hypo,
    Hyper,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SkinInflammation {
    #[default]
    None,
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Cycle {
    pub enabled: bool,
    /// First day of the last menstruation ("YYYY-MM-DD")
    pub last_period_start: Option<NaiveDate>,
    pub length_days: u32,
    pub clamp_min: f64,
    pub clamp_max: f64,
    pub thyroid: Thyroid,
    pub skin_inflammation: SkinInflammation,
}

impl Default for Cycle {
    fn default() -> Self {
        Self {
            enabled: false,
            last_period_start: None,
            length_days: 28,
            clamp_min: 0.8,
            clamp_max: 1.25,
            thyroid: Thyroid::Normal,
            skin_inflammation: SkinInflammation::None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Learner {
    pub alpha: f64,
}

impl Default for Learner {
    fn default() -> Self {
        Self { alpha: 0.1 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Audit {
    /// CSV file receiving one row per cycle; absent disables auditing
    pub csv: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct StateCfg {
    /// JSON file holding the learning state between invocations
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub pump: Pump,
    pub fusion: Fusion,
    pub damping: Damping,
    pub safety: Safety,
    pub pkpd: PkPd,
    pub meal: Meal,
    pub cycle: Cycle,
    pub learner: Learner,
    pub logging: Logging,
    pub audit: Audit,
    pub state: StateCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Strictly positive and finite.
#[inline]
fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pump
        if !positive(self.pump.bolus_step) {
            eyre::bail!("pump.bolus_step must be > 0");
        }
        if !positive(self.pump.max_smb) {
            eyre::bail!("pump.max_smb must be > 0");
        }
        if self.pump.bolus_step > self.pump.max_smb {
            eyre::bail!("pump.bolus_step must be <= pump.max_smb");
        }
        if !positive(self.pump.max_basal) {
            eyre::bail!("pump.max_basal must be > 0");
        }
        if !positive(self.pump.max_iob) {
            eyre::bail!("pump.max_iob must be > 0");
        }

        // Fusion
        if !positive(self.fusion.min_factor) || self.fusion.min_factor > 1.0 {
            eyre::bail!("fusion.min_factor must be in (0.0, 1.0]");
        }
        if !self.fusion.max_factor.is_finite() || self.fusion.max_factor < 1.0 {
            eyre::bail!("fusion.max_factor must be >= 1.0");
        }
        if !positive(self.fusion.max_change_per_5min) || self.fusion.max_change_per_5min > 0.5 {
            eyre::bail!("fusion.max_change_per_5min must be in (0.0, 0.5]");
        }

        // Damping
        if !(0.0..=1.0).contains(&self.damping.tail_threshold) {
            eyre::bail!("damping.tail_threshold must be in [0.0, 1.0]");
        }
        for (name, m) in [
            ("damping.tail_mult", self.damping.tail_mult),
            ("damping.exercise_mult", self.damping.exercise_mult),
            ("damping.late_fat_mult", self.damping.late_fat_mult),
        ] {
            if !positive(m) || m > 1.0 {
                eyre::bail!("{name} must be in (0.0, 1.0]");
            }
        }

        // Safety
        if !positive(self.safety.high_bg) || !positive(self.safety.rising_bg) {
            eyre::bail!("safety glucose thresholds must be > 0");
        }
        if self.safety.rising_bg > self.safety.high_bg {
            eyre::bail!("safety.rising_bg must be <= safety.high_bg");
        }
        if !self.safety.rising_delta.is_finite() {
            eyre::bail!("safety.rising_delta must be finite");
        }
        if !(0.0..=1.0).contains(&self.safety.basal_first_confidence) {
            eyre::bail!("safety.basal_first_confidence must be in [0.0, 1.0]");
        }
        if !positive(self.safety.basal_first_bg) {
            eyre::bail!("safety.basal_first_bg must be > 0");
        }

        // PK/PD
        if !positive(self.pkpd.dia_hours) || self.pkpd.dia_hours > 12.0 {
            eyre::bail!("pkpd.dia_hours must be in (0, 12]");
        }
        if !positive(self.pkpd.peak_minutes) || self.pkpd.peak_minutes >= self.pkpd.dia_hours * 60.0
        {
            eyre::bail!("pkpd.peak_minutes must be > 0 and shorter than the DIA");
        }
        if !positive(self.pkpd.smb_ratio) || self.pkpd.smb_ratio > 1.0 {
            eyre::bail!("pkpd.smb_ratio must be in (0.0, 1.0]");
        }
        if !positive(self.pkpd.scale_min) || self.pkpd.scale_min > 1.0 {
            eyre::bail!("pkpd.scale_min must be in (0.0, 1.0]");
        }
        if !self.pkpd.scale_max.is_finite() || self.pkpd.scale_max < 1.0 {
            eyre::bail!("pkpd.scale_max must be >= 1.0");
        }

        // Meal
        if !self.meal.min_rise_above_target.is_finite() {
            eyre::bail!("meal.min_rise_above_target must be finite");
        }
        if !(0.0..=1.0).contains(&self.meal.iob_fraction) {
            eyre::bail!("meal.iob_fraction must be in [0.0, 1.0]");
        }
        if !positive(self.meal.min_factor) || self.meal.min_factor > 1.0 {
            eyre::bail!("meal.min_factor must be in (0.0, 1.0]");
        }

        // Cycle
        if !(20..=45).contains(&self.cycle.length_days) {
            eyre::bail!("cycle.length_days must be in [20, 45]");
        }
        if !positive(self.cycle.clamp_min) || self.cycle.clamp_min > 1.0 {
            eyre::bail!("cycle.clamp_min must be in (0.0, 1.0]");
        }
        if !self.cycle.clamp_max.is_finite() || self.cycle.clamp_max < 1.0 {
            eyre::bail!("cycle.clamp_max must be >= 1.0");
        }
        if self.cycle.enabled && self.cycle.last_period_start.is_none() {
            eyre::bail!("cycle.last_period_start is required when cycle.enabled = true");
        }

        // Learner
        if !positive(self.learner.alpha) || self.learner.alpha > 1.0 {
            eyre::bail!("learner.alpha must be in (0.0, 1.0]");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

//! Per-cycle data handed across the core boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PumpLimits;

/// Active behavioral modes announced by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MealModes {
    pub meal: bool,
    pub breakfast: bool,
    pub lunch: bool,
    pub dinner: bool,
    pub high_carb: bool,
    pub snack: bool,
}

impl MealModes {
    /// True when any meal-related mode is active.
    pub fn any_active(&self) -> bool {
        self.meal || self.breakfast || self.lunch || self.dinner || self.high_carb || self.snack
    }
}

/// Context flags raised by upstream detectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextFlags {
    /// Physical activity ended recently.
    pub recent_exercise: bool,
    /// Slow late rise consistent with a fatty meal.
    pub late_fat_meal: bool,
    /// Night-time rise that may come from growth hormone.
    pub night_growth_candidate: bool,
}

/// Immutable snapshot for one control cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopContext {
    pub timestamp: DateTime<Utc>,
    /// Current glucose (mg/dL).
    pub bg: f64,
    /// Glucose change over the last 5 minutes (mg/dL).
    pub delta: f64,
    /// Insulin on board (U).
    pub iob: f64,
    /// Carbs on board (g).
    #[serde(default)]
    pub cob: f64,
    pub eventual_bg: f64,
    pub predicted_bg: f64,
    pub target_bg: f64,
    pub profile_isf: f64,
    pub tdd_isf: f64,
    /// Autosens-style ratio; above 1.0 means more resistant.
    #[serde(default = "neutral_ratio")]
    pub sensitivity_ratio: f64,
    #[serde(default)]
    pub minutes_since_last_bolus: Option<f64>,
    /// Meal advisor one-shot override currently active.
    #[serde(default)]
    pub meal_advisor_one_shot: bool,
    #[serde(default)]
    pub modes: MealModes,
    #[serde(default)]
    pub flags: ContextFlags,
    /// Set from configuration, never read from the snapshot file.
    #[serde(skip)]
    pub pump: PumpLimits,
}

fn neutral_ratio() -> f64 {
    1.0
}

/// PK/PD model output for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PkPdSnapshot {
    pub fused_isf: f64,
    pub dia_hours: f64,
    pub peak_minutes: f64,
    /// Raw SMB proposal (U), absent when the model has no opinion.
    pub raw_smb: Option<f64>,
    /// Fraction of IOB attributable to the absorption tail, in [0, 1].
    pub tail_fraction: f64,
}

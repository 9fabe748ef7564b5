//! Scenario weighting and percentile bands for predicted glucose trajectories.
//!
//! Three scenario curves (insulin-only, unannounced meal, zero temp) are
//! weighted from context signals, then combined per time offset into weighted
//! 5th/50th/95th percentiles.

use serde::{Deserialize, Serialize};

/// Physiologic clamp for reported band values (mg/dL).
pub const BAND_MIN_BG: f64 = 39.0;
pub const BAND_MAX_BG: f64 = 401.0;
/// Every scenario keeps at least this weight before renormalization.
pub const WEIGHT_FLOOR: f64 = 0.01;

const PRIOR_IOB: f64 = 0.40;
const PRIOR_UAM: f64 = 0.35;
const PRIOR_ZT: f64 = 0.25;

/// Trend contribution per mg/dL/5min, capped at `TREND_CAP`.
const TREND_GAIN: f64 = 0.05;
const TREND_CAP: f64 = 0.25;
const SLOPE_NUDGE: f64 = 0.10;
/// Parabola peaks inside this window (minutes ahead) look like a meal.
const PEAK_WINDOW_MIN: (f64, f64) = (20.0, 60.0);
const PEAK_NUDGE: f64 = 0.05;
const NIGHT_GROWTH_NUDGE: f64 = 0.05;
const TAIL_HIGH: f64 = 0.4;
const TAIL_HIGH_NUDGE: f64 = 0.10;
const TAIL_LOW: f64 = 0.1;
const TAIL_LOW_NUDGE: f64 = 0.05;
/// Carbs on board below this count as "no meal" (g).
const LOW_COB_G: f64 = 5.0;
const LOW_COB_NUDGE: f64 = 0.05;
const LATE_FAT_NUDGE: f64 = 0.08;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scenario {
    #[serde(rename = "IOB")]
    InsulinOnly,
    #[serde(rename = "UAM")]
    UnannouncedMeal,
    #[serde(rename = "ZT")]
    ZeroTemp,
}

/// Context signals feeding the scenario weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioInput {
    /// Combined glucose-deviation trend (mg/dL per 5 min).
    pub deviation_trend: f64,
    /// Slope of recent deviations.
    pub deviation_slope: f64,
    /// Minutes until the fitted parabola peaks, if a fit exists.
    pub parabola_peak_min: Option<f64>,
    pub night_growth_candidate: bool,
    /// PK/PD tail fraction; absent when the model gave none.
    pub tail_fraction: Option<f64>,
    /// Carbs on board (g); absent when unknown.
    pub cob: Option<f64>,
    pub meal_mode_active: bool,
    pub late_fat_rise: bool,
}

/// Normalized scenario weights; always sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioWeights {
    #[serde(rename = "IOB")]
    pub insulin_only: f64,
    #[serde(rename = "UAM")]
    pub unannounced_meal: f64,
    #[serde(rename = "ZT")]
    pub zero_temp: f64,
}

impl ScenarioWeights {
    pub fn get(&self, s: Scenario) -> f64 {
        match s {
            Scenario::InsulinOnly => self.insulin_only,
            Scenario::UnannouncedMeal => self.unannounced_meal,
            Scenario::ZeroTemp => self.zero_temp,
        }
    }

    pub fn sum(&self) -> f64 {
        self.insulin_only + self.unannounced_meal + self.zero_temp
    }
}

/// Compute scenario weights from priors plus context nudges.
///
/// Non-finite numeric signals contribute nothing. All weights are floored at
/// `WEIGHT_FLOOR` and renormalized last, so the nudge order is irrelevant.
pub fn scenario_weights(input: &ScenarioInput) -> ScenarioWeights {
    let mut iob = PRIOR_IOB;
    let mut uam = PRIOR_UAM;
    let mut zt = PRIOR_ZT;

    let trend = finite_or_zero(input.deviation_trend);
    let trend_push = (trend.abs() * TREND_GAIN).min(TREND_CAP);
    if trend > 0.0 {
        uam += trend_push;
    } else if trend < 0.0 {
        zt += trend_push;
    }

    let slope = finite_or_zero(input.deviation_slope);
    if slope > 0.0 {
        uam += SLOPE_NUDGE;
    } else if slope < 0.0 {
        uam -= SLOPE_NUDGE;
    }

    if let Some(peak) = input.parabola_peak_min.filter(|p| p.is_finite())
        && (PEAK_WINDOW_MIN.0..=PEAK_WINDOW_MIN.1).contains(&peak)
        && trend > 0.0
    {
        uam += PEAK_NUDGE;
    }

    if input.night_growth_candidate {
        uam += NIGHT_GROWTH_NUDGE;
    }

    if let Some(tail) = input.tail_fraction.filter(|t| t.is_finite()) {
        if tail > TAIL_HIGH {
            iob += TAIL_HIGH_NUDGE;
        } else if tail < TAIL_LOW {
            zt += TAIL_LOW_NUDGE;
        }
    }

    if let Some(cob) = input.cob.filter(|c| c.is_finite())
        && cob < LOW_COB_G
        && !input.meal_mode_active
    {
        iob += LOW_COB_NUDGE;
    }

    if input.late_fat_rise {
        uam += LATE_FAT_NUDGE;
    }

    let iob = iob.max(WEIGHT_FLOOR);
    let uam = uam.max(WEIGHT_FLOOR);
    let zt = zt.max(WEIGHT_FLOOR);
    let total = iob + uam + zt;
    ScenarioWeights {
        insulin_only: iob / total,
        unannounced_meal: uam / total,
        zero_temp: zt / total,
    }
}

#[inline]
fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Uncertainty band at one future offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentileBand {
    #[serde(rename = "offsetMin")]
    pub offset_min: u32,
    pub p05: i32,
    pub p50: i32,
    pub p95: i32,
}

/// The three scenario curves, one glucose value per 5-minute step.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScenarioCurves<'a> {
    pub insulin_only: Option<&'a [f64]>,
    pub unannounced_meal: Option<&'a [f64]>,
    pub zero_temp: Option<&'a [f64]>,
}

/// Build weighted-percentile bands across the scenario curves.
///
/// Index 0 (now) is skipped. Returns an empty vector when the longest curve
/// has fewer than 2 points.
pub fn percentile_bands(
    weights: &ScenarioWeights,
    curves: &ScenarioCurves<'_>,
    step_minutes: u32,
) -> Vec<PercentileBand> {
    let series = [
        (curves.insulin_only, weights.insulin_only),
        (curves.unannounced_meal, weights.unannounced_meal),
        (curves.zero_temp, weights.zero_temp),
    ];
    let len = series
        .iter()
        .filter_map(|(c, _)| c.map(<[f64]>::len))
        .max()
        .unwrap_or(0);
    if len < 2 {
        return Vec::new();
    }

    let mut bands = Vec::with_capacity(len - 1);
    let mut points: Vec<(f64, f64)> = Vec::with_capacity(3);
    for idx in 1..len {
        points.clear();
        for (curve, w) in &series {
            if let Some(v) = curve.and_then(|c| c.get(idx)).copied()
                && v.is_finite()
            {
                points.push((v, *w));
            }
        }
        if points.is_empty() {
            continue;
        }
        normalize_weights(&mut points);
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let offset_min = u32::try_from(idx).unwrap_or(u32::MAX).saturating_mul(step_minutes);
        bands.push(PercentileBand {
            offset_min,
            p05: clamp_bg(weighted_quantile(&points, 0.05)),
            p50: clamp_bg(weighted_quantile(&points, 0.50)),
            p95: clamp_bg(weighted_quantile(&points, 0.95)),
        });
    }
    bands
}

/// Renormalize weights to sum to 1, falling back to uniform.
fn normalize_weights(points: &mut [(f64, f64)]) {
    let total: f64 = points
        .iter()
        .map(|(_, w)| if w.is_finite() && *w > 0.0 { *w } else { 0.0 })
        .sum();
    if total.is_finite() && total > 0.0 {
        for p in points.iter_mut() {
            p.1 = if p.1.is_finite() && p.1 > 0.0 { p.1 / total } else { 0.0 };
        }
    } else {
        let n = u32::try_from(points.len()).unwrap_or(u32::MAX);
        let uniform = 1.0 / f64::from(n);
        for p in points.iter_mut() {
            p.1 = uniform;
        }
    }
}

/// Weighted nearest-rank quantile over value-sorted `(value, weight)` pairs.
fn weighted_quantile(sorted: &[(f64, f64)], q: f64) -> f64 {
    let mut cum = 0.0;
    for (v, w) in sorted {
        cum += w;
        if cum + 1e-12 >= q {
            return *v;
        }
    }
    sorted.last().map_or(f64::NAN, |p| p.0)
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "clamped to the band range before the cast"
)]
fn clamp_bg(v: f64) -> i32 {
    v.clamp(BAND_MIN_BG, BAND_MAX_BG).round() as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    MealMode,
    MealIobRelax,
    NightGrowth,
    LateFat,
}

/// Marker drawn on the prediction chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionAnnotation {
    pub kind: AnnotationKind,
    pub label: String,
    #[serde(rename = "offsetMin")]
    pub offset_min: u32,
}

/// Prediction payload handed to display and sync.
///
/// Absent fields are omitted on the wire; an empty list is serialized as `[]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predictions {
    #[serde(rename = "IOB", default, skip_serializing_if = "Option::is_none")]
    pub iob: Option<Vec<f64>>,
    #[serde(rename = "ZT", default, skip_serializing_if = "Option::is_none")]
    pub zt: Option<Vec<f64>>,
    #[serde(rename = "COB", default, skip_serializing_if = "Option::is_none")]
    pub cob: Option<Vec<f64>>,
    #[serde(rename = "aCOB", default, skip_serializing_if = "Option::is_none")]
    pub acob: Option<Vec<f64>>,
    #[serde(rename = "UAM", default, skip_serializing_if = "Option::is_none")]
    pub uam: Option<Vec<f64>>,
    #[serde(
        rename = "scenarioWeights",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub scenario_weights: Option<ScenarioWeights>,
    #[serde(rename = "percentileBands", default, skip_serializing_if = "Option::is_none")]
    pub percentile_bands: Option<Vec<PercentileBand>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<PredictionAnnotation>>,
}

impl Predictions {
    pub fn curves(&self) -> ScenarioCurves<'_> {
        ScenarioCurves {
            insulin_only: self.iob.as_deref(),
            unannounced_meal: self.uam.as_deref(),
            zero_temp: self.zt.as_deref(),
        }
    }

    /// Compute scenario weights and bands from this payload's own curves.
    pub fn attach_uncertainty(&mut self, input: &ScenarioInput, step_minutes: u32) {
        let weights = scenario_weights(input);
        let bands = percentile_bands(&weights, &self.curves(), step_minutes);
        self.scenario_weights = Some(weights);
        self.percentile_bands = Some(bands);
    }

    pub fn annotate(&mut self, kind: AnnotationKind, label: impl Into<String>, offset_min: u32) {
        self.annotations
            .get_or_insert_with(Vec::new)
            .push(PredictionAnnotation {
                kind,
                label: label.into(),
                offset_min,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_input_yields_priors() {
        let w = scenario_weights(&ScenarioInput::default());
        assert!((w.insulin_only - 0.40).abs() < 1e-12);
        assert!((w.unannounced_meal - 0.35).abs() < 1e-12);
        assert!((w.zero_temp - 0.25).abs() < 1e-12);
    }

    #[test]
    fn rising_trend_favors_meal_scenario() {
        let base = ScenarioInput::default();
        let rising = ScenarioInput {
            deviation_trend: 20.0,
            ..base
        };
        let w0 = scenario_weights(&base);
        let w1 = scenario_weights(&rising);
        assert!(w1.unannounced_meal > w0.unannounced_meal);
        // capped at 0.25 contribution: (0.35 + 0.25) / 1.25
        assert!((w1.unannounced_meal - 0.60 / 1.25).abs() < 1e-12);
    }

    #[test]
    fn negative_slope_is_floored() {
        let input = ScenarioInput {
            deviation_slope: -1.0,
            ..ScenarioInput::default()
        };
        let w = scenario_weights(&input);
        assert!((w.sum() - 1.0).abs() < 1e-9);
        assert!(w.unannounced_meal < 0.35);
    }

    #[test]
    fn tail_and_low_carbs_nudges() {
        let input = ScenarioInput {
            tail_fraction: Some(0.5),
            cob: Some(0.0),
            ..ScenarioInput::default()
        };
        let w = scenario_weights(&input);
        assert!((w.insulin_only - 0.55 / 1.15).abs() < 1e-12);
        let meal = ScenarioInput {
            meal_mode_active: true,
            ..input
        };
        assert!((scenario_weights(&meal).insulin_only - 0.50 / 1.10).abs() < 1e-12);
    }

    #[test]
    fn bands_need_two_indices() {
        let w = scenario_weights(&ScenarioInput::default());
        let one = [120.0];
        let curves = ScenarioCurves {
            insulin_only: Some(&one),
            ..ScenarioCurves::default()
        };
        assert!(percentile_bands(&w, &curves, 5).is_empty());
        assert!(percentile_bands(&w, &ScenarioCurves::default(), 5).is_empty());
    }

    #[test]
    fn bands_are_ordered_and_offset() {
        let w = ScenarioWeights {
            insulin_only: 0.4,
            unannounced_meal: 0.35,
            zero_temp: 0.25,
        };
        let iob = [120.0, 110.0, 100.0];
        let uam = [120.0, 130.0, 150.0, 170.0];
        let zt = [120.0, 125.0];
        let curves = ScenarioCurves {
            insulin_only: Some(&iob),
            unannounced_meal: Some(&uam),
            zero_temp: Some(&zt),
        };
        let bands = percentile_bands(&w, &curves, 5);
        assert_eq!(bands.len(), 3);
        assert_eq!(bands[0].offset_min, 5);
        // index 1: sorted 110 (0.4), 125 (0.25), 130 (0.35)
        assert_eq!((bands[0].p05, bands[0].p50, bands[0].p95), (110, 125, 130));
        // index 3: only UAM remains
        assert_eq!((bands[2].p05, bands[2].p50, bands[2].p95), (170, 170, 170));
        for b in &bands {
            assert!(b.p05 <= b.p50 && b.p50 <= b.p95);
        }
    }

    #[test]
    fn bands_clamp_and_fallback_to_uniform() {
        let w = ScenarioWeights {
            insulin_only: 0.0,
            unannounced_meal: f64::NAN,
            zero_temp: 0.0,
        };
        let iob = [100.0, 20.0];
        let uam = [100.0, 500.0];
        let zt = [100.0, f64::NAN];
        let curves = ScenarioCurves {
            insulin_only: Some(&iob),
            unannounced_meal: Some(&uam),
            zero_temp: Some(&zt),
        };
        let bands = percentile_bands(&w, &curves, 5);
        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].p05, 39);
        assert_eq!(bands[0].p50, 39);
        assert_eq!(bands[0].p95, 401);
    }

    #[test]
    fn absent_fields_are_omitted_empty_lists_kept() {
        let mut p = Predictions {
            iob: Some(vec![100.0, 95.0]),
            annotations: Some(Vec::new()),
            ..Predictions::default()
        };
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("ZT").is_none());
        assert!(json.get("percentileBands").is_none());
        assert_eq!(json["annotations"], serde_json::json!([]));

        p.attach_uncertainty(&ScenarioInput::default(), 5);
        p.annotate(AnnotationKind::NightGrowth, "GH", 0);
        let json = serde_json::to_value(&p).unwrap();
        assert!(json["scenarioWeights"]["IOB"].is_number());
        assert_eq!(json["percentileBands"][0]["offsetMin"], 5);
        assert_eq!(json["annotations"][0]["kind"], "night_growth");
    }

    #[test]
    fn serialized_predictions_read_back_unchanged() {
        let mut p = Predictions {
            iob: Some(vec![120.0, 115.0, 110.0]),
            zt: Some(vec![120.0, 118.0, 117.0]),
            uam: Some(vec![120.0, 126.0, 131.0]),
            ..Predictions::default()
        };
        p.attach_uncertainty(&ScenarioInput::default(), 5);
        p.annotate(AnnotationKind::MealMode, "meal", 0);

        let json = serde_json::to_string(&p).unwrap();
        let back: Predictions = serde_json::from_str(&json).unwrap();
        assert!(back.scenario_weights.is_some());
        assert_eq!(back, p);
    }
}

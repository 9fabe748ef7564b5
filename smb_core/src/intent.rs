//! Context intents: announced physiological or situational events.
//!
//! One JSON object per line. The shared envelope carries `start`,
//! `duration_min`, `intensity` and `confidence`; the `type` tag selects the
//! payload, whose fields sit next to the envelope:
//!
//! ```text
//! {"start":"2026-10-19T07:00:00Z","duration_min":45,"intensity":"high","confidence":0.9,"type":"activity","kind":"run"}
//! ```
//!
//! Unknown tags and malformed lines decode to `None` and are reported to the
//! injected diagnostics sink; they never fail the caller.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use smb_traits::Diagnostics;

use crate::cycle::CyclePhase;
use crate::error::CoreError;

const COMPONENT: &str = "intent";

/// Type tags understood by [`decode`].
pub const KNOWN_TYPES: [&str; 8] = [
    "activity",
    "stress",
    "illness",
    "unannounced_meal_risk",
    "alcohol",
    "travel",
    "menstrual_cycle",
    "custom",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    Medium,
    High,
    Extreme,
}

/// Per-type payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntentPayload {
    Activity {
        #[serde(default)]
        kind: String,
    },
    Stress {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    Illness {
        #[serde(default)]
        fever: bool,
    },
    UnannouncedMealRisk {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected_carbs_g: Option<f64>,
    },
    Alcohol {
        #[serde(default)]
        drinks: f64,
    },
    Travel {
        #[serde(default)]
        timezone_shift_h: f64,
    },
    MenstrualCycle {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phase: Option<CyclePhase>,
    },
    Custom {
        label: String,
    },
}

impl IntentPayload {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Activity { .. } => "activity",
            Self::Stress { .. } => "stress",
            Self::Illness { .. } => "illness",
            Self::UnannouncedMealRisk { .. } => "unannounced_meal_risk",
            Self::Alcohol { .. } => "alcohol",
            Self::Travel { .. } => "travel",
            Self::MenstrualCycle { .. } => "menstrual_cycle",
            Self::Custom { .. } => "custom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextIntent {
    pub start: DateTime<Utc>,
    pub duration_min: u32,
    pub intensity: Intensity,
    /// Certainty of the announcement in [0, 1].
    pub confidence: f64,
    #[serde(flatten)]
    pub payload: IntentPayload,
}

impl ContextIntent {
    pub fn end(&self) -> DateTime<Utc> {
        self.start
            .checked_add_signed(Duration::minutes(i64::from(self.duration_min)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// True when `t` falls inside `[start, start + duration)`.
    pub fn is_active_at(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end()
    }
}

/// Decode one line. Returns `None` for unknown tags and malformed input.
pub fn decode(line: &str, diagnostics: &dyn Diagnostics) -> Option<ContextIntent> {
    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.warn(COMPONENT, &format!("malformed intent line: {e}"));
            return None;
        }
    };
    let Some(tag) = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
    else {
        diagnostics.warn(COMPONENT, "intent without a type tag");
        return None;
    };
    if !KNOWN_TYPES.contains(&tag.as_str()) {
        diagnostics.warn(COMPONENT, &format!("unknown intent type '{tag}' ignored"));
        return None;
    }
    match serde_json::from_value::<ContextIntent>(value) {
        Ok(mut intent) => {
            intent.confidence = intent.confidence.clamp(0.0, 1.0);
            Some(intent)
        }
        Err(e) => {
            diagnostics.warn(COMPONENT, &format!("invalid '{tag}' intent: {e}"));
            None
        }
    }
}

/// Decode every non-blank, non-comment line, skipping the ones `decode` rejects.
pub fn decode_all(text: &str, diagnostics: &dyn Diagnostics) -> Vec<ContextIntent> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| decode(l, diagnostics))
        .collect()
}

/// Encode one intent as a single line.
pub fn encode(intent: &ContextIntent) -> Result<String, CoreError> {
    if !intent.confidence.is_finite() {
        return Err(CoreError::Intent("confidence must be finite".into()));
    }
    if let IntentPayload::Custom { label } = &intent.payload
        && label.trim().is_empty()
    {
        return Err(CoreError::Intent("custom intent needs a label".into()));
    }
    serde_json::to_string(intent).map_err(|e| CoreError::Intent(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::RecordingDiagnostics;

    const RUN: &str = r#"{"start":"2026-10-19T07:00:00Z","duration_min":45,"intensity":"high","confidence":0.9,"type":"activity","kind":"run"}"#;

    #[test]
    fn decodes_activity_line() {
        let diag = RecordingDiagnostics::default();
        let intent = decode(RUN, &diag).unwrap();
        assert_eq!(intent.intensity, Intensity::High);
        assert_eq!(intent.duration_min, 45);
        assert_eq!(
            intent.payload,
            IntentPayload::Activity {
                kind: "run".into()
            }
        );
        assert!(diag.is_empty());
    }

    #[test]
    fn unknown_tag_is_absent_and_reported() {
        let diag = RecordingDiagnostics::default();
        let line = r#"{"start":"2026-10-19T07:00:00Z","duration_min":10,"intensity":"low","confidence":1,"type":"sauna"}"#;
        assert!(decode(line, &diag).is_none());
        assert!(diag.contains("unknown intent type 'sauna'"));
    }

    #[test]
    fn malformed_lines_are_absent() {
        let diag = RecordingDiagnostics::default();
        assert!(decode("{not json", &diag).is_none());
        assert!(decode(r#"{"type":"stress"}"#, &diag).is_none());
        assert!(decode(r#"{"start":"2026-10-19T07:00:00Z"}"#, &diag).is_none());
        assert_eq!(diag.len(), 3);
    }

    #[test]
    fn known_tag_with_bad_payload_names_the_tag() {
        let diag = RecordingDiagnostics::default();
        let line = r#"{"start":"2026-10-19T07:00:00Z","duration_min":30,"intensity":"medium","confidence":0.5,"type":"alcohol","drinks":"two"}"#;
        assert!(decode(line, &diag).is_none());
        assert!(diag.contains("invalid 'alcohol' intent"));
    }

    #[test]
    fn confidence_is_clamped_on_decode() {
        let diag = RecordingDiagnostics::default();
        let line = RUN.replace("0.9", "1.7");
        assert_eq!(decode(&line, &diag).unwrap().confidence, 1.0);
    }

    #[test]
    fn encode_then_decode_keeps_payload() {
        let diag = RecordingDiagnostics::default();
        let intent = ContextIntent {
            start: "2026-10-19T20:00:00Z".parse().unwrap(),
            duration_min: 240,
            intensity: Intensity::Medium,
            confidence: 0.5,
            payload: IntentPayload::MenstrualCycle {
                phase: Some(CyclePhase::Luteal),
            },
        };
        let line = encode(&intent).unwrap();
        assert!(line.contains(r#""type":"menstrual_cycle""#));
        assert_eq!(decode(&line, &diag), Some(intent));
    }

    #[test]
    fn encode_rejects_nan_confidence() {
        let mut intent = decode(RUN, &RecordingDiagnostics::default()).unwrap();
        intent.confidence = f64::NAN;
        assert!(matches!(encode(&intent), Err(CoreError::Intent(_))));
    }

    #[test]
    fn decode_all_skips_comments_and_bad_lines() {
        let diag = RecordingDiagnostics::default();
        let text = format!("# morning\n{RUN}\n\n{{\"type\":\"unknown\"}}\n");
        let all = decode_all(&text, &diag);
        assert_eq!(all.len(), 1);
        assert_eq!(diag.len(), 1);
    }

    #[test]
    fn activity_window_is_half_open() {
        let intent = decode(RUN, &RecordingDiagnostics::default()).unwrap();
        let start: DateTime<Utc> = "2026-10-19T07:00:00Z".parse().unwrap();
        assert!(!intent.is_active_at(start - Duration::minutes(1)));
        assert!(intent.is_active_at(start));
        assert!(intent.is_active_at(start + Duration::minutes(44)));
        assert!(!intent.is_active_at(start + Duration::minutes(45)));
    }
}

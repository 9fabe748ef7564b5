//! Learning state carried from one cycle to the next.

use serde::{Deserialize, Serialize};

use crate::cycle::PhaseLearner;
use crate::error::CoreError;
use crate::isf_fusion::IsfFusionState;

/// Everything the loop persists between cycles.
///
/// A fresh `LoopState::default()` is deterministic: no previous fused ISF and
/// no learned phase multipliers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopState {
    pub isf: IsfFusionState,
    pub learner: PhaseLearner,
}

impl LoopState {
    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::State(e.to_string()))
    }

    pub fn from_json(s: &str) -> Result<Self, CoreError> {
        serde_json::from_str(s).map_err(|e| CoreError::State(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::CyclePhase;

    #[test]
    fn fresh_state_is_empty() {
        let s = LoopState::default();
        assert_eq!(s.isf.previous, None);
        assert_eq!(s.learner.samples(CyclePhase::Luteal), 0);
    }

    #[test]
    fn learned_values_survive_reload() {
        let mut s = LoopState::default();
        s.isf.previous = Some(48.5);
        assert!(s.learner.observe(CyclePhase::Luteal, 1.5, 0.5, 0.5));
        let back = LoopState::from_json(&s.to_json().unwrap()).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn empty_object_is_fresh_state() {
        assert_eq!(LoopState::from_json("{}").unwrap(), LoopState::default());
    }

    #[test]
    fn garbage_is_a_state_error() {
        let err = LoopState::from_json("not json").unwrap_err();
        assert!(matches!(err, CoreError::State(_)));
    }
}

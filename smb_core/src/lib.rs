#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! SMB decision core (device-agnostic).
//!
//! Computes a bounded, rate-limited super micro-bolus and a fused insulin
//! sensitivity factor for one control cycle, plus glucose prediction bands.
//! Collaborators (PK/PD model, UAM model, meal advisor, audit sink) are
//! reached through the traits in [`ports`] and `smb_traits`.
//!
//! ## Architecture
//!
//! - **Quantizer**: pump-step rounding within `[min, max]` (`quantizer`)
//! - **ISF fusion**: profile/TDD/PK-PD median with a per-cycle rate limit (`isf_fusion`)
//! - **Damping**: tail, post-exercise and late-fat dampers with audit (`damping`)
//! - **Safety**: high-BG override and basal-first gate (`safety`)
//! - **Adjusters**: hormonal cycle learner and condition multipliers (`cycle`, `inflammation`)
//! - **Prediction**: scenario weights and percentile bands (`prediction`)
//! - **Planning**: the per-cycle orchestrator (`planner`, `pipeline`)
//!
//! ## State
//!
//! The only state carried between cycles is [`state::LoopState`]. It is owned
//! by the caller and passed in explicitly; cycles must run strictly one after
//! another.

pub mod config;
pub mod conversions;
pub mod cycle;
pub mod damping;
pub mod diagnostics;
pub mod error;
pub mod inflammation;
pub mod intent;
pub mod isf_fusion;
pub mod meal_advisor;
pub mod mocks;
pub mod pipeline;
pub mod pkpd;
pub mod planner;
pub mod ports;
pub mod prediction;
pub mod quantizer;
pub mod safety;
pub mod state;
pub mod types;
pub mod util;

pub use damping::{DampingPolicy, SmbDampingResult};
pub use diagnostics::TracingDiagnostics;
pub use error::{BuildError, CoreError, Result};
pub use isf_fusion::{IsfFusion, IsfFusionState};
pub use pipeline::{CycleDecision, LearnedSignals, SmbPipeline, SmbPipelineBuilder};
pub use planner::{PlannerPorts, SmbPlan, SmbPlanner};
pub use prediction::{Predictions, ScenarioInput, ScenarioWeights};
pub use quantizer::quantize;
pub use safety::SafetyOverrideResult;
pub use state::LoopState;
pub use types::{LoopContext, PkPdSnapshot};

//! Collaborator seams consumed by the planning engine.

use smb_traits::PortError;

use crate::damping::SmbDampingResult;
use crate::types::{LoopContext, PkPdSnapshot};

/// PK/PD model for one control cycle.
pub trait PkPdPort {
    fn snapshot(&mut self, ctx: &LoopContext) -> PkPdSnapshot;

    /// Damp a proposed dose. With `bypass` set the dose is returned unchanged
    /// and the result is flagged as bypassed.
    fn damp_smb(&self, dose: f64, ctx: &LoopContext, bypass: bool) -> SmbDampingResult;

    /// Best-effort audit of the cycle. Failures are the caller's to swallow.
    fn log_csv(
        &mut self,
        ctx: &LoopContext,
        snapshot: &PkPdSnapshot,
        proposed: f64,
        final_dose: f64,
        audit: &SmbDampingResult,
    ) -> Result<(), PortError>;
}

/// Learned-model SMB delta (unannounced meal signal).
pub trait UamPort {
    /// NaN means "no opinion".
    fn predict_smb_delta(&self, ctx: &LoopContext) -> f64;
}

/// Model that never has an opinion.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUamOpinion;

impl UamPort for NoUamOpinion {
    fn predict_smb_delta(&self, _ctx: &LoopContext) -> f64 {
        f64::NAN
    }
}

/// Inputs of the meal/high-IOB relaxation decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MealDecisionInput {
    pub meal_mode: bool,
    pub bg: f64,
    pub delta: f64,
    pub eventual_bg: f64,
    pub target_bg: f64,
    pub iob: f64,
    pub max_iob: f64,
}

impl MealDecisionInput {
    pub fn from_context(ctx: &LoopContext) -> Self {
        Self {
            meal_mode: ctx.modes.any_active(),
            bg: ctx.bg,
            delta: ctx.delta,
            eventual_bg: ctx.eventual_bg,
            target_bg: ctx.target_bg,
            iob: ctx.iob,
            max_iob: ctx.pump.max_iob,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MealRelaxDecision {
    pub relax: bool,
    pub damping_factor: f64,
}

/// Meal/high-IOB decision; must be a pure function of its input.
pub trait MealAdvisor {
    fn decide(&self, input: &MealDecisionInput) -> MealRelaxDecision;
}

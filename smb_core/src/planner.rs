//! SMB planning engine.
//!
//! One call per cycle: raw PK/PD proposal, meal relaxation, UAM delta,
//! quantization, damping, re-quantization, audit. The rationale string records
//! every step so a reader can replay the decision.

use std::fmt::Write as _;

use serde::Serialize;
use smb_traits::Diagnostics;

use crate::damping::SmbDampingResult;
use crate::ports::{MealAdvisor, MealDecisionInput, PkPdPort, UamPort};
use crate::quantizer::quantize;
use crate::types::{LoopContext, PkPdSnapshot};

/// Planned dose and its rationale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmbPlan {
    pub units: f64,
    pub reason: String,
    /// Quantized dose before damping.
    pub proposed: f64,
    pub snapshot: PkPdSnapshot,
    pub damping: SmbDampingResult,
}

/// Collaborators the planner talks to during one cycle.
pub struct PlannerPorts<'p, P: PkPdPort, U: UamPort, A: MealAdvisor> {
    pub pkpd: &'p mut P,
    pub uam: &'p U,
    pub meal: &'p A,
    pub diagnostics: &'p dyn Diagnostics,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SmbPlanner;

impl SmbPlanner {
    /// Plan one SMB and audit it with the planned dose as the final dose.
    pub fn plan_smb<P: PkPdPort, U: UamPort, A: MealAdvisor>(
        &self,
        ctx: &LoopContext,
        bypass_damping: bool,
        mut ports: PlannerPorts<'_, P, U, A>,
    ) -> SmbPlan {
        let plan = self.draft(ctx, bypass_damping, &mut ports);
        Self::audit(ctx, &plan, plan.units, &mut ports);
        plan
    }

    /// Steps 1 to 5 of planning, without the audit row.
    pub(crate) fn draft<P: PkPdPort, U: UamPort, A: MealAdvisor>(
        &self,
        ctx: &LoopContext,
        bypass_damping: bool,
        ports: &mut PlannerPorts<'_, P, U, A>,
    ) -> SmbPlan {
        let step = ctx.pump.bolus_step;
        let max_smb = ctx.pump.max_smb;

        let snapshot = ports.pkpd.snapshot(ctx);
        let mut dose = snapshot
            .raw_smb
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
            .max(0.0);
        let mut reason = format!(
            "PKPD isf={:.1} dia={:.2}h peak={:.0}m proposal={:.2}U",
            snapshot.fused_isf, snapshot.dia_hours, snapshot.peak_minutes, dose
        );

        if ctx.modes.any_active() {
            let decision = ports.meal.decide(&MealDecisionInput::from_context(ctx));
            if decision.relax && decision.damping_factor.is_finite() {
                let factor = decision.damping_factor.max(0.0);
                dose *= factor;
                let _ = write!(reason, " | meal-relax x{factor:.2} -> {dose:.2}U");
            }
        }

        let delta = ports.uam.predict_smb_delta(ctx);
        if delta.is_finite() {
            dose = (dose + delta).max(0.0);
            let _ = write!(reason, " | uam {delta:+.2} -> {dose:.2}U");
        } else {
            ports.diagnostics.info("planner", "uam model has no opinion");
        }

        let proposed = quantize(dose, step, 0.0, max_smb);
        let _ = write!(reason, " | quantized {proposed:.2}U (max {max_smb:.2}U)");

        let damping = ports.pkpd.damp_smb(proposed, ctx, bypass_damping);
        let units = if damping.bypassed {
            reason.push_str(" | damping bypassed");
            proposed
        } else {
            let q = quantize(damping.out, step, 0.0, max_smb);
            let _ = write!(
                reason,
                " | damping tail x{:.2} exercise x{:.2} late-fat x{:.2} -> {q:.2}U",
                damping.tail_mult, damping.exercise_mult, damping.late_fat_mult
            );
            q
        };
        let units = units.max(0.0);

        tracing::debug!(proposed, units, bypass = damping.bypassed, "smb planned");
        SmbPlan {
            units,
            reason,
            proposed,
            snapshot,
            damping,
        }
    }

    /// Best-effort audit row for `plan`, recording `final_units` as delivered.
    pub(crate) fn audit<P: PkPdPort, U: UamPort, A: MealAdvisor>(
        ctx: &LoopContext,
        plan: &SmbPlan,
        final_units: f64,
        ports: &mut PlannerPorts<'_, P, U, A>,
    ) {
        if let Err(e) =
            ports
                .pkpd
                .log_csv(ctx, &plan.snapshot, plan.proposed, final_units, &plan.damping)
        {
            ports
                .diagnostics
                .warn("audit", &format!("audit row dropped: {e}"));
        }
    }
}

//! One control cycle: override predicate, planning, override, basal-first gate, audit.
//!
//! `SmbPipeline` holds validated configuration only. Learning state lives in
//! [`LoopState`](crate::state::LoopState) and is handed in by the caller.

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::{
    BasalFirstCfg, CycleCfg, DampingCfg, FusionCfg, LearnerCfg, MealAdvisorCfg, OverrideCfg,
    PkPdCfg, PumpLimits,
};
use crate::cycle::{CycleAdjuster, PhaseLearner};
use crate::damping::DampingPolicy;
use crate::error::{BuildError, Result};
use crate::inflammation::{
    ComposedAdjustment, InflammationAdjuster, SkinInflammation, ThyroidStatus, compose,
};
use crate::isf_fusion::{IsfFusion, IsfFusionState};
use crate::meal_advisor::MealIobAdvisor;
use crate::pkpd::PkPdModel;
use crate::planner::{PlannerPorts, SmbPlan, SmbPlanner};
use crate::ports::{MealAdvisor, PkPdPort, UamPort};
use crate::safety::{BasalFirstGate, GlucoseReadings, HighBgOverride, SafetyOverrideResult};
use crate::types::LoopContext;

/// Learned signals consumed by the safety layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnedSignals {
    /// Glucose floor (mg/dL) the override must stay above.
    pub hypo_guard: f64,
    /// Learner confidence factor in [0, 1].
    pub learner_confidence: f64,
}

impl Default for LearnedSignals {
    fn default() -> Self {
        Self {
            hypo_guard: 80.0,
            learner_confidence: 1.0,
        }
    }
}

/// Outcome of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleDecision {
    /// Dose to deliver (U).
    pub units: f64,
    pub reason: String,
    pub override_result: SafetyOverrideResult,
    pub basal_first: bool,
    pub plan: SmbPlan,
}

#[derive(Debug, Clone)]
pub struct SmbPipeline {
    pump: PumpLimits,
    fusion: FusionCfg,
    damping: DampingCfg,
    overrides: OverrideCfg,
    basal_first: BasalFirstCfg,
    pkpd: PkPdCfg,
    meal: MealAdvisorCfg,
    cycle: CycleCfg,
    learner: LearnerCfg,
    thyroid: ThyroidStatus,
    skin: SkinInflammation,
}

impl SmbPipeline {
    pub fn builder() -> SmbPipelineBuilder {
        SmbPipelineBuilder::default()
    }

    pub fn pump(&self) -> &PumpLimits {
        &self.pump
    }

    pub fn learner_cfg(&self) -> &LearnerCfg {
        &self.learner
    }

    /// Stamp pump limits onto a context read from outside.
    pub fn prepare(&self, ctx: &mut LoopContext) {
        ctx.pump = self.pump;
    }

    /// Reference PK/PD model borrowing the fusion state for one cycle.
    pub fn model<'a>(&self, state: &'a mut IsfFusionState) -> PkPdModel<'a> {
        PkPdModel::new(
            self.pkpd,
            IsfFusion::new(self.fusion),
            DampingPolicy::new(self.damping),
            state,
        )
    }

    pub fn meal_advisor(&self) -> MealIobAdvisor {
        MealIobAdvisor::new(self.meal)
    }

    pub fn cycle_adjuster(&self) -> CycleAdjuster {
        CycleAdjuster::new(self.cycle, self.learner)
    }

    pub fn inflammation(&self) -> InflammationAdjuster {
        InflammationAdjuster::new(self.thyroid, self.skin)
    }

    /// Cycle and condition multipliers for `today`.
    pub fn adjustments(&self, learner: &PhaseLearner, today: NaiveDate) -> ComposedAdjustment {
        let info = self.cycle_adjuster().get_info(learner, today);
        compose(&info, &self.inflammation().evaluate())
    }

    pub fn run_cycle<P: PkPdPort, U: UamPort, A: MealAdvisor>(
        &self,
        ctx: &LoopContext,
        signals: LearnedSignals,
        mut ports: PlannerPorts<'_, P, U, A>,
    ) -> CycleDecision {
        let readings = GlucoseReadings {
            bg: ctx.bg,
            delta: ctx.delta,
            predicted_bg: ctx.predicted_bg,
            eventual_bg: ctx.eventual_bg,
        };
        let guard = HighBgOverride::new(self.overrides);
        let bypass = guard.should_fire(&readings, signals.hypo_guard, ctx.iob, self.pump.max_smb);

        let plan = SmbPlanner.draft(ctx, bypass, &mut ports);

        let override_result = guard.apply(
            &readings,
            signals.hypo_guard,
            ctx.iob,
            self.pump.max_smb,
            plan.units,
            self.pump.bolus_step,
        );
        let mut reason = plan.reason.clone();
        if override_result.fired {
            reason.push_str(&format!(
                " | high-bg override -> {:.2}U, next cycle now",
                override_result.dose
            ));
        }

        let basal_first = BasalFirstGate::new(self.basal_first).is_active(
            signals.learner_confidence,
            ctx.bg,
            ctx.delta,
            ctx.meal_advisor_one_shot,
        );
        let units = if basal_first && !override_result.fired {
            reason.push_str(" | basal-first: smb suppressed");
            0.0
        } else {
            override_result.dose.max(0.0)
        };
        SmbPlanner::audit(ctx, &plan, units, &mut ports);

        tracing::info!(
            bg = ctx.bg,
            iob = ctx.iob,
            units,
            override_fired = override_result.fired,
            basal_first,
            "cycle decided"
        );
        CycleDecision {
            units,
            reason,
            override_result,
            basal_first,
            plan,
        }
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

/// Builder for `SmbPipeline`. Every section defaults; `build()` validates.
#[derive(Debug, Clone, Default)]
pub struct SmbPipelineBuilder {
    pump: PumpLimits,
    fusion: FusionCfg,
    damping: DampingCfg,
    overrides: OverrideCfg,
    basal_first: BasalFirstCfg,
    pkpd: PkPdCfg,
    meal: MealAdvisorCfg,
    cycle: CycleCfg,
    learner: LearnerCfg,
    thyroid: ThyroidStatus,
    skin: SkinInflammation,
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn in_unit_interval(v: f64) -> bool {
    v > 0.0 && v <= 1.0
}

impl SmbPipelineBuilder {
    pub fn with_pump(mut self, pump: PumpLimits) -> Self {
        self.pump = pump;
        self
    }

    pub fn with_fusion(mut self, fusion: FusionCfg) -> Self {
        self.fusion = fusion;
        self
    }

    pub fn with_damping(mut self, damping: DampingCfg) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_override(mut self, overrides: OverrideCfg) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_basal_first(mut self, basal_first: BasalFirstCfg) -> Self {
        self.basal_first = basal_first;
        self
    }

    pub fn with_pkpd(mut self, pkpd: PkPdCfg) -> Self {
        self.pkpd = pkpd;
        self
    }

    pub fn with_meal(mut self, meal: MealAdvisorCfg) -> Self {
        self.meal = meal;
        self
    }

    pub fn with_cycle(mut self, cycle: CycleCfg) -> Self {
        self.cycle = cycle;
        self
    }

    pub fn with_learner(mut self, learner: LearnerCfg) -> Self {
        self.learner = learner;
        self
    }

    pub fn with_conditions(mut self, thyroid: ThyroidStatus, skin: SkinInflammation) -> Self {
        self.thyroid = thyroid;
        self.skin = skin;
        self
    }

    /// Convenience: every section from a loaded TOML config.
    pub fn from_config(cfg: &smb_config::Config) -> Self {
        Self {
            pump: (&cfg.pump).into(),
            fusion: (&cfg.fusion).into(),
            damping: (&cfg.damping).into(),
            overrides: (&cfg.safety).into(),
            basal_first: (&cfg.safety).into(),
            pkpd: (&cfg.pkpd).into(),
            meal: (&cfg.meal).into(),
            cycle: (&cfg.cycle).into(),
            learner: (&cfg.learner).into(),
            thyroid: cfg.cycle.thyroid.into(),
            skin: cfg.cycle.skin_inflammation.into(),
        }
    }

    pub fn build(self) -> Result<SmbPipeline> {
        // ── Validation ───────────────────────────────────────────────────────
        let p = &self.pump;
        if !(p.bolus_step.is_finite() && p.bolus_step > 0.0) {
            return Err(invalid("bolus_step must be > 0"));
        }
        if !(p.max_smb.is_finite() && p.max_smb >= p.bolus_step) {
            return Err(invalid("max_smb must be >= bolus_step"));
        }
        if !(p.max_basal.is_finite() && p.max_basal >= 0.0) {
            return Err(invalid("max_basal must be >= 0"));
        }
        if !(p.max_iob.is_finite() && p.max_iob > 0.0) {
            return Err(invalid("max_iob must be > 0"));
        }
        let f = &self.fusion;
        if !in_unit_interval(f.min_factor) || !(f.max_factor >= 1.0 && f.max_factor.is_finite()) {
            return Err(invalid("fusion band must satisfy 0 < min_factor <= 1 <= max_factor"));
        }
        if !(f.max_change_per_5min > 0.0 && f.max_change_per_5min <= 0.5) {
            return Err(invalid("max_change_per_5min must be in (0, 0.5]"));
        }
        let d = &self.damping;
        if !(d.tail_threshold >= 0.0 && d.tail_threshold <= 1.0) {
            return Err(invalid("tail_threshold must be in [0, 1]"));
        }
        if ![d.tail_mult, d.exercise_mult, d.late_fat_mult]
            .into_iter()
            .all(in_unit_interval)
        {
            return Err(invalid("damping factors must be in (0, 1]"));
        }
        let o = &self.overrides;
        if !(o.rising_bg.is_finite() && o.high_bg.is_finite() && o.rising_bg <= o.high_bg) {
            return Err(invalid("rising_bg must be <= high_bg"));
        }
        if !o.rising_delta.is_finite() {
            return Err(invalid("rising_delta must be finite"));
        }
        let b = &self.basal_first;
        if !(b.min_confidence >= 0.0 && b.min_confidence <= 1.0) || !b.low_bg.is_finite() {
            return Err(invalid("basal-first thresholds out of range"));
        }
        let k = &self.pkpd;
        if !(k.dia_hours.is_finite() && k.dia_hours > 0.0) {
            return Err(invalid("dia_hours must be > 0"));
        }
        if !(k.peak_minutes > 0.0 && k.peak_minutes < k.dia_hours * 60.0) {
            return Err(invalid("peak_minutes must be inside the DIA"));
        }
        if !in_unit_interval(k.smb_ratio) {
            return Err(invalid("smb_ratio must be in (0, 1]"));
        }
        if !(k.scale_min > 0.0 && k.scale_min <= 1.0 && k.scale_max >= 1.0 && k.scale_max.is_finite())
        {
            return Err(invalid("pkpd scale bounds must bracket 1.0"));
        }
        let m = &self.meal;
        if !(0.0..=1.0).contains(&m.iob_fraction) || !in_unit_interval(m.min_factor) {
            return Err(invalid("meal advisor fractions out of range"));
        }
        let c = &self.cycle;
        if !(20..=45).contains(&c.length_days) {
            return Err(invalid("cycle length must be in [20, 45] days"));
        }
        if !(c.clamp_min > 0.0 && c.clamp_min <= 1.0 && c.clamp_max >= 1.0 && c.clamp_max.is_finite())
        {
            return Err(invalid("cycle clamps must bracket 1.0"));
        }
        if c.enabled && c.last_period_start.is_none() {
            return Err(invalid("cycle tracking needs last_period_start"));
        }
        if !in_unit_interval(self.learner.alpha) {
            return Err(invalid("learner alpha must be in (0, 1]"));
        }

        Ok(SmbPipeline {
            pump: self.pump,
            fusion: self.fusion,
            damping: self.damping,
            overrides: self.overrides,
            basal_first: self.basal_first,
            pkpd: self.pkpd,
            meal: self.meal,
            cycle: self.cycle,
            learner: self.learner,
            thyroid: self.thyroid,
            skin: self.skin,
        })
    }
}

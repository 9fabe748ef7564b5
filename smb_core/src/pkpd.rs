//! Reference PK/PD model implementing [`PkPdPort`].
//!
//! The model borrows the ISF fusion state for one cycle; the loop owns the
//! state and hands it in each time a model is built.

use smb_traits::{AuditSink, PortError};

use crate::config::PkPdCfg;
use crate::damping::{DampingPolicy, SmbDampingResult};
use crate::isf_fusion::{IsfFusion, IsfFusionState};
use crate::ports::PkPdPort;
use crate::types::{LoopContext, PkPdSnapshot};

/// Column order of the audit row.
pub const AUDIT_COLUMNS: [&str; 16] = [
    "timestamp",
    "bg",
    "delta",
    "iob",
    "fused_isf",
    "dia_hours",
    "peak_minutes",
    "tail_fraction",
    "proposed_u",
    "final_u",
    "tail_mult",
    "exercise_mult",
    "late_fat_mult",
    "tail_hit",
    "exercise_hit",
    "bypassed",
];

pub struct PkPdModel<'a> {
    cfg: PkPdCfg,
    fusion: IsfFusion,
    damping: DampingPolicy,
    state: &'a mut IsfFusionState,
    audit: Option<&'a mut dyn AuditSink>,
}

impl<'a> PkPdModel<'a> {
    pub fn new(
        cfg: PkPdCfg,
        fusion: IsfFusion,
        damping: DampingPolicy,
        state: &'a mut IsfFusionState,
    ) -> Self {
        Self {
            cfg,
            fusion,
            damping,
            state,
            audit: None,
        }
    }

    /// Attach an audit sink receiving one row per `log_csv` call.
    pub fn with_audit(mut self, sink: &'a mut dyn AuditSink) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Fraction of IOB in the absorption tail, from the age of the last bolus.
    ///
    /// 0 before the activity peak, rising linearly to 1 at the end of the DIA.
    pub fn tail_fraction(&self, ctx: &LoopContext) -> f64 {
        let Some(age) = ctx.minutes_since_last_bolus.filter(|a| a.is_finite() && *a >= 0.0) else {
            return 0.0;
        };
        let dia_min = self.cfg.dia_hours * 60.0;
        let span = dia_min - self.cfg.peak_minutes;
        if span <= 0.0 {
            return 0.0;
        }
        ((age - self.cfg.peak_minutes) / span).clamp(0.0, 1.0)
    }

    /// Sensitivity scale from the context ratio, clamped to the model bounds.
    pub fn pkpd_scale(&self, ctx: &LoopContext) -> f64 {
        let r = if ctx.sensitivity_ratio.is_finite() {
            ctx.sensitivity_ratio
        } else {
            1.0
        };
        r.clamp(self.cfg.scale_min, self.cfg.scale_max)
    }
}

impl PkPdPort for PkPdModel<'_> {
    fn snapshot(&mut self, ctx: &LoopContext) -> PkPdSnapshot {
        let scale = self.pkpd_scale(ctx);
        let fused_isf = self.fusion.fused(self.state, ctx.profile_isf, ctx.tdd_isf, scale);
        let raw_smb = if fused_isf.is_finite() && fused_isf > 0.0 && ctx.eventual_bg.is_finite() {
            let req = (ctx.eventual_bg - ctx.target_bg) / fused_isf;
            req.is_finite().then(|| (req * self.cfg.smb_ratio).max(0.0))
        } else {
            None
        };
        PkPdSnapshot {
            fused_isf,
            dia_hours: self.cfg.dia_hours,
            peak_minutes: self.cfg.peak_minutes,
            raw_smb,
            tail_fraction: self.tail_fraction(ctx),
        }
    }

    fn damp_smb(&self, dose: f64, ctx: &LoopContext, bypass: bool) -> SmbDampingResult {
        if bypass {
            return SmbDampingResult::bypassed(dose);
        }
        self.damping.damp_with_audit(
            dose,
            self.tail_fraction(ctx),
            ctx.flags.recent_exercise,
            ctx.flags.late_fat_meal,
        )
    }

    fn log_csv(
        &mut self,
        ctx: &LoopContext,
        snapshot: &PkPdSnapshot,
        proposed: f64,
        final_dose: f64,
        audit: &SmbDampingResult,
    ) -> Result<(), PortError> {
        let Some(sink) = self.audit.as_deref_mut() else {
            return Ok(());
        };
        let values = [
            ctx.timestamp.to_rfc3339(),
            format!("{:.0}", ctx.bg),
            format!("{:.1}", ctx.delta),
            format!("{:.2}", ctx.iob),
            format!("{:.1}", snapshot.fused_isf),
            format!("{:.2}", snapshot.dia_hours),
            format!("{:.0}", snapshot.peak_minutes),
            format!("{:.3}", snapshot.tail_fraction),
            format!("{proposed:.2}"),
            format!("{final_dose:.2}"),
            format!("{:.2}", audit.tail_mult),
            format!("{:.2}", audit.exercise_mult),
            format!("{:.2}", audit.late_fat_mult),
            audit.tail_hit.to_string(),
            audit.exercise_hit.to_string(),
            audit.bypassed.to_string(),
        ];
        let row: Vec<(&'static str, String)> = AUDIT_COLUMNS.into_iter().zip(values).collect();
        sink.append(&row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{RecordingAudit, sample_context};

    fn model(state: &mut IsfFusionState) -> PkPdModel<'_> {
        PkPdModel::new(
            PkPdCfg::default(),
            IsfFusion::default(),
            DampingPolicy::default(),
            state,
        )
    }

    #[test]
    fn tail_fraction_follows_bolus_age() {
        let mut st = IsfFusionState::default();
        let m = model(&mut st);
        let mut ctx = sample_context();
        ctx.minutes_since_last_bolus = None;
        assert_eq!(m.tail_fraction(&ctx), 0.0);
        ctx.minutes_since_last_bolus = Some(60.0);
        assert_eq!(m.tail_fraction(&ctx), 0.0);
        ctx.minutes_since_last_bolus = Some(75.0 + 112.5);
        assert!((m.tail_fraction(&ctx) - 0.5).abs() < 1e-12);
        ctx.minutes_since_last_bolus = Some(600.0);
        assert_eq!(m.tail_fraction(&ctx), 1.0);
    }

    #[test]
    fn snapshot_fuses_isf_and_proposes() {
        let mut st = IsfFusionState::default();
        let mut ctx = sample_context();
        ctx.profile_isf = 50.0;
        ctx.tdd_isf = 50.0;
        ctx.sensitivity_ratio = 1.0;
        ctx.eventual_bg = 200.0;
        ctx.target_bg = 100.0;
        let snap = model(&mut st).snapshot(&ctx);
        assert!((snap.fused_isf - 50.0).abs() < 1e-9);
        assert!((snap.raw_smb.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(st.previous, Some(snap.fused_isf));
    }

    #[test]
    fn eventual_below_target_proposes_zero() {
        let mut st = IsfFusionState::default();
        let mut ctx = sample_context();
        ctx.eventual_bg = 80.0;
        assert_eq!(model(&mut st).snapshot(&ctx).raw_smb, Some(0.0));
        ctx.eventual_bg = f64::NAN;
        assert_eq!(model(&mut st).snapshot(&ctx).raw_smb, None);
    }

    #[test]
    fn damp_honours_bypass() {
        let mut st = IsfFusionState::default();
        let m = model(&mut st);
        let mut ctx = sample_context();
        ctx.flags.recent_exercise = true;
        assert!(m.damp_smb(1.0, &ctx, true).bypassed);
        assert!((m.damp_smb(1.0, &ctx, false).out - 0.6).abs() < 1e-12);
    }

    #[test]
    fn audit_row_has_stable_columns() {
        let mut st = IsfFusionState::default();
        let mut sink = RecordingAudit::default();
        let ctx = sample_context();
        let mut m = model(&mut st).with_audit(&mut sink);
        let snap = m.snapshot(&ctx);
        let audit = m.damp_smb(0.5, &ctx, false);
        m.log_csv(&ctx, &snap, 0.5, audit.out, &audit).unwrap();
        assert_eq!(sink.rows.len(), 1);
        let cols: Vec<&str> = sink.rows[0].iter().map(|(c, _)| *c).collect();
        assert_eq!(cols, AUDIT_COLUMNS.to_vec());
    }
}

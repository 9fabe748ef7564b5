//! Test doubles and fixtures for smb_core and downstream crates.

use std::cell::RefCell;

use chrono::{DateTime, Utc};
use smb_traits::{AuditSink, Diagnostics, PortError, Severity};

use crate::config::PumpLimits;
use crate::damping::SmbDampingResult;
use crate::ports::{PkPdPort, UamPort};
use crate::types::{ContextFlags, LoopContext, MealModes, PkPdSnapshot};

/// A mid-range, slightly rising snapshot with default pump limits.
pub fn sample_context() -> LoopContext {
    LoopContext {
        timestamp: DateTime::<Utc>::from_timestamp(1_792_411_200, 0).unwrap_or_default(),
        bg: 150.0,
        delta: 1.0,
        iob: 1.0,
        cob: 0.0,
        eventual_bg: 180.0,
        predicted_bg: 170.0,
        target_bg: 100.0,
        profile_isf: 50.0,
        tdd_isf: 45.0,
        sensitivity_ratio: 1.0,
        minutes_since_last_bolus: Some(30.0),
        meal_advisor_one_shot: false,
        modes: MealModes::default(),
        flags: ContextFlags::default(),
        pump: PumpLimits::default(),
    }
}

/// Audit sink that keeps every row in memory.
#[derive(Debug, Default)]
pub struct RecordingAudit {
    pub rows: Vec<Vec<(&'static str, String)>>,
}

impl AuditSink for RecordingAudit {
    fn append(&mut self, columns: &[(&'static str, String)]) -> Result<(), PortError> {
        self.rows.push(columns.to_vec());
        Ok(())
    }
}

/// Audit sink that rejects every row.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingAudit;

impl AuditSink for FailingAudit {
    fn append(&mut self, _columns: &[(&'static str, String)]) -> Result<(), PortError> {
        Err(Box::new(std::io::Error::other("audit sink unavailable")))
    }
}

/// Diagnostics sink that records every report.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    pub reports: RefCell<Vec<(Severity, String, String)>>,
}

impl RecordingDiagnostics {
    /// True when any recorded message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.reports.borrow().iter().any(|(_, _, m)| m.contains(needle))
    }

    pub fn len(&self) -> usize {
        self.reports.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.borrow().is_empty()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn report(&self, severity: Severity, component: &str, message: &str) {
        self.reports
            .borrow_mut()
            .push((severity, component.to_owned(), message.to_owned()));
    }
}

/// PK/PD port with a fixed proposal; damping multiplies by a fixed tail factor.
#[derive(Debug, Clone)]
pub struct FixedPkPd {
    pub raw_smb: Option<f64>,
    pub tail_mult: f64,
    pub fail_audit: bool,
    pub logged: usize,
}

impl FixedPkPd {
    pub fn proposing(units: f64) -> Self {
        Self {
            raw_smb: Some(units),
            tail_mult: 1.0,
            fail_audit: false,
            logged: 0,
        }
    }

    pub fn silent() -> Self {
        Self {
            raw_smb: None,
            ..Self::proposing(0.0)
        }
    }

    #[must_use]
    pub fn with_tail(mut self, mult: f64) -> Self {
        self.tail_mult = mult;
        self
    }

    #[must_use]
    pub fn failing_audit(mut self) -> Self {
        self.fail_audit = true;
        self
    }
}

impl PkPdPort for FixedPkPd {
    fn snapshot(&mut self, ctx: &LoopContext) -> PkPdSnapshot {
        PkPdSnapshot {
            fused_isf: ctx.profile_isf,
            dia_hours: 5.0,
            peak_minutes: 75.0,
            raw_smb: self.raw_smb,
            tail_fraction: 0.0,
        }
    }

    fn damp_smb(&self, dose: f64, _ctx: &LoopContext, bypass: bool) -> SmbDampingResult {
        if bypass {
            return SmbDampingResult::bypassed(dose);
        }
        let hit = (self.tail_mult - 1.0).abs() > f64::EPSILON;
        SmbDampingResult {
            out: dose * self.tail_mult,
            tail_hit: hit,
            tail_mult: self.tail_mult,
            exercise_hit: false,
            exercise_mult: 1.0,
            late_fat_hit: false,
            late_fat_mult: 1.0,
            bypassed: false,
        }
    }

    fn log_csv(
        &mut self,
        _ctx: &LoopContext,
        _snapshot: &PkPdSnapshot,
        _proposed: f64,
        _final_dose: f64,
        _audit: &SmbDampingResult,
    ) -> Result<(), PortError> {
        if self.fail_audit {
            return Err("audit disk full".into());
        }
        self.logged += 1;
        Ok(())
    }
}

/// UAM port with a constant opinion.
#[derive(Debug, Clone, Copy)]
pub struct FixedUam(pub f64);

impl UamPort for FixedUam {
    fn predict_smb_delta(&self, _ctx: &LoopContext) -> f64 {
        self.0
    }
}

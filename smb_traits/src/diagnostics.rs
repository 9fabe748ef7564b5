/// Severity of a diagnostic report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
}

/// Injected sink for degraded-input reports.
///
/// Components never fail on malformed input; they fall back to a neutral value
/// and tell the sink what happened.
///
/// - report(): one message tagged with the reporting component
/// - warn()/info(): shorthands
pub trait Diagnostics {
    fn report(&self, severity: Severity, component: &str, message: &str);

    fn warn(&self, component: &str, message: &str) {
        self.report(Severity::Warn, component, message);
    }

    fn info(&self, component: &str, message: &str) {
        self.report(Severity::Info, component, message);
    }
}

/// Sink that drops every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentDiagnostics;

impl Diagnostics for SilentDiagnostics {
    #[inline]
    fn report(&self, _severity: Severity, _component: &str, _message: &str) {}
}

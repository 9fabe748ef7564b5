//! `tracing`-backed diagnostic sink.

use smb_traits::{Diagnostics, Severity};

/// Forwards diagnostic reports to the `tracing` stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&self, severity: Severity, component: &str, message: &str) {
        match severity {
            Severity::Warn => tracing::warn!(component, "{message}"),
            Severity::Info => tracing::info!(component, "{message}"),
        }
    }
}

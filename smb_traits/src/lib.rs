pub mod diagnostics;

pub use diagnostics::{Diagnostics, Severity, SilentDiagnostics};

/// Error type returned by best-effort collaborators.
pub type PortError = Box<dyn std::error::Error + Send + Sync>;

/// Sink for one audit row per control cycle.
///
/// Rows are CSV-shaped: an ordered list of `(column, value)` pairs. The column
/// order is stable across cycles so implementations may emit a header from
/// the first row they see.
pub trait AuditSink {
    fn append(&mut self, columns: &[(&'static str, String)]) -> Result<(), PortError>;
}

impl<T: AuditSink + ?Sized> AuditSink for Box<T> {
    fn append(&mut self, columns: &[(&'static str, String)]) -> Result<(), PortError> {
        (**self).append(columns)
    }
}

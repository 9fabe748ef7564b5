//! File-backed collaborators for the SMB core.
//!
//! - `CsvAuditSink`: one CSV row per control cycle, header from the first row
//! - `StateStore`: the loop's learning state as a JSON file

pub mod error;

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use smb_core::LoopState;
use smb_traits::{AuditSink, PortError};

pub use error::{AdapterError, Result};

// ── CSV audit ────────────────────────────────────────────────────────────────

/// Appends audit rows to a CSV file.
///
/// The header is written once, from the column names of the first row, and
/// only when the file is empty. Later rows must keep the same column count.
pub struct CsvAuditSink {
    writer: csv::Writer<File>,
    header_pending: bool,
    width: Option<usize>,
}

impl CsvAuditSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        let has_content = file.metadata()?.len() > 0;
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        Ok(Self {
            writer,
            header_pending: !has_content,
            width: None,
        })
    }

    fn write_row(&mut self, columns: &[(&'static str, String)]) -> Result<()> {
        if let Some(n) = self.width
            && n != columns.len()
        {
            return Err(AdapterError::ColumnMismatch {
                expected: n,
                got: columns.len(),
            });
        }
        if self.header_pending {
            self.writer.write_record(columns.iter().map(|(c, _)| *c))?;
            self.header_pending = false;
        }
        self.width = Some(columns.len());
        self.writer.write_record(columns.iter().map(|(_, v)| v.as_str()))?;
        self.writer.flush()?;
        Ok(())
    }
}

impl AuditSink for CsvAuditSink {
    fn append(&mut self, columns: &[(&'static str, String)]) -> std::result::Result<(), PortError> {
        self.write_row(columns).map_err(|e| Box::new(e) as PortError)
    }
}

// ── JSON state ───────────────────────────────────────────────────────────────

/// Loads and saves [`LoopState`] as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means a fresh state.
    pub fn load(&self) -> Result<LoopState> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no state file, starting fresh");
                return Ok(LoopState::default());
            }
            Err(e) => return Err(e.into()),
        };
        LoopState::from_json(&text).map_err(|source| AdapterError::State {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Written to a sibling temp file, then renamed over the target.
    pub fn save(&self, state: &LoopState) -> Result<()> {
        let json = state.to_json().map_err(|source| AdapterError::State {
            path: self.path.display().to_string(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut f = File::create(&tmp)?;
            f.write_all(json.as_bytes())?;
            f.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "state saved");
        Ok(())
    }
}

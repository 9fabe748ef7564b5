//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "smb", version, about = "SMB decision loop")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print results and errors as JSON, log as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one control cycle on a loop context snapshot
    Plan {
        /// Loop context JSON
        #[arg(long, value_name = "FILE")]
        context: PathBuf,
        /// Learning state JSON (overrides [state] path)
        #[arg(long, value_name = "FILE")]
        state: Option<PathBuf>,
        /// Glucose floor the high-BG override must stay above (mg/dL)
        #[arg(long, value_name = "MGDL", default_value_t = 80.0)]
        hypo_guard: f64,
        /// Learner confidence factor in [0, 1]
        #[arg(long, value_name = "F", default_value_t = 1.0)]
        confidence: f64,
    },
    /// Attach scenario weights and percentile bands to prediction curves
    Predict {
        /// Curves and scenario signals JSON
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
    },
    /// Show (and optionally train) the hormonal cycle adjustment for a day
    Cycle {
        /// Day to evaluate (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        date: chrono::NaiveDate,
        /// Observed effective basal need multiplier
        #[arg(long, value_name = "F", requires = "observe_smb")]
        observe_basal: Option<f64>,
        /// Observed effective SMB need multiplier
        #[arg(long, value_name = "F", requires = "observe_basal")]
        observe_smb: Option<f64>,
        /// Learning state JSON (overrides [state] path)
        #[arg(long, value_name = "FILE")]
        state: Option<PathBuf>,
    },
    /// Decode a context-intent file (one JSON object per line)
    Intents {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        /// Only list intents active at this RFC 3339 time
        #[arg(long, value_name = "TIME")]
        at: Option<chrono::DateTime<chrono::Utc>>,
    },
    /// Validate the config and exit
    CheckConfig,
}

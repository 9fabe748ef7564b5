//! Tracing subscriber setup: console layer plus an optional rolling file.

use std::path::Path;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::cli::FILE_GUARD;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level`; `[logging] level` wins over the CLI default.
/// The file layer always writes JSON lines.
pub fn init_tracing(json: bool, level: &str, cfg: &smb_config::Logging) -> eyre::Result<()> {
    let directive = cfg.level.as_deref().unwrap_or(level);
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(directive)?,
    };

    let ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if json {
        layers.push(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(ansi)
                .with_target(false)
                .compact()
                .boxed(),
        );
    }

    if let Some(file) = cfg.file.as_deref() {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let Some(name) = path.file_name() else {
            eyre::bail!("logging.file must name a file, got {file:?}");
        };
        let appender = match cfg.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        layers.push(fmt::layer().json().with_ansi(false).with_writer(writer).boxed());
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;
    Ok(())
}

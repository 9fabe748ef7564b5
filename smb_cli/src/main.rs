#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod commands;
mod error_fmt;
mod logging;

use clap::Parser;
use eyre::WrapErr;

use crate::cli::{Cli, Commands, JSON_MODE};

fn load_config(path: Option<&std::path::Path>) -> eyre::Result<smb_config::Config> {
    let cfg = match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .wrap_err_with(|| format!("read config {}", p.display()))?;
            smb_config::load_toml(&text)
                .map_err(|e| eyre::eyre!("parse config {}: {e}", p.display()))?
        }
        None => smb_config::Config::default(),
    };
    cfg.validate()?;
    Ok(cfg)
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    logging::init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = ?cli.config, "config loaded");

    match cli.cmd {
        Commands::Plan {
            context,
            state,
            hypo_guard,
            confidence,
        } => commands::plan(&cfg, &context, state.as_deref(), hypo_guard, confidence, cli.json),
        Commands::Predict { input } => commands::predict(&input),
        Commands::Cycle {
            date,
            observe_basal,
            observe_smb,
            state,
        } => {
            let observed = observe_basal.zip(observe_smb);
            commands::cycle(&cfg, date, observed, state.as_deref(), cli.json)
        }
        Commands::Intents { file, at } => commands::intents(&file, at, cli.json),
        Commands::CheckConfig => commands::check_config(&cfg, cli.json),
    }
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", error_fmt::format_error_json(&e));
        } else {
            eprintln!("{}", error_fmt::humanize(&e));
        }
        std::process::exit(error_fmt::exit_code_for_error(&e));
    }
}

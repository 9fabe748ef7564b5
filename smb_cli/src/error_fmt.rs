//! Human-readable error descriptions and structured JSON error formatting.

use smb_adapters::AdapterError;
use smb_core::{BuildError, CoreError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(BuildError::InvalidConfig(msg)) = err.downcast_ref::<BuildError>() {
        return format!(
            "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then run `smb check-config`."
        );
    }

    if let Some(ae) = err.downcast_ref::<AdapterError>() {
        return match ae {
            AdapterError::State { path, .. } => format!(
                "What happened: The learning state file {path} could not be read.\nLikely causes: The file was edited by hand or truncated.\nHow to fix: Restore it from a backup, or delete it to start with fresh learning state."
            ),
            AdapterError::Csv(_) | AdapterError::ColumnMismatch { .. } => {
                "What happened: The audit CSV could not be written.\nLikely causes: The file belongs to another version or is not writable.\nHow to fix: Point [audit] csv at a new file.".to_string()
            }
            AdapterError::Io(e) => format!(
                "What happened: File access failed ({e}).\nLikely causes: Missing directory or insufficient permissions.\nHow to fix: Check the [state] and [audit] paths."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CoreError>() {
        return format!(
            "What happened: {ce}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        );
    }

    // String-based heuristics for errors coming from config loading and inputs
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.starts_with("parse config") || lower.contains(" must be ") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: A typo in a section or key, or an out-of-range value.\nHow to fix: Edit the TOML config and run `smb check-config`."
        );
    }

    if lower.starts_with("read ") {
        return format!(
            "What happened: Could not {msg}.\nLikely causes: Wrong path or missing file.\nHow to fix: Check the path passed on the command line."
        );
    }

    if lower.starts_with("parse ") {
        let cause = err.root_cause();
        return format!(
            "What happened: Could not {msg}: {cause}.\nLikely causes: The document does not match the expected JSON shape.\nHow to fix: Check field names and value types in the document."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 config, 4 learning state, 5 input documents, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 3;
    }
    if let Some(ae) = err.downcast_ref::<AdapterError>() {
        return match ae {
            AdapterError::State { .. } => 4,
            _ => 1,
        };
    }
    let lower = err.to_string().to_ascii_lowercase();
    if lower.starts_with("parse config") || lower.contains(" must be ") {
        return 3;
    }
    if lower.starts_with("read ") || lower.starts_with("parse ") {
        return 5;
    }
    1
}

/// Short machine-readable reason for JSON output.
fn reason_name(err: &eyre::Report) -> &'static str {
    match exit_code_for_error(err) {
        3 => "InvalidConfig",
        4 => "StateFile",
        5 => "Input",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;
    json!({
        "reason": reason_name(err),
        "code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_errors_map_to_config_code() {
        let e = eyre::Report::new(BuildError::InvalidConfig("bolus_step must be > 0"));
        assert_eq!(exit_code_for_error(&e), 3);
        assert!(humanize(&e).contains("Invalid configuration (bolus_step must be > 0)"));
    }

    #[test]
    fn validation_messages_map_to_config_code() {
        let e = eyre::eyre!("learner.alpha must be in (0.0, 1.0]");
        assert_eq!(exit_code_for_error(&e), 3);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&e)).unwrap();
        assert_eq!(v["reason"], "InvalidConfig");
    }

    #[test]
    fn state_errors_map_to_state_code() {
        let e = eyre::Report::new(AdapterError::State {
            path: "state.json".into(),
            source: CoreError::State("eof".into()),
        });
        assert_eq!(exit_code_for_error(&e), 4);
        assert!(humanize(&e).contains("state.json"));
    }

    #[test]
    fn missing_inputs_map_to_input_code() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let e = eyre::Report::new(io).wrap_err("read loop context ctx.json");
        assert_eq!(exit_code_for_error(&e), 5);
    }
}

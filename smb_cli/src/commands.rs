//! Subcommand handlers. Each reads its inputs, runs the core, prints results.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use eyre::WrapErr;
use serde::Deserialize;
use serde_json::json;

use smb_adapters::{CsvAuditSink, StateStore};
use smb_core::intent::{self, ContextIntent};
use smb_core::ports::NoUamOpinion;
use smb_core::prediction::AnnotationKind;
use smb_core::{
    LearnedSignals, LoopContext, LoopState, PlannerPorts, Predictions, ScenarioInput,
    SmbPipeline, SmbPipelineBuilder, TracingDiagnostics,
};

fn read_input(path: &Path, what: &str) -> eyre::Result<String> {
    std::fs::read_to_string(path).wrap_err_with(|| format!("read {what} {}", path.display()))
}

fn pipeline(cfg: &smb_config::Config) -> eyre::Result<SmbPipeline> {
    SmbPipelineBuilder::from_config(cfg).build()
}

fn state_store(cfg: &smb_config::Config, cli_path: Option<&Path>) -> Option<StateStore> {
    cli_path
        .map(StateStore::new)
        .or_else(|| cfg.state.path.as_deref().map(StateStore::new))
}

fn load_state(store: Option<&StateStore>) -> eyre::Result<LoopState> {
    Ok(match store {
        Some(s) => s.load()?,
        None => LoopState::default(),
    })
}

fn print_json(value: &serde_json::Value) -> eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── plan ─────────────────────────────────────────────────────────────────────

pub fn plan(
    cfg: &smb_config::Config,
    context: &Path,
    state_path: Option<&Path>,
    hypo_guard: f64,
    confidence: f64,
    json: bool,
) -> eyre::Result<()> {
    let text = read_input(context, "loop context")?;
    let mut ctx: LoopContext = serde_json::from_str(&text)
        .wrap_err_with(|| format!("parse loop context {}", context.display()))?;
    let pipeline = pipeline(cfg)?;
    pipeline.prepare(&mut ctx);

    let store = state_store(cfg, state_path);
    let mut state = load_state(store.as_ref())?;
    let mut audit = cfg.audit.csv.as_deref().map(CsvAuditSink::open).transpose()?;

    let signals = LearnedSignals {
        hypo_guard,
        learner_confidence: confidence,
    };
    let meal = pipeline.meal_advisor();
    let decision = {
        let mut model = pipeline.model(&mut state.isf);
        if let Some(sink) = audit.as_mut() {
            model = model.with_audit(sink);
        }
        pipeline.run_cycle(
            &ctx,
            signals,
            PlannerPorts {
                pkpd: &mut model,
                uam: &NoUamOpinion,
                meal: &meal,
                diagnostics: &TracingDiagnostics,
            },
        )
    };
    let adjustment = pipeline.adjustments(&state.learner, ctx.timestamp.date_naive());

    if let Some(s) = &store {
        s.save(&state)?;
    }

    if json {
        return print_json(&json!({ "decision": decision, "adjustment": adjustment }));
    }
    println!("SMB: {:.2} U", decision.units);
    println!("Reason: {}", decision.reason);
    if decision.override_result.fired {
        println!("High-BG override: fired, next decision immediately");
    }
    if decision.basal_first {
        println!("Basal-first: active");
    }
    println!(
        "Adjustment: basal x{:.2} smb x{:.2} isf x{:.2} ({})",
        adjustment.basal, adjustment.smb, adjustment.isf, adjustment.reason
    );
    Ok(())
}

// ── predict ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PredictInput {
    #[serde(flatten)]
    predictions: Predictions,
    #[serde(default)]
    scenario: ScenarioInput,
    #[serde(default = "default_step")]
    step_minutes: u32,
    #[serde(default)]
    meal_iob_relax: bool,
}

fn default_step() -> u32 {
    5
}

pub fn predict(input: &Path) -> eyre::Result<()> {
    let text = read_input(input, "prediction input")?;
    let PredictInput {
        mut predictions,
        scenario,
        step_minutes,
        meal_iob_relax,
    } = serde_json::from_str(&text)
        .wrap_err_with(|| format!("parse prediction input {}", input.display()))?;

    predictions.attach_uncertainty(&scenario, step_minutes.max(1));
    if scenario.meal_mode_active {
        predictions.annotate(AnnotationKind::MealMode, "meal mode", 0);
    }
    if meal_iob_relax {
        predictions.annotate(AnnotationKind::MealIobRelax, "meal IOB relax", 0);
    }
    if scenario.night_growth_candidate {
        predictions.annotate(AnnotationKind::NightGrowth, "night growth", 0);
    }
    if scenario.late_fat_rise {
        predictions.annotate(AnnotationKind::LateFat, "late fat rise", 0);
    }
    println!("{}", serde_json::to_string_pretty(&predictions)?);
    Ok(())
}

// ── cycle ────────────────────────────────────────────────────────────────────

pub fn cycle(
    cfg: &smb_config::Config,
    date: NaiveDate,
    observed: Option<(f64, f64)>,
    state_path: Option<&Path>,
    json: bool,
) -> eyre::Result<()> {
    let pipeline = pipeline(cfg)?;
    let store = state_store(cfg, state_path);
    let mut state = load_state(store.as_ref())?;
    let adjuster = pipeline.cycle_adjuster();

    let mut learned = false;
    if let Some((basal, smb)) = observed {
        learned = adjuster.learn(&mut state.learner, date, basal, smb);
        if !learned {
            tracing::warn!(%date, basal, smb, "observation not learned (tracking off or invalid values)");
        }
        if learned && let Some(s) = &store {
            s.save(&state)?;
        }
    }

    let info = adjuster.get_info(&state.learner, date);
    let adjustment = pipeline.adjustments(&state.learner, date);
    if json {
        return print_json(&json!({ "cycle": info, "adjustment": adjustment, "learned": learned }));
    }
    match info.day_in_cycle {
        Some(day) => println!("Phase: {} (day {day})", info.phase.as_str()),
        None => println!("Phase: {}", info.phase.as_str()),
    }
    println!(
        "Basal: base x{:.2} learned x{:.2} applied x{:.2}",
        info.base_basal, info.learned_basal, info.applied_basal
    );
    println!(
        "SMB:   base x{:.2} learned x{:.2} applied x{:.2}",
        info.base_smb, info.learned_smb, info.applied_smb
    );
    println!(
        "Final: basal x{:.2} smb x{:.2} isf x{:.2} ({})",
        adjustment.basal, adjustment.smb, adjustment.isf, adjustment.reason
    );
    Ok(())
}

// ── intents ──────────────────────────────────────────────────────────────────

fn describe(i: &ContextIntent) -> String {
    format!(
        "{} +{}m {} {} (confidence {:.2})",
        i.start.to_rfc3339(),
        i.duration_min,
        i.payload.type_tag(),
        format!("{:?}", i.intensity).to_lowercase(),
        i.confidence
    )
}

pub fn intents(file: &Path, at: Option<DateTime<Utc>>, json: bool) -> eyre::Result<()> {
    let text = read_input(file, "intent file")?;
    let all = intent::decode_all(&text, &TracingDiagnostics);
    let selected = all
        .iter()
        .filter(|i| at.is_none_or(|t| i.is_active_at(t)));
    for i in selected {
        if json {
            println!("{}", intent::encode(i)?);
        } else {
            println!("{}", describe(i));
        }
    }
    Ok(())
}

// ── check-config ─────────────────────────────────────────────────────────────

pub fn check_config(cfg: &smb_config::Config, json: bool) -> eyre::Result<()> {
    let pipeline = pipeline(cfg)?;
    let pump = pipeline.pump();
    if json {
        return print_json(&json!({
            "ok": true,
            "bolus_step": pump.bolus_step,
            "max_smb": pump.max_smb,
        }));
    }
    println!(
        "config ok (bolus step {:.2} U, max SMB {:.2} U)",
        pump.bolus_step, pump.max_smb
    );
    Ok(())
}

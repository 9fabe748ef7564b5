use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

const CONTEXT: &str = r#"{
  "timestamp": "2026-10-19T12:00:00Z",
  "bg": 150, "delta": 1.0, "iob": 1.0,
  "eventual_bg": 180, "predicted_bg": 170, "target_bg": 100,
  "profile_isf": 50, "tdd_isf": 45,
  "minutes_since_last_bolus": 30
}"#;

fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body).unwrap();
    path
}

fn smb() -> Command {
    Command::cargo_bin("smb").unwrap()
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["check-config"], 0, "config ok", "stdout")]
#[case(&["plan"], 2, "required", "stderr")]
#[case(&["cycle", "--date", "2026-10-19", "--observe-basal", "1.1"], 2, "observe-smb", "stderr")]
#[case(&["plan", "--context", "/definitely/missing.json"], 5, "Could not read loop context", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let assert = smb().args(args).assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn plan_prints_dose_and_persists_state() {
    let dir = tempdir().unwrap();
    let ctx = write(&dir, "ctx.json", CONTEXT);
    let state = dir.path().join("state.json");

    smb()
        .arg("plan")
        .arg("--context")
        .arg(&ctx)
        .arg("--state")
        .arg(&state)
        .assert()
        .success()
        .stdout(predicate::str::contains("SMB: 0.90 U"));

    let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&state).unwrap()).unwrap();
    assert_eq!(saved["isf"]["previous"], 45.0);
}

#[test]
fn plan_json_reports_override() {
    let dir = tempdir().unwrap();
    let body = CONTEXT.replace(r#""bg": 150, "delta": 1.0"#, r#""bg": 220, "delta": 3.0"#);
    let ctx = write(&dir, "ctx.json", &body);

    let out = smb()
        .args(["--json", "plan", "--context"])
        .arg(&ctx)
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["decision"]["override_result"]["fired"], true);
    assert_eq!(v["decision"]["override_result"]["forced_interval_min"], 0);
    assert_eq!(v["decision"]["plan"]["damping"]["bypassed"], true);
}

#[test]
fn plan_writes_audit_csv() {
    let dir = tempdir().unwrap();
    let ctx = write(&dir, "ctx.json", CONTEXT);
    let audit = dir.path().join("audit.csv");
    let cfg = write(
        &dir,
        "cfg.toml",
        &format!("[audit]\ncsv = {:?}\n", audit.display().to_string()),
    );

    smb()
        .arg("--config")
        .arg(&cfg)
        .arg("plan")
        .arg("--context")
        .arg(&ctx)
        .assert()
        .success();

    let text = fs::read_to_string(&audit).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("timestamp,bg,delta"));
    assert_eq!(lines.count(), 1);
}

#[test]
fn invalid_config_exits_with_config_code() {
    let dir = tempdir().unwrap();
    let cfg = write(&dir, "cfg.toml", "[learner]\nalpha = 0.0\n");
    smb()
        .arg("--config")
        .arg(&cfg)
        .arg("check-config")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("learner.alpha"));
}

#[test]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let cfg = write(&dir, "cfg.toml", "[pump]\nbolus_step = -1.0\n");
    let out = smb()
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .arg("check-config")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    let line = String::from_utf8(out.stderr).unwrap();
    let v: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(v["reason"], "InvalidConfig");
}

#[test]
fn corrupt_state_exits_with_state_code() {
    let dir = tempdir().unwrap();
    let ctx = write(&dir, "ctx.json", CONTEXT);
    let state = write(&dir, "state.json", "{ broken");
    smb()
        .arg("plan")
        .arg("--context")
        .arg(&ctx)
        .arg("--state")
        .arg(&state)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("learning state file"));
}

#[test]
fn predict_attaches_weights_and_bands() {
    let dir = tempdir().unwrap();
    let input = write(
        &dir,
        "pred.json",
        r#"{
  "IOB": [150, 145, 140, 135],
  "UAM": [150, 160, 170, 180],
  "ZT":  [150, 148, 146, 144],
  "scenario": { "meal_mode_active": true }
}"#,
    );
    let out = smb().arg("predict").arg("--input").arg(&input).output().unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let w = &v["scenarioWeights"];
    let sum = w["IOB"].as_f64().unwrap() + w["UAM"].as_f64().unwrap() + w["ZT"].as_f64().unwrap();
    assert!((sum - 1.0).abs() < 1e-9);
    assert_eq!(v["percentileBands"].as_array().unwrap().len(), 3);
    assert_eq!(v["percentileBands"][0]["offsetMin"], 5);
    assert_eq!(v["annotations"][0]["kind"], "meal_mode");
    assert!(v.get("COB").is_none());
}

#[test]
fn cycle_learns_and_reports_phase() {
    let dir = tempdir().unwrap();
    let state = dir.path().join("state.json");
    let cfg = write(
        &dir,
        "cfg.toml",
        "[cycle]\nenabled = true\nlast_period_start = \"2026-10-01\"\n",
    );
    let out = smb()
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .args(["cycle", "--date", "2026-10-20", "--observe-basal", "1.2", "--observe-smb", "1.1", "--state"])
        .arg(&state)
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["cycle"]["phase"], "luteal");
    assert_eq!(v["cycle"]["day_in_cycle"], 20);
    assert_eq!(v["learned"], true);
    assert!(state.exists());
}

#[test]
fn intents_skip_unknown_types() {
    let dir = tempdir().unwrap();
    let file = write(
        &dir,
        "intents.jsonl",
        concat!(
            r#"{"start":"2026-10-19T07:00:00Z","duration_min":45,"intensity":"high","confidence":0.9,"type":"activity","kind":"run"}"#,
            "\n",
            r#"{"start":"2026-10-19T08:00:00Z","duration_min":30,"intensity":"low","confidence":0.5,"type":"sauna"}"#,
            "\n",
        ),
    );
    smb()
        .arg("intents")
        .arg("--file")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("activity high"))
        .stdout(predicate::str::contains("sauna").not())
        .stderr(predicate::str::contains("unknown intent type 'sauna'"));
}

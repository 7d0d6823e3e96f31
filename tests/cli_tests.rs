mod common;

use common::{single, two_singlets, two_singlets_with_variables};
use lensforge::blocks::VariableScope;
use lensforge::merit::Operand;
use lensforge::system::SystemConfigurations;
use lensforge::value::Value;
use regex::Regex;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct TestContext {
    _dir: TempDir,
    system_path: PathBuf,
    merit_json: PathBuf,
    merit_csv: PathBuf,
}

impl TestContext {
    fn new(systems: &SystemConfigurations) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let system_path = dir.path().join("system.json");
        let merit_json = dir.path().join("merit.json");
        let merit_csv = dir.path().join("merit.csv");

        fs::write(&system_path, serde_json::to_string_pretty(systems).unwrap()).unwrap();

        let ops = vec![
            Operand::new("EFL").with_target(100.0),
            Operand::new("TOT3_SPH").with_weight(10.0),
            Operand::new("REAY"),
        ];
        fs::write(&merit_json, serde_json::to_string(&ops).unwrap()).unwrap();

        // Same rows as the editor would export them.
        let mut csv = File::create(&merit_csv).unwrap();
        writeln!(csv, "Operand,ConfigId,Param1,Param2,Target,Weight").unwrap();
        writeln!(csv, "EFL,,,,100,").unwrap();
        writeln!(csv, "TOT3_SPH,,,,,10").unwrap();
        writeln!(csv, "REAY,,,,,").unwrap();

        Self {
            _dir: dir,
            system_path,
            merit_json,
            merit_csv,
        }
    }

    fn path(p: &Path) -> &str {
        p.to_str().unwrap()
    }
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lensforge"))
        .args(args)
        .output()
        .expect("Failed to execute binary")
}

fn total_merit(stdout: &str) -> f64 {
    let re = Regex::new(r"Total merit:\s*([0-9.eE+\-]+)").unwrap();
    let caps = re
        .captures(stdout)
        .unwrap_or_else(|| panic!("no total in output:\n{stdout}"));
    caps[1].parse().unwrap()
}

// --- EVALUATE ---

#[test]
fn test_evaluate_prints_total() {
    let ctx = TestContext::new(&single(two_singlets()));
    let out = run(&[
        "evaluate",
        "--system",
        TestContext::path(&ctx.system_path),
        "--merit",
        TestContext::path(&ctx.merit_json),
    ]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout.contains("Impact %"));
    assert!(total_merit(&stdout) > 0.0);
}

#[test]
fn test_csv_and_json_merit_agree() {
    let ctx = TestContext::new(&single(two_singlets()));
    let system = TestContext::path(&ctx.system_path);
    let from_json = run(&["evaluate", "-s", system, "-m", TestContext::path(&ctx.merit_json)]);
    let from_csv = run(&["evaluate", "-s", system, "-m", TestContext::path(&ctx.merit_csv)]);
    assert!(from_csv.status.success());
    assert_eq!(
        total_merit(&String::from_utf8_lossy(&from_json.stdout)),
        total_merit(&String::from_utf8_lossy(&from_csv.stdout))
    );
}

#[test]
fn test_evaluate_json_output() {
    let ctx = TestContext::new(&single(two_singlets()));
    let out = run(&[
        "evaluate",
        "-s",
        TestContext::path(&ctx.system_path),
        "-m",
        TestContext::path(&ctx.merit_json),
        "--json",
    ]);
    assert!(out.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let terms = doc["terms"].as_array().unwrap();
    assert_eq!(terms.len(), 3);
    assert_eq!(terms[0]["operand"], "EFL");
    assert_eq!(terms[2]["value"], 0.0);
    assert!(doc["total"].as_f64().unwrap() > 0.0);
}

#[test]
fn test_missing_system_file_fails() {
    let ctx = TestContext::new(&single(two_singlets()));
    let out = run(&[
        "evaluate",
        "-s",
        "/nonexistent/system.json",
        "-m",
        TestContext::path(&ctx.merit_json),
    ]);
    assert!(!out.status.success());
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn test_malformed_merit_file_fails() {
    let ctx = TestContext::new(&single(two_singlets()));
    fs::write(&ctx.merit_json, "{ not json").unwrap();
    let out = run(&[
        "evaluate",
        "-s",
        TestContext::path(&ctx.system_path),
        "-m",
        TestContext::path(&ctx.merit_json),
    ]);
    assert_eq!(out.status.code(), Some(1));
}

// --- EXPAND ---

#[test]
fn test_expand_prints_surface_table() {
    let ctx = TestContext::new(&single(two_singlets()));
    let out = run(&["expand", "-s", TestContext::path(&ctx.system_path)]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success());
    assert!(stdout.contains("Semi-Dia"));
    assert!(stdout.contains("N-BK7"));
    assert!(stdout.contains("L2"));
}

#[test]
fn test_expand_fatal_exits_nonzero() {
    let mut blocks = two_singlets();
    blocks.pop();
    let ctx = TestContext::new(&single(blocks));
    let out = run(&["expand", "-s", TestContext::path(&ctx.system_path)]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(out.status.code(), Some(1));
    assert!(stdout.contains("Severity"));
}

// --- VARIABLES ---

#[test]
fn test_variables_lists_labels_and_objective() {
    let ctx = TestContext::new(&single(two_singlets_with_variables(VariableScope::Global)));
    let out = run(&[
        "variables",
        "-s",
        TestContext::path(&ctx.system_path),
        "-m",
        TestContext::path(&ctx.merit_json),
    ]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success());
    assert!(stdout.contains("DESIGN VARIABLES (2)"));
    assert!(stdout.contains("A:G1.thickness"));
    assert!(stdout.contains("L2.frontRadius"));
    let re = Regex::new(r"Objective at current values:\s*\S+\s+\(3 residuals\)").unwrap();
    assert!(re.is_match(&stdout), "{stdout}");
}

// --- SETTINGS ---

#[test]
fn test_settings_file_sets_penalty() {
    let ctx = TestContext::new(&single(two_singlets()));
    fs::write(&ctx.merit_json, r#"[{ "operand": "NOPE" }]"#).unwrap();
    let settings = ctx.system_path.with_file_name("settings.json");
    fs::write(&settings, r#"{ "eval": { "failure_penalty": 5.0 } }"#).unwrap();

    let out = run(&[
        "evaluate",
        "-s",
        TestContext::path(&ctx.system_path),
        "-m",
        TestContext::path(&ctx.merit_json),
        "--settings",
        settings.to_str().unwrap(),
    ]);
    assert!(out.status.success());
    assert_eq!(total_merit(&String::from_utf8_lossy(&out.stdout)), 25.0);
}

#[test]
fn test_explicit_flag_beats_settings_file() {
    let ctx = TestContext::new(&single(two_singlets()));
    fs::write(&ctx.merit_json, r#"[{ "operand": "NOPE" }]"#).unwrap();
    let settings = ctx.system_path.with_file_name("settings.json");
    fs::write(&settings, r#"{ "eval": { "failure_penalty": 5.0 } }"#).unwrap();

    let out = run(&[
        "evaluate",
        "-s",
        TestContext::path(&ctx.system_path),
        "-m",
        TestContext::path(&ctx.merit_json),
        "--settings",
        settings.to_str().unwrap(),
        "--failure-penalty",
        "3",
    ]);
    assert!(out.status.success());
    assert_eq!(total_merit(&String::from_utf8_lossy(&out.stdout)), 9.0);
}

#[test]
fn test_invalid_la_samples_is_rejected() {
    let ctx = TestContext::new(&single(two_singlets()));
    let out = run(&[
        "evaluate",
        "-s",
        TestContext::path(&ctx.system_path),
        "-m",
        TestContext::path(&ctx.merit_json),
        "--la-samples",
        "1",
    ]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("la_samples"));

    let settings = ctx.system_path.with_file_name("settings.json");
    fs::write(&settings, r#"{ "eval": { "la_samples": 0 } }"#).unwrap();
    let out = run(&[
        "evaluate",
        "-s",
        TestContext::path(&ctx.system_path),
        "-m",
        TestContext::path(&ctx.merit_json),
        "--settings",
        settings.to_str().unwrap(),
    ]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn test_glass_catalog_flag_loads_agf() {
    let mut blocks = two_singlets();
    blocks[5].set_param("material", Value::Text("LF-CROWN".into()));
    let ctx = TestContext::new(&single(blocks));
    fs::write(&ctx.merit_json, r#"[{ "operand": "EFL" }]"#).unwrap();
    let agf = ctx.system_path.with_file_name("lab.agf");
    fs::write(&agf, "NM LF-CROWN 1 0 1.5 60 0 0 0\n").unwrap();
    let system = TestContext::path(&ctx.system_path);
    let merit = TestContext::path(&ctx.merit_json);

    let without = run(&["evaluate", "-s", system, "-m", merit, "--failure-penalty", "7"]);
    assert!(without.status.success());
    assert_eq!(total_merit(&String::from_utf8_lossy(&without.stdout)), 49.0);

    let with = run(&[
        "evaluate",
        "-s",
        system,
        "-m",
        merit,
        "--failure-penalty",
        "7",
        "--glass-catalog",
        agf.to_str().unwrap(),
    ]);
    assert!(with.status.success(), "stderr: {}", String::from_utf8_lossy(&with.stderr));
    let total = total_merit(&String::from_utf8_lossy(&with.stdout));
    assert!(total != 49.0 && total.is_finite(), "{total}");

    let missing = run(&["evaluate", "-s", system, "-m", merit, "--glass-catalog", "/nonexistent.agf"]);
    assert_eq!(missing.status.code(), Some(1));
}

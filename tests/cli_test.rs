//! CLI contract tests
//!
//! Runs the `vadima` binary against a small linear model written to a temp
//! directory.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

fn vadima_bin() -> String {
    env!("CARGO_BIN_EXE_vadima").to_string()
}

const VOCAB: &str = "[UNK]\n<pad>\n<s>\n</s>\ndef\nadd\n(\n)\n,\n:\na\nb\nreturn\n+\n";
const LABELS: &str = "int\nstr\nbool\n";

/// Model dir with vocab, labels and a linear model that favours `int` for
/// every token, plus a config file pointing at it.
fn setup_model() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let model_dir = dir.path().join("model");
    std::fs::create_dir_all(&model_dir).unwrap();
    std::fs::write(model_dir.join("vocab.txt"), VOCAB).unwrap();
    std::fs::write(model_dir.join("labels.txt"), LABELS).unwrap();

    let vocab_size = VOCAB.lines().count();
    let int_row = vec![2.0; vocab_size];
    let str_row = vec![1.0; vocab_size];
    let bool_row = vec![0.0; vocab_size];
    let weights = serde_json::json!({
        "weights": [int_row, str_row, bool_row],
        "bias": [0.0, 0.0, 0.0],
        "parameter_focus": 0.5
    });
    std::fs::write(model_dir.join("model.json"), weights.to_string()).unwrap();

    std::fs::write(
        dir.path().join("vadima.toml"),
        format!(
            "[model]\ndir = {:?}\n\n[inference]\ntop_k = 3\n",
            model_dir.display().to_string()
        ),
    )
    .unwrap();
    std::fs::write(dir.path().join("add.py"), "def add(a, b):\n    return a + b\n").unwrap();
    dir
}

fn vadima(dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(vadima_bin())
        .args(args)
        .current_dir(dir)
        .env_remove("VADIMA_MODEL_DIR")
        .env_remove("VADIMA_ARTIFACT_SOURCE")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run vadima");
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

// ============================================================================
// predict
// ============================================================================

#[test]
fn test_predict_json() {
    let dir = setup_model();
    let (code, stdout, stderr) = vadima(dir.path(), &["predict", "add.py", "--format", "json"]);
    assert_eq!(code, 0, "stderr: {stderr}");

    let v: serde_json::Value = serde_json::from_str(&stdout).expect("Invalid JSON");
    assert_eq!(v["function"], "add");
    assert_eq!(v["parameter_count"], 2);
    let predictions = v["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 3);
    assert_eq!(predictions[0]["label"], "int, int");

    let total: f64 = predictions
        .iter()
        .map(|p| p["probability"].as_f64().unwrap())
        .sum();
    // every label of both parameters is merged, each scaled by 1/3
    assert!((total - 2.0 / 3.0).abs() < 1e-4, "total = {total}");
}

#[test]
fn test_predict_explicit_params_and_top_k() {
    let dir = setup_model();
    let (code, stdout, _) = vadima(
        dir.path(),
        &["predict", "add.py", "--params", "1", "--top-k", "1", "--format", "json"],
    );
    assert_eq!(code, 0);
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let predictions = v["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0]["label"], "int");
}

#[test]
fn test_predict_zero_params_is_null() {
    let dir = setup_model();
    let (code, stdout, _) = vadima(
        dir.path(),
        &["predict", "add.py", "--params", "0", "--format", "json"],
    );
    assert_eq!(code, 0);
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(v["predictions"].is_null());
}

#[test]
fn test_predict_text_from_stdin() {
    let dir = setup_model();
    let mut child = Command::new(vadima_bin())
        .args(["predict", "-"])
        .current_dir(dir.path())
        .env_remove("VADIMA_MODEL_DIR")
        .env_remove("VADIMA_ARTIFACT_SOURCE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"def add(a, b):\n    return a + b\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("int, int"), "stdout: {stdout}");
}

#[test]
fn test_predict_without_header_needs_params() {
    let dir = setup_model();
    std::fs::write(dir.path().join("expr.py"), "x = 1\n").unwrap();
    let (code, _, stderr) = vadima(dir.path(), &["predict", "expr.py"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("--params"), "stderr: {stderr}");
}

#[test]
fn test_predict_missing_model_fails() {
    let dir = setup_model();
    std::fs::remove_file(dir.path().join("model").join("model.json")).unwrap();
    let (code, _, stderr) = vadima(dir.path(), &["predict", "add.py"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("unavailable"), "stderr: {stderr}");
}

#[test]
fn test_predict_copies_artifact_from_source() {
    let dir = setup_model();
    let mirror = dir.path().join("mirror");
    std::fs::create_dir_all(&mirror).unwrap();
    std::fs::rename(
        dir.path().join("model").join("model.json"),
        mirror.join("model.json"),
    )
    .unwrap();

    let output = Command::new(vadima_bin())
        .args(["predict", "add.py", "--format", "json"])
        .current_dir(dir.path())
        .env_remove("VADIMA_MODEL_DIR")
        .env("VADIMA_ARTIFACT_SOURCE", &mirror)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(dir.path().join("model").join("model.json").exists());
}

// ============================================================================
// tokenize / init / doctor
// ============================================================================

#[test]
fn test_tokenize_json_layout() {
    let dir = setup_model();
    let (code, stdout, _) = vadima(dir.path(), &["tokenize", "add.py", "--format", "json"]);
    assert_eq!(code, 0);
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let tokens: Vec<&str> = v["tokens"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap())
        .collect();
    assert_eq!(
        tokens,
        vec!["</s>", "def", "add", "(", "a", ",", "b", ")", ":", "return", "a", "+", "b", "<s>"]
    );
    assert_eq!(v["valid_length"], 14);
    assert_eq!(v["token_ids"][0], 3);
}

#[test]
fn test_init_writes_example_config() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, _) = vadima(dir.path(), &["init"]);
    assert_eq!(code, 0);
    let content = std::fs::read_to_string(dir.path().join("vadima.toml")).unwrap();
    assert!(content.contains("[tokenizer]"));

    // existing file is kept without --force
    std::fs::write(dir.path().join("vadima.toml"), "# mine\n").unwrap();
    vadima(dir.path(), &["init"]);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("vadima.toml")).unwrap(),
        "# mine\n"
    );
    vadima(dir.path(), &["init", "--force"]);
    assert!(std::fs::read_to_string(dir.path().join("vadima.toml"))
        .unwrap()
        .contains("[inference]"));
}

#[test]
fn test_doctor_passes_with_model() {
    let dir = setup_model();
    let (code, stdout, _) = vadima(dir.path(), &["doctor"]);
    assert_eq!(code, 0, "stdout: {stdout}");
    assert!(stdout.contains("3 labels"));
}

#[test]
fn test_doctor_reports_missing_labels() {
    let dir = setup_model();
    std::fs::remove_file(dir.path().join("model").join("labels.txt")).unwrap();
    let (code, stdout, _) = vadima(dir.path(), &["doctor"]);
    assert_ne!(code, 0);
    assert!(stdout.contains("Labels"));
}

#[test]
fn test_invalid_config_rejected() {
    let dir = setup_model();
    std::fs::write(dir.path().join("bad.toml"), "[inference]\ntop_k = 0\n").unwrap();
    let (code, _, stderr) = vadima(dir.path(), &["--config", "bad.toml", "tokenize", "add.py"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("top_k"), "stderr: {stderr}");
}

//! CLI tests for `solver run`, `solver compare`, `solver init` and `solver solve`.
//!
//! Spawns the solver binary and verifies exit codes and printed output.
#![cfg(unix)]

use std::fs;
use std::process::Command;

use solver::exit_codes;

fn solver() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_solver"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn compare_identical_outputs_prints_match() {
    let temp = tempfile::tempdir().expect("tempdir");
    let a = temp.path().join("a.txt");
    let b = temp.path().join("b.txt");
    fs::write(&a, "1 2\n3\n").expect("write a");
    fs::write(&b, "  1 2\n3  \n\n").expect("write b");

    let output = solver()
        .arg("compare")
        .arg(&a)
        .arg(&b)
        .output()
        .expect("solver compare");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "Outputs match!");
}

#[test]
fn compare_different_outputs_exits_failed() {
    let temp = tempfile::tempdir().expect("tempdir");
    let a = temp.path().join("a.txt");
    fs::write(&a, "Expected output").expect("write a");

    let output = solver()
        .arg("compare")
        .arg(&a)
        .arg(temp.path().join("missing.txt"))
        .output()
        .expect("solver compare");

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Outputs differ"), "{stdout}");
    assert!(stdout.contains("Expected output"), "{stdout}");
}

#[test]
fn run_captures_stdout_into_output_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let source = temp.path().join("echo.sh");
    let input = temp.path().join("in.txt");
    let out = temp.path().join("out.txt");
    fs::write(&source, "read line\necho \"Input was: $line\"\n").expect("source");
    fs::write(&input, "test input\n").expect("input");

    let status = solver()
        .arg("run")
        .arg(&source)
        .arg(&input)
        .arg(&out)
        .args(["--interpreter", "sh"])
        .status()
        .expect("solver run");

    assert_eq!(status.code(), Some(exit_codes::OK));
    assert_eq!(fs::read_to_string(&out).expect("out"), "Input was: test input\n");
}

#[test]
fn run_missing_source_reports_kind() {
    let temp = tempfile::tempdir().expect("tempdir");
    let input = temp.path().join("in.txt");
    fs::write(&input, "").expect("input");

    let output = solver()
        .arg("run")
        .arg(temp.path().join("nonexistent.py"))
        .arg(&input)
        .arg(temp.path().join("out.txt"))
        .output()
        .expect("solver run");

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("code_file_not_found"), "{stderr}");
    assert!(stderr.contains("Code file not found"), "{stderr}");
}

#[test]
fn init_writes_config_and_workspace() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = solver()
        .current_dir(temp.path())
        .arg("init")
        .output()
        .expect("solver init");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(temp.path().join("solver.toml").is_file());
    assert!(temp.path().join("workspace").is_dir());
    assert!(String::from_utf8_lossy(&output.stdout).contains("PROBLEM.txt"));
}

#[test]
fn solve_without_config_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = solver()
        .current_dir(temp.path())
        .arg("solve")
        .output()
        .expect("solver solve");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("configuration_error"), "{stderr}");
    assert!(stderr.contains("solver.toml"), "{stderr}");
}

/// Full session through the binary with a shell-script generator that answers
/// by role, taken from the `{model}` argument.
#[test]
fn solve_with_command_generator_reports_json() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let generator = root.join("fake-llm.sh");
    fs::write(
        &generator,
        r#"cat > /dev/null
case "$1" in
  tester) printf '```text\n2\n4\n9\n```\n' ;;
  brute) printf '```sh\nread n\nwhile read x; do echo $((x * x)); done\n```\n' ;;
  optimal) printf '```sh\nread n\nwhile read x; do echo $((x * x)); done\n```\n' ;;
esac
"#,
    )
    .expect("generator");
    let config = format!(
        r#"[api_keys]
google = "your-google-api-key-here"

[models]
tester_agent = "tester"
brute_agent = "brute"
optimal_agent = "optimal"

[execution]
max_optimal_attempts = 2
timeout_seconds = 5
interpreter = ["sh"]

[generator]
command = ["sh", "{}", "{{model}}"]
timeout_seconds = 10

[output]
workspace_dir = "ws"

[files]
test_inputs = "in.txt"
brute_solution = "brute.sh"
brute_outputs = "brute_out.txt"
optimal_solution = "optimal.sh"
optimal_outputs = "optimal_out.txt"
"#,
        generator.display()
    );
    fs::write(root.join("solver.toml"), config).expect("config");
    fs::write(root.join("PROBLEM.txt"), "Square each number.\n").expect("problem");

    let output = solver()
        .current_dir(root)
        .args(["solve", "--json"])
        .output()
        .expect("solver solve");

    assert_eq!(
        output.status.code(),
        Some(exit_codes::OK),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(report["status"], "success");
    assert_eq!(report["attempts"], 1);
    assert_eq!(report["generations"]["optimal"], 1);
    assert_eq!(
        fs::read_to_string(root.join("ws").join("brute_out.txt")).expect("brute out"),
        "16\n81\n"
    );
    let log = fs::read_to_string(root.join("ws").join("generator.brute.log")).expect("log");
    assert!(log.starts_with("=== stdout ===\n```sh"), "{log}");
}

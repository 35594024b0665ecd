//! Process executor for candidate solutions.
//!
//! Runs one source file through the configured interpreter with a test input
//! on stdin, captures stdout into a file, and classifies the result. The
//! executor never returns `Err`: every failure is folded into an
//! [`ExecutionResult`] so the orchestrator can decide what it means.

use std::fs::File;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::types::{ExecOutcome, ExecutionResult};
use crate::io::process::run_with_files;

pub const DEFAULT_STDERR_LIMIT_BYTES: usize = 64 * 1024;

/// Runs candidates as `<interpreter...> <source>`.
#[derive(Debug, Clone)]
pub struct CodeExecutor {
    interpreter: Vec<String>,
    stderr_limit_bytes: usize,
}

impl Default for CodeExecutor {
    fn default() -> Self {
        Self::new(vec!["python3".to_string()])
    }
}

impl CodeExecutor {
    pub fn new(interpreter: Vec<String>) -> Self {
        Self {
            interpreter,
            stderr_limit_bytes: DEFAULT_STDERR_LIMIT_BYTES,
        }
    }

    pub fn with_stderr_limit(mut self, bytes: usize) -> Self {
        self.stderr_limit_bytes = bytes;
        self
    }

    /// Run `source` with `input` on stdin, writing stdout to `output`.
    ///
    /// `output` is created or truncated only once both preconditions hold.
    #[instrument(skip_all, fields(source = %source.display(), timeout_secs = timeout.as_secs()))]
    pub fn execute(
        &self,
        source: &Path,
        input: &Path,
        output: &Path,
        timeout: Duration,
    ) -> ExecutionResult {
        let fail = |outcome: ExecOutcome, error: String| ExecutionResult {
            outcome,
            output_path: output.to_path_buf(),
            error,
        };

        if !source.is_file() {
            warn!("code file missing");
            return fail(
                ExecOutcome::CodeFileNotFound,
                format!("Code file not found: {}", source.display()),
            );
        }
        if !input.is_file() {
            warn!(input = %input.display(), "input file missing");
            return fail(
                ExecOutcome::InputFileNotFound,
                format!("Input file not found: {}", input.display()),
            );
        }

        match self.run(source, input, output, timeout) {
            Ok(result) => result,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "could not run candidate");
                fail(
                    ExecOutcome::RuntimeError { exit_code: None },
                    format!("Execution failed: {err:#}"),
                )
            }
        }
    }

    fn run(
        &self,
        source: &Path,
        input: &Path,
        output: &Path,
        timeout: Duration,
    ) -> Result<ExecutionResult> {
        let (program, args) = self
            .interpreter
            .split_first()
            .ok_or_else(|| anyhow!("interpreter command is empty"))?;
        let mut cmd = Command::new(program);
        cmd.args(args).arg(source);

        let stdin =
            File::open(input).with_context(|| format!("open input {}", input.display()))?;
        if let Some(parent) = output.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir {}", parent.display()))?;
        }
        let stdout =
            File::create(output).with_context(|| format!("create output {}", output.display()))?;

        info!(interpreter = %program, "running candidate");
        let run = run_with_files(cmd, stdin, stdout, timeout, self.stderr_limit_bytes)
            .with_context(|| format!("run {program}"))?;

        let stderr = String::from_utf8_lossy(&run.stderr);
        let (outcome, error) = if run.timed_out {
            (
                ExecOutcome::Timeout,
                format!(
                    "Execution timed out after {} seconds",
                    format_secs(timeout)
                ),
            )
        } else if run.status.success() {
            (ExecOutcome::Ok, String::new())
        } else {
            let exit_code = run.status.code();
            let status = match exit_code {
                Some(code) => format!("exit code {code}"),
                None => "termination by signal".to_string(),
            };
            let mut error = format!("Execution failed with {status}");
            if !stderr.trim().is_empty() {
                error.push_str(":\n");
                error.push_str(stderr.trim_end());
            }
            error.push_str(&run.stderr_truncated_notice("candidate"));
            (ExecOutcome::RuntimeError { exit_code }, error)
        };

        debug!(outcome = ?outcome, "candidate finished");
        Ok(ExecutionResult {
            outcome,
            output_path: output.to_path_buf(),
            error,
        })
    }
}

fn format_secs(timeout: Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        timeout.as_secs().to_string()
    } else {
        format!("{:.3}", timeout.as_secs_f64())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::types::ExitClass;
    use std::fs;
    use std::path::PathBuf;
    use std::time::Instant;

    struct Fixture {
        _temp: tempfile::TempDir,
        dir: PathBuf,
        executor: CodeExecutor,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = tempfile::tempdir().expect("tempdir");
            let dir = temp.path().to_path_buf();
            Self {
                _temp: temp,
                dir,
                executor: CodeExecutor::new(vec!["sh".to_string()]),
            }
        }

        fn file(&self, name: &str, contents: &str) -> PathBuf {
            let path = self.dir.join(name);
            fs::write(&path, contents).expect("write fixture");
            path
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.join(name)
        }
    }

    #[test]
    fn prints_hello_world() {
        let fx = Fixture::new();
        let source = fx.file("hello.sh", "echo 'Hello, World!'\n");
        let input = fx.file("input.txt", "");
        let output = fx.path("output.txt");

        let result = fx
            .executor
            .execute(&source, &input, &output, Duration::from_secs(5));

        assert!(result.success(), "{}", result.error);
        assert_eq!(result.clone().into_pair(), (true, String::new()));
        assert_eq!(result.outcome.class(), ExitClass::Ok);
        assert_eq!(fs::read_to_string(&output).expect("read"), "Hello, World!\n");
    }

    #[test]
    fn transforms_stdin_line() {
        let fx = Fixture::new();
        let source = fx.file("echo.sh", "read line\necho \"Input was: $line\"\n");
        let input = fx.file("input.txt", "test input\n");
        let output = fx.path("output.txt");

        let result = fx
            .executor
            .execute(&source, &input, &output, Duration::from_secs(5));

        assert!(result.success(), "{}", result.error);
        assert_eq!(
            fs::read_to_string(&output).expect("read"),
            "Input was: test input\n"
        );
    }

    #[test]
    fn stdout_is_captured_byte_for_byte() {
        let fx = Fixture::new();
        let source = fx.file("raw.sh", "printf '  a \\n\\n b  '\necho err >&2\n");
        let input = fx.file("input.txt", "");
        let output = fx.path("output.txt");

        let result = fx
            .executor
            .execute(&source, &input, &output, Duration::from_secs(5));

        assert!(result.success(), "{}", result.error);
        assert_eq!(fs::read(&output).expect("read"), b"  a \n\n b  ");
    }

    #[test]
    fn missing_code_file_is_reported() {
        let fx = Fixture::new();
        let input = fx.file("input.txt", "");
        let output = fx.path("output.txt");

        let result = fx.executor.execute(
            &fx.path("nonexistent.sh"),
            &input,
            &output,
            Duration::from_secs(5),
        );

        assert_eq!(result.outcome, ExecOutcome::CodeFileNotFound);
        let (ok, error) = result.into_pair();
        assert!(!ok);
        assert!(error.contains("Code file not found"), "{error}");
        assert!(!output.exists());
    }

    #[test]
    fn missing_code_file_wins_over_missing_input() {
        let fx = Fixture::new();
        let result = fx.executor.execute(
            &fx.path("nonexistent.sh"),
            &fx.path("nonexistent_input.txt"),
            &fx.path("output.txt"),
            Duration::from_secs(5),
        );
        assert!(result.error.contains("Code file not found"));
    }

    #[test]
    fn missing_input_file_is_reported() {
        let fx = Fixture::new();
        let source = fx.file("test.sh", "echo test\n");

        let result = fx.executor.execute(
            &source,
            &fx.path("nonexistent_input.txt"),
            &fx.path("output.txt"),
            Duration::from_secs(5),
        );

        assert_eq!(result.outcome, ExecOutcome::InputFileNotFound);
        assert_eq!(result.outcome.class(), ExitClass::NotFound);
        assert!(result.error.contains("Input file not found"));
    }

    #[test]
    fn syntax_error_is_execution_failure() {
        let fx = Fixture::new();
        let source = fx.file("syntax_error.sh", "echo \"Hello World\n");
        let input = fx.file("input.txt", "");

        let result = fx.executor.execute(
            &source,
            &input,
            &fx.path("output.txt"),
            Duration::from_secs(5),
        );

        assert!(!result.success());
        assert!(matches!(result.outcome, ExecOutcome::RuntimeError { .. }));
        assert!(result.error.contains("Execution failed"), "{}", result.error);
    }

    #[test]
    fn nonzero_exit_includes_stderr() {
        let fx = Fixture::new();
        let source = fx.file("boom.sh", "echo partial\necho 'Traceback: boom' >&2\nexit 3\n");
        let input = fx.file("input.txt", "");

        let result = fx.executor.execute(
            &source,
            &input,
            &fx.path("output.txt"),
            Duration::from_secs(5),
        );

        assert_eq!(
            result.outcome,
            ExecOutcome::RuntimeError { exit_code: Some(3) }
        );
        assert!(result.error.contains("exit code 3"));
        assert!(result.error.contains("Traceback: boom"));
        assert!(!result.error.contains("partial"));
    }

    #[test]
    fn missing_interpreter_is_runtime_error() {
        let fx = Fixture::new();
        let source = fx.file("x.sh", "echo x\n");
        let input = fx.file("input.txt", "");
        let executor = CodeExecutor::new(vec!["definitely-not-an-interpreter-7f3a".to_string()]);

        let result = executor.execute(&source, &input, &fx.path("out.txt"), Duration::from_secs(5));

        assert_eq!(
            result.outcome,
            ExecOutcome::RuntimeError { exit_code: None }
        );
        assert!(result.error.starts_with("Execution failed"));
    }

    #[test]
    fn timeout_is_bounded_and_classified() {
        let fx = Fixture::new();
        let source = fx.file("slow.sh", "sleep 30\n");
        let input = fx.file("input.txt", "");

        let start = Instant::now();
        let result = fx.executor.execute(
            &source,
            &input,
            &fx.path("output.txt"),
            Duration::from_secs(1),
        );

        assert_eq!(result.outcome, ExecOutcome::Timeout);
        assert!(result.error.contains("timed out after 1 seconds"));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn timeout_leaves_no_descendant_running() {
        let fx = Fixture::new();
        let pid_path = fx.path("child.pid");
        let source = fx.file(
            "spawner.sh",
            &format!("sleep 30 &\necho $! > '{}'\nwait\n", pid_path.display()),
        );
        let input = fx.file("input.txt", "");

        let result = fx.executor.execute(
            &source,
            &input,
            &fx.path("output.txt"),
            Duration::from_secs(1),
        );
        assert_eq!(result.outcome, ExecOutcome::Timeout);

        let pid = fs::read_to_string(&pid_path).expect("pid file");
        let pid = pid.trim();
        let deadline = Instant::now() + Duration::from_secs(3);
        while process_running(pid) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }
        assert!(!process_running(pid), "descendant {pid} still running");
    }

    #[cfg(target_os = "linux")]
    fn process_running(pid: &str) -> bool {
        // Zombies awaiting reaping by init count as gone.
        match fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                .is_some_and(|state| state != 'Z' && state != 'X'),
            Err(_) => false,
        }
    }
}

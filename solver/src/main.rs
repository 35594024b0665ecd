//! Brute-then-optimal solver CLI.
//!
//! `solver solve` generates a brute-force program, runs it to produce reference
//! output, then iterates on an optimized program until the outputs agree.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use solver::core::types::{ErrorKind, ExecOutcome};
use solver::exit_codes;
use solver::io::compare::OutputComparator;
use solver::io::config::ConfigError;
use solver::io::executor::CodeExecutor;
use solver::io::init::{DEFAULT_CONFIG_FILE, DEFAULT_PROBLEM_FILE, InitOptions, init_project};
use solver::logging;
use solver::solve::{Orchestrator, SessionOutcome, SessionReport, read_problem};

#[derive(Parser)]
#[command(
    name = "solver",
    version,
    about = "Generate, run and cross-check competitive-programming solutions"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` wins when set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write `solver.toml` and create the workspace directory.
    Init {
        /// Overwrite an existing config with the template.
        #[arg(short, long)]
        force: bool,
    },
    /// Run a full brute-then-optimal session.
    Solve {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        #[arg(long, default_value = DEFAULT_PROBLEM_FILE)]
        problem: PathBuf,
        /// Print the session report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run one source file against one input file.
    Run {
        source: PathBuf,
        input: PathBuf,
        output: PathBuf,
        /// Wall-clock limit in seconds.
        #[arg(long, default_value_t = 10)]
        timeout: u64,
        /// Interpreter argv; repeat for extra arguments. Defaults to python3.
        #[arg(long = "interpreter", allow_hyphen_values = true)]
        interpreter: Vec<String>,
    },
    /// Compare an expected output file with an actual one.
    Compare { expected: PathBuf, actual: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli.command) {
        Ok(code) => exit_code(code),
        Err(err) => {
            eprintln!("{err:#}");
            exit_code(exit_codes::INVALID)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn run(command: Command) -> Result<i32> {
    match command {
        Command::Init { force } => cmd_init(force),
        Command::Solve {
            config,
            problem,
            json,
        } => cmd_solve(&config, &problem, json),
        Command::Run {
            source,
            input,
            output,
            timeout,
            interpreter,
        } => Ok(cmd_run(&source, &input, &output, timeout, interpreter)),
        Command::Compare { expected, actual } => Ok(cmd_compare(&expected, &actual)),
    }
}

fn cmd_init(force: bool) -> Result<i32> {
    let root = std::env::current_dir().context("resolve current directory")?;
    let report = init_project(&root, &InitOptions::in_root(&root, force))?;
    if report.config_written {
        println!("wrote {}", report.config_path.display());
    } else {
        println!("kept existing {}", report.config_path.display());
    }
    if report.workspace_created {
        println!("created {}", report.workspace_dir.display());
    }
    if !report.problem_present {
        println!("next: put the problem statement in {DEFAULT_PROBLEM_FILE}");
    }
    Ok(exit_codes::OK)
}

fn cmd_solve(config: &Path, problem: &Path, json: bool) -> Result<i32> {
    let orchestrator = match Orchestrator::from_config_path(config) {
        Ok(orchestrator) => orchestrator,
        Err(err) if err.downcast_ref::<ConfigError>().is_some() => {
            eprintln!("{}: {err:#}", ErrorKind::ConfigurationError);
            return Ok(exit_codes::INVALID);
        }
        Err(err) => return Err(err),
    };
    let problem = read_problem(problem)?;
    let report = orchestrator.solve(&problem)?;
    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    Ok(report.outcome.exit_code())
}

fn print_report(report: &SessionReport) {
    let artifacts = &report.artifacts;
    match &report.outcome {
        SessionOutcome::Success { attempts } => {
            println!("solved in {attempts} optimal attempt(s)");
            println!("brute:   {}", artifacts.brute_solution.display());
            println!("optimal: {}", artifacts.optimal_solution.display());
        }
        SessionOutcome::StageFailed {
            stage,
            kind,
            message,
        } => {
            println!("{stage} stage failed ({kind})");
            println!("{message}");
        }
        SessionOutcome::ConvergenceFailure {
            attempts,
            last_diff,
        } => {
            println!("no match after {attempts} optimal attempt(s)");
            println!("{last_diff}");
        }
    }
}

#[derive(Serialize)]
struct RunReport<'a> {
    success: bool,
    kind: Option<ErrorKind>,
    error: &'a str,
}

fn cmd_run(
    source: &Path,
    input: &Path,
    output: &Path,
    timeout: u64,
    interpreter: Vec<String>,
) -> i32 {
    let executor = if interpreter.is_empty() {
        CodeExecutor::default()
    } else {
        CodeExecutor::new(interpreter)
    };
    let result = executor.execute(source, input, output, Duration::from_secs(timeout));
    if result.outcome == ExecOutcome::Ok {
        exit_codes::OK
    } else {
        let report = RunReport {
            success: false,
            kind: result.outcome.error_kind(),
            error: &result.error,
        };
        match serde_json::to_string(&report) {
            Ok(line) => eprintln!("{line}"),
            Err(_) => eprintln!("{}", result.error),
        }
        exit_codes::FAILED
    }
}

fn cmd_compare(expected: &Path, actual: &Path) -> i32 {
    let comparator = OutputComparator::default();
    let verdict = comparator.verdict(expected, actual);
    match verdict.diff {
        None => {
            println!("{}", comparator.diff_summary(expected, actual));
            exit_codes::OK
        }
        Some(diff) => {
            println!("{diff}");
            exit_codes::FAILED
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["solver", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn parse_solve_defaults() {
        let cli = Cli::parse_from(["solver", "solve"]);
        match cli.command {
            Command::Solve {
                config,
                problem,
                json,
            } => {
                assert_eq!(config, PathBuf::from("solver.toml"));
                assert_eq!(problem, PathBuf::from("PROBLEM.txt"));
                assert!(!json);
            }
            _ => panic!("expected solve"),
        }
    }

    #[test]
    fn parse_run_with_interpreter_and_verbosity() {
        let cli = Cli::parse_from([
            "solver",
            "-vv",
            "run",
            "a.py",
            "in.txt",
            "out.txt",
            "--timeout",
            "3",
            "--interpreter",
            "python3",
            "--interpreter",
            "-u",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Run {
                timeout,
                interpreter,
                ..
            } => {
                assert_eq!(timeout, 3);
                assert_eq!(interpreter, vec!["python3", "-u"]);
            }
            _ => panic!("expected run"),
        }
    }
}

//! Helpers for running child processes with timeouts and bounded output.
//!
//! Every child is started as the leader of its own process group. When the
//! supervising call returns, on any path, the whole group is killed and the
//! leader reaped, so descendants cannot outlive the call.

use std::fs::File;
use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;
#[cfg(unix)]
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};

/// Upper bound on the sleep between exit checks while waiting on a child.
#[cfg(unix)]
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_truncated_notice(&self, label: &str) -> String {
        truncated_notice(label, "stdout", self.stdout_truncated)
    }

    pub fn stderr_truncated_notice(&self, label: &str) -> String {
        truncated_notice(label, "stderr", self.stderr_truncated)
    }
}

/// Outcome of a child whose stdout went straight to a file.
#[derive(Debug)]
pub struct FileRunOutput {
    pub status: ExitStatus,
    pub stderr: Vec<u8>,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl FileRunOutput {
    pub fn stderr_truncated_notice(&self, label: &str) -> String {
        truncated_notice(label, "stderr", self.stderr_truncated)
    }
}

fn truncated_notice(label: &str, stream: &str, truncated: usize) -> String {
    if truncated > 0 {
        format!("\n[{label} {stream} truncated {truncated} bytes]\n")
    } else {
        String::new()
    }
}

/// Owned handle to a spawned process group.
///
/// Dropping the handle kills the group and reaps the leader if that has not
/// happened yet.
struct SupervisedChild {
    child: Child,
    reaped: bool,
}

impl SupervisedChild {
    fn spawn(cmd: &mut Command) -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        let child = cmd.spawn()?;
        Ok(Self {
            child,
            reaped: false,
        })
    }

    fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Block until the leader exits or `timeout` elapses.
    ///
    /// Returns the exit status and whether the deadline was hit. The group is
    /// killed while the leader is still an unreaped zombie, so its pid (and the
    /// group id) cannot have been handed to another process yet.
    #[cfg(unix)]
    fn wait_deadline(&mut self, timeout: Duration) -> Result<(ExitStatus, bool)> {
        let pid = self.child.id();
        let deadline = Instant::now() + timeout;
        let mut pause = Duration::from_millis(1);
        let timed_out = loop {
            match leader_exited(pid) {
                Ok(true) => break false,
                Ok(false) => {}
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("wait for child process"),
            }
            let now = Instant::now();
            if now >= deadline {
                break true;
            }
            thread::sleep(pause.min(deadline - now));
            pause = (pause * 2).min(MAX_POLL_INTERVAL);
        };
        if timed_out {
            warn!(timeout_secs = timeout.as_secs_f64(), "child timed out, killing");
        }
        // Kills the leader on timeout and sweeps leftover descendants otherwise.
        kill_process_group(pid);
        let status = self.child.wait().context("reap child")?;
        self.reaped = true;
        Ok((status, timed_out))
    }

    #[cfg(not(unix))]
    fn wait_deadline(&mut self, timeout: Duration) -> Result<(ExitStatus, bool)> {
        
        let waited = self
            .child
            .wait_timeout(timeout)
            .context("wait for child process")?;
        let (status, timed_out) = match waited {
            Some(status) => (status, false),
            None => {
                warn!(timeout_secs = timeout.as_secs_f64(), "child timed out, killing");
                if let Err(e) = self.child.kill() {
                    debug!(err = %e, "kill child after timeout");
                }
                (self.child.wait().context("wait child after kill")?, true)
            }
        };
        self.reaped = true;
        Ok((status, timed_out))
    }
}

impl Drop for SupervisedChild {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        kill_process_group(self.child.id());
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Whether the leader has exited, without reaping it.
#[cfg(unix)]
#[allow(unsafe_code)]
fn leader_exited(pid: u32) -> std::io::Result<bool> {
    let id = libc::id_t::from(pid);
    // SAFETY: siginfo_t is plain data; an all-zero value is valid.
    let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
    // SAFETY: waitid writes only into `info`; WNOWAIT leaves the child waitable.
    let rc = unsafe {
        libc::waitid(
            libc::P_PID,
            id,
            &mut info,
            libc::WEXITED | libc::WNOHANG | libc::WNOWAIT,
        )
    };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: after a successful waitid, si_pid is set and stays zero when no
    // child changed state.
    Ok(unsafe { info.si_pid() } != 0)
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_process_group(leader_pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(leader_pid) else {
        return;
    };
    if pgid <= 1 {
        return;
    }
    // SAFETY: killpg only takes integer arguments; a stale or empty group yields ESRCH.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, err = %std::io::Error::last_os_error(), "killpg");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_leader_pid: u32) {}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match SupervisedChild::spawn(&mut cmd) {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdin_handle = match stdin {
        Some(input) => {
            let mut child_stdin = child
                .child_mut()
                .stdin
                .take()
                .ok_or_else(|| anyhow!("stdin was not piped"))?;
            let input = input.to_vec();
            // A child that never reads stdin must not block the deadline.
            Some(thread::spawn(move || child_stdin.write_all(&input)))
        }
        None => None,
    };

    let stdout = child
        .child_mut()
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .child_mut()
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let (status, timed_out) = child.wait_deadline(timeout)?;

    if let Some(handle) = stdin_handle {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(err = %e, "child closed stdin early"),
            Err(_) => return Err(anyhow!("stdin writer thread panicked")),
        }
    }
    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

/// Run a command with stdin read from `stdin` and stdout written to `stdout`.
///
/// The child writes straight into the output file so its bytes land unmodified.
/// Stderr is drained on a helper thread and kept up to `stderr_limit_bytes`.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), stderr_limit_bytes))]
pub fn run_with_files(
    mut cmd: Command,
    stdin: File,
    stdout: File,
    timeout: Duration,
    stderr_limit_bytes: usize,
) -> Result<FileRunOutput> {
    cmd.stdin(Stdio::from(stdin))
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match SupervisedChild::spawn(&mut cmd) {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };
    // The parent's copies of the stdio handles are closed once spawn returns.
    drop(cmd);

    let stderr = child
        .child_mut()
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, stderr_limit_bytes));

    let (status, timed_out) = child.wait_deadline(timeout)?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stderr_truncated > 0 {
        warn!(stderr_truncated, "stderr truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(FileRunOutput {
        status,
        stderr,
        stderr_truncated,
        timed_out,
    })
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

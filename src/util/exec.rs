use std::ffi::OsString;
use std::io;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use wait_timeout::ChildExt;

/// Runs external tools (docker, ssh-keygen, keybase) with captured output and a timeout.
/// A zero timeout waits indefinitely.
#[derive(Debug, Clone)]
pub struct ExecService {
    default_timeout: Duration,
}

impl ExecService {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    pub fn run(&self, request: ExecRequest) -> Result<ExecOutput> {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(program = ?request.program, args = ?request.args, "exec");
        let mut child = cmd.spawn().with_context(|| {
            format!(
                "failed to spawn {:?} with args {:?}",
                request.program, request.args
            )
        })?;

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let timeout = self.default_timeout;
        let started = Instant::now();
        let status = if timeout.is_zero() {
            child.wait().context("failed to wait for process")?
        } else {
            match child
                .wait_timeout(timeout)
                .context("failed to wait with timeout")?
            {
                Some(status) => status,
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(anyhow!(
                        "command {:?} timed out after {:?}",
                        request.program,
                        timeout
                    ));
                }
            }
        };

        let duration = started.elapsed();
        tracing::debug!(program = ?request.program, ?status, ?duration, "exec finished");
        let stdout = read_stream(stdout_pipe.as_mut())?;
        let stderr = read_stream(stderr_pipe.as_mut())?;

        Ok(ExecOutput {
            status,
            duration,
            stdout,
            stderr,
        })
    }
}

/// Run a command attached to the current terminal and return its exit status.
pub fn run_attached(program: impl Into<OsString>, args: &[OsString]) -> io::Result<ExitStatus> {
    let program = program.into();
    tracing::debug!(program = ?program, args = ?args, "exec attached");
    Command::new(&program).args(args).status()
}

fn read_stream(stream: Option<&mut impl io::Read>) -> Result<String> {
    let mut buf = String::new();
    if let Some(reader) = stream {
        reader
            .read_to_string(&mut buf)
            .context("failed to read process output")?;
    }
    Ok(buf)
}

impl Default for ExecService {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[derive(Debug, Default)]
pub struct ExecRequest {
    program: OsString,
    args: Vec<OsString>,
}

impl ExecRequest {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

}

#[derive(Debug)]
pub struct ExecOutput {
    pub status: ExitStatus,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    /// Error carrying stderr when the process exited non-zero.
    pub fn check(self, what: &str) -> Result<Self> {
        if self.status.success() {
            Ok(self)
        } else {
            Err(anyhow!(
                "{what} failed ({}): {}",
                self.status,
                self.stderr.trim()
            ))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_captures_stdout() {
        let out = ExecService::default()
            .run(ExecRequest::new("sh").args(["-c", "echo hello; echo oops >&2"]))
            .expect("run sh");
        assert!(out.status.success());
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[test]
    fn test_check_reports_stderr() {
        let out = ExecService::default()
            .run(ExecRequest::new("sh").args(["-c", "echo broken >&2; exit 3"]))
            .expect("run sh");
        let err = out.check("probe").unwrap_err().to_string();
        assert!(err.contains("probe failed"), "{err}");
        assert!(err.contains("broken"), "{err}");
    }

    #[test]
    fn test_timeout_kills_child() {
        let err = ExecService::new(Duration::from_millis(200))
            .run(ExecRequest::new("sh").args(["-c", "sleep 5"]))
            .unwrap_err()
            .to_string();
        assert!(err.contains("timed out"), "{err}");
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let err = ExecService::default()
            .run(ExecRequest::new("kdk-definitely-not-a-program"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("failed to spawn"), "{err}");
    }
}

//! Process execution behind a swappable [`Executor`] trait.
use anyhow::{Context, Result, bail};
use std::io::Write as _;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::string::FromUtf8Error;

/// Result of a command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Exit code, `None` if the process was terminated by a signal.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

impl ExecResult {
    /// Like the [`From`] conversion, but stdout must be valid UTF-8.
    /// Stderr is diagnostic text and is still decoded lossily.
    fn from_output_strict(output: Output) -> Result<Self, FromUtf8Error> {
        Ok(Self {
            stdout: String::from_utf8(output.stdout)?,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}

/// Runs external programs.
///
/// The production implementation is [`SystemExecutor`]; tests substitute a
/// mock so that inventory loading and module invocation can be exercised
/// without spawning processes.
#[cfg_attr(test, mockall::automock)]
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Run a command and return its output. Fails if the command exits non-zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be started or exits non-zero.
    fn run(&self, program: &str, args: &[&'static str]) -> Result<ExecResult>;

    /// Run `program` with `input` written to its stdin, returning the result
    /// without inspecting the exit status.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started, its streams fail,
    /// or its stdout is not UTF-8 (the error then wraps a [`FromUtf8Error`]).
    fn run_with_input(&self, program: &Path, input: &str) -> Result<ExecResult>;

    /// Check if a program is available on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// [`Executor`] backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run(&self, program: &str, args: &[&'static str]) -> Result<ExecResult> {
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("failed to execute: {program}"))?;
        let result = ExecResult::from(output);
        if !result.success {
            bail!(
                "{program} failed (exit {}): {}",
                result.code.unwrap_or(-1),
                result.stderr.trim()
            );
        }
        Ok(result)
    }

    fn run_with_input(&self, program: &Path, input: &str) -> Result<ExecResult> {
        let mut child = Command::new(program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to execute: {}", program.display()))?;

        // Writing from a separate thread keeps a module that emits a large
        // manifest before draining stdin from deadlocking against us.
        let writer = child.stdin.take().map(|mut stdin| {
            let payload = input.to_owned();
            std::thread::spawn(move || stdin.write_all(payload.as_bytes()))
        });

        let output = child
            .wait_with_output()
            .with_context(|| format!("waiting for {}", program.display()))?;

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                // A module may exit without reading its input; that is its
                // exit status's business, not a transport failure.
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => {
                    return Err(e)
                        .with_context(|| format!("writing stdin of {}", program.display()));
                }
                Err(_) => bail!("stdin writer for {} panicked", program.display()),
            }
        }

        ExecResult::from_output_strict(output)
            .with_context(|| format!("stdout of {} is not valid UTF-8", program.display()))
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

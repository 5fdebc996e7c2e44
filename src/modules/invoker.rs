//! Run a module executable with its JSON payload and collect the manifest.
use std::path::Path;
use std::string::FromUtf8Error;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ModuleError;
use crate::exec::Executor;

/// Document written to a module's standard input.
#[derive(Debug, Serialize)]
pub struct ModulePayload<'a> {
    /// The full inventory document.
    pub chezmoi: &'a Value,
    /// The module's effective configuration.
    pub data: &'a Map<String, Value>,
}

/// Raw output of a successful module run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOutput {
    /// Standard output, expected to hold the manifest JSON.
    pub stdout: String,
    /// Trimmed standard error, if the module wrote any.
    pub stderr: Option<String>,
}

/// Run the module at `path`, feeding it `payload` on stdin.
///
/// # Errors
///
/// Returns [`ModuleError::Spawn`] if the process cannot be run,
/// [`ModuleError::ExecutionFailed`] on non-zero exit,
/// [`ModuleError::NonUtf8Output`] if stdout is not UTF-8, and
/// [`ModuleError::NoOutput`] if it wrote nothing to stdout.
pub fn invoke(
    executor: &dyn Executor,
    module: &str,
    path: &Path,
    payload: &ModulePayload<'_>,
) -> Result<ModuleOutput, ModuleError> {
    let input = serde_json::to_string(payload).map_err(|e| ModuleError::Spawn {
        module: module.to_string(),
        reason: format!("encoding payload: {e}"),
    })?;

    let result = executor.run_with_input(path, &input).map_err(|e| {
        if e.downcast_ref::<FromUtf8Error>().is_some() {
            ModuleError::NonUtf8Output(module.to_string())
        } else {
            ModuleError::Spawn {
                module: module.to_string(),
                reason: format!("{e:#}"),
            }
        }
    })?;

    let stderr = result.stderr.trim();
    if !result.success {
        return Err(ModuleError::ExecutionFailed {
            module: module.to_string(),
            code: result.code,
            stderr: stderr.to_string(),
        });
    }
    if result.stdout.trim().is_empty() {
        return Err(ModuleError::NoOutput(module.to_string()));
    }

    Ok(ModuleOutput {
        stderr: (!stderr.is_empty()).then(|| stderr.to_string()),
        stdout: result.stdout,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::{ExecResult, MockExecutor};
    use serde_json::json;

    fn ok(stdout: &str, stderr: &str) -> ExecResult {
        ExecResult {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            success: true,
            code: Some(0),
        }
    }

    fn run(exec: &MockExecutor) -> Result<ModuleOutput, ModuleError> {
        let inventory = json!({"chezmoi": {"hostname": "laptop"}});
        let config = json!({"name": "A"}).as_object().cloned().unwrap();
        invoke(
            exec,
            "git",
            Path::new("/m/git/generate"),
            &ModulePayload {
                chezmoi: &inventory,
                data: &config,
            },
        )
    }

    #[test]
    fn sends_payload_and_returns_stdout() {
        let mut exec = MockExecutor::new();
        exec.expect_run_with_input()
            .withf(|path, input| {
                let doc: Value = serde_json::from_str(input).unwrap();
                path == Path::new("/m/git/generate")
                    && doc["data"]["name"] == "A"
                    && doc["chezmoi"]["chezmoi"]["hostname"] == "laptop"
            })
            .times(1)
            .returning(|_, _| Ok(ok("{\"files\": []}", "")));
        let out = run(&exec).unwrap();
        assert_eq!(out.stdout, "{\"files\": []}");
        assert_eq!(out.stderr, None);
    }

    #[test]
    fn non_zero_exit_is_execution_failure() {
        let mut exec = MockExecutor::new();
        exec.expect_run_with_input().returning(|_, _| {
            Ok(ExecResult {
                stderr: "  bad config\n".to_string(),
                success: false,
                code: Some(2),
                ..ExecResult::default()
            })
        });
        let err = run(&exec).unwrap_err();
        assert!(
            matches!(&err, ModuleError::ExecutionFailed { code: Some(2), stderr, .. } if stderr == "bad config"),
            "{err}"
        );
    }

    #[test]
    fn empty_stdout_is_no_output() {
        let mut exec = MockExecutor::new();
        exec.expect_run_with_input()
            .returning(|_, _| Ok(ok("  \n", "")));
        assert!(matches!(run(&exec), Err(ModuleError::NoOutput(m)) if m == "git"));
    }

    #[test]
    fn stderr_on_success_is_captured() {
        let mut exec = MockExecutor::new();
        exec.expect_run_with_input()
            .returning(|_, _| Ok(ok("{}", "deprecated key\n")));
        let out = run(&exec).unwrap();
        assert_eq!(out.stderr.as_deref(), Some("deprecated key"));
    }

    #[test]
    fn spawn_failure_is_reported() {
        let mut exec = MockExecutor::new();
        exec.expect_run_with_input()
            .returning(|_, _| Err(anyhow::anyhow!("permission denied")));
        let err = run(&exec).unwrap_err();
        assert!(matches!(err, ModuleError::Spawn { .. }));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn non_utf8_stdout_is_its_own_error() {
        let mut exec = MockExecutor::new();
        exec.expect_run_with_input().returning(|_, _| {
            let bad = String::from_utf8(vec![b'{', 0xff]).unwrap_err();
            Err(anyhow::Error::new(bad).context("stdout of /m/git/generate is not valid UTF-8"))
        });
        assert!(matches!(run(&exec), Err(ModuleError::NonUtf8Output(m)) if m == "git"));
    }
}

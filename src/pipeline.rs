//! The build pipeline: run every resolved module and fold its manifest.
//!
//! Modules are processed in canonical order. The first error stops the
//! build and no plan is returned. With `parallel` set, invocations run
//! concurrently on the rayon pool; their logs are buffered and every result
//! is folded afterwards in canonical order, so the plan and the reported
//! error are the same as for a sequential build.
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Inventory, ModuleConfig, Resolution};
use crate::error::{BuildError, InvalidManifest};
use crate::exec::Executor;
use crate::logging::{BufferedLog, Log};
use crate::modules::{Manifest, ModePolicy, ModulePayload, ModuleResolver, invoke};
use crate::plan::{Aggregator, BuildReport, GlobalPlan};
use crate::warning::Warning;

/// Knobs for a single build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// How modes of shared files combine.
    pub policy: ModePolicy,
    /// Invoke modules concurrently.
    pub parallel: bool,
}

/// Shared state for running a build.
pub struct BuildContext {
    /// Canonical build root; planned paths are relative to it.
    pub root: PathBuf,
    /// Directory `~` expands to in file paths.
    pub home: Option<PathBuf>,
    /// Finds module entry points.
    pub resolver: Arc<dyn ModuleResolver>,
    /// Runs module processes.
    pub executor: Arc<dyn Executor>,
    /// Logger for progress and warnings.
    pub log: Arc<dyn Log>,
    /// Build options.
    pub options: BuildOptions,
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("root", &self.root)
            .field("home", &self.home)
            .field("resolver", &self.resolver)
            .field("executor", &"<dyn Executor>")
            .field("log", &"<dyn Log>")
            .field("options", &self.options)
            .finish()
    }
}

/// A finished build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// The plan handed to the materializer.
    pub plan: GlobalPlan,
    /// Summary of the build.
    pub report: BuildReport,
}

/// A module's validated output.
#[derive(Debug)]
struct ModuleRun {
    manifest: Manifest,
    stderr: Option<String>,
}

impl BuildContext {
    /// Build the plan for `host` from an already resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`BuildError`] in canonical module order.
    pub fn build(
        &self,
        host: &str,
        inventory: &Inventory,
        resolution: &Resolution,
    ) -> Result<BuildOutcome, BuildError> {
        let mut warnings = resolution.warnings.clone();
        for warning in &warnings {
            self.log.warn(&warning.to_string());
        }

        let mut aggregator =
            Aggregator::new(&self.root, self.options.policy).with_home(self.home.clone());
        let mut processed = Vec::with_capacity(resolution.modules.len());

        if self.options.parallel {
            use rayon::prelude::*;
            let results: Vec<(BufferedLog, Result<ModuleRun, BuildError>)> = resolution
                .modules
                .par_iter()
                .map(|module| {
                    let buffer = BufferedLog::new();
                    let result = self.run_module(module, inventory, &buffer);
                    (buffer, result)
                })
                .collect();
            for (module, (buffer, result)) in resolution.modules.iter().zip(results) {
                buffer.replay(self.log.as_ref());
                let run = result?;
                self.fold(&mut aggregator, &mut warnings, &module.name, run)?;
                processed.push(module.name.clone());
            }
        } else {
            for module in &resolution.modules {
                let run = self.run_module(module, inventory, self.log.as_ref())?;
                self.fold(&mut aggregator, &mut warnings, &module.name, run)?;
                processed.push(module.name.clone());
            }
        }

        let plan = aggregator.finish();

        let report = BuildReport::new(host, processed, &plan, warnings);
        Ok(BuildOutcome { plan, report })
    }

    fn run_module(
        &self,
        module: &ModuleConfig,
        inventory: &Inventory,
        log: &dyn Log,
    ) -> Result<ModuleRun, BuildError> {
        log.stage(&format!("Running module {}", module.name));
        let path = self.resolver.resolve(&module.name)?;
        log.debug(&format!("entry point: {}", path.display()));

        let payload = ModulePayload {
            chezmoi: inventory.document(),
            data: &module.config,
        };
        let output = invoke(self.executor.as_ref(), &module.name, &path, &payload)?;
        let manifest = Manifest::parse(&output.stdout).map_err(|source| InvalidManifest {
            module: module.name.clone(),
            source,
        })?;
        log.debug(&format!(
            "{}: {} file(s), {} script(s)",
            module.name,
            manifest.files.len(),
            manifest.scripts.len()
        ));
        Ok(ModuleRun {
            manifest,
            stderr: output.stderr,
        })
    }

    fn fold(
        &self,
        aggregator: &mut Aggregator,
        warnings: &mut Vec<Warning>,
        module: &str,
        run: ModuleRun,
    ) -> Result<(), BuildError> {
        if let Some(stderr) = run.stderr {
            let warning = Warning::ModuleStderr {
                module: module.to_string(),
                stderr,
            };
            self.log.warn(&warning.to_string());
            warnings.push(warning);
        }
        aggregator.add(module, run.manifest)?;
        for warning in aggregator.take_warnings() {
            self.log.warn(&warning.to_string());
            warnings.push(warning);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::merge::resolve_modules;
    use crate::error::{AggregationError, ModuleError};
    use crate::exec::{ExecResult, MockExecutor};
    use crate::logging::CapturedLog;
    use crate::modules::locator::MockModuleResolver;
    use serde_json::{Map, Value, json};

    const ROOT: &str = "/src/dotfiles";

    fn resolver() -> MockModuleResolver {
        let mut r = MockModuleResolver::new();
        r.expect_resolve()
            .returning(|name| Ok(Path::new(ROOT).join("modules").join(name).join("generate")));
        r
    }

    fn module_of(path: &Path) -> String {
        path.parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Executor that answers with a canned manifest per module directory.
    fn executor(outputs: Vec<(&'static str, ExecResult)>) -> MockExecutor {
        let mut exec = MockExecutor::new();
        exec.expect_run_with_input().returning(move |path, _| {
            let module = module_of(path);
            Ok(outputs
                .iter()
                .find(|(m, _)| *m == module)
                .map(|(_, r)| r.clone())
                .unwrap_or_default())
        });
        exec
    }

    fn ok(stdout: &str) -> ExecResult {
        ExecResult {
            stdout: stdout.to_string(),
            success: true,
            code: Some(0),
            ..ExecResult::default()
        }
    }

    fn context(exec: MockExecutor, parallel: bool) -> (BuildContext, Arc<CapturedLog>) {
        let log = Arc::new(CapturedLog::default());
        let ctx = BuildContext {
            root: PathBuf::from(ROOT),
            home: None,
            resolver: Arc::new(resolver()),
            executor: Arc::new(exec),
            log: log.clone(),
            options: BuildOptions {
                policy: ModePolicy::Restrict,
                parallel,
            },
        };
        (ctx, log)
    }

    fn resolution(host: &Value) -> Resolution {
        let host: Map<String, Value> = host.as_object().cloned().unwrap();
        resolve_modules(&Map::new(), &host).unwrap()
    }

    fn inventory() -> Inventory {
        Inventory::from_json(r#"{"chezmoi": {"hostname": "laptop"}}"#).unwrap()
    }

    const SHARED_A: &str = r#"{"files": [{"path": "shared.conf", "contents": {"kind": "inline", "source": "a"}, "mode": 493}]}"#;
    const SHARED_B: &str = r#"{"files": [{"path": "shared.conf", "append": [{"kind": "inline", "source": "b"}], "mode": 428}]}"#;

    #[test]
    fn builds_shared_file_from_two_modules() {
        let exec = executor(vec![("a", ok(SHARED_A)), ("b", ok(SHARED_B))]);
        let (ctx, _) = context(exec, false);
        let out = ctx
            .build("laptop", &inventory(), &resolution(&json!({"a": {}, "b": {}})))
            .unwrap();
        let f = &out.plan.files()["shared.conf"];
        assert_eq!(f.mode.bits(), 0o654);
        assert_eq!(f.append.len(), 1);
        assert_eq!(out.report.modules, ["a", "b"]);
        assert_eq!(out.report.file_count, 1);
    }

    #[test]
    fn parallel_matches_sequential() {
        let outputs = || vec![("a", ok(SHARED_A)), ("b", ok(SHARED_B))];
        let res = resolution(&json!({"a": {}, "b": {}}));
        let (seq, _) = context(executor(outputs()), false);
        let (par, _) = context(executor(outputs()), true);
        let seq = seq.build("laptop", &inventory(), &res).unwrap();
        let par = par.build("laptop", &inventory(), &res).unwrap();
        assert_eq!(seq.plan, par.plan);
        assert_eq!(seq.report, par.report);
    }

    #[test]
    fn failing_module_stops_the_build() {
        let failed = ExecResult {
            stderr: "boom".to_string(),
            success: false,
            code: Some(2),
            ..ExecResult::default()
        };
        let mut exec = MockExecutor::new();
        exec.expect_run_with_input()
            .withf(|path, _| module_of(path) == "bad")
            .times(1)
            .returning(move |_, _| Ok(failed.clone()));
        let (ctx, _) = context(exec, false);
        let err = ctx
            .build("laptop", &inventory(), &resolution(&json!({"bad": {}, "later": {}})))
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::Module(ModuleError::ExecutionFailed { code: Some(2), .. })
        ));
    }

    #[test]
    fn parallel_reports_first_error_in_order() {
        let exec = executor(vec![
            ("a", ok("not json")),
            ("b", ExecResult::default()),
        ]);
        let (ctx, _) = context(exec, true);
        let err = ctx
            .build("laptop", &inventory(), &resolution(&json!({"a": {}, "b": {}})))
            .unwrap_err();
        assert!(matches!(err, BuildError::Manifest(ref m) if m.module == "a"), "{err}");
    }

    #[test]
    fn content_conflict_is_fatal() {
        let exec = executor(vec![("a", ok(SHARED_A)), ("b", ok(SHARED_A))]);
        let (ctx, _) = context(exec, false);
        let err = ctx
            .build("laptop", &inventory(), &resolution(&json!({"a": {}, "b": {}})))
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::Aggregation(AggregationError::FileContentConflict { .. })
        ));
    }

    #[test]
    fn stderr_and_disabled_modules_become_warnings() {
        let mut noisy = ok(r#"{"files": []}"#);
        noisy.stderr = "deprecated\n".to_string();
        let exec = executor(vec![("a", noisy)]);
        let (ctx, log) = context(exec, false);
        let res = resolve_modules(
            json!({"a": {}, "ssh": {}}).as_object().unwrap(),
            json!({"ssh": null}).as_object().unwrap(),
        )
        .unwrap();
        let out = ctx.build("laptop", &inventory(), &res).unwrap();
        assert_eq!(
            out.report.warnings,
            vec![
                Warning::ModuleDisabled {
                    module: "ssh".to_string()
                },
                Warning::ModuleStderr {
                    module: "a".to_string(),
                    stderr: "deprecated".to_string()
                },
            ]
        );
        assert_eq!(log.at("warn").len(), 2);
    }

    #[test]
    fn warnings_follow_module_order() {
        const OUTSIDE: &str = r#"{"files": [{"path": "../escape", "contents": {"kind": "inline", "source": "x"}}]}"#;
        let mut noisy = ok("{}");
        noisy.stderr = "old flag".to_string();
        let exec = executor(vec![("a", ok(OUTSIDE)), ("b", noisy)]);
        let (ctx, log) = context(exec, false);
        let out = ctx
            .build("laptop", &inventory(), &resolution(&json!({"a": {}, "b": {}})))
            .unwrap();
        assert!(matches!(
            out.report.warnings.as_slice(),
            [Warning::PathOutsideRoot { module: a, .. }, Warning::ModuleStderr { module: b, .. }]
                if a == "a" && b == "b"
        ));
        assert_eq!(log.at("warn").len(), 2);
    }

    #[test]
    fn path_warning_is_logged_before_a_later_failure() {
        const OUTSIDE: &str = r#"{"files": [{"path": "/etc/motd", "contents": {"kind": "inline", "source": "x"}}]}"#;
        let exec = executor(vec![("a", ok(OUTSIDE)), ("b", ExecResult::default())]);
        let (ctx, log) = context(exec, false);
        ctx.build("laptop", &inventory(), &resolution(&json!({"a": {}, "b": {}})))
            .unwrap_err();
        let warned = log.at("warn");
        assert_eq!(warned.len(), 1);
        assert!(warned[0].contains("'/etc/motd'"), "{warned:?}");
    }

    #[test]
    fn payload_carries_inventory_and_config() {
        let mut exec = MockExecutor::new();
        exec.expect_run_with_input()
            .withf(|_, input| {
                let doc: Value = serde_json::from_str(input).unwrap();
                doc["data"] == json!({"name": "A"})
                    && doc["chezmoi"]["chezmoi"]["hostname"] == "laptop"
            })
            .times(1)
            .returning(|_, _| Ok(ok("{}")));
        let (ctx, _) = context(exec, false);
        ctx.build("laptop", &inventory(), &resolution(&json!({"git": {"name": "A"}})))
            .unwrap();
    }

    #[test]
    fn empty_resolution_builds_empty_plan() {
        let (ctx, _) = context(MockExecutor::new(), false);
        let out = ctx
            .build("laptop", &inventory(), &Resolution::default())
            .unwrap();
        assert!(out.plan.files().is_empty());
        assert!(out.report.modules.is_empty());
    }
}

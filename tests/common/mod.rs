// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed build root and a fluent builder so
// each integration test can lay out a host document, an inventory, and a set
// of shell-script modules without repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dotfiles_modules::cli::GlobalOpts;
use dotfiles_modules::commands::CommandSetup;
use dotfiles_modules::exec::SystemExecutor;
use dotfiles_modules::logging::Log;
use dotfiles_modules::modules::{FsModuleResolver, ModePolicy};
use dotfiles_modules::pipeline::{BuildContext, BuildOptions, BuildOutcome};

/// Hostname written into the default inventory.
pub const TEST_HOST: &str = "testhost";

/// [`Log`] that records every message as `"<level>: <message>"`.
#[derive(Debug, Default)]
pub struct RecordingLog {
    lines: Mutex<Vec<String>>,
}

impl RecordingLog {
    /// Messages logged at `level`, without the prefix.
    pub fn at(&self, level: &str) -> Vec<String> {
        let prefix = format!("{level}: ");
        self.lines
            .lock()
            .expect("log lock")
            .iter()
            .filter_map(|l| l.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    fn push(&self, level: &str, msg: &str) {
        self.lines
            .lock()
            .expect("log lock")
            .push(format!("{level}: {msg}"));
    }
}

impl Log for RecordingLog {
    fn stage(&self, msg: &str) {
        self.push("stage", msg);
    }
    fn info(&self, msg: &str) {
        self.push("info", msg);
    }
    fn debug(&self, msg: &str) {
        self.push("debug", msg);
    }
    fn warn(&self, msg: &str) {
        self.push("warn", msg);
    }
    fn error(&self, msg: &str) {
        self.push("error", msg);
    }
}

/// An isolated build root backed by a [`tempfile::TempDir`].
pub struct IntegrationTestContext {
    /// Temporary directory used as the build root.
    pub root: tempfile::TempDir,
}

impl IntegrationTestContext {
    /// Empty build root with a default inventory for [`TEST_HOST`].
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        std::fs::write(
            root.path().join("inventory.json"),
            format!(r#"{{"chezmoi": {{"hostname": "{TEST_HOST}", "os": "linux"}}}}"#),
        )
        .expect("write inventory");
        Self { root }
    }

    /// Path to the build root as created.
    pub fn root_path(&self) -> &Path {
        self.root.path()
    }

    /// Canonical build root, as the engine sees it.
    pub fn canonical_root(&self) -> PathBuf {
        dunce::canonicalize(self.root.path()).expect("canonicalize root")
    }

    /// Global options pointing at this root and its inventory file.
    pub fn global(&self) -> GlobalOpts {
        GlobalOpts {
            root: Some(self.root.path().to_path_buf()),
            inventory: Some(self.root.path().join("inventory.json")),
            ..GlobalOpts::default()
        }
    }

    /// Run the command setup sequence.
    pub fn setup(&self, global: &GlobalOpts, log: &dyn Log) -> anyhow::Result<CommandSetup> {
        CommandSetup::init(global, &SystemExecutor, log)
    }

    /// Run a full build with the given options.
    pub fn build_with(
        &self,
        policy: ModePolicy,
        parallel: bool,
    ) -> (anyhow::Result<BuildOutcome>, Arc<RecordingLog>) {
        let log = Arc::new(RecordingLog::default());
        let result = self.setup(&self.global(), log.as_ref()).and_then(|setup| {
            let ctx = BuildContext {
                resolver: Arc::new(FsModuleResolver::new(&setup.root)),
                root: setup.root.clone(),
                home: None,
                executor: Arc::new(SystemExecutor),
                log: log.clone(),
                options: BuildOptions { policy, parallel },
            };
            Ok(ctx.build(&setup.hostname, &setup.inventory, &setup.resolution)?)
        });
        (result, log)
    }

    /// Run a sequential build with the default mode policy.
    pub fn build(&self) -> (anyhow::Result<BuildOutcome>, Arc<RecordingLog>) {
        self.build_with(ModePolicy::Restrict, false)
    }

    /// Whether `rel` exists under the build root.
    pub fn exists(&self, rel: &str) -> bool {
        self.root.path().join(rel).exists()
    }
}

/// Fluent builder for [`IntegrationTestContext`].
pub struct TestContextBuilder {
    ctx: IntegrationTestContext,
}

impl TestContextBuilder {
    /// Begin building a new context.
    pub fn new() -> Self {
        Self {
            ctx: IntegrationTestContext::new(),
        }
    }

    /// Write the host document.
    pub fn with_hosts(self, yaml: &str) -> Self {
        std::fs::write(self.ctx.root.path().join("hosts.yaml"), yaml).expect("write hosts.yaml");
        self
    }

    /// Replace the inventory document.
    pub fn with_inventory(self, json: &str) -> Self {
        std::fs::write(self.ctx.root.path().join("inventory.json"), json)
            .expect("write inventory");
        self
    }

    /// Add a module under `modules/<name>` that discards its input and
    /// prints `manifest`.
    pub fn with_module(self, name: &str, manifest: &str) -> Self {
        self.with_module_script(
            name,
            &format!("cat >/dev/null\ncat <<'EOF'\n{manifest}\nEOF\n"),
        )
    }

    /// Add a module under `modules/<name>` whose `generate` entry point runs
    /// `body` with `/bin/sh`. `$DIR` is the module's directory.
    pub fn with_module_script(self, name: &str, body: &str) -> Self {
        let dir = self.ctx.root.path().join("modules").join(name);
        write_entry_point(&dir.join("generate"), body);
        self
    }

    /// Add a typed module at `<root>/<name>/generate`, e.g. `user/ssh`.
    pub fn with_typed_module(self, name: &str, manifest: &str) -> Self {
        let dir = self.ctx.root.path().join(name);
        write_entry_point(
            &dir.join("generate"),
            &format!("cat >/dev/null\ncat <<'EOF'\n{manifest}\nEOF\n"),
        );
        self
    }

    /// Finish building and return the configured context.
    pub fn build(self) -> IntegrationTestContext {
        self.ctx
    }
}

fn write_entry_point(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt as _;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create module dir");
    }
    let script = format!("#!/bin/sh\nDIR=$(dirname \"$0\")\n{body}");
    std::fs::write(path, script).expect("write module");
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod module");
}

/// Manifest with one inline file.
pub fn inline_file(path: &str, text: &str, mode: &str) -> String {
    format!(
        r#"{{"files": [{{"path": "{path}", "contents": {{"kind": "inline", "source": "{text}"}}, "mode": {mode}}}]}}"#
    )
}

/// Manifest with one append-only file.
pub fn append_file(path: &str, text: &str, mode: &str) -> String {
    format!(
        r#"{{"files": [{{"path": "{path}", "append": [{{"kind": "inline", "source": "{text}"}}], "mode": {mode}}}]}}"#
    )
}

/// Manifest with one inline `run_once` script.
pub fn inline_script(name: &str) -> String {
    format!(
        r#"{{"scripts": [{{"name": "{name}", "content": {{"kind": "inline", "source": "echo {name}"}}}}]}}"#
    )
}

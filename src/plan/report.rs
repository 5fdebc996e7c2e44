//! Human and machine readable summary of a finished build.
use std::fmt::Write as _;

use serde::Serialize;

use super::aggregate::GlobalPlan;
use crate::logging::Log;
use crate::warning::Warning;

/// Summary of a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Host the plan was built for.
    pub host: String,
    /// Modules that ran, in processing order.
    pub modules: Vec<String>,
    /// Number of planned files.
    pub file_count: usize,
    /// Number of planned scripts.
    pub script_count: usize,
    /// Planned file paths, sorted.
    pub files: Vec<String>,
    /// Planned script filenames, sorted.
    pub scripts: Vec<String>,
    /// Every warning, in the order it was raised.
    pub warnings: Vec<Warning>,
    /// SHA-256 of the plan.
    pub digest: String,
}

impl BuildReport {
    /// Summarize `plan`.
    #[must_use]
    pub fn new(host: &str, modules: Vec<String>, plan: &GlobalPlan, warnings: Vec<Warning>) -> Self {
        let files: Vec<String> = plan.files().keys().cloned().collect();
        let scripts: Vec<String> = plan.scripts().keys().cloned().collect();
        Self {
            host: host.to_string(),
            modules,
            file_count: files.len(),
            script_count: scripts.len(),
            files,
            scripts,
            warnings,
            digest: plan.digest(),
        }
    }

    /// Render the plain-text summary.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let modules = if self.modules.is_empty() {
            "(none)".to_string()
        } else {
            self.modules.join(", ")
        };
        let _ = writeln!(out, "Host: {}", self.host);
        let _ = writeln!(out, "Modules: {modules}");
        let _ = writeln!(out, "Files: {}", self.file_count);
        let _ = writeln!(out, "Scripts: {}", self.script_count);
        section(&mut out, "Planned files", self.files.iter());
        section(&mut out, "Planned scripts", self.scripts.iter());
        section(&mut out, "Warnings", self.warnings.iter());
        let _ = writeln!(out, "Digest: sha256:{}", self.digest);
        out
    }

    /// Emit the summary through `log` at info level.
    ///
    /// Warnings are part of the summary text; they were already logged at
    /// warn level when raised.
    pub fn log(&self, log: &dyn Log) {
        log.stage("Build summary");
        for line in self.render().lines() {
            log.info(line);
        }
    }
}

fn section<T: std::fmt::Display>(out: &mut String, title: &str, items: impl Iterator<Item = T>) {
    let _ = writeln!(out, "{title}:");
    let mut empty = true;
    for item in items {
        empty = false;
        let text = item.to_string();
        let mut lines = text.lines();
        if let Some(first) = lines.next() {
            let _ = writeln!(out, "  - {first}");
        }
        for line in lines {
            let _ = writeln!(out, "    {line}");
        }
    }
    if empty {
        let _ = writeln!(out, "  (none)");
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};

use super::CommandSetup;
use crate::cli::{BuildOpts, GlobalOpts, ReportFormat};
use crate::exec::{Executor, SystemExecutor};
use crate::logging::Log;
use crate::modules::{FsModuleResolver, ModePolicy};
use crate::pipeline::{BuildContext, BuildOptions};
use crate::plan::GlobalPlan;

/// Whether `opts` send machine-readable output to stdout.
#[must_use]
pub fn writes_stdout(opts: &BuildOpts) -> bool {
    opts.format == ReportFormat::Json || opts.plan.as_deref().is_some_and(is_stdout)
}

fn is_stdout(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Run the build command.
///
/// # Errors
///
/// Returns an error if setup fails, any module fails, or the plan cannot be
/// written. No plan is written unless every module succeeded.
pub fn run(global: &GlobalOpts, opts: &BuildOpts, log: &Arc<dyn Log>) -> Result<()> {
    if opts.format == ReportFormat::Json && opts.plan.as_deref().is_some_and(is_stdout) {
        anyhow::bail!("--plan - cannot be combined with --format json; write the plan to a file");
    }

    log.debug(&format!("dotfiles-modules {}", super::version::version()));

    let executor: Arc<dyn Executor> = Arc::new(SystemExecutor);
    let setup = CommandSetup::init(global, executor.as_ref(), log.as_ref())?;

    let ctx = BuildContext {
        resolver: Arc::new(FsModuleResolver::new(&setup.root)),
        root: setup.root.clone(),
        home: std::env::var_os("HOME").map(PathBuf::from),
        executor,
        log: Arc::clone(log),
        options: BuildOptions {
            policy: if opts.relax_modes {
                ModePolicy::Relax
            } else {
                ModePolicy::Restrict
            },
            parallel: opts.parallel,
        },
    };

    let outcome = ctx.build(&setup.hostname, &setup.inventory, &setup.resolution)?;

    if let Some(path) = &opts.plan {
        write_plan(path, &outcome.plan)?;
        if !is_stdout(path) {
            log.info(&format!("plan written to {}", path.display()));
        }
    }

    match opts.format {
        ReportFormat::Text => outcome.report.log(log.as_ref()),
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(&outcome.report)
                .context("serializing build report")?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Write `plan` as pretty JSON to `path`, or stdout for `-`.
///
/// # Errors
///
/// Returns an error if the plan cannot be serialized or written.
pub fn write_plan(path: &Path, plan: &GlobalPlan) -> Result<()> {
    let json = serde_json::to_string_pretty(plan).context("serializing plan")?;
    if is_stdout(path) {
        println!("{json}");
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, format!("{json}\n"))
        .with_context(|| format!("writing plan to {}", path.display()))
}

pub mod build;
pub mod config;
pub mod schema;
pub mod version;

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::cli::GlobalOpts;
use crate::config::{self as host_config, HOSTS_FILE, Inventory, Resolution};
use crate::exec::Executor;
use crate::logging::Log;

/// Environment variable naming the build root when `--root` is absent.
pub const ROOT_ENV: &str = "DOTFILES_MODULES_ROOT";

/// Shared state produced by the common command setup sequence.
///
/// Loads the inventory, picks the host, locates the build root and resolves
/// the effective configuration of every module, so that each command does
/// not have to repeat the boilerplate.
#[derive(Debug)]
pub struct CommandSetup {
    /// Canonical build root.
    pub root: PathBuf,
    /// Inventory forwarded to modules.
    pub inventory: Inventory,
    /// Host the configuration was resolved for.
    pub hostname: String,
    /// Host document that was read.
    pub hosts_file: PathBuf,
    /// Effective module configuration.
    pub resolution: Resolution,
}

impl CommandSetup {
    /// Load the inventory and resolve the host's module configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the inventory cannot be loaded, no hostname is
    /// known, the root cannot be resolved, or the host document is invalid.
    pub fn init(global: &GlobalOpts, executor: &dyn Executor, log: &dyn Log) -> Result<Self> {
        log.stage("Loading inventory");
        let inventory = Inventory::load(executor, global.inventory.as_deref())?;
        let hostname = match &global.hostname {
            Some(name) => name.clone(),
            None => inventory.require_hostname()?.to_string(),
        };
        log.info(&format!("host: {hostname}"));

        let root = resolve_root(global, &inventory)?;
        log.debug(&format!("root: {}", root.display()));
        let hosts_file = global
            .hosts
            .clone()
            .unwrap_or_else(|| root.join(HOSTS_FILE));

        log.stage("Resolving module configuration");
        log.debug(&format!("hosts file: {}", hosts_file.display()));
        let resolution = host_config::resolve_host(&hosts_file, &hostname)?;
        log.info(&format!(
            "{} module(s): {}",
            resolution.modules.len(),
            resolution.module_names().join(", ")
        ));

        Ok(Self {
            root,
            inventory,
            hostname,
            hosts_file,
            resolution,
        })
    }
}

/// Determine the build root.
///
/// Order: `--root`, [`ROOT_ENV`], the inventory's `chezmoi.sourceDir`, the
/// current directory. The result is canonicalized.
///
/// # Errors
///
/// Returns an error if the chosen directory does not exist.
pub fn resolve_root(global: &GlobalOpts, inventory: &Inventory) -> Result<PathBuf> {
    let candidate = if let Some(root) = &global.root {
        root.clone()
    } else if let Some(root) = std::env::var_os(ROOT_ENV).filter(|v| !v.is_empty()) {
        PathBuf::from(root)
    } else if let Some(dir) = inventory.source_dir() {
        dir
    } else {
        std::env::current_dir().context("reading current directory")?
    };

    dunce::canonicalize(&candidate)
        .with_context(|| format!("cannot resolve build root {}", candidate.display()))
}

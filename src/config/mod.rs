//! Host document, inventory, and per-module configuration resolution.
pub mod hosts;
pub mod inventory;
pub mod merge;

use std::path::Path;

use crate::error::ConfigError;

pub use hosts::HostsDocument;
pub use inventory::Inventory;
pub use merge::{ModuleConfig, Resolution};

/// Default host document file name, relative to the build root.
pub const HOSTS_FILE: &str = "hosts.yaml";

/// Load the host document and resolve the effective module configuration
/// for `hostname`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the document is missing or malformed, the
/// host is unknown, or a module's configuration is not a mapping.
pub fn resolve_host(hosts_file: &Path, hostname: &str) -> Result<Resolution, ConfigError> {
    let document = HostsDocument::load(hosts_file)?;
    let host = document.host_modules(hostname)?;
    merge::resolve_modules(&document.common, &host)
}

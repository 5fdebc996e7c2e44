//! Domain-specific error types for the module build engine.
//!
//! Internal modules return typed errors built with [`thiserror`]; command
//! handlers at the CLI boundary convert them to [`anyhow::Error`] via `?`.
//! Every variant here is fatal: the build stops at the first one and no
//! plan is produced.
//!
//! # Error hierarchy
//!
//! ```text
//! BuildError
//! ├── Config(ConfigError)            host document, inventory, host selection
//! ├── Module(ModuleError)            module resolution and execution
//! ├── Manifest(InvalidManifest)      module output failed validation
//! └── Aggregation(AggregationError)  file content or script name collisions
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for a build.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Malformed or missing host/config documents.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A module could not be located or failed while running.
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    /// A module returned output that is not a valid manifest.
    #[error("Manifest validation error: {0}")]
    Manifest(#[from] InvalidManifest),

    /// Two manifests collided while folding them into the plan.
    #[error("Aggregation conflict: {0}")]
    Aggregation(#[from] AggregationError),
}

/// Errors raised before any module runs.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The host document does not exist.
    #[error("hosts file not found at {}", .path.display())]
    HostsNotFound {
        /// Expected location of the host document.
        path: PathBuf,
    },

    /// The host document could not be read.
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        /// Path of the unreadable file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The host document is not valid YAML.
    #[error("failed to parse {}: {source}", .path.display())]
    InvalidYaml {
        /// Path of the document.
        path: PathBuf,
        /// Underlying parser error.
        source: serde_yaml::Error,
    },

    /// The host document is valid YAML but has the wrong shape.
    #[error("invalid hosts document: {0}")]
    InvalidStructure(String),

    /// The inventory document is malformed or lacks a hostname.
    #[error("invalid inventory: {0}")]
    InvalidInventory(String),

    /// The current host has no entry in the host document.
    #[error("host '{host}' not found in hosts document. Available hosts: {available}")]
    UnknownHost {
        /// Hostname that was looked up.
        host: String,
        /// Comma-separated list of known hosts, or `(none)`.
        available: String,
    },

    /// The host entry exists but is not a mapping of module configurations.
    #[error("host entry for '{0}' must be a mapping")]
    HostNotMapping(String),

    /// A module's effective configuration is not a mapping.
    #[error("module '{0}' config must be a mapping")]
    ModuleNotMapping(String),
}

/// Errors raised while locating or running a module.
#[derive(Error, Debug)]
pub enum ModuleError {
    /// The module name does not name a valid location.
    #[error("invalid module name '{name}': {reason}")]
    InvalidModuleName {
        /// Offending module name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No directory or file exists for the module.
    #[error("module '{name}' not found at {}", .path.display())]
    ModuleNotFound {
        /// Module name.
        name: String,
        /// Location that was searched.
        path: PathBuf,
    },

    /// The module exists but has no executable entry point.
    #[error("no executable entry point found for module '{name}' in {}", .path.display())]
    NoExecutableEntryPoint {
        /// Module name.
        name: String,
        /// Directory that was searched.
        path: PathBuf,
    },

    /// The module process could not be started or its streams failed.
    #[error("failed to run module '{module}': {reason}")]
    Spawn {
        /// Module name.
        module: String,
        /// Underlying failure.
        reason: String,
    },

    /// The module exited with a non-zero status.
    #[error("module '{module}' failed with exit code {}: {stderr}", .code.map_or_else(|| "(signal)".to_string(), |c| c.to_string()))]
    ExecutionFailed {
        /// Module name.
        module: String,
        /// Exit code, or `None` when terminated by a signal.
        code: Option<i32>,
        /// Captured diagnostics from the error stream.
        stderr: String,
    },

    /// The module exited successfully but wrote nothing to stdout.
    #[error("module '{0}' produced no output")]
    NoOutput(String),

    /// The module's stdout is not valid UTF-8.
    #[error("module '{0}' wrote output that is not valid UTF-8")]
    NonUtf8Output(String),
}

/// A module's output failed to decode or violated a manifest invariant.
#[derive(Error, Debug)]
#[error("invalid manifest from module '{module}': {source}")]
pub struct InvalidManifest {
    /// Module that produced the output.
    pub module: String,
    /// Structural error.
    pub source: ManifestError,
}

/// Structural problems in a module manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The output is not JSON matching the manifest schema.
    #[error("{0}")]
    Parse(#[from] serde_json::Error),

    /// A file declares neither `contents` nor `append`.
    #[error("file '{path}': either contents or append must be specified")]
    MissingContent {
        /// File path as declared by the module.
        path: String,
    },

    /// A permission triplet is outside `4..=7` or extra bits are set.
    #[error(
        "file '{path}': invalid mode {mode:#o}, each of user/group/other bits must be between 4 and 7"
    )]
    InvalidMode {
        /// File path as declared by the module.
        path: String,
        /// Offending mode.
        mode: u32,
    },

    /// A file path is empty.
    #[error("file path must not be empty")]
    EmptyPath,

    /// An inline resource is blank after trimming.
    #[error("{location}: inline source must not be empty")]
    EmptyInline {
        /// Where the resource was declared.
        location: String,
    },

    /// A remote resource does not carry a well-formed URI.
    #[error("{location}: invalid remote source '{uri}': {reason}")]
    InvalidUri {
        /// Where the resource was declared.
        location: String,
        /// The rejected URI.
        uri: String,
        /// Parser message.
        reason: String,
    },

    /// A local resource is absolute or escapes its root.
    #[error("{location}: local source '{}' must be a relative path inside the module", .path.display())]
    LocalOutsideRoot {
        /// Where the resource was declared.
        location: String,
        /// Rejected path.
        path: PathBuf,
    },

    /// A script name is blank after trimming.
    #[error("script name must not be empty")]
    EmptyScriptName,

    /// A script name contains a path separator.
    #[error("script name '{0}' must not contain path separators")]
    ScriptNameSeparator(String),
}

/// Collisions detected while folding manifests into the global plan.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AggregationError {
    /// Two modules both provide primary contents for the same path.
    #[error("duplicate file path '{path}' with contents from module '{module}' (contents already provided by '{owner}')")]
    FileContentConflict {
        /// Normalised relative path.
        path: String,
        /// Module that first provided contents.
        owner: String,
        /// Module that tried to provide contents again.
        module: String,
    },

    /// Two scripts derive the same filename.
    #[error("duplicate script name '{name}' from module '{module}' (already provided by '{owner}')")]
    DuplicateScript {
        /// Derived script filename.
        name: String,
        /// Module that registered the script first.
        owner: String,
        /// Module that tried to register it again.
        module: String,
    },
}

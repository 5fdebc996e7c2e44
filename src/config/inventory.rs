//! Machine inventory supplied by the external `chezmoi data` command.
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde_json::Value;

use crate::error::ConfigError;
use crate::exec::Executor;

/// Program queried for the inventory document.
pub const INVENTORY_PROGRAM: &str = "chezmoi";

/// Arguments passed to [`INVENTORY_PROGRAM`].
pub const INVENTORY_ARGS: &[&str] = &["data", "--format=json"];

/// Opaque inventory document describing the target machine.
///
/// Only the hostname and source directory are interpreted; the whole
/// document is forwarded to every module unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Inventory {
    document: Value,
}

impl Inventory {
    /// Parse an inventory JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidInventory`] if the text is not a JSON object.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let document: Value = serde_json::from_str(text.trim())
            .map_err(|e| ConfigError::InvalidInventory(format!("invalid JSON: {e}")))?;
        Self::from_value(document)
    }

    /// Wrap an already parsed inventory document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidInventory`] if the value is not an object.
    pub fn from_value(document: Value) -> Result<Self, ConfigError> {
        if !document.is_object() {
            return Err(ConfigError::InvalidInventory(
                "inventory must be a JSON object".to_string(),
            ));
        }
        Ok(Self { document })
    }

    /// Load the inventory from `file`, or from `chezmoi data` when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the command is missing or
    /// fails, or the output is not a JSON object.
    pub fn load(executor: &dyn Executor, file: Option<&Path>) -> Result<Self> {
        let text = if let Some(path) = file {
            std::fs::read_to_string(path)
                .with_context(|| format!("reading inventory {}", path.display()))?
        } else {
            if !executor.which(INVENTORY_PROGRAM) {
                return Err(ConfigError::InvalidInventory(format!(
                    "'{INVENTORY_PROGRAM}' not found on PATH; pass --inventory <FILE>"
                ))
                .into());
            }
            executor
                .run(INVENTORY_PROGRAM, INVENTORY_ARGS)
                .context("fetching inventory")?
                .stdout
        };
        Ok(Self::from_json(&text)?)
    }

    /// The full document, as forwarded to modules.
    #[must_use]
    pub const fn document(&self) -> &Value {
        &self.document
    }

    /// Hostname of the target machine: `chezmoi.hostname`, falling back to a
    /// top-level `hostname`. Empty strings count as missing.
    #[must_use]
    pub fn hostname(&self) -> Option<&str> {
        self.document
            .pointer("/chezmoi/hostname")
            .or_else(|| self.document.get("hostname"))
            .and_then(Value::as_str)
            .filter(|h| !h.is_empty())
    }

    /// Source directory declared by the inventory (`chezmoi.sourceDir`).
    #[must_use]
    pub fn source_dir(&self) -> Option<PathBuf> {
        self.document
            .pointer("/chezmoi/sourceDir")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }

    /// Hostname, or an error naming the missing field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidInventory`] if no hostname is present.
    pub fn require_hostname(&self) -> Result<&str, ConfigError> {
        self.hostname()
            .ok_or_else(|| ConfigError::InvalidInventory("no hostname found".to_string()))
    }
}

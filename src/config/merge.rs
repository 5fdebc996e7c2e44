//! Common/host configuration merge with null-as-delete semantics.
//!
//! Per key, the host value decides:
//!
//! - `null` removes the key from the effective configuration;
//! - a mapping merges recursively into a common mapping;
//! - anything else (scalar or sequence) replaces the common value.
//!
//! At module level a host scalar is a placeholder meaning "use common as-is",
//! and a `null` module is dropped with a warning instead of being invoked.
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::warning::Warning;

/// Effective configuration for a single module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleConfig {
    /// Module name as written in the host document.
    pub name: String,
    /// Configuration passed to the module as `data`.
    pub config: Map<String, Value>,
}

/// Outcome of resolving every module for one host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Modules to run, in canonical processing order.
    pub modules: Vec<ModuleConfig>,
    /// Non-fatal conditions (disabled modules).
    pub warnings: Vec<Warning>,
}

impl Resolution {
    /// Names of the modules to run, in order.
    #[must_use]
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }
}

/// Merge `overlay` onto `base`.
///
/// Two mappings merge key by key; any other overlay value replaces `base`.
/// `null` values inside overlay mappings delete the matching key and are
/// never carried into the result.
#[must_use]
pub fn merge_value(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => Value::Object(merge_maps(base, overlay)),
        (_, overlay) => strip_nulls(overlay),
    }
}

/// Merge two mappings, keeping `base` key order and appending new keys.
#[must_use]
pub fn merge_maps(base: &Map<String, Value>, overlay: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in base {
        match overlay.get(key) {
            None => {
                out.insert(key.clone(), value.clone());
            }
            Some(Value::Null) => {}
            Some(over) => {
                out.insert(key.clone(), merge_value(value, over));
            }
        }
    }
    for (key, value) in overlay {
        if !base.contains_key(key) && !value.is_null() {
            out.insert(key.clone(), strip_nulls(value));
        }
    }
    out
}

/// Remove `null`-valued keys from mappings, recursively. Sequences are kept
/// verbatim.
fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

const fn is_placeholder(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

/// Resolve the effective configuration of every module for one host.
///
/// Processing order is the host mapping's order, followed by modules only
/// present in `common` (in `common` order).
///
/// # Errors
///
/// Returns [`ConfigError::ModuleNotMapping`] if a module's effective
/// configuration is not a mapping.
pub fn resolve_modules(
    common: &Map<String, Value>,
    host: &Map<String, Value>,
) -> Result<Resolution, ConfigError> {
    let mut warnings = Vec::new();
    let mut entries: Vec<(String, Value)> =
        host.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

    for (name, global) in common {
        if global.is_null() {
            warnings.push(Warning::CommonModuleDisabled {
                module: name.clone(),
            });
            continue;
        }

        match entries.iter_mut().find(|(n, _)| n == name) {
            None => entries.push((name.clone(), global.clone())),
            Some((_, slot)) => {
                if slot.is_null() {
                    // Disabled for this host; reported below.
                } else if is_placeholder(slot) {
                    *slot = global.clone();
                } else {
                    *slot = merge_value(global, slot);
                }
            }
        }
    }

    let mut modules = Vec::with_capacity(entries.len());
    for (name, value) in entries {
        match value {
            Value::Null => warnings.push(Warning::ModuleDisabled { module: name }),
            Value::Object(config) => modules.push(ModuleConfig { name, config }),
            _ => return Err(ConfigError::ModuleNotMapping(name)),
        }
    }

    Ok(Resolution { modules, warnings })
}

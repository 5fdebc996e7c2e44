//! Host configuration document (`hosts.yaml`) loading.
//!
//! ```yaml
//! hosts:
//!   common:
//!     git: { name: "A", email: "a@x.com" }
//!   laptop:
//!     git: ""          # keep common as-is
//!     ssh: null        # disabled on this host
//!     fish: { theme: dark }
//! ```
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Reserved host key holding configuration shared by every host.
pub const COMMON_KEY: &str = "common";

/// YAML tag that splices nested sequences into their parent sequence.
const FLATTEN_TAG: &str = "flatten";

/// Parsed host document, with mapping order preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostsDocument {
    /// Module configuration shared by all hosts.
    pub common: Map<String, Value>,
    /// Per-host module configuration, keyed by hostname.
    pub hosts: Map<String, Value>,
}

impl HostsDocument {
    /// Read and parse the host document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HostsNotFound`] if the file is missing, and
    /// a parse or structure error if its content is malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::HostsNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::InvalidYaml {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_yaml(yaml)
    }

    /// Build a document from an already parsed YAML value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidStructure`] if there is no top-level
    /// `hosts` mapping, if `common` is not a mapping, or if a key cannot be
    /// represented as a string.
    pub fn from_yaml(yaml: serde_yaml::Value) -> Result<Self, ConfigError> {
        let root = yaml_to_json(yaml).map_err(ConfigError::InvalidStructure)?;
        let Value::Object(mut root) = root else {
            return Err(missing_hosts());
        };
        let Some(Value::Object(hosts)) = root.remove("hosts") else {
            return Err(missing_hosts());
        };

        let mut common = Map::new();
        let mut rest = Map::new();
        for (name, value) in hosts {
            if name == COMMON_KEY {
                common = match value {
                    Value::Object(map) => map,
                    Value::Null => Map::new(),
                    _ => {
                        return Err(ConfigError::InvalidStructure(
                            "'common' must be a mapping of module configs".to_string(),
                        ));
                    }
                };
            } else {
                rest.insert(name, value);
            }
        }

        Ok(Self {
            common,
            hosts: rest,
        })
    }

    /// Names of all hosts (excluding `common`), sorted.
    #[must_use]
    pub fn host_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.hosts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Module configuration mapping for `host`.
    ///
    /// A host entry that is explicitly `null` has no overrides and yields an
    /// empty mapping.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownHost`] if the host has no entry and
    /// [`ConfigError::HostNotMapping`] if its entry is not a mapping.
    pub fn host_modules(&self, host: &str) -> Result<Map<String, Value>, ConfigError> {
        match self.hosts.get(host) {
            None => {
                let names = self.host_names();
                let available = if names.is_empty() {
                    "(none)".to_string()
                } else {
                    names.join(", ")
                };
                Err(ConfigError::UnknownHost {
                    host: host.to_string(),
                    available,
                })
            }
            Some(Value::Null) => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(ConfigError::HostNotMapping(host.to_string())),
        }
    }
}

fn missing_hosts() -> ConfigError {
    ConfigError::InvalidStructure(
        "hosts document must have a 'hosts' key, mapping the hosts to module configs"
            .to_string(),
    )
}

/// Convert a YAML value into the engine's JSON value model, resolving tags.
///
/// `!flatten` on a sequence splices any nested sequences one level deep;
/// every other tag is dropped and its inner value kept.
fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, String> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => yaml_number(&n)?,
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                map.insert(yaml_key(key)?, yaml_to_json(value)?);
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => {
            let serde_yaml::value::TaggedValue { tag, value } = *tagged;
            let inner = yaml_to_json(value)?;
            if tag.to_string().trim_start_matches('!') == FLATTEN_TAG {
                flatten(inner)?
            } else {
                inner
            }
        }
    })
}

fn flatten(value: Value) -> Result<Value, String> {
    let Value::Array(items) = value else {
        return Err("!flatten must be applied to a sequence".to_string());
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Array(nested) => out.extend(nested),
            other => out.push(other),
        }
    }
    Ok(Value::Array(out))
}

fn yaml_number(n: &serde_yaml::Number) -> Result<Value, String> {
    if let Some(i) = n.as_i64() {
        return Ok(Value::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(Value::from(u));
    }
    n.as_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("unsupported number: {n}"))
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, String> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Number(n) => Ok(n.to_string()),
        other => Err(format!("mapping keys must be scalars, found {other:?}")),
    }
}

use anyhow::{Context as _, Result};
use serde::Serialize;
use serde_json::{Map, Value};

use super::CommandSetup;
use crate::cli::GlobalOpts;
use crate::config::Resolution;
use crate::exec::SystemExecutor;
use crate::logging::Log;
use crate::warning::Warning;

/// Effective configuration as printed by `config`.
#[derive(Debug, Serialize)]
pub struct EffectiveConfig<'a> {
    /// Host the configuration was resolved for.
    pub host: &'a str,
    /// Module name to effective configuration, in processing order.
    pub modules: Map<String, Value>,
    /// Modules dropped because they are set to `null`.
    pub warnings: &'a [Warning],
}

impl<'a> EffectiveConfig<'a> {
    /// View of `resolution` for `host`.
    #[must_use]
    pub fn new(host: &'a str, resolution: &'a Resolution) -> Self {
        Self {
            host,
            modules: resolution
                .modules
                .iter()
                .map(|m| (m.name.clone(), Value::Object(m.config.clone())))
                .collect(),
            warnings: &resolution.warnings,
        }
    }
}

/// Run the config command: print the merged per-module configuration.
///
/// # Errors
///
/// Returns an error if setup fails.
pub fn run(global: &GlobalOpts, log: &dyn Log) -> Result<()> {
    let setup = CommandSetup::init(global, &SystemExecutor, log)?;
    for warning in &setup.resolution.warnings {
        log.warn(&warning.to_string());
    }
    let view = EffectiveConfig::new(&setup.hostname, &setup.resolution);
    let json = serde_json::to_string_pretty(&view).context("serializing configuration")?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::merge::resolve_modules;
    use serde_json::json;

    #[test]
    fn view_preserves_processing_order() {
        let common = json!({"a": {"x": 1}, "b": {}});
        let host = json!({"b": {"y": 2}, "c": {}});
        let res = resolve_modules(common.as_object().unwrap(), host.as_object().unwrap()).unwrap();
        let view = serde_json::to_value(EffectiveConfig::new("laptop", &res)).unwrap();
        let keys: Vec<&String> = view["modules"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["b", "c", "a"]);
        assert_eq!(view["modules"]["b"], json!({"y": 2}));
        assert_eq!(view["host"], "laptop");
    }
}

//! Non-fatal conditions collected during a build and surfaced in the report.
use std::fmt;

use serde::Serialize;

/// A condition that does not stop the build but is reported at the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A module is mapped to `null` in the common configuration.
    CommonModuleDisabled {
        /// Module name.
        module: String,
    },
    /// A module is mapped to `null` for the current host and will not run.
    ModuleDisabled {
        /// Module name.
        module: String,
    },
    /// A file path resolves outside the build root and was not planned.
    PathOutsideRoot {
        /// Module that declared the file.
        module: String,
        /// Path as declared.
        path: String,
    },
    /// A module succeeded but wrote diagnostics to its error stream.
    ModuleStderr {
        /// Module name.
        module: String,
        /// Trimmed stderr text.
        stderr: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommonModuleDisabled { module } => {
                write!(f, "common module '{module}' is set to null")
            }
            Self::ModuleDisabled { module } => {
                write!(f, "module '{module}' is set to null; skipping")
            }
            Self::PathOutsideRoot { module, path } => write!(
                f,
                "skipping path '{path}' from module '{module}' (outside the build root)"
            ),
            Self::ModuleStderr { module, stderr } => {
                write!(f, "module '{module}' produced stderr output:\n{stderr}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_module_disabled() {
        let w = Warning::ModuleDisabled {
            module: "ssh".to_string(),
        };
        assert_eq!(w.to_string(), "module 'ssh' is set to null; skipping");
    }

    #[test]
    fn display_path_outside_root() {
        let w = Warning::PathOutsideRoot {
            module: "git".to_string(),
            path: "/etc/gitconfig".to_string(),
        };
        assert!(w.to_string().contains("'/etc/gitconfig'"));
        assert!(w.to_string().contains("'git'"));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let w = Warning::ModuleStderr {
            module: "fish".to_string(),
            stderr: "deprecated option".to_string(),
        };
        let json = serde_json::to_value(&w).unwrap_or_default();
        assert_eq!(json["kind"], "module_stderr");
        assert_eq!(json["module"], "fish");
    }
}

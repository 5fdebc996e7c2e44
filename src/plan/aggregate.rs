//! Fold validated manifests into one [`GlobalPlan`].
//!
//! Files are keyed by their path normalized relative to the build root.
//! Contributions to the same path combine: at most one module may provide
//! `contents`, `append` fragments concatenate in processing order, and modes
//! merge under the active [`ModePolicy`]. Script filenames must be unique.
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use sha2::{Digest as _, Sha256};

use crate::error::AggregationError;
use crate::modules::{File, FileMode, Manifest, ModePolicy, Resource, Script, ScriptType};
use crate::warning::Warning;

/// A file after every contribution has been folded in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedFile {
    /// Primary body, if any module provided one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<Resource>,
    /// Module that provided `contents`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Appended fragments, in processing order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub append: Vec<Resource>,
    /// Merged permission bits.
    pub mode: FileMode,
    /// Every module that contributed, in processing order.
    pub modules: Vec<String>,
}

/// A script registered in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedScript {
    /// Script name as declared.
    pub name: String,
    /// Execution policy.
    #[serde(rename = "type")]
    pub kind: ScriptType,
    /// Script body.
    pub content: Resource,
    /// Module that declared the script.
    pub module: String,
}

/// The complete, immutable build output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GlobalPlan {
    files: BTreeMap<String, PlannedFile>,
    scripts: BTreeMap<String, PlannedScript>,
}

impl GlobalPlan {
    /// Planned files by normalized relative path.
    #[must_use]
    pub const fn files(&self) -> &BTreeMap<String, PlannedFile> {
        &self.files
    }

    /// Planned scripts by derived filename.
    #[must_use]
    pub const fn scripts(&self) -> &BTreeMap<String, PlannedScript> {
        &self.scripts
    }

    /// Hex-encoded SHA-256 of the plan's canonical JSON form.
    ///
    /// Both maps are ordered, so identical inputs give identical digests.
    #[must_use]
    pub fn digest(&self) -> String {
        use std::fmt::Write as _;

        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let hash = Sha256::digest(&bytes);
        let mut hex = String::with_capacity(hash.len() * 2);
        for b in hash {
            let _ = write!(hex, "{b:02x}");
        }
        hex
    }
}

/// Accumulates manifests, in processing order, into a [`GlobalPlan`].
#[derive(Debug)]
pub struct Aggregator {
    root: PathBuf,
    home: Option<PathBuf>,
    policy: ModePolicy,
    files: BTreeMap<String, PlannedFile>,
    scripts: BTreeMap<String, PlannedScript>,
    warnings: Vec<Warning>,
}

impl Aggregator {
    /// Aggregator for paths under `root`; `~` expands to `$HOME`.
    #[must_use]
    pub fn new(root: &Path, policy: ModePolicy) -> Self {
        Self {
            root: root.to_path_buf(),
            home: std::env::var_os("HOME").map(PathBuf::from),
            policy,
            files: BTreeMap::new(),
            scripts: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Override the directory `~` expands to.
    #[must_use]
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// Fold one module's manifest into the plan.
    ///
    /// Paths outside the build root are skipped with a warning, collected
    /// until [`take_warnings`](Self::take_warnings).
    ///
    /// # Errors
    ///
    /// Returns [`AggregationError::FileContentConflict`] if a second module
    /// provides contents for a path, or [`AggregationError::DuplicateScript`]
    /// if a script filename is already taken.
    pub fn add(&mut self, module: &str, manifest: Manifest) -> Result<(), AggregationError> {
        for file in manifest.files {
            self.add_file(module, file)?;
        }
        for script in manifest.scripts {
            self.add_script(module, script)?;
        }
        Ok(())
    }

    fn add_file(&mut self, module: &str, file: File) -> Result<(), AggregationError> {
        let Some(key) = normalize_path(&self.root, self.home.as_deref(), &file.path) else {
            self.warnings.push(Warning::PathOutsideRoot {
                module: module.to_string(),
                path: file.path.display().to_string(),
            });
            return Ok(());
        };

        match self.files.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(PlannedFile {
                    owner: file.contents.is_some().then(|| module.to_string()),
                    contents: file.contents,
                    append: file.append,
                    mode: file.mode,
                    modules: vec![module.to_string()],
                });
            }
            Entry::Occupied(mut slot) => {
                let path = slot.key().clone();
                let planned = slot.get_mut();
                if let Some(contents) = file.contents {
                    if let Some(owner) = &planned.owner {
                        return Err(AggregationError::FileContentConflict {
                            path,
                            owner: owner.clone(),
                            module: module.to_string(),
                        });
                    }
                    planned.contents = Some(contents);
                    planned.owner = Some(module.to_string());
                }
                planned.append.extend(file.append);
                planned.mode = self.policy.merge(planned.mode, file.mode);
                if planned.modules.last().is_none_or(|m| m != module) {
                    planned.modules.push(module.to_string());
                }
            }
        }
        Ok(())
    }

    fn add_script(&mut self, module: &str, script: Script) -> Result<(), AggregationError> {
        match self.scripts.entry(script.filename()) {
            Entry::Occupied(slot) => Err(AggregationError::DuplicateScript {
                name: slot.key().clone(),
                owner: slot.get().module.clone(),
                module: module.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(PlannedScript {
                    name: script.name,
                    kind: script.kind,
                    content: script.content,
                    module: module.to_string(),
                });
                Ok(())
            }
        }
    }

    /// Hand over the warnings raised since the last call.
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    /// Freeze the plan.
    #[must_use]
    pub fn finish(self) -> GlobalPlan {
        GlobalPlan {
            files: self.files,
            scripts: self.scripts,
        }
    }
}

/// Normalize `path` to a `/`-separated path relative to `root`.
///
/// A leading `~` expands to `home`, relative paths are joined to `root`, and
/// `.`/`..` are resolved lexically. Returns `None` when the result is not
/// strictly inside `root`, or when the path starts with `~` and no home
/// directory is known.
#[must_use]
pub fn normalize_path(root: &Path, home: Option<&Path>, path: &Path) -> Option<String> {
    let expanded = match (path.strip_prefix("~"), home) {
        (Ok(rest), Some(home)) => home.join(rest),
        (Ok(_), None) => return None,
        (Err(_), _) => path.to_path_buf(),
    };
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        root.join(expanded)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }

    let rel = normalized.strip_prefix(root).ok()?;
    let parts: Vec<&str> = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

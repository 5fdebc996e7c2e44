//! Manifest schema: the files and scripts a module asks to materialize.
//!
//! Decoding is a typed serde step (tagged [`Resource`] union, unknown fields
//! rejected). [`Manifest::validate`] then re-checks the invariants serde
//! cannot express and reports them as [`ManifestError`]s.
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr as _;

use serde::{Deserialize, Deserializer, Serialize};

use super::mode::FileMode;
use crate::error::ManifestError;

/// Where the bytes of a file or script come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Resource {
    /// Fetched from a URI by the materializer.
    Remote(RemoteSource),
    /// Literal text.
    Inline(InlineSource),
    /// A path relative to the module's own directory.
    Local(LocalSource),
}

/// A remote resource locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteSource {
    /// Absolute URI with a scheme and host.
    pub source: String,
    /// Extra request headers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<BTreeMap<String, String>>,
}

/// Literal text, trimmed on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InlineSource {
    /// The text.
    #[serde(deserialize_with = "trimmed")]
    pub source: String,
}

/// A file shipped alongside the module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalSource {
    /// Relative path that must stay inside the module's root.
    pub source: PathBuf,
}

impl Resource {
    /// Literal text resource.
    #[must_use]
    pub fn inline(text: impl Into<String>) -> Self {
        Self::Inline(InlineSource {
            source: text.into().trim().to_string(),
        })
    }

    /// Remote resource without headers.
    #[must_use]
    pub fn remote(uri: impl Into<String>) -> Self {
        Self::Remote(RemoteSource {
            source: uri.into(),
            headers: Vec::new(),
        })
    }

    /// Local resource.
    #[must_use]
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local(LocalSource {
            source: path.into(),
        })
    }

    /// Check the per-variant invariants; `location` names the resource in errors.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::EmptyInline`], [`ManifestError::InvalidUri`]
    /// or [`ManifestError::LocalOutsideRoot`].
    pub fn validate(&self, location: &str) -> Result<(), ManifestError> {
        match self {
            Self::Inline(inline) => {
                if inline.source.trim().is_empty() {
                    return Err(ManifestError::EmptyInline {
                        location: location.to_string(),
                    });
                }
            }
            Self::Remote(remote) => validate_uri(&remote.source).map_err(|reason| {
                ManifestError::InvalidUri {
                    location: location.to_string(),
                    uri: remote.source.clone(),
                    reason,
                }
            })?,
            Self::Local(local) => {
                if !stays_inside(&local.source) {
                    return Err(ManifestError::LocalOutsideRoot {
                        location: location.to_string(),
                        path: local.source.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn validate_uri(source: &str) -> Result<(), String> {
    let uri = ureq::http::Uri::from_str(source.trim()).map_err(|e| e.to_string())?;
    if uri.scheme().is_none() {
        return Err("missing scheme".to_string());
    }
    if uri.host().is_none_or(str::is_empty) {
        return Err("missing host".to_string());
    }
    Ok(())
}

/// Whether `path` is non-empty, relative, and never climbs above its root.
fn stays_inside(path: &Path) -> bool {
    let mut depth = 0usize;
    let mut seen = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => {
                depth += 1;
                seen = true;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                let Some(d) = depth.checked_sub(1) else {
                    return false;
                };
                depth = d;
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    seen && depth > 0
}

fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let s = String::deserialize(deserializer)?;
    Ok(s.trim().to_string())
}

/// A file the module wants present in the target tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct File {
    /// Target path, relative to the destination (may start with `~/`).
    pub path: PathBuf,
    /// Primary body; replaces any previous content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<Resource>,
    /// Fragments appended after `contents`, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub append: Vec<Resource>,
    /// Permission bits.
    #[serde(default)]
    pub mode: FileMode,
}

impl File {
    /// Check the file's invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let path = self.path.display().to_string();
        if path.trim().is_empty() {
            return Err(ManifestError::EmptyPath);
        }
        if self.contents.is_none() && self.append.is_empty() {
            return Err(ManifestError::MissingContent { path });
        }
        if !self.mode.is_valid() {
            return Err(ManifestError::InvalidMode {
                path,
                mode: self.mode.bits(),
            });
        }
        if let Some(contents) = &self.contents {
            contents.validate(&format!("file '{path}' contents"))?;
        }
        for (i, fragment) in self.append.iter().enumerate() {
            fragment.validate(&format!("file '{path}' append[{i}]"))?;
        }
        Ok(())
    }
}

/// When the materializer runs a script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptType {
    /// Every apply.
    Run,
    /// Once per machine.
    #[default]
    RunOnce,
    /// Whenever the script body changes.
    RunOnchange,
    /// Before files are written.
    RunBefore,
    /// After files are written.
    RunAfter,
}

impl ScriptType {
    /// The wire name, e.g. `run_once`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::RunOnce => "run_once",
            Self::RunOnchange => "run_onchange",
            Self::RunBefore => "run_before",
            Self::RunAfter => "run_after",
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A script the module wants the materializer to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Script name, trimmed on decode.
    #[serde(deserialize_with = "trimmed")]
    pub name: String,
    /// Execution policy.
    #[serde(rename = "type", default)]
    pub kind: ScriptType,
    /// Script body.
    pub content: Resource,
}

impl Script {
    /// Filename identifying the script in the plan, e.g. `run_once_setup.sh`.
    #[must_use]
    pub fn filename(&self) -> String {
        let prefix = self.kind.as_str();
        let prefix = prefix.strip_suffix('_').unwrap_or(prefix);
        format!("{prefix}_{}.sh", self.name)
    }

    /// Check the script's invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.name.trim().is_empty() {
            return Err(ManifestError::EmptyScriptName);
        }
        if self.name.contains(['/', '\\']) {
            return Err(ManifestError::ScriptNameSeparator(self.name.clone()));
        }
        self.content
            .validate(&format!("script '{}' content", self.name))
    }
}

/// A module's complete output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Declared files.
    #[serde(default)]
    pub files: Vec<File>,
    /// Declared scripts.
    #[serde(default)]
    pub scripts: Vec<Script>,
}

impl Manifest {
    /// Decode and validate a manifest from a module's stdout.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] for malformed JSON or schema
    /// violations serde detects, and the matching variant for everything
    /// [`validate`](Self::validate) rejects.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let manifest: Self = serde_json::from_str(text.trim())?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Re-check every invariant of the decoded manifest.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ManifestError> {
        for file in &self.files {
            file.validate()?;
        }
        for script in &self.scripts {
            script.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;

    #[test]
    fn parses_inline_file() {
        let m = Manifest::parse(
            r#"{"files": [{"path": ".gitconfig", "contents": {"kind": "inline", "source": "  [user]\n"}}]}"#,
        )
        .unwrap();
        assert_eq!(m.files.len(), 1);
        assert_eq!(m.files[0].contents, Some(Resource::inline("[user]")));
        assert_eq!(m.files[0].mode, FileMode::DEFAULT);
        assert!(m.scripts.is_empty());
    }

    #[test]
    fn empty_object_is_empty_manifest() {
        assert_eq!(Manifest::parse("{}").unwrap(), Manifest::default());
    }

    #[test]
    fn rejects_unknown_top_level_field() {
        let err = Manifest::parse(r#"{"files": [], "extra": 1}"#).unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn rejects_unknown_resource_kind() {
        let err = Manifest::parse(
            r#"{"files": [{"path": "a", "contents": {"kind": "ftp", "source": "x"}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn rejects_unknown_resource_field() {
        let err = Manifest::parse(
            r#"{"files": [{"path": "a", "contents": {"kind": "inline", "source": "x", "compression": "gz"}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn rejects_file_without_content() {
        let err = Manifest::parse(r#"{"files": [{"path": "a"}]}"#).unwrap_err();
        assert!(matches!(err, ManifestError::MissingContent { .. }));
    }

    #[test]
    fn append_only_file_is_valid() {
        let m = Manifest::parse(
            r#"{"files": [{"path": "a", "append": [{"kind": "inline", "source": "x"}], "mode": "0654"}]}"#,
        )
        .unwrap();
        assert_eq!(m.files[0].mode.bits(), 0o654);
    }

    #[test]
    fn rejects_mode_without_other_read() {
        let err = Manifest::parse(
            r#"{"files": [{"path": "a", "append": [{"kind": "inline", "source": "x"}], "mode": "0640"}]}"#,
        )
        .unwrap_err();
        assert!(
            matches!(err, ManifestError::InvalidMode { mode, .. } if mode == 0o640),
            "{err}"
        );
    }

    #[test]
    fn rejects_out_of_range_mode() {
        let err = Manifest::parse(
            r#"{"files": [{"path": "a", "contents": {"kind": "inline", "source": "x"}, "mode": 384}]}"#,
        )
        .unwrap_err();
        assert!(
            matches!(err, ManifestError::InvalidMode { mode, .. } if mode == 0o600),
            "{err}"
        );
    }

    #[test]
    fn rejects_blank_inline() {
        let err = Manifest::parse(
            r#"{"files": [{"path": "a", "contents": {"kind": "inline", "source": "   "}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::EmptyInline { .. }));
    }

    #[test]
    fn remote_requires_well_formed_uri() {
        assert!(Resource::remote("https://example.com/a.conf").validate("x").is_ok());
        assert!(Resource::remote("not a uri").validate("x").is_err());
        assert!(Resource::remote("/just/a/path").validate("x").is_err());
    }

    #[test]
    fn remote_headers_decode() {
        let m = Manifest::parse(
            r#"{"files": [{"path": "a", "contents": {"kind": "remote", "source": "https://h/x", "headers": [{"Authorization": "token"}]}}]}"#,
        )
        .unwrap();
        let Some(Resource::Remote(remote)) = &m.files[0].contents else {
            panic!("expected remote resource");
        };
        assert_eq!(remote.headers[0]["Authorization"], "token");
    }

    #[test]
    fn local_must_stay_inside_root() {
        assert!(Resource::local("templates/a.conf").validate("x").is_ok());
        assert!(Resource::local("./a/../b").validate("x").is_ok());
        assert!(Resource::local("../escape").validate("x").is_err());
        assert!(Resource::local("a/../../b").validate("x").is_err());
        assert!(Resource::local("/etc/passwd").validate("x").is_err());
        assert!(Resource::local("").validate("x").is_err());
    }

    #[test]
    fn script_defaults_to_run_once() {
        let m = Manifest::parse(
            r#"{"scripts": [{"name": " setup ", "content": {"kind": "inline", "source": "echo hi"}}]}"#,
        )
        .unwrap();
        assert_eq!(m.scripts[0].kind, ScriptType::RunOnce);
        assert_eq!(m.scripts[0].name, "setup");
    }

    #[test]
    fn script_filename_convention() {
        let script = |kind| Script {
            name: "setup".to_string(),
            kind,
            content: Resource::inline("true"),
        };
        assert_eq!(script(ScriptType::RunOnce).filename(), "run_once_setup.sh");
        assert_eq!(script(ScriptType::Run).filename(), "run_setup.sh");
        assert_eq!(
            script(ScriptType::RunOnchange).filename(),
            "run_onchange_setup.sh"
        );
        assert_eq!(script(ScriptType::RunAfter).filename(), "run_after_setup.sh");
    }

    #[test]
    fn rejects_unknown_script_type() {
        let err = Manifest::parse(
            r#"{"scripts": [{"name": "s", "type": "run_twice", "content": {"kind": "inline", "source": "x"}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn rejects_blank_script_name() {
        let err = Manifest::parse(
            r#"{"scripts": [{"name": "  ", "content": {"kind": "inline", "source": "x"}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::EmptyScriptName));
    }

    #[test]
    fn rejects_script_name_with_separator() {
        let err = Manifest::parse(
            r#"{"scripts": [{"name": "a/b", "content": {"kind": "inline", "source": "x"}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::ScriptNameSeparator(_)));
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            Manifest::parse("files: []"),
            Err(ManifestError::Parse(_))
        ));
    }
}

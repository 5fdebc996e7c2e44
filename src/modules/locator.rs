//! Map module names to executable entry points on disk.
use std::path::{Component, Path, PathBuf};

use crate::error::ModuleError;

/// Filename prefixes recognised as a module's entry point, by priority.
pub const DISCOVERY_TOKENS: &[&str] = &["generate", "default"];

/// Directory holding plain (untyped) modules, relative to the build root.
pub const MODULES_DIR: &str = "modules";

/// Finds the executable for a module.
#[cfg_attr(test, mockall::automock)]
pub trait ModuleResolver: Send + Sync + std::fmt::Debug {
    /// Return the path of the module's executable entry point.
    ///
    /// # Errors
    ///
    /// Returns a [`ModuleError`] if the name is invalid, the module is
    /// absent, or it has no executable entry point.
    fn resolve(&self, name: &str) -> Result<PathBuf, ModuleError>;
}

/// Typed module namespaces, addressed as `<type>/<path>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleType {
    /// Machine-wide modules under `<root>/system`.
    System,
    /// Per-user modules under `<root>/user`.
    User,
}

impl ModuleType {
    /// Directory name under the build root.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

/// Resolves modules against a directory tree.
///
/// `name` maps to `<root>/modules/<name>`; `system/<rel>` and `user/<rel>`
/// map to `<root>/<type>/<rel>`. The location may be an executable file or a
/// directory containing one whose name starts with a discovery token.
#[derive(Debug, Clone)]
pub struct FsModuleResolver {
    root: PathBuf,
}

impl FsModuleResolver {
    /// Resolver rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Location a module name maps to, before probing the filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::InvalidModuleName`] for empty or absolute names
    /// and names containing `.` or `..` components.
    pub fn module_path(&self, name: &str) -> Result<PathBuf, ModuleError> {
        let invalid = |reason: &str| ModuleError::InvalidModuleName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        let rel = Path::new(name);
        for component in rel.components() {
            match component {
                Component::Normal(_) => {}
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("name must be relative"));
                }
                Component::CurDir | Component::ParentDir => {
                    return Err(invalid("name must not contain '.' or '..'"));
                }
            }
        }

        if let Some((head, tail)) = name.split_once('/')
            && let Some(kind) = ModuleType::parse(head)
        {
            if tail.is_empty() {
                return Err(invalid("typed module needs a path after the type"));
            }
            return Ok(self.root.join(kind.dir_name()).join(tail));
        }
        Ok(self.root.join(MODULES_DIR).join(rel))
    }
}

impl ModuleResolver for FsModuleResolver {
    fn resolve(&self, name: &str) -> Result<PathBuf, ModuleError> {
        let path = self.module_path(name)?;

        if path.is_file() {
            if is_executable(&path) {
                return Ok(path);
            }
            return Err(ModuleError::NoExecutableEntryPoint {
                name: name.to_string(),
                path,
            });
        }
        if !path.is_dir() {
            return Err(ModuleError::ModuleNotFound {
                name: name.to_string(),
                path,
            });
        }

        find_entry_point(&path).ok_or_else(|| ModuleError::NoExecutableEntryPoint {
            name: name.to_string(),
            path,
        })
    }
}

/// First executable file in `dir` whose name starts with a discovery token.
///
/// Tokens are tried in priority order; within a token, candidates are
/// sorted by name.
fn find_entry_point(dir: &Path) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    entries.sort();

    DISCOVERY_TOKENS.iter().find_map(|token| {
        entries.iter().find_map(|p| {
            let name = p.file_name()?.to_str()?;
            (name.starts_with(token) && is_executable(p)).then(|| p.clone())
        })
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt as _;
    std::fs::metadata(path).is_ok_and(|m| m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

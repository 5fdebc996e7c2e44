//! File permission bits and the policy used to combine them.
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Permission bits of a planned file, owner/group/other.
///
/// Valid modes have every triplet in `4..=7` (each principal can at least
/// read) and no set-id or sticky bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FileMode(u32);

impl FileMode {
    /// Mode used when a file does not declare one.
    pub const DEFAULT: Self = Self(0o644);

    /// Wrap raw permission bits without validating them.
    #[must_use]
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw permission bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every triplet lies in `4..=7` and no other bits are set.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        let bits = self.0;
        if bits & !0o777 != 0 {
            return false;
        }
        let user = (bits >> 6) & 0o7;
        let group = (bits >> 3) & 0o7;
        let other = bits & 0o7;
        user >= 4 && group >= 4 && other >= 4
    }
}

impl Default for FileMode {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03o}", self.0)
    }
}

/// Accepts a JSON integer (`420`) or an octal string (`"644"`, `"0644"`, `"0o644"`).
impl<'de> Deserialize<'de> for FileMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(n) => u32::try_from(n)
                .map(Self)
                .map_err(|_| serde::de::Error::custom(format!("mode {n} is out of range"))),
            Raw::Text(s) => parse_octal(&s).map(Self).ok_or_else(|| {
                serde::de::Error::custom(format!("mode '{s}' is not an octal number"))
            }),
        }
    }
}

fn parse_octal(s: &str) -> Option<u32> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0o")
        .or_else(|| s.strip_prefix("0O"))
        .unwrap_or(s);
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 8).ok()
}

/// How the modes of several contributions to one file are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModePolicy {
    /// Bitwise AND: the more restrictive permission wins.
    #[default]
    Restrict,
    /// Bitwise OR: the more permissive permission wins.
    Relax,
}

impl ModePolicy {
    /// Combine the current mode with an incoming one.
    #[must_use]
    pub const fn merge(self, current: FileMode, incoming: FileMode) -> FileMode {
        match self {
            Self::Restrict => FileMode(current.0 & incoming.0),
            Self::Relax => FileMode(current.0 | incoming.0),
        }
    }
}

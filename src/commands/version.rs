//! Command: print version information.

/// Version string baked in at build time.
#[must_use]
pub fn version() -> &'static str {
    option_env!("DOTFILES_MODULES_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the version to stdout.
pub fn run() {
    println!("dotfiles-modules {}", version());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}

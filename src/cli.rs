use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Top-level CLI entry point for the module build engine.
#[derive(Parser, Debug)]
#[command(
    name = "dotfiles-modules",
    about = "Resolve per-host module configuration and build a dotfiles plan",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Override the build root directory
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Host document (default: <root>/hosts.yaml)
    #[arg(long, global = true)]
    pub hosts: Option<PathBuf>,

    /// Read the inventory from a JSON file instead of `chezmoi data`
    #[arg(short, long, global = true)]
    pub inventory: Option<PathBuf>,

    /// Build for this host instead of the inventory's hostname
    #[arg(long, global = true)]
    pub hostname: Option<String>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every module for the host and build the plan
    Build(BuildOpts),
    /// Print the effective per-module configuration for the host
    Config,
    /// Print the JSON Schema of the manifest modules must emit
    Schema,
    /// Print version information
    Version,
}

/// Output format of the build summary.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Plain text
    #[default]
    Text,
    /// JSON document
    Json,
}

/// Options for the `build` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct BuildOpts {
    /// Combine modes of shared files with OR instead of AND
    #[arg(long)]
    pub relax_modes: bool,

    /// Invoke modules concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Write the plan as JSON to FILE (`-` for stdout)
    #[arg(long, value_name = "FILE")]
    pub plan: Option<PathBuf>,

    /// Summary format
    #[arg(long, value_enum, default_value_t)]
    pub format: ReportFormat,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_build_defaults() {
        let cli = Cli::parse_from(["dotfiles-modules", "build"]);
        assert!(
            matches!(&cli.command, Command::Build(_)),
            "Expected Build command"
        );
        if let Command::Build(opts) = cli.command {
            assert!(!opts.relax_modes);
            assert!(!opts.parallel);
            assert_eq!(opts.plan, None);
            assert_eq!(opts.format, ReportFormat::Text);
        }
    }

    #[test]
    fn parse_build_flags() {
        let cli = Cli::parse_from([
            "dotfiles-modules",
            "build",
            "--relax-modes",
            "--parallel",
            "--plan",
            "-",
            "--format",
            "json",
        ]);
        assert!(
            matches!(&cli.command, Command::Build(_)),
            "Expected Build command"
        );
        if let Command::Build(opts) = cli.command {
            assert!(opts.relax_modes);
            assert!(opts.parallel);
            assert_eq!(opts.plan, Some(PathBuf::from("-")));
            assert_eq!(opts.format, ReportFormat::Json);
        }
    }

    #[test]
    fn parse_global_options() {
        let cli = Cli::parse_from([
            "dotfiles-modules",
            "--root",
            "/tmp/dotfiles",
            "--hosts",
            "/tmp/h.yaml",
            "-i",
            "/tmp/inv.json",
            "--hostname",
            "laptop",
            "config",
        ]);
        assert_eq!(cli.global.root, Some(PathBuf::from("/tmp/dotfiles")));
        assert_eq!(cli.global.hosts, Some(PathBuf::from("/tmp/h.yaml")));
        assert_eq!(cli.global.inventory, Some(PathBuf::from("/tmp/inv.json")));
        assert_eq!(cli.global.hostname.as_deref(), Some("laptop"));
        assert!(matches!(cli.command, Command::Config));
    }

    #[test]
    fn global_options_after_subcommand() {
        let cli = Cli::parse_from(["dotfiles-modules", "build", "--hostname", "box", "-v"]);
        assert_eq!(cli.global.hostname.as_deref(), Some("box"));
        assert!(cli.verbose);
    }

    #[test]
    fn parse_schema() {
        let cli = Cli::parse_from(["dotfiles-modules", "schema"]);
        assert!(matches!(cli.command, Command::Schema));
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["dotfiles-modules", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(Cli::try_parse_from(["dotfiles-modules", "build", "--format", "yaml"]).is_err());
    }
}

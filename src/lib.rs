//! Module manifest build engine for chezmoi-managed dotfiles.
//!
//! Resolves each module's effective configuration for the current host,
//! runs every module with that configuration and the machine inventory, and
//! folds the manifests they return into a single plan of files and scripts
//! for a downstream materializer.
//!
//! The public API is organised into layers:
//!
//! - **[`config`]**: host document, inventory, and common/host merge
//! - **[`modules`]**: locate and invoke modules, decode their manifests
//! - **[`plan`]**: aggregate manifests into the global plan and report on it
//! - **[`pipeline`]**: run the whole build in canonical module order
//! - **[`commands`]**: top-level subcommand orchestration (`build`, `config`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod modules;
pub mod pipeline;
pub mod plan;
pub mod warning;

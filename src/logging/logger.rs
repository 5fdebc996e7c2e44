//! [`Log`] implementation that writes through the global tracing subscriber.
use std::path::PathBuf;

use super::subscriber::STAGE_TARGET;
use super::types::Log;
use super::utils::log_file_path;

/// Console and file logger for one command run.
///
/// Messages go to the tracing subscriber installed by
/// [`init_subscriber`](super::subscriber::init_subscriber), whose file layer
/// also records them in `$XDG_CACHE_HOME/dotfiles-modules/<command>.log`.
#[derive(Debug)]
pub struct Logger {
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Logger for `command`. The file itself is created by the subscriber.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            log_file: log_file_path(command),
        }
    }

    /// Where this run's log file lives, shown after a failed build.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }
}

impl Log for Logger {
    fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }
    fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }
    fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }
    fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }
    fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }
}

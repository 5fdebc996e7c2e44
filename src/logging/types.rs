//! The [`Log`] trait and the severities it carries.

/// Severity of a log message. `Stage` marks a section header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Section header.
    Stage,
    /// Progress.
    Info,
    /// Detail for `--verbose` and the log file.
    Debug,
    /// Non-fatal problem.
    Warn,
    /// Fatal problem.
    Error,
}

impl LogLevel {
    /// Lowercase name, e.g. `"warn"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stage => "stage",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Sink for progress and diagnostic messages.
///
/// Implemented by [`Logger`](super::logger::Logger), which writes through the
/// tracing subscriber, and by [`BufferedLog`](super::buffered::BufferedLog),
/// which holds messages from a module invoked on a worker thread until the
/// pipeline replays them in module order.
pub trait Log: Send + Sync {
    /// Log a section header.
    fn stage(&self, msg: &str);
    /// Log a progress message.
    fn info(&self, msg: &str);
    /// Log a detail message, suppressed on the console unless verbose.
    fn debug(&self, msg: &str);
    /// Log a warning.
    fn warn(&self, msg: &str);
    /// Log an error.
    fn error(&self, msg: &str);

    /// Dispatch `msg` to the method for `level`.
    fn emit(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Stage => self.stage(msg),
            LogLevel::Info => self.info(msg),
            LogLevel::Debug => self.debug(msg),
            LogLevel::Warn => self.warn(msg),
            LogLevel::Error => self.error(msg),
        }
    }
}

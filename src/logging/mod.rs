//! Console and file logging.

mod buffered;
mod logger;
mod subscriber;
mod types;
mod utils;

pub use buffered::BufferedLog;
pub use logger::Logger;
pub use subscriber::init_subscriber;
pub use types::{Log, LogLevel};

/// Held while a test points `XDG_CACHE_HOME` at a temporary directory.
#[cfg(test)]
pub(crate) static TEST_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// A [`Logger`] whose events land in a log file under a fresh temporary
/// cache directory, via a thread-local subscriber.
///
/// Keep the returned guard alive for the whole test.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn isolated_logger() -> (Logger, tempfile::TempDir, tracing::dispatcher::DefaultGuard) {
    use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};

    let cache = tempfile::tempdir().expect("temp cache dir");
    let (layer, log) = {
        let _env = TEST_ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // SAFETY: serialized by TEST_ENV_MUTEX and restored before it is released.
        #[allow(unsafe_code)]
        unsafe {
            std::env::set_var("XDG_CACHE_HOME", cache.path());
        }
        let layer = subscriber::FileLayer::new("test").expect("file layer");
        let log = Logger::new("test");
        // SAFETY: as above.
        #[allow(unsafe_code)]
        unsafe {
            std::env::remove_var("XDG_CACHE_HOME");
        }
        (layer, log)
    };
    let registry = tracing_subscriber::registry().with(layer.with_filter(LevelFilter::DEBUG));
    let guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(registry));
    (log, cache, guard)
}

/// [`Log`] that keeps every message in memory as `"<level>: <message>"`.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CapturedLog {
    lines: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl CapturedLog {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().map_or_else(|_| Vec::new(), |g| g.clone())
    }

    /// Messages logged at `level` (e.g. `"warn"`), prefix removed.
    pub(crate) fn at(&self, level: &str) -> Vec<String> {
        let prefix = format!("{level}: ");
        self.lines()
            .into_iter()
            .filter_map(|l| l.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    fn capture(&self, level: LogLevel, msg: &str) {
        if let Ok(mut g) = self.lines.lock() {
            g.push(format!("{}: {msg}", level.as_str()));
        }
    }
}

#[cfg(test)]
impl Log for CapturedLog {
    fn stage(&self, msg: &str) {
        self.capture(LogLevel::Stage, msg);
    }
    fn info(&self, msg: &str) {
        self.capture(LogLevel::Info, msg);
    }
    fn debug(&self, msg: &str) {
        self.capture(LogLevel::Debug, msg);
    }
    fn warn(&self, msg: &str) {
        self.capture(LogLevel::Warn, msg);
    }
    fn error(&self, msg: &str) {
        self.capture(LogLevel::Error, msg);
    }
}

//! Deferred log output for modules invoked on worker threads.
use std::sync::Mutex;

use super::types::{Log, LogLevel};

/// Collects one module's messages while it runs in parallel with others.
///
/// The pipeline replays each buffer in canonical module order once all
/// invocations have returned, so a parallel build logs exactly what a
/// sequential one would.
#[derive(Debug, Default)]
pub struct BufferedLog {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl BufferedLog {
    /// Empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay every buffered message into `log`, oldest first.
    pub fn replay(self, log: &dyn Log) {
        let entries = self
            .entries
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for (level, msg) in &entries {
            log.emit(*level, msg);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().map_or(0, |g| g.len())
    }

    fn record(&self, level: LogLevel, msg: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((level, msg.to_string()));
        }
    }
}

impl Log for BufferedLog {
    fn stage(&self, msg: &str) {
        self.record(LogLevel::Stage, msg);
    }
    fn info(&self, msg: &str) {
        self.record(LogLevel::Info, msg);
    }
    fn debug(&self, msg: &str) {
        self.record(LogLevel::Debug, msg);
    }
    fn warn(&self, msg: &str) {
        self.record(LogLevel::Warn, msg);
    }
    fn error(&self, msg: &str) {
        self.record(LogLevel::Error, msg);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::logging::{CapturedLog, isolated_logger};
    use std::fs;

    #[test]
    fn replay_preserves_module_message_order() {
        let buf = BufferedLog::new();
        buf.debug("running module 'git'");
        buf.warn("module 'git' produced stderr output:\ndeprecated key");
        buf.info("module 'git' returned 2 files");
        assert_eq!(buf.len(), 3);

        let captured = CapturedLog::default();
        buf.replay(&captured);
        assert_eq!(
            captured.lines(),
            vec![
                "debug: running module 'git'",
                "warn: module 'git' produced stderr output:\ndeprecated key",
                "info: module 'git' returned 2 files",
            ]
        );
    }

    #[test]
    fn buffers_replayed_in_module_order_regardless_of_completion() {
        let first = BufferedLog::new();
        let second = BufferedLog::new();
        second.info("fish done");
        first.info("git done");

        let captured = CapturedLog::default();
        first.replay(&captured);
        second.replay(&captured);
        assert_eq!(captured.at("info"), ["git done", "fish done"]);
    }

    #[test]
    fn messages_reach_the_log_file_only_on_replay() {
        let (log, _tmp, _guard) = isolated_logger();
        let buf = BufferedLog::new();
        let marker = format!("module-ssh-{}", std::process::id());
        buf.warn(&marker);
        let path = log.log_path().expect("log path").clone();

        assert!(!fs::read_to_string(&path).unwrap().contains(&marker));
        buf.replay(&log);
        assert!(fs::read_to_string(&path).unwrap().contains(&marker));
    }
}

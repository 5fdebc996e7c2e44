//! Tracing subscriber setup: console formatter, file layer, and initialisation.
use std::fs;
use std::io::Write as _;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;

use super::utils::{format_utc_datetime, format_utc_time, log_file_path, strip_ansi};

/// Tracing target used for stage headers.
pub(super) const STAGE_TARGET: &str = "dotfiles_modules::stage";

/// Environment variable naming the console level (e.g. `debug`, `WARNING`).
const LOGLEVEL_ENV: &str = "LOGLEVEL";

/// How an event is presented, derived from its level and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Stage,
    Error,
    Warn,
    Info,
    Debug,
}

impl LineKind {
    fn classify(level: Level, target: &str) -> Self {
        match level {
            Level::ERROR => Self::Error,
            Level::WARN => Self::Warn,
            Level::INFO if target == STAGE_TARGET => Self::Stage,
            Level::INFO => Self::Info,
            Level::DEBUG | Level::TRACE => Self::Debug,
        }
    }

    /// Fixed-width tag used in the log file.
    const fn file_tag(self) -> &'static str {
        match self {
            Self::Stage => "==>  ",
            Self::Error => "ERROR",
            Self::Warn => "WARN ",
            Self::Info => "INFO ",
            Self::Debug => "DEBUG",
        }
    }
}

/// Join `msg`'s lines, indenting every line after the first by `width`.
///
/// Module stderr is often several lines long; this keeps continuation lines
/// aligned under the first one.
fn hang_indent(msg: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    let mut lines = msg.lines();
    let mut out = lines.next().unwrap_or_default().to_string();
    for line in lines {
        out.push('\n');
        out.push_str(&pad);
        out.push_str(line);
    }
    out
}

/// Render one log file line (without the trailing newline).
fn file_line(kind: LineKind, ts: &str, msg: &str) -> String {
    let prefix = format!("[{ts}] {} ", kind.file_tag());
    let body = hang_indent(&strip_ansi(msg), prefix.len());
    format!("{prefix}{body}")
}

/// Render one console line (without the trailing newline).
fn console_line(kind: LineKind, msg: &str) -> String {
    match kind {
        LineKind::Stage => format!("\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m"),
        LineKind::Error => format!("\x1b[31mERROR\x1b[0m {}", hang_indent(msg, 6)),
        LineKind::Warn => format!("\x1b[33mWARN\x1b[0m  {}", hang_indent(msg, 6)),
        LineKind::Info => format!("  {}", hang_indent(msg, 2)),
        LineKind::Debug => format!("  \x1b[2m{}\x1b[0m", hang_indent(msg, 2)),
    }
}

/// Console level from a `LOGLEVEL` value, or from `verbose` when unset or
/// unrecognised.
///
/// Accepts tracing level names and the Python logging names `warning`,
/// `critical`, and `fatal`, case-insensitively.
fn console_level(loglevel: Option<&str>, verbose: bool) -> LevelFilter {
    let fallback = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let Some(raw) = loglevel else {
        return fallback;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "warning" => LevelFilter::WARN,
        "critical" | "fatal" => LevelFilter::ERROR,
        other => other.parse().unwrap_or(fallback),
    }
}

/// Extracts the `message` field from a [`tracing::Event`].
#[derive(Default)]
struct MessageExtractor {
    message: String,
}

impl MessageExtractor {
    fn extract(event: &tracing::Event<'_>) -> String {
        let mut extractor = Self::default();
        event.record(&mut extractor);
        extractor.message
    }
}

impl tracing::field::Visit for MessageExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

/// A [`tracing_subscriber::Layer`] that appends every event to the
/// per-command log file, timestamped and with ANSI codes removed.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Truncate the log file for `command`, write a run header, and keep it
    /// open for appending.
    ///
    /// Returns `None` if the cache directory or the file is unavailable.
    pub(super) fn new(command: &str) -> Option<Self> {
        let path = log_file_path(command)?;
        let version = option_env!("DOTFILES_MODULES_VERSION")
            .unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
        let header = format!(
            "# dotfiles-modules {version}: {command} started {} UTC\n",
            format_utc_datetime(),
        );
        fs::write(&path, header).ok()?;
        let file = fs::OpenOptions::new().append(true).open(&path).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        let kind = LineKind::classify(*metadata.level(), metadata.target());
        let line = file_line(kind, &format_utc_time(), &MessageExtractor::extract(event));

        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "{line}").ok();
        }
    }
}

/// A [`tracing_subscriber::fmt::FormatEvent`] producing the console style.
struct ConsoleFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let kind = LineKind::classify(*metadata.level(), metadata.target());
        writeln!(
            writer,
            "{}",
            console_line(kind, &MessageExtractor::extract(event))
        )
    }
}

/// Initialise the global [`tracing`] subscriber.
///
/// Installs the console layer and a file layer that records every event,
/// `debug` included, in `$XDG_CACHE_HOME/dotfiles-modules/<command>.log`.
///
/// Console verbosity is `INFO`, or `DEBUG` with `verbose`; a recognised
/// `LOGLEVEL` level name replaces that default. Warnings and
/// errors go to stderr, the rest to stdout. With `stdout_reserved` (the
/// command prints JSON on stdout) all console output goes to stderr.
///
/// Call once at startup, before any logging.
pub fn init_subscriber(verbose: bool, stdout_reserved: bool, command: &str) {
    use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt as _};
    use tracing_subscriber::{
        EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
    };

    let level = console_level(std::env::var(LOGLEVEL_ENV).ok().as_deref(), verbose);
    let console_filter = EnvFilter::default().add_directive(level.into());

    let make_writer = if stdout_reserved {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(
            std::io::stderr
                .with_max_level(Level::WARN)
                .and(std::io::stdout.with_min_level(Level::INFO)),
        )
    };

    let console_layer = fmt::layer()
        .event_format(ConsoleFormatter)
        .with_writer(make_writer)
        .with_filter(console_filter);

    let file_layer = FileLayer::new(command).map(|l| l.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}

//! Tracing subscriber: coloured console output and a plain per-command log
//! file that always records debug events.
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use tracing::Level;

/// Tracing target used for per-application stage headers.
pub(super) const STAGE_TARGET: &str = "userapps::stage";

/// Environment variable holding an optional console filter directive.
const LOG_ENV: &str = "USERAPPS_LOG";

/// Strip ANSI CSI sequences (colours, cursor movement, erase) and two-byte
/// escapes from `s`.
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.next() == Some('[') {
            for inner in chars.by_ref() {
                if ('@'..='~').contains(&inner) {
                    break;
                }
            }
        }
    }
    out
}

/// How an event is presented, derived from its level and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    Stage,
    Error,
    Warn,
    Info,
    Debug,
}

impl Line {
    fn of(event: &tracing::Event<'_>) -> Self {
        let metadata = event.metadata();
        match *metadata.level() {
            Level::ERROR => Self::Error,
            Level::WARN => Self::Warn,
            Level::INFO if metadata.target() == STAGE_TARGET => Self::Stage,
            Level::INFO => Self::Info,
            _ => Self::Debug,
        }
    }

    fn console(self, msg: &str) -> String {
        match self {
            Self::Stage => format!("\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m"),
            Self::Error => format!("\x1b[31mERROR\x1b[0m {msg}"),
            Self::Warn => format!("\x1b[33mWARN\x1b[0m  {msg}"),
            Self::Info => format!("  {msg}"),
            Self::Debug => format!("  \x1b[2m{msg}\x1b[0m"),
        }
    }

    fn plain(self, msg: &str) -> String {
        let msg = strip_ansi(msg);
        match self {
            Self::Stage => format!("==> {msg}"),
            Self::Error => format!("    [error] {msg}"),
            Self::Warn => format!("    [warn] {msg}"),
            Self::Info => format!("    {msg}"),
            Self::Debug => format!("    [debug] {msg}"),
        }
    }
}

/// The `message` field of an event.
#[derive(Default)]
struct Message(String);

impl tracing::field::Visit for Message {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.0 = value.to_string();
        }
    }
}

fn message_of(event: &tracing::Event<'_>) -> String {
    let mut message = Message::default();
    event.record(&mut message);
    message.0
}

/// Layer appending every event to the run's log file, timestamped and
/// without colour.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Truncate `path`, write a run header naming `command`, and keep the file
    /// open for appending. `None` if the file cannot be created.
    pub(super) fn create(path: &Path, command: &str) -> Option<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok()?;
        }
        let rule = "=".repeat(42);
        let header = format!(
            "{rule}\nuserapps {} {command} {}\n{rule}\n",
            crate::VERSION,
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
        );
        fs::write(path, header).ok()?;
        let file = fs::OpenOptions::new().append(true).open(path).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _: tracing_subscriber::layer::Context<'_, S>) {
        let line = Line::of(event).plain(&message_of(event));
        if let Ok(mut file) = self.file.lock() {
            writeln!(file, "[{}] {line}", Utc::now().format("%H:%M:%S")).ok();
        }
    }
}

/// Console event format.
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
        writeln!(writer, "{}", Line::of(event).console(&message_of(event)))
    }
}

/// Initialise the global [`tracing`] subscriber.
///
/// Warnings and errors go to stderr, everything else to stdout. The console
/// level is debug with `verbose`, info otherwise, and `USERAPPS_LOG` (an
/// [`EnvFilter`](tracing_subscriber::EnvFilter) directive) overrides both.
/// When `log_file` is given every event down to debug is also appended there.
/// Call once, before any logging.
pub fn init_subscriber(verbose: bool, command: &str, log_file: Option<&Path>) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        EnvFilter, Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let console_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    let make_writer = std::io::stderr
        .with_max_level(Level::WARN)
        .and(std::io::stdout.with_min_level(Level::INFO));

    let console_layer = fmt::layer()
        .event_format(ConsoleFormatter)
        .with_writer(make_writer)
        .with_filter(console_filter);

    let file_layer = log_file
        .and_then(|path| FileLayer::create(path, command))
        .map(|layer| layer.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}

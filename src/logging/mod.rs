//! Logging infrastructure for structured console and file output.

mod logger;
mod subscriber;
mod types;

pub use logger::Logger;
pub use subscriber::{init_subscriber, strip_ansi};
pub use types::{Log, OutcomeEntry, OutcomeStatus};

/// Create a Logger backed by an isolated per-thread tracing subscriber
/// writing to a log file in a fresh temporary directory.
///
/// Keep the returned guard alive for the duration of the test; dropping it
/// restores the previous thread-local dispatcher.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn isolated_logger() -> (Logger, tempfile::TempDir, tracing::dispatcher::DefaultGuard) {
    use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let path = tmp.path().join("test.log");
    let file_layer =
        subscriber::FileLayer::create(&path, "test").expect("failed to create file layer");
    let subscriber =
        tracing_subscriber::registry().with(file_layer.with_filter(LevelFilter::DEBUG));
    let guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(subscriber));
    (Logger::new(Some(path)), tmp, guard)
}

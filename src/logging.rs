//! Logging initialisation for mokhatt-widget.
//!
//! When the `MOKHATT_LOG` environment variable is set to `1`, structured
//! logs are also written to `mokhatt.log` in the log directory. Otherwise only
//! stderr output (filtered by `RUST_LOG`) is enabled.
//!
//! Stderr is the widget's diagnostic channel: configuration failures and
//! dispatch errors are reported there and nowhere in the UI.

use std::path::Path;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "MOKHATT_LOG";

/// Keeps the non-blocking file writer alive; buffered lines flush on drop.
pub struct LogGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initialise the global tracing subscriber.
///
/// Call once from `main` and hold the returned `LogGuard` until exit.
pub fn init(log_dir: Option<&Path>) -> LogGuard {
    init_with(log_dir, std::env::var(LOG_ENV).as_deref() == Ok("1"))
}

/// Like [`init`], with file logging chosen by the caller.
pub fn init_with(log_dir: Option<&Path>, file_logging: bool) -> LogGuard {
    let file_guard = if file_logging {
        let dir = log_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        let _ = std::fs::create_dir_all(&dir);
        let file_appender = tracing_appender::rolling::never(dir, "mokhatt.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

        tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(file_layer)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();

        None
    };

    LogGuard {
        _file_guard: file_guard,
    }
}

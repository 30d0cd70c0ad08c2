use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INSTALLED: OnceCell<()> = OnceCell::new();

#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Filter used when `RUST_LOG` is unset, e.g. `info` or `kb_odometer=debug`.
    pub level: String,
    /// Directory for the JSON-lines log file. `None` logs to stderr only.
    pub file_dir: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_dir: None,
            file_prefix: "odometer.log".to_string(),
        }
    }
}

/// Installs the global subscriber. Later calls are no-ops and return `None`.
///
/// Keep the returned guard alive for as long as file logging should flush.
pub fn init(options: &LogOptions) -> Result<Option<WorkerGuard>> {
    if INSTALLED.get().is_some() {
        return Ok(None);
    }

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&options.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(dir) = options.file_dir.as_ref() else {
        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .is_ok();
        let _ = INSTALLED.set(());
        if !installed {
            tracing::debug!("global subscriber already set elsewhere");
        }
        return Ok(None);
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log dir {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(dir, &options.file_prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false),
        )
        .try_init()
        .is_ok();
    let _ = INSTALLED.set(());
    if !installed {
        tracing::debug!("global subscriber already set elsewhere");
        return Ok(None);
    }
    Ok(Some(guard))
}

/// Routes panics through `tracing` before the previous hook runs.
pub fn install_panic_hook() {
    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "panic".to_string()
        };
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());

        tracing::error!(scope = "panic", "{} ({})", payload, location);
        prev(info);
    }));
}

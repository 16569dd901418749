//! Logging setup with a reloadable filter.
//!
//! Console output always; a daily-rolling file under the configured log
//! directory when one is set. The filter can be changed at runtime through
//! [`LoggingConfig::set_filter`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "webai_bridge=info,gemini_web=info,tower_http=info";

const LOG_FILE_PREFIX: &str = "webai-bridge.log";

/// Timestamps in the server's local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

pub type FilterHandle = Handle<EnvFilter, tracing_subscriber::Registry>;
type FilterLayer = reload::Layer<EnvFilter, tracing_subscriber::Registry>;

/// Reloadable filter plus where logs are written.
pub struct LoggingConfig {
    handle: FilterHandle,
    log_dir: Option<PathBuf>,
    /// Keeps a non-installed filter alive; the handle only holds a weak ref.
    _detached: Option<FilterLayer>,
}

impl LoggingConfig {
    pub fn new(handle: FilterHandle, log_dir: Option<PathBuf>) -> Self {
        Self {
            handle,
            log_dir,
            _detached: None,
        }
    }

    /// Current filter directive.
    pub fn get_filter(&self) -> String {
        self.handle
            .with_current(|filter| filter.to_string())
            .unwrap_or_default()
    }

    /// Replace the filter. Fails on an invalid directive.
    pub fn set_filter(&self, directive: &str) -> crate::Result<()> {
        let new_filter = parse_filter(directive)?;

        self.handle
            .reload(new_filter)
            .map_err(|e| crate::Error::Other(format!("Failed to reload filter: {}", e)))?;

        info!(directive = %directive, "Log filter updated");
        Ok(())
    }

    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Validate a filter directive.
pub fn parse_filter(directive: &str) -> crate::Result<EnvFilter> {
    if directive.trim().is_empty() {
        return Err(crate::Error::Other("Filter directive is empty".to_string()));
    }
    EnvFilter::try_new(directive)
        .map_err(|e| crate::Error::Other(format!("Invalid filter directive: {}", e)))
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the process lifetime; dropping it stops
/// the file writer.
pub fn init_logging(
    log_dir: Option<&Path>,
) -> crate::Result<(Arc<LoggingConfig>, Option<WorkerGuard>)> {
    let initial_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let (filter_layer, filter_handle) = reload::Layer::new(initial_filter);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(file_layer)
        .try_init()
        .map_err(|e| {
            crate::Error::Other(format!("Failed to set global default subscriber: {}", e))
        })?;

    let config = Arc::new(LoggingConfig::new(
        filter_handle,
        log_dir.map(Path::to_path_buf),
    ));

    Ok((config, guard))
}

/// Build a [`LoggingConfig`] whose handle is not installed globally.
///
/// The filter can still be read and reloaded, which is all the API needs.
pub fn detached(directive: &str) -> crate::Result<Arc<LoggingConfig>> {
    let (layer, handle) = FilterLayer::new(parse_filter(directive)?);
    Ok(Arc::new(LoggingConfig {
        handle,
        log_dir: None,
        _detached: Some(layer),
    }))
}

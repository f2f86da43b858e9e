//! Logging: the host-provided [`Logger`] and the `tracing` console subscriber.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Trait representing a logger that can log messages at various levels.
///
/// An implementation is handed to each orchestrator at construction, so hosts can
/// route the SDK's diagnostics into their own logging facilities.
///
/// # Examples
///
/// Implementing the `Logger` trait:
///
/// ```rust
/// use verifykit_core::logger::{Logger, LogLevel};
///
/// struct MyLogger;
///
/// impl Logger for MyLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         println!("[{:?}] {}", level, message);
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Logs a message at the specified log level.
    ///
    /// # Arguments
    ///
    /// * `level` - The severity level of the log message.
    /// * `message` - The log message to be recorded.
    fn log(&self, level: LogLevel, message: String);
}

/// Enumeration of possible log levels.
///
/// This enum represents the severity levels that can be used when logging messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Designates very low priority, often extremely detailed messages.
    Trace,
    /// Designates lower priority debugging information.
    Debug,
    /// Designates informational messages that highlight the progress of the application.
    Info,
    /// Designates potentially harmful situations.
    Warn,
    /// Designates error events that might still allow the application to continue running.
    Error,
}

/// Default logger, forwards every message as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Trace => tracing::trace!(target: "verifykit", "{message}"),
            LogLevel::Debug => tracing::debug!(target: "verifykit", "{message}"),
            LogLevel::Info => tracing::info!(target: "verifykit", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "verifykit", "{message}"),
            LogLevel::Error => tracing::error!(target: "verifykit", "{message}"),
        }
    }
}

/// Logger that drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: LogLevel, _message: String) {}
}

/// Convenience handle over an injected [`Logger`].
#[derive(Clone)]
pub(crate) struct Log {
    inner: Arc<dyn Logger>,
    prefix: &'static str,
}

impl Log {
    pub(crate) fn new(inner: Arc<dyn Logger>, prefix: &'static str) -> Self {
        Self { inner, prefix }
    }

    fn emit(&self, level: LogLevel, message: &str) {
        self.inner.log(level, format!("[{}] {message}", self.prefix));
    }

    pub(crate) fn debug(&self, message: &str) {
        self.emit(LogLevel::Debug, message);
    }

    pub(crate) fn info(&self, message: &str) {
        self.emit(LogLevel::Info, message);
    }

    pub(crate) fn warn(&self, message: &str) {
        self.emit(LogLevel::Warn, message);
    }

    pub(crate) fn error(&self, message: &str) {
        self.emit(LogLevel::Error, message);
    }
}

impl std::fmt::Debug for Log {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Log").field("prefix", &self.prefix).finish()
    }
}

/// Installs a `tracing-subscriber` console subscriber.
///
/// `filter` uses the `EnvFilter` directive syntax (e.g. `"verifykit=debug"`). When
/// `RUST_LOG` is set it takes precedence. Calling this more than once is harmless;
/// only the first subscriber is installed.
pub fn init_tracing(filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
    {
        eprintln!("Failed to set tracing subscriber: {e}");
    }
}

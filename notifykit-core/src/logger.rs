//! Bridges the crate's log output to a logger supplied by the host app.
//!
//! `tracing` events are re-emitted as `log` records, which [`ForeignLogger`]
//! hands to the registered [`Logger`]. Debug and trace records from other
//! crates are dropped so a verbose dependency cannot flood the host's log.

use std::sync::{Arc, OnceLock};

/// Receives log lines from the crate.
///
/// Implemented on the host side and registered once with [`set_logger`].
///
/// ```rust
/// use notifykit_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
///
/// On Android:
///
/// ```kotlin
/// object NotifyKitLog : Logger {
///     override fun log(level: LogLevel, message: String) {
///         Log.println(level.toPriority(), "NotifyKit", message)
///     }
/// }
///
/// setLogger(NotifyKitLog) // once, from Application.onCreate
/// ```
#[uniffi::export(with_foreign)]
pub trait Logger: Sync + Send {
    /// Records one formatted message.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a forwarded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum LogLevel {
    /// Very detailed tracing output.
    Trace,
    /// Debugging information.
    Debug,
    /// Normal lifecycle events, such as a key being generated.
    Info,
    /// Recoverable problems, including failed authentication of a payload.
    Warn,
    /// Failures the host should surface.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

const CRATE_PREFIX: &str = "notifykit";

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if !should_forward(record.level(), record.module_path()) {
            return;
        }
        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(record.level().into(), record.args().to_string());
        }
    }

    fn flush(&self) {}
}

/// Verbose records are only kept when they come from this crate.
fn should_forward(level: log::Level, module_path: Option<&str>) -> bool {
    level <= log::Level::Info || module_path.is_some_and(|path| path.starts_with(CRATE_PREFIX))
}

/// Registers the host logger.
///
/// Only the first call takes effect; later calls are ignored with a notice on
/// stderr.
#[uniffi::export]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("notifykit logger already set");
        return;
    }
    if let Err(err) = init_logger() {
        eprintln!("failed to install notifykit logger: {err}");
    }
}

fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: ForeignLogger = ForeignLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        assert_eq!(LogLevel::from(log::Level::Warn), LogLevel::Warn);
        assert_eq!(LogLevel::from(log::Level::Trace), LogLevel::Trace);
    }

    #[test]
    fn test_foreign_debug_records_are_dropped() {
        assert!(should_forward(log::Level::Debug, Some("notifykit_core::push")));
        assert!(!should_forward(log::Level::Debug, Some("ciborium::de")));
        assert!(!should_forward(log::Level::Trace, None));
        assert!(should_forward(log::Level::Warn, Some("ciborium::de")));
        assert!(should_forward(log::Level::Info, None));
    }
}

//! Narrow collaborator capabilities injected into the client.
//!
//! The engine never constructs a concrete logger or recovery policy itself. It works with the
//! no-op implementations below just as well as with [`LogLogger`], which forwards to the `log`
//! facade.

use crate::error::NetTraceError;

/// Leveled, fire-and-forget message sink.
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
    fn fatal(&self, message: &str);
}

/// Last stop for every error before it reaches the caller.
///
/// Implementations may return the error unchanged, re-wrap it, or replace it with a different
/// [`NetTraceError`].
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, error: NetTraceError) -> NetTraceError;
}

/// Discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn debug(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
    fn fatal(&self, _message: &str) {}
}

/// Forwards messages to the `log` crate under the `nettrace` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogLogger;

impl Logger for LogLogger {
    fn debug(&self, message: &str) {
        log::debug!(target: "nettrace", "{message}");
    }

    fn info(&self, message: &str) {
        log::info!(target: "nettrace", "{message}");
    }

    fn warn(&self, message: &str) {
        log::warn!(target: "nettrace", "{message}");
    }

    fn error(&self, message: &str) {
        log::error!(target: "nettrace", "{message}");
    }

    // `log` has no fatal level.
    fn fatal(&self, message: &str) {
        log::error!(target: "nettrace", "FATAL {message}");
    }
}

/// Returns every error unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughErrorHandler;

impl ErrorHandler for PassthroughErrorHandler {
    fn handle(&self, error: NetTraceError) -> NetTraceError {
        error
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::Logger;

    /// Captures messages for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingLogger {
        pub lines: Mutex<Vec<String>>,
    }

    impl RecordingLogger {
        fn push(&self, level: &str, message: &str) {
            if let Ok(mut lines) = self.lines.lock() {
                lines.push(format!("{level} {message}"));
            }
        }

        pub fn count(&self, level: &str) -> usize {
            self.lines.lock().map_or(0, |lines| {
                lines
                    .iter()
                    .filter(|l| l.starts_with(&format!("{level} ")))
                    .count()
            })
        }
    }

    impl Logger for RecordingLogger {
        fn debug(&self, message: &str) {
            self.push("DEBUG", message);
        }
        fn info(&self, message: &str) {
            self.push("INFO", message);
        }
        fn warn(&self, message: &str) {
            self.push("WARN", message);
        }
        fn error(&self, message: &str) {
            self.push("ERROR", message);
        }
        fn fatal(&self, message: &str) {
            self.push("FATAL", message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;

    #[test]
    fn test_passthrough_keeps_error() {
        let err = NetTraceError::validation(codes::SSL_INVALID_PORT, "port out of range");
        let handled = PassthroughErrorHandler.handle(err);
        assert_eq!(handled.code, codes::SSL_INVALID_PORT);
    }

    #[test]
    fn test_noop_logger_accepts_everything() {
        let logger: &dyn Logger = &NoopLogger;
        logger.debug("d");
        logger.info("i");
        logger.warn("w");
        logger.error("e");
        logger.fatal("f");
    }

    #[test]
    fn test_recording_logger_counts_levels() {
        let logger = testing::RecordingLogger::default();
        logger.warn("first");
        logger.warn("second");
        logger.info("third");
        assert_eq!(logger.count("WARN"), 2);
        assert_eq!(logger.count("INFO"), 1);
    }
}

//! Logging handles passed to seal wrappers
//!
//! Wrappers receive a [`Logger`] through [`WrapperOptions`](crate::wrappers::WrapperOptions)
//! and use it to report configuration outcomes at debug level. Secret values
//! are never logged.

use std::fmt;
use std::sync::Arc;

/// Logger interface for seal wrappers
pub trait Logger: Send + Sync + fmt::Debug {
    /// Log a debug message
    fn debug(&self, message: &str);

    /// Log a debug message with formatting
    fn debugf(&self, fmt: fmt::Arguments<'_>);
}

/// A no-op logger that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl NoopLogger {
    /// Create a new no-op logger
    pub fn new() -> Self {
        Self
    }

    /// Create a shared instance
    pub fn shared() -> Arc<dyn Logger> {
        Arc::new(Self::new())
    }
}

impl Logger for NoopLogger {
    fn debug(&self, _message: &str) {}
    fn debugf(&self, _fmt: fmt::Arguments<'_>) {}
}

/// Forwards messages to the `log` crate under a fixed target
#[derive(Debug, Clone)]
pub struct LogFacade {
    target: String,
}

impl Default for LogFacade {
    fn default() -> Self {
        Self::new("sealwrap")
    }
}

impl LogFacade {
    /// Create a logger that emits records with the given target
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// Create a shared instance
    pub fn shared(target: impl Into<String>) -> Arc<dyn Logger> {
        Arc::new(Self::new(target))
    }

    /// Target attached to every record
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Logger for LogFacade {
    fn debug(&self, message: &str) {
        log::debug!(target: &self.target, "{}", message);
    }

    fn debugf(&self, fmt: fmt::Arguments<'_>) {
        log::debug!(target: &self.target, "{}", fmt);
    }
}

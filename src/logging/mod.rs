//! Logging capability handed to the lifecycle.
//!
//! The lifecycle never writes to `tracing` directly; it goes through a
//! [`Logger`] so that applications can route lifecycle messages elsewhere and
//! tests can assert on them with [`MemoryLogger`].

use std::sync::{Mutex, PoisonError};
use tracing::Level;

pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn debug(&self, message: &str);
}

/// Default logger, emitting `tracing` events tagged with the service name.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    service: String,
}

impl TracingLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(service = %self.service, "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(service = %self.service, "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(service = %self.service, "{message}");
    }

    fn debug(&self, message: &str) {
        tracing::debug!(service = %self.service, "{message}");
    }
}

/// Logger that keeps every entry in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<(Level, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Level, String)> {
        self.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|(_, message)| message.clone()).collect()
    }

    /// Whether any entry contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|(_, message)| message.contains(needle))
    }

    fn record(&self, level: Level, message: &str) {
        self.lock().push((level, message.to_owned()));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(Level, String)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Logger for MemoryLogger {
    fn info(&self, message: &str) {
        self.record(Level::INFO, message);
    }

    fn error(&self, message: &str) {
        self.record(Level::ERROR, message);
    }

    fn warn(&self, message: &str) {
        self.record(Level::WARN, message);
    }

    fn debug(&self, message: &str) {
        self.record(Level::DEBUG, message);
    }
}

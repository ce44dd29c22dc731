//! Logger handle and global tracing subscriber setup.

use std::io::{self, IsTerminal};
use std::sync::{Mutex, PoisonError};

use tracing::Span;
use tracing_subscriber::EnvFilter;

static INSTALLED: Mutex<bool> = Mutex::new(false);

/// Errors encountered while installing the tracing subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// The filter expression could not be parsed.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Another global subscriber is already installed.
    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Install a global fmt subscriber writing to stderr.
///
/// Only the first successful call installs anything; later calls are no-ops,
/// including calls racing the first one from other threads.
pub fn init(filter: &str) -> Result<(), LoggerError> {
    let mut installed = INSTALLED.lock().unwrap_or_else(PoisonError::into_inner);
    if *installed {
        return Ok(());
    }
    tracing_subscriber::fmt()
        .with_env_filter(parse_filter(filter)?)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .try_init()
        .map_err(|e| LoggerError::Install(e.to_string()))?;
    *installed = true;
    Ok(())
}

fn parse_filter(filter: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(filter).map_err(|e| LoggerError::Filter(e.to_string()))
}

/// Named logging handle given to a protocol.
///
/// Every event is emitted inside a `protocol` span carrying the logger name.
#[derive(Debug, Clone)]
pub struct Logger {
    name: String,
    span: Span,
}

impl Logger {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let span = tracing::info_span!("protocol", logger = %name);
        Self { name, span }
    }

    /// A logger whose span is disabled; events still reach the subscriber
    /// without span context.
    pub fn silent() -> Self {
        Self {
            name: String::new(),
            span: Span::none(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn debug(&self, message: &str) {
        let _entered = self.span.enter();
        tracing::debug!("{message}");
    }

    pub fn info(&self, message: &str) {
        let _entered = self.span.enter();
        tracing::info!("{message}");
    }

    /// Info-level event tagged `outcome = "success"`.
    pub fn success(&self, message: &str) {
        let _entered = self.span.enter();
        tracing::info!(outcome = "success", "{message}");
    }

    pub fn warn(&self, message: &str) {
        let _entered = self.span.enter();
        tracing::warn!("{message}");
    }

    pub fn error(&self, message: &str) {
        let _entered = self.span.enter();
        tracing::error!("{message}");
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_NAME"))
    }
}

//! Error types surfaced by the protocol and by command handlers.
//!
//! Two families exist. [`ConfigError`] is raised once, when a
//! [`CommandProtocol`](crate::CommandProtocol) is constructed, and is the only
//! error that ever reaches a caller. [`CommandError`] is what handlers return;
//! the protocol never propagates it and instead encodes it into the
//! [`OutputMessage`](crate::OutputMessage).

use thiserror::Error;

/// Errors detected while assembling a protocol instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required configuration field was not provided.
    #[error("missing required configuration: {field}")]
    Missing { field: &'static str },
}

impl ConfigError {
    pub(crate) fn missing(field: &'static str) -> Self {
        Self::Missing { field }
    }
}

/// Errors produced while running a command handler or shaping its output.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The handler did not override [`ExecutableCommand::run`](crate::ExecutableCommand::run).
    #[error("method run() must be overridden")]
    NotImplemented,

    /// Handler-supplied failure text, shown as-is.
    #[error("{0}")]
    Message(String),

    /// The handler returned a value whose `content` could not be interpreted.
    #[error("malformed command output: {0}")]
    MalformedOutput(String),

    /// The handler panicked; the payload message is captured.
    #[error("command panicked: {0}")]
    Panicked(String),

    /// Any other failure bubbled up from handler code.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CommandError {
    /// Build a [`CommandError::Message`] from any string-like value.
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }
}

//! Input records and their tokenized command form.

use time::OffsetDateTime;

/// Raw text received by the protocol, stamped with its arrival time.
#[derive(Debug, Clone, PartialEq)]
pub struct InputMessage {
    /// Whitespace-delimited text; `None` when the input carried no value.
    pub value: Option<String>,
    pub time: OffsetDateTime,
}

impl InputMessage {
    /// Wrap `value`, stamped with the current UTC time.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            time: OffsetDateTime::now_utc(),
        }
    }

    /// An input record without any value.
    pub fn empty() -> Self {
        Self {
            value: None,
            time: OffsetDateTime::now_utc(),
        }
    }

    /// Replace the arrival time.
    pub fn with_time(mut self, time: OffsetDateTime) -> Self {
        self.time = time;
        self
    }

    /// The raw text, or `""` when absent.
    pub fn text(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }
}

/// Trim `value` and split it on runs of whitespace.
pub fn tokenize(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_owned).collect()
}

/// Structured form of a command invocation.
///
/// `argv` never contains the command name: handlers only see their arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandMessage {
    name: String,
    argv: Vec<String>,
}

impl CommandMessage {
    /// Build a message from its parts.
    pub fn new(name: impl Into<String>, argv: Vec<String>) -> Self {
        Self {
            name: name.into(),
            argv,
        }
    }

    /// Parse a raw token list where the first token is the command name.
    ///
    /// An empty list yields an empty name and no arguments.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Self {
        match tokens.split_first() {
            Some((name, rest)) => Self::new(
                name.as_ref(),
                rest.iter().map(|t| t.as_ref().to_owned()).collect(),
            ),
            None => Self::default(),
        }
    }

    /// Name of the command this message was addressed to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arguments following the command name.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Alias of [`CommandMessage::argv`].
    pub fn args(&self) -> &[String] {
        &self.argv
    }
}

//! Handler results and the normalised output envelope.

use crate::error::CommandError;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Content produced when a handler returns nothing recognisable.
pub const FALLBACK_CONTENT: [&str; 2] = ["Command executed.", "(no output data)"];

/// Key injected into every [`OutputMessage::meta`].
pub const SOURCE_KEY: &str = "source";

/// Output priority; higher is more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Priority(pub i32);

impl Priority {
    pub const NORMAL: Self = Self(0);
    pub const CRITICAL: Self = Self(100);
}

/// Structured result a handler may return instead of plain text.
#[derive(Debug, Default)]
pub struct HandlerOutput {
    /// Without content the result is treated as carrying no output data.
    pub content: Option<Vec<String>>,
    pub priority: Option<Priority>,
    pub meta: Map<String, Value>,
    pub error: Option<CommandError>,
}

impl HandlerOutput {
    pub fn new(content: Vec<String>) -> Self {
        Self {
            content: Some(content),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn with_error(mut self, error: CommandError) -> Self {
        self.error = Some(error);
        self
    }
}

/// Everything a handler can hand back to the protocol.
#[derive(Debug)]
pub enum CommandResult {
    /// Single text block; trimmed on normalisation.
    Text(String),
    /// Ordered lines, kept as-is.
    Lines(Vec<String>),
    /// Structured result with optional priority, meta, and error.
    Output(HandlerOutput),
    /// Dynamically shaped JSON value.
    Value(Value),
    /// No output at all.
    None,
}

impl PartialEq for CommandResult {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Lines(a), Self::Lines(b)) => a == b,
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::None, Self::None) => true,
            (Self::Output(a), Self::Output(b)) => {
                a.content == b.content
                    && a.priority == b.priority
                    && a.meta == b.meta
                    && a.error.as_ref().map(ToString::to_string)
                        == b.error.as_ref().map(ToString::to_string)
            }
            _ => false,
        }
    }
}

impl From<String> for CommandResult {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for CommandResult {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<String>> for CommandResult {
    fn from(lines: Vec<String>) -> Self {
        Self::Lines(lines)
    }
}

impl From<HandlerOutput> for CommandResult {
    fn from(output: HandlerOutput) -> Self {
        Self::Output(output)
    }
}

impl From<Value> for CommandResult {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<()> for CommandResult {
    fn from(_: ()) -> Self {
        Self::None
    }
}

/// Normalised envelope returned by [`CommandProtocol::process`](crate::CommandProtocol::process).
#[derive(Debug, Serialize)]
pub struct OutputMessage {
    pub content: Vec<String>,
    pub priority: Priority,
    /// Always carries [`SOURCE_KEY`].
    pub meta: Map<String, Value>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<CommandError>,
}

impl OutputMessage {
    /// Shape a handler result according to its kind.
    ///
    /// Fails only when a dynamic [`CommandResult::Value`] carries a `content`
    /// field of an unusable type.
    pub fn normalize(result: CommandResult, source: &str) -> Result<Self, CommandError> {
        let output = match result {
            CommandResult::Text(text) => Self::lines(vec![text.trim().to_owned()], source),
            CommandResult::Lines(lines) => Self::lines(lines, source),
            CommandResult::Output(output) => Self::structured(output, source),
            CommandResult::Value(value) => return Self::from_value(value, source),
            CommandResult::None => Self::fallback(source),
        };
        Ok(output)
    }

    /// Critical envelope describing `error`.
    pub fn failure(error: CommandError, source: &str) -> Self {
        Self {
            content: vec![error.to_string()],
            priority: Priority::CRITICAL,
            meta: source_meta(source),
            error: Some(error),
        }
    }

    /// The `meta.source` value.
    pub fn source(&self) -> Option<&str> {
        self.meta.get(SOURCE_KEY).and_then(Value::as_str)
    }

    pub fn is_critical(&self) -> bool {
        self.priority >= Priority::CRITICAL
    }

    fn lines(content: Vec<String>, source: &str) -> Self {
        Self {
            content,
            priority: Priority::NORMAL,
            meta: source_meta(source),
            error: None,
        }
    }

    fn fallback(source: &str) -> Self {
        Self::lines(FALLBACK_CONTENT.map(str::to_owned).to_vec(), source)
    }

    fn structured(output: HandlerOutput, source: &str) -> Self {
        let Some(content) = output.content else {
            return Self::fallback(source);
        };
        let mut meta = output.meta;
        meta.insert(SOURCE_KEY.to_owned(), Value::from(source));
        Self {
            content,
            priority: output.priority.unwrap_or_default(),
            meta,
            error: output.error,
        }
    }

    fn from_value(value: Value, source: &str) -> Result<Self, CommandError> {
        match value {
            Value::String(text) => Ok(Self::lines(vec![text.trim().to_owned()], source)),
            Value::Array(items) => {
                let lines = items.into_iter().map(value_line).collect();
                Ok(Self::lines(lines, source))
            }
            Value::Object(mut fields) => match fields.remove("content") {
                Some(content) if !is_blank(&content) => {
                    Ok(Self::structured(handler_output(content, fields)?, source))
                }
                _ => Ok(Self::fallback(source)),
            },
            _ => Ok(Self::fallback(source)),
        }
    }
}

fn source_meta(source: &str) -> Map<String, Value> {
    let mut meta = Map::new();
    meta.insert(SOURCE_KEY.to_owned(), Value::from(source));
    meta
}

/// `null`, `false`, `0` and `""` count as no content at all.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn value_line(item: Value) -> String {
    match item {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Convert the remaining fields of a dynamic object result.
fn handler_output(
    content: Value,
    mut fields: Map<String, Value>,
) -> Result<HandlerOutput, CommandError> {
    let content = match content {
        Value::String(text) => vec![text],
        Value::Array(items) => items.into_iter().map(value_line).collect(),
        other => {
            return Err(CommandError::MalformedOutput(format!(
                "content must be a string or an array, got {other}"
            )));
        }
    };

    let priority = match fields.remove("priority") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let raw = value
                .as_i64()
                .and_then(|p| i32::try_from(p).ok())
                .ok_or_else(|| {
                    CommandError::MalformedOutput(format!(
                        "priority must be an integer, got {value}"
                    ))
                })?;
            Some(Priority(raw))
        }
    };

    let meta = match fields.remove("meta") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(meta)) => meta,
        Some(other) => {
            return Err(CommandError::MalformedOutput(format!(
                "meta must be an object, got {other}"
            )));
        }
    };

    let error = match fields.remove("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => None,
        Some(Value::String(text)) => Some(CommandError::Message(text)),
        Some(other) => Some(CommandError::Message(other.to_string())),
    };

    Ok(HandlerOutput {
        content: Some(content),
        priority,
        meta,
        error,
    })
}

fn serialize_error<S: Serializer>(
    error: &Option<CommandError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.serialize_str(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

use crate::command::{Command, CommandContext};
use crate::error::{CommandError, ConfigError};
use crate::logger::Logger;
use crate::message::{CommandMessage, InputMessage, tokenize};
use crate::output::OutputMessage;

/// One recorded processing attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub input: InputMessage,
    pub message: CommandMessage,
    pub time: OffsetDateTime,
}

impl HistoryEntry {
    /// Recording time as an RFC 3339 string.
    pub fn timestamp(&self) -> Result<String, time::error::Format> {
        self.time.format(&Rfc3339)
    }
}

/// Parts required to assemble a [`CommandProtocol`].
///
/// Every field is mandatory; [`CommandProtocol::new`] reports the first one
/// left unset.
pub struct ProtocolConfig<D> {
    pub command: Option<Command<D>>,
    pub db: Option<D>,
    pub logger: Option<Logger>,
}

impl<D> Default for ProtocolConfig<D> {
    fn default() -> Self {
        Self {
            command: None,
            db: None,
            logger: None,
        }
    }
}

impl<D> ProtocolConfig<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn command(mut self, command: impl Into<Command<D>>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn db(mut self, db: D) -> Self {
        self.db = Some(db);
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }
}

/// Gates, dispatches, and normalises input for a single configured command.
///
/// The protocol keeps an append-only history of every
/// [`process`](Self::process) call. `db` is shared with every handler
/// invocation and never touched by the protocol itself.
///
/// Example
/// ```
/// use command_protocol::{Command, CommandProtocol, InputMessage, Logger, ProtocolConfig};
/// use command_protocol::{CommandContext, CommandError, CommandMessage, CommandResult};
///
/// fn echo(
///     msg: &CommandMessage,
///     _ctx: &CommandContext<'_, ()>,
/// ) -> Result<CommandResult, CommandError> {
///     Ok(msg.argv().join(" ").into())
/// }
///
/// let protocol = CommandProtocol::new(
///     ProtocolConfig::new()
///         .command(Command::callable(echo))
///         .db(())
///         .logger(Logger::silent()),
/// )
/// .unwrap();
///
/// let input = InputMessage::new("echo hello universe");
/// assert!(protocol.accepts(&input));
/// let out = protocol.process(&input);
/// assert_eq!(out.content, ["hello universe"]);
/// assert_eq!(out.source(), Some("echo"));
/// ```
pub struct CommandProtocol<D> {
    command: Command<D>,
    db: Arc<D>,
    logger: Logger,
    history: Mutex<Vec<HistoryEntry>>,
}

impl<D> CommandProtocol<D> {
    /// Validate `config` and build the protocol.
    ///
    /// Fails with [`ConfigError::Missing`] naming the first absent field,
    /// checked in the order command, db, logger.
    pub fn new(config: ProtocolConfig<D>) -> Result<Self, ConfigError> {
        let ProtocolConfig { command, db, logger } = config;
        let command = command.ok_or_else(|| ConfigError::missing("command"))?;
        let db = db.ok_or_else(|| ConfigError::missing("db"))?;
        let logger = logger.ok_or_else(|| ConfigError::missing("logger"))?;
        Ok(Self {
            command,
            db: Arc::new(db),
            logger,
            history: Mutex::new(Vec::new()),
        })
    }

    /// Whether the first token of `input` names the configured command.
    pub fn accepts(&self, input: &InputMessage) -> bool {
        let Some(value) = input.value.as_deref().filter(|v| !v.is_empty()) else {
            return false;
        };
        let name = self.command.name();
        let accepted = value.split_whitespace().next() == Some(name);
        debug!(command = name, accepted, "checked input");
        accepted
    }

    /// Run the command for `input` and normalise its result.
    ///
    /// Never fails: handler errors and panics are reported as a critical
    /// [`OutputMessage`]. Every call appends exactly one history entry,
    /// before the handler runs.
    pub fn process(&self, input: &InputMessage) -> OutputMessage {
        let _entered = self.logger.span().enter();
        let source = self.command.name();
        match self.dispatch(input, source) {
            Ok(output) => {
                debug!(command = source, priority = output.priority.0, "command processed");
                output
            }
            Err(error) => {
                warn!(command = source, %error, "command failed");
                OutputMessage::failure(error, source)
            }
        }
    }

    fn dispatch(&self, input: &InputMessage, source: &str) -> Result<OutputMessage, CommandError> {
        let argv = tokenize(input.text());
        let raw = CommandMessage::parse(argv.as_slice());
        let message = CommandMessage::new(raw.name(), raw.argv().to_vec());

        self.lock_history().push(HistoryEntry {
            input: input.clone(),
            message: message.clone(),
            time: OffsetDateTime::now_utc(),
        });

        let ctx = CommandContext { db: &*self.db };
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.command.invoke(&message, &ctx)))
            .map_err(|payload| CommandError::Panicked(panic_message(payload.as_ref())))??;

        OutputMessage::normalize(result, source)
    }

    /// Snapshot of all processing attempts, in call order.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock_history().clone()
    }

    pub fn history_len(&self) -> usize {
        self.lock_history().len()
    }

    pub fn command(&self) -> &Command<D> {
        &self.command
    }

    /// The shared resource handle passed to handlers.
    pub fn db(&self) -> &Arc<D> {
        &self.db
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    // Entries are pushed whole, so a poisoned lock still guards a valid list.
    fn lock_history(&self) -> MutexGuard<'_, Vec<HistoryEntry>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "handler panicked".to_owned()
    }
}

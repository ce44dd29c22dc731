//! A minimal command-dispatch protocol.
//!
//! A [`CommandProtocol`] owns exactly one command handler. It checks whether
//! an [`InputMessage`] is addressed to that handler, runs it, and normalises
//! whatever the handler returns into an [`OutputMessage`]. Handler failures
//! never escape [`CommandProtocol::process`]; they come back as critical
//! output instead.
//!
//! Handlers are either structured ([`ExecutableCommand`] implementors) or
//! plain functions ([`CommandFn`]). Both are wrapped in [`Command`].

pub mod command;
pub mod error;
pub mod logger;
pub mod message;
pub mod output;
mod protocol;

pub use command::{BaseCommand, Command, CommandContext, CommandFn, ExecutableCommand};
pub use error::{CommandError, ConfigError};
pub use logger::Logger;
pub use message::{CommandMessage, InputMessage};
pub use output::{CommandResult, HandlerOutput, OutputMessage, Priority};
/// The protocol itself, plus its configuration and history records.
pub use protocol::{CommandProtocol, HistoryEntry, ProtocolConfig};

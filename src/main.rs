use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use argh::FromArgs;
use command_protocol::logger;
use command_protocol::{
    BaseCommand, Command, CommandContext, CommandError, CommandMessage, CommandProtocol,
    CommandResult, ExecutableCommand, HandlerOutput, InputMessage, Logger, OutputMessage,
    ProtocolConfig,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

#[derive(FromArgs)]
/// Playground for the command protocol: feed it lines and inspect the output envelopes.
struct Args {
    #[argh(option, default = "String::from(\"echo\")")]
    /// demo handler to configure: echo, upper, kv, or base.
    command: String,

    #[argh(option, default = "String::from(\"info\")")]
    /// tracing filter, e.g. "debug" or "command_protocol=debug".
    log: String,

    #[argh(switch)]
    /// print compact JSON instead of pretty JSON.
    compact: bool,

    #[argh(positional, greedy)]
    /// a single input line to process; starts a REPL when omitted.
    line: Vec<String>,
}

/// In-memory key-value store used as the resource handle.
#[derive(Debug, Default)]
struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

/// Echoes its arguments back, prefixed.
struct EchoCommand;

impl ExecutableCommand<MemoryStore> for EchoCommand {
    fn name(&self) -> Option<&str> {
        Some("echo")
    }

    fn run(
        &self,
        msg: &CommandMessage,
        _ctx: &CommandContext<'_, MemoryStore>,
    ) -> Result<CommandResult, CommandError> {
        Ok(format!("ECHO: {}", msg.argv().join(" ")).into())
    }
}

fn upper(
    msg: &CommandMessage,
    _ctx: &CommandContext<'_, MemoryStore>,
) -> Result<CommandResult, CommandError> {
    Ok(msg.argv().iter().map(|a| a.to_uppercase()).collect::<Vec<_>>().into())
}

/// `kv set <key> <value...>`, `kv get <key>`, `kv list`.
struct KvCommand;

impl ExecutableCommand<MemoryStore> for KvCommand {
    fn name(&self) -> Option<&str> {
        Some("kv")
    }

    fn run(
        &self,
        msg: &CommandMessage,
        ctx: &CommandContext<'_, MemoryStore>,
    ) -> Result<CommandResult, CommandError> {
        let mut entries = ctx
            .db
            .entries
            .lock()
            .map_err(|_| anyhow!("kv: store lock poisoned"))?;

        match msg.argv() {
            [op, key, value @ ..] if op == "set" && !value.is_empty() => {
                entries.insert(key.clone(), value.join(" "));
                Ok(HandlerOutput::new(vec![format!("{key} stored")])
                    .with_meta("op", "set")
                    .into())
            }
            [op, key] if op == "get" => {
                let value = entries
                    .get(key)
                    .with_context(|| format!("kv: no value stored under {key}"))?;
                Ok(HandlerOutput::new(vec![value.clone()])
                    .with_meta("op", "get")
                    .into())
            }
            [op] if op == "list" => Ok(entries
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .into()),
            _ => Err(CommandError::message(
                "usage: kv set <key> <value...> | kv get <key> | kv list",
            )),
        }
    }
}

fn demo_command(name: &str) -> Result<Command<MemoryStore>> {
    Ok(match name {
        "echo" => Command::executable(EchoCommand),
        "upper" => Command::callable(upper),
        "kv" => Command::executable(KvCommand),
        "base" => Command::executable(BaseCommand),
        other => return Err(anyhow!("unknown demo command: {other}")),
    })
}

struct Playground {
    protocol: CommandProtocol<MemoryStore>,
    compact: bool,
}

impl Playground {
    fn handle(&self, line: &str) -> Result<()> {
        let input = InputMessage::new(line);
        let logger = self.protocol.logger();
        logger.info(&format!("input: {line}"));

        let accepted = self.protocol.accepts(&input);
        logger.debug(&format!("accepted: {accepted}"));
        if !accepted {
            logger.warn(&format!(
                "not addressed to {}; processing anyway",
                self.protocol.command().name()
            ));
        }

        let out = self.protocol.process(&input);
        println!("{}", self.render(&out)?);
        let history = self.protocol.history();
        if let Some(entry) = history.last() {
            logger.info(&format!(
                "history length: {}, last recorded at {}",
                history.len(),
                entry.timestamp()?
            ));
        }
        Ok(())
    }

    fn render(&self, out: &OutputMessage) -> Result<String> {
        let text = if self.compact {
            serde_json::to_string(out)?
        } else {
            serde_json::to_string_pretty(out)?
        };
        Ok(text)
    }

    fn repl(&self) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;
        let prompt = format!("{}> ", self.protocol.command().name());

        loop {
            match rl.readline(&prompt) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => {
                    rl.add_history_entry(line.as_str())?;
                    if let Err(err) = self.handle(&line) {
                        self.protocol.logger().error(&format!("{err:#}"));
                    }
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }

        self.protocol.logger().success("playground closed");
        Ok(())
    }
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    logger::init(&args.log)?;

    let protocol = CommandProtocol::new(
        ProtocolConfig::new()
            .command(demo_command(&args.command)?)
            .db(MemoryStore::default())
            .logger(Logger::new("playground")),
    )?;
    let playground = Playground {
        protocol,
        compact: args.compact,
    };

    if args.line.is_empty() {
        playground.repl()?;
    } else {
        playground.handle(&args.line.join(" "))?;
    }
    Ok(())
}

use crate::error::CommandError;
use crate::message::CommandMessage;
use crate::output::CommandResult;

/// Name reported when a handler exposes neither an explicit nor a type name.
pub const UNKNOWN_COMMAND: &str = "unknown";

/// Execution context handed to every handler invocation.
///
/// `db` is the resource handle configured on the protocol, passed through
/// unchanged.
pub struct CommandContext<'a, D> {
    pub db: &'a D,
}

/// Object-safe trait for structured command handlers.
///
/// Implementors usually override [`ExecutableCommand::run`]. The default
/// implementation always fails with [`CommandError::NotImplemented`], so an
/// abstract handler can never be executed silently.
pub trait ExecutableCommand<D>: Send + Sync {
    /// Explicit routing name. Takes precedence over [`ExecutableCommand::type_name`].
    fn name(&self) -> Option<&str> {
        None
    }

    /// Short name of the implementing type, e.g. `EchoCommand`.
    fn type_name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Executes the command against `msg`.
    fn run(
        &self,
        _msg: &CommandMessage,
        _ctx: &CommandContext<'_, D>,
    ) -> Result<CommandResult, CommandError> {
        Err(CommandError::NotImplemented)
    }
}

/// The bare structured handler. Running it always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaseCommand;

impl<D> ExecutableCommand<D> for BaseCommand {}

type HandlerFn<D> = dyn Fn(&CommandMessage, &CommandContext<'_, D>) -> HandlerResult + Send + Sync;

type HandlerResult = Result<CommandResult, CommandError>;

/// Callable handler: a plain function standing in for a structured command.
///
/// Its identity is the explicit name given to [`CommandFn::named`], otherwise
/// the identifier of the function item. Closures have no identifier and
/// resolve to [`UNKNOWN_COMMAND`].
pub struct CommandFn<D> {
    name: Option<String>,
    type_name: &'static str,
    func: Box<HandlerFn<D>>,
}

impl<D> CommandFn<D> {
    /// Wrap `func`, identified by its own item name.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&CommandMessage, &CommandContext<'_, D>) -> Result<CommandResult, CommandError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: None,
            type_name: short_type_name(std::any::type_name::<F>()),
            func: Box::new(func),
        }
    }

    /// Wrap `func` under an explicit name.
    pub fn named<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&CommandMessage, &CommandContext<'_, D>) -> Result<CommandResult, CommandError>
            + Send
            + Sync
            + 'static,
    {
        let mut cmd = Self::new(func);
        cmd.name = Some(name.into());
        cmd
    }

    /// Explicit name, if one was assigned.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Identifier of the wrapped function item; empty for closures.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Call the wrapped function. Equivalent to `run` on a structured handler.
    pub fn call(
        &self,
        msg: &CommandMessage,
        ctx: &CommandContext<'_, D>,
    ) -> Result<CommandResult, CommandError> {
        (self.func)(msg, ctx)
    }
}

/// A configured handler: either a structured command or a plain function.
pub enum Command<D> {
    Executable(Box<dyn ExecutableCommand<D>>),
    Callable(CommandFn<D>),
}

impl<D> Command<D> {
    /// Wrap a structured handler.
    pub fn executable(cmd: impl ExecutableCommand<D> + 'static) -> Self {
        Self::Executable(Box::new(cmd))
    }

    /// Wrap a function item, identified by its own name.
    pub fn callable<F>(func: F) -> Self
    where
        F: Fn(&CommandMessage, &CommandContext<'_, D>) -> Result<CommandResult, CommandError>
            + Send
            + Sync
            + 'static,
    {
        Self::Callable(CommandFn::new(func))
    }

    /// Resolved identity used for routing and for `meta.source`.
    pub fn name(&self) -> &str {
        match self {
            Self::Executable(cmd) => resolve_name(cmd.name(), cmd.type_name()),
            Self::Callable(func) => resolve_name(func.name(), func.type_name()),
        }
    }

    /// Run the handler, dispatching on the variant.
    pub fn invoke(
        &self,
        msg: &CommandMessage,
        ctx: &CommandContext<'_, D>,
    ) -> Result<CommandResult, CommandError> {
        match self {
            Self::Executable(cmd) => cmd.run(msg, ctx),
            Self::Callable(func) => func.call(msg, ctx),
        }
    }
}

impl<D> From<CommandFn<D>> for Command<D> {
    fn from(func: CommandFn<D>) -> Self {
        Self::Callable(func)
    }
}

/// Pick the first non-empty candidate: explicit name, type name, then
/// [`UNKNOWN_COMMAND`].
pub fn resolve_name<'a>(explicit: Option<&'a str>, type_name: &'a str) -> &'a str {
    [explicit.unwrap_or_default(), type_name]
        .into_iter()
        .find(|candidate| !candidate.is_empty())
        .unwrap_or(UNKNOWN_COMMAND)
}

/// Reduce a fully qualified type name to its last path segment.
///
/// Generic parameters are dropped and closures map to `""`.
fn short_type_name(full: &'static str) -> &'static str {
    if full.contains("{{closure}}") {
        return "";
    }
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

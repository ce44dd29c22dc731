use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use command_protocol::{
    Command, CommandContext, CommandError, CommandFn, CommandMessage, CommandProtocol,
    CommandResult, ExecutableCommand, HandlerOutput, InputMessage, Logger, Priority,
    ProtocolConfig,
};
use rstest::rstest;
use serde_json::{Value, json};

fn protocol<D>(command: impl Into<Command<D>>, db: D) -> CommandProtocol<D> {
    CommandProtocol::new(
        ProtocolConfig::new()
            .command(command)
            .db(db)
            .logger(Logger::silent()),
    )
    .unwrap()
}

struct Echo;

impl ExecutableCommand<()> for Echo {
    fn name(&self) -> Option<&str> {
        Some("echo")
    }

    fn run(
        &self,
        msg: &CommandMessage,
        _ctx: &CommandContext<'_, ()>,
    ) -> Result<CommandResult, CommandError> {
        Ok(msg.argv().join(" ").into())
    }
}

struct Ping;

impl ExecutableCommand<()> for Ping {
    fn run(
        &self,
        msg: &CommandMessage,
        _ctx: &CommandContext<'_, ()>,
    ) -> Result<CommandResult, CommandError> {
        Ok(format!("PONG {}", msg.argv().join("-")).into())
    }
}

fn upper(
    msg: &CommandMessage,
    _ctx: &CommandContext<'_, ()>,
) -> Result<CommandResult, CommandError> {
    Ok(msg.argv().iter().map(|a| a.to_uppercase()).collect::<Vec<_>>().into())
}

fn object_cmd(
    msg: &CommandMessage,
    _ctx: &CommandContext<'_, ()>,
) -> Result<CommandResult, CommandError> {
    let mut content = vec!["custom".to_owned()];
    content.extend(msg.argv().iter().cloned());
    Ok(HandlerOutput::new(content)
        .with_priority(Priority(7))
        .with_meta("extra", true)
        .with_meta("source", "handler")
        .into())
}

fn number_cmd(
    _msg: &CommandMessage,
    _ctx: &CommandContext<'_, ()>,
) -> Result<CommandResult, CommandError> {
    Ok(json!(12345).into())
}

fn boom(
    _msg: &CommandMessage,
    _ctx: &CommandContext<'_, ()>,
) -> Result<CommandResult, CommandError> {
    Err(CommandError::message("boom"))
}

#[test]
fn echo_scenario() {
    let protocol = protocol(Command::executable(Echo), ());
    let input = InputMessage::new("echo hello universe");

    assert!(protocol.accepts(&input));

    let out = protocol.process(&input);
    assert_eq!(out.content, ["hello universe"]);
    assert_eq!(out.priority, Priority::NORMAL);
    assert_eq!(Value::Object(out.meta), json!({ "source": "echo" }));
    assert!(out.error.is_none());
}

#[test]
fn structured_handler_resolves_type_name() {
    let protocol = protocol(Command::executable(Ping), ());
    let input = InputMessage::new("Ping hello world");

    let out = protocol.process(&input);
    assert_eq!(out.content, ["PONG hello-world"]);
    assert_eq!(out.source(), Some("Ping"));
    assert_eq!(out.priority, Priority::NORMAL);

    let history = protocol.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].input, input);
}

#[test]
fn callable_returning_lines() {
    let protocol = protocol(CommandFn::named("Upper", upper), ());
    let out = protocol.process(&InputMessage::new("Upper one two"));

    assert_eq!(out.content, ["ONE", "TWO"]);
    assert_eq!(out.source(), Some("Upper"));
}

#[test]
fn callable_uses_function_identifier() {
    let protocol = protocol(Command::callable(upper), ());
    let input = InputMessage::new("upper a");

    assert!(protocol.accepts(&input));
    assert!(!protocol.accepts(&InputMessage::new("Upper a")));
    assert_eq!(protocol.process(&input).source(), Some("upper"));
}

#[test]
fn structured_output_keeps_priority_and_overrides_source() {
    let protocol = protocol(CommandFn::named("ObjectCmd", object_cmd), ());
    let out = protocol.process(&InputMessage::new("ObjectCmd a b"));

    assert_eq!(out.content, ["custom", "a", "b"]);
    assert_eq!(out.priority, Priority(7));
    assert_eq!(
        Value::Object(out.meta),
        json!({ "extra": true, "source": "ObjectCmd" })
    );
}

#[test]
fn unrecognised_result_falls_back() {
    let protocol = protocol(CommandFn::named("NumberCmd", number_cmd), ());
    let out = protocol.process(&InputMessage::new("NumberCmd foo"));

    assert_eq!(out.content, ["Command executed.", "(no output data)"]);
    assert_eq!(out.source(), Some("NumberCmd"));
    assert_eq!(out.priority, Priority::NORMAL);
}

#[test]
fn handler_error_is_reported_as_critical() {
    let protocol = protocol(CommandFn::named("BoomCmd", boom), ());
    let out = protocol.process(&InputMessage::new("BoomCmd anything"));

    assert_eq!(out.content, ["boom"]);
    assert_eq!(out.priority, Priority::CRITICAL);
    assert_eq!(out.source(), Some("BoomCmd"));
    let error = out.error.expect("error should be populated");
    assert!(matches!(error, CommandError::Message(_)));
    assert_eq!(error.to_string(), "boom");
}

#[test]
fn anonymous_closure_reports_unknown_source() {
    let protocol = protocol(
        Command::callable(|_: &CommandMessage, _: &CommandContext<'_, ()>| {
            Err(anyhow::anyhow!("closure failed").into())
        }),
        (),
    );

    assert!(protocol.accepts(&InputMessage::new("unknown x")));
    let out = protocol.process(&InputMessage::new("whatever"));
    assert_eq!(out.content, ["closure failed"]);
    assert_eq!(out.source(), Some("unknown"));
}

#[rstest]
#[case(CommandFn::named("c", upper), "c a b")]
#[case(CommandFn::named("c", boom), "c a b")]
#[case(CommandFn::named("c", number_cmd), "")]
#[case(CommandFn::named("c", boom), "not-c")]
fn history_grows_by_one_per_call(#[case] command: CommandFn<()>, #[case] line: &str) {
    let protocol = protocol(command, ());
    for expected in 1..=3 {
        protocol.process(&InputMessage::new(line));
        assert_eq!(protocol.history_len(), expected);
    }
}

#[test]
fn history_preserves_call_order() {
    let protocol = protocol(CommandFn::named("c", boom), ());
    for line in ["c first", "c second", "c third"] {
        protocol.process(&InputMessage::new(line));
    }
    let args: Vec<String> = protocol
        .history()
        .iter()
        .map(|entry| entry.message.argv().join(" "))
        .collect();
    assert_eq!(args, ["first", "second", "third"]);
}

#[derive(Default)]
struct Counter {
    calls: AtomicUsize,
}

struct CountingCommand;

impl ExecutableCommand<Counter> for CountingCommand {
    fn name(&self) -> Option<&str> {
        Some("count")
    }

    fn run(
        &self,
        _msg: &CommandMessage,
        ctx: &CommandContext<'_, Counter>,
    ) -> Result<CommandResult, CommandError> {
        let n = ctx.db.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(n.to_string().into())
    }
}

#[test]
fn db_is_shared_across_calls() {
    let protocol = protocol(Command::executable(CountingCommand), Counter::default());

    protocol.process(&InputMessage::new("count"));
    let out = protocol.process(&InputMessage::new("count"));

    assert_eq!(out.content, ["2"]);
    assert_eq!(protocol.db().calls.load(Ordering::SeqCst), 2);
}

#[test]
fn concurrent_processing_records_every_call() {
    let protocol = Arc::new(protocol(Command::executable(CountingCommand), Counter::default()));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let protocol = Arc::clone(&protocol);
            thread::spawn(move || {
                for i in 0..25 {
                    let out = protocol.process(&InputMessage::new(format!("count {worker} {i}")));
                    assert_eq!(out.priority, Priority::NORMAL);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(protocol.history_len(), 200);
    assert_eq!(protocol.db().calls.load(Ordering::SeqCst), 200);

    // each worker's entries stay in its own call order
    let history = protocol.history();
    for worker in 0..8 {
        let seen: Vec<usize> = history
            .iter()
            .filter(|entry| entry.message.argv()[0] == worker.to_string())
            .map(|entry| entry.message.argv()[1].parse().unwrap())
            .collect();
        assert_eq!(seen, (0..25).collect::<Vec<_>>());
    }
}

fn null_content_cmd(
    _msg: &CommandMessage,
    _ctx: &CommandContext<'_, ()>,
) -> Result<CommandResult, CommandError> {
    Ok(json!({ "content": null, "priority": 3 }).into())
}

#[test]
fn dynamic_result_without_content_falls_back() {
    let protocol = protocol(CommandFn::named("NullCmd", null_content_cmd), ());
    let out = protocol.process(&InputMessage::new("NullCmd"));

    assert_eq!(out.content, ["Command executed.", "(no output data)"]);
    assert_eq!(out.priority, Priority::NORMAL);
    assert!(out.error.is_none());
}

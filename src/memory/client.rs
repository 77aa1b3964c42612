//! Callback-style client and batch over the in-memory store.
//!
//! Arguments are coerced to their wire form the way a loosely typed client
//! would: strings as-is, arrays joined with `,`, objects as `[object Object]`.
//! Nothing here knows about futures or the codec.

use bytes::Bytes;
use serde_json::{Number, Value};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, trace};

use super::commands::{CommandHandler, Reply};
use super::store::Store;
use crate::error::CommandError;
use crate::method::{Arity, BuilderFn, CallbackFn, Completion, FactoryFn, Method, MethodTable};
use crate::module::{Module, BATCH_METHOD, EXEC_METHOD};

/// Reference list of remote command names.
///
/// Entries may carry a subcommand (`"config get"`); only the first token
/// names a client method. Many entries have no counterpart on the in-memory
/// client and are skipped by discovery.
pub const COMMANDS: &[&str] = &[
    "append", "auth", "bgsave", "bitcount", "blpop", "brpop", "client kill", "client list",
    "client getname", "client setname", "config get", "config set", "config resetstat",
    "dbsize", "decr", "decrby", "del", "discard", "echo", "exec", "exists", "expire",
    "expireat", "flushall", "flushdb", "get", "getbit", "getrange", "getset", "hdel",
    "hexists", "hget", "hgetall", "hincrby", "hkeys", "hlen", "hmget", "hmset", "hset",
    "hsetnx", "hvals", "incr", "incrby", "incrbyfloat", "info", "keys", "lindex", "linsert",
    "llen", "lpop", "lpush", "lpushx", "lrange", "lrem", "lset", "ltrim", "mget", "monitor",
    "move", "mset", "msetnx", "multi", "object", "persist", "pexpire", "pexpireat", "ping",
    "psetex", "psubscribe", "pttl", "publish", "punsubscribe", "quit", "randomkey",
    "rename", "renamenx", "rpop", "rpoplpush", "rpush", "rpushx", "sadd", "save", "scard",
    "script exists", "script flush", "script kill", "script load", "sdiff", "select", "set",
    "setbit", "setex", "setnx", "setrange", "shutdown", "sinter", "sismember", "smembers",
    "smove", "sort", "spop", "srandmember", "srem", "strlen", "subscribe", "sunion", "sync",
    "time", "ttl", "type", "unsubscribe", "unwatch", "watch", "zadd", "zcard", "zcount",
    "zincrby", "zrange", "zrangebyscore", "zrank", "zrem", "zrevrange", "zscore",
];

/// Coerces a value to the bytes sent for it.
pub fn to_wire(value: &Value) -> Bytes {
    Bytes::from(coerce(value))
}

fn coerce(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number(n),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => coerce(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

// Integral floats print without a fractional part.
fn number(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

/// A lone array argument stands for the whole argument list.
fn wire_args(args: Vec<Value>) -> Vec<Bytes> {
    match <[Value; 1]>::try_from(args) {
        Ok([Value::Array(items)]) => items.iter().map(to_wire).collect(),
        Ok([single]) => vec![to_wire(&single)],
        Err(args) => args.iter().map(to_wire).collect(),
    }
}

/// Hands `outcome` to `done` on a fresh task, or inline outside a runtime.
fn complete(done: Completion, outcome: Result<Value, CommandError>) {
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move { done(outcome) });
        }
        Err(_) => done(outcome),
    }
}

/// A client whose commands report through completion callbacks.
#[derive(Debug, Clone)]
pub struct MemoryClient {
    handler: CommandHandler,
}

impl MemoryClient {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        self.handler.store()
    }

    /// Runs `command` and reports its reply through `done`.
    pub fn send_command(&self, command: &str, args: Vec<Value>, done: Completion) {
        let args = wire_args(args);
        let reply = self.handler.execute(command, &args);
        debug!(command = %command, args = args.len(), error = reply.is_error(), "command executed");
        complete(done, reply.into_outcome());
    }

    pub fn quit(&self, done: Completion) {
        complete(done, Ok(Value::String("OK".to_string())));
    }

    /// Opens an empty batch.
    pub fn multi(&self) -> MemoryBatch {
        MemoryBatch {
            handler: self.handler.clone(),
            queued: Vec::new(),
        }
    }
}

/// Commands queued for one `exec`.
#[derive(Debug, Clone)]
pub struct MemoryBatch {
    handler: CommandHandler,
    queued: Vec<(String, Vec<Bytes>)>,
}

impl MemoryBatch {
    pub fn queue(&mut self, command: &str, args: Vec<Value>) {
        trace!(command = %command, position = self.queued.len(), "command queued");
        self.queued.push((command.to_string(), wire_args(args)));
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Runs every queued command in order.
    ///
    /// Completes with the ordered replies, or with the first failure. Unlike
    /// node_redis, which puts error objects inside the reply array, a failed
    /// command fails the whole `exec` with [`CommandError::Batch`].
    pub fn exec(&self, done: Completion) {
        let replies: Vec<Reply> = self
            .queued
            .iter()
            .map(|(command, args)| self.handler.execute(command, args))
            .collect();
        debug!(commands = replies.len(), "batch executed");

        let failed = replies.iter().enumerate().find_map(|(index, reply)| match reply {
            Reply::Error(message) => Some(CommandError::Batch {
                index,
                message: message.clone(),
            }),
            _ => None,
        });
        let outcome = match failed {
            Some(err) => Err(err),
            None => Ok(Value::Array(replies.into_iter().map(Reply::into_value).collect())),
        };
        complete(done, outcome);
    }
}

/// Builds the method tables of the in-memory client library.
pub fn module() -> Module<MemoryClient, MemoryBatch> {
    let mut client: MethodTable<CallbackFn<MemoryClient>> = MethodTable::new();
    let mut builders: MethodTable<BuilderFn<MemoryBatch>> = MethodTable::new();

    for &command in CommandHandler::SUPPORTED {
        let name = command.to_string();
        client.define(
            command,
            Arity::Variadic,
            Arc::new(move |c: &MemoryClient, args: Vec<Value>, done: Completion| {
                c.send_command(&name, args, done)
            }),
        );
        let name = command.to_string();
        builders.define(
            command,
            Arity::Variadic,
            Arc::new(move |b: &mut MemoryBatch, args: Vec<Value>| b.queue(&name, args)),
        );
    }

    client.define(
        "quit",
        Arity::Fixed(0),
        Arc::new(|c: &MemoryClient, _: Vec<Value>, done: Completion| c.quit(done)),
    );
    // Lowercase only, so never taken for a command.
    client.insert(
        "send_command",
        Method::new(
            Arity::Variadic,
            Arc::new(|c: &MemoryClient, args: Vec<Value>, done: Completion| {
                let mut args = args.into_iter();
                match args.next() {
                    Some(Value::String(command)) => c.send_command(&command, args.collect(), done),
                    _ => complete(
                        done,
                        Err(CommandError::reply("ERR send_command requires a command name")),
                    ),
                }
            }),
        ),
    );

    let mut factories: MethodTable<FactoryFn<MemoryClient, MemoryBatch>> = MethodTable::new();
    factories.define(
        BATCH_METHOD,
        Arity::Variadic,
        Arc::new(|c: &MemoryClient, _: Vec<Value>| c.multi()),
    );

    let mut executors: MethodTable<CallbackFn<MemoryBatch>> = MethodTable::new();
    executors.define(
        EXEC_METHOD,
        Arity::Variadic,
        Arc::new(|b: &MemoryBatch, _: Vec<Value>, done: Completion| b.exec(done)),
    );

    Module {
        client,
        factories,
        builders,
        executors,
        commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::discover;
    use serde_json::json;
    use tokio::sync::oneshot;

    fn client() -> MemoryClient {
        MemoryClient::new(Arc::new(Store::new()))
    }

    fn capture() -> (Completion, oneshot::Receiver<Result<Value, CommandError>>) {
        let (tx, rx) = oneshot::channel();
        let done: Completion = Box::new(move |outcome| {
            let _ = tx.send(outcome);
        });
        (done, rx)
    }

    #[test]
    fn test_coercion_follows_loose_string_conversion() {
        assert_eq!(to_wire(&json!("FOO")), Bytes::from("FOO"));
        assert_eq!(to_wire(&json!(123)), Bytes::from("123"));
        assert_eq!(to_wire(&json!(1.5)), Bytes::from("1.5"));
        assert_eq!(to_wire(&json!(2.0)), Bytes::from("2"));
        assert_eq!(to_wire(&json!(true)), Bytes::from("true"));
        assert_eq!(to_wire(&Value::Null), Bytes::from("null"));
        assert_eq!(to_wire(&json!(["BAZ", 123, true])), Bytes::from("BAZ,123,true"));
        assert_eq!(to_wire(&json!([1, null, [2, 3]])), Bytes::from("1,,2,3"));
        assert_eq!(to_wire(&json!({"str": "QUX"})), Bytes::from("[object Object]"));
    }

    #[test]
    fn test_single_array_argument_is_flattened() {
        assert_eq!(
            wire_args(vec![json!(["a", "b"])]),
            vec![Bytes::from("a"), Bytes::from("b")]
        );
        assert_eq!(wire_args(vec![json!("a")]), vec![Bytes::from("a")]);
        assert_eq!(
            wire_args(vec![json!("k"), json!(["a", "b"])]),
            vec![Bytes::from("k"), Bytes::from("a,b")]
        );
    }

    #[test]
    fn test_completes_inline_without_runtime() {
        let client = client();
        let (done, mut rx) = capture();
        client.send_command("set", vec![json!("k"), json!("v")], done);
        assert_eq!(rx.try_recv().unwrap(), Ok(json!("OK")));
    }

    #[tokio::test]
    async fn test_completes_on_spawned_task() {
        let client = client();
        let (done, rx) = capture();
        client.send_command("get", vec![json!("missing")], done);
        assert_eq!(rx.await.unwrap(), Ok(Value::Null));
    }

    #[tokio::test]
    async fn test_error_reply_is_forwarded() {
        let client = client();
        let (done, rx) = capture();
        client.send_command("lpush", vec![json!("k")], done);
        assert_eq!(
            rx.await.unwrap(),
            Err(CommandError::reply(
                "ERR wrong number of arguments for 'lpush' command"
            ))
        );
    }

    #[tokio::test]
    async fn test_exec_returns_ordered_replies() {
        let client = client();
        let mut batch = client.multi();
        batch.queue("set", vec![json!("a"), json!("1")]);
        batch.queue("incr", vec![json!("a")]);
        batch.queue("get", vec![json!("a")]);
        assert_eq!(batch.len(), 3);

        let (done, rx) = capture();
        batch.exec(done);
        assert_eq!(rx.await.unwrap(), Ok(json!(["OK", 2, "2"])));
    }

    #[tokio::test]
    async fn test_exec_reports_first_failure() {
        let client = client();
        let mut batch = client.multi();
        batch.queue("set", vec![json!("s"), json!("x")]);
        batch.queue("incr", vec![json!("s")]);
        batch.queue("bogus", vec![]);

        let (done, rx) = capture();
        batch.exec(done);
        assert_eq!(
            rx.await.unwrap(),
            Err(CommandError::Batch {
                index: 1,
                message: "ERR value is not an integer or out of range".to_string()
            })
        );
        // Commands before and after the failure still ran.
        assert_eq!(client.store().get(&Bytes::from("s")).unwrap(), Some(Bytes::from("x")));
    }

    #[test]
    fn test_huge_expiry_is_an_error_reply() {
        let client = client();
        let (done, mut rx) = capture();
        client.send_command(
            "set",
            vec![json!("k"), json!("v"), json!("EX"), json!("9223372036854775807")],
            done,
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Err(CommandError::reply("ERR invalid expire time in 'set' command"))
        );
    }

    #[test]
    fn test_empty_batch_execs_to_empty_array() {
        let batch = client().multi();
        assert!(batch.is_empty());
        let (done, mut rx) = capture();
        batch.exec(done);
        assert_eq!(rx.try_recv().unwrap(), Ok(json!([])));
    }

    #[test]
    fn test_module_tables() {
        let module = module();
        assert!(module.client.get("get").unwrap().same_function(module.client.get("GET").unwrap()));
        assert_eq!(module.client.get("quit").unwrap().arity(), Arity::Fixed(0));
        assert!(module.client.contains("send_command"));
        assert!(!module.client.contains("SEND_COMMAND"));
        assert!(module.factories.contains("multi") && module.factories.contains("MULTI"));
        assert!(module.executors.contains("exec") && module.executors.contains("EXEC"));
        assert!(module.builders.contains("mget"));
        assert!(!module.builders.contains("quit"));
    }

    #[test]
    fn test_discovery_over_reference_list() {
        let module = module();
        let found = discover(&module.client, &module.commands);
        assert!(found.contains(&"get".to_string()));
        assert!(found.contains(&"lrange".to_string()));
        assert!(!found.contains(&"quit".to_string()));
        assert!(!found.contains(&"client".to_string()));
        assert!(!found.contains(&"hget".to_string()));
        assert!(!found.contains(&"multi".to_string()));
        assert_eq!(found.len(), CommandHandler::SUPPORTED.len());
    }

    #[test]
    fn test_send_command_helper() {
        let module = module();
        let client = client();
        let helper = module.client.get("send_command").unwrap().func().clone();

        let (done, mut rx) = capture();
        helper(&client, vec![json!("mset"), json!(["a", "1", "b", "2"])], done);
        assert_eq!(rx.try_recv().unwrap(), Ok(json!("OK")));

        let (done, mut rx) = capture();
        helper(&client, vec![json!(42)], done);
        assert!(rx.try_recv().unwrap().is_err());
    }
}

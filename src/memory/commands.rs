//! Command Dispatch
//!
//! Executes one command against the [`Store`] and produces a [`Reply`].
//! Arguments arrive already coerced to bytes by the client.
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  execute()  │───>│  dispatch() │───>│   cmd_*()   │───> Store
//! └─────────────┘    └─────────────┘    └─────────────┘
//! ```

use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::store::{deadline, End, SetCondition, Store, StoreError};
use crate::error::CommandError;

/// A reply from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Status(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Nil,
    Array(Vec<Reply>),
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Status("OK".to_string())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error(message.into())
    }

    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Reply::Bulk(data.into())
    }

    fn optional(data: Option<Bytes>) -> Self {
        data.map(Reply::Bulk).unwrap_or(Reply::Nil)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Converts the reply into a value, keeping nested error text as a string.
    pub fn into_value(self) -> Value {
        match self {
            Reply::Status(s) | Reply::Error(s) => Value::String(s),
            Reply::Integer(n) => Value::from(n),
            Reply::Bulk(data) => Value::String(String::from_utf8_lossy(&data).into_owned()),
            Reply::Nil => Value::Null,
            Reply::Array(items) => Value::Array(items.into_iter().map(Reply::into_value).collect()),
        }
    }

    /// Converts the reply into what a completion handler receives.
    pub fn into_outcome(self) -> Result<Value, CommandError> {
        match self {
            Reply::Error(message) => Err(CommandError::Reply(message)),
            other => Ok(other.into_value()),
        }
    }
}

impl From<StoreError> for Reply {
    fn from(err: StoreError) -> Self {
        Reply::Error(err.to_string())
    }
}

fn wrong_args(command: &str) -> Reply {
    Reply::error(format!(
        "ERR wrong number of arguments for '{}' command",
        command.to_lowercase()
    ))
}

fn invalid_expire(command: &str) -> Reply {
    Reply::error(format!("ERR invalid expire time in '{}' command", command))
}

/// A positive expiry whose deadline fits in an `Instant`.
fn expiry(amount: i64, unit: fn(u64) -> Duration) -> Option<Duration> {
    let amount = u64::try_from(amount).ok().filter(|&n| n > 0)?;
    let ttl = unit(amount);
    deadline(ttl).map(|_| ttl)
}

fn integer_arg(arg: &Bytes) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

fn string_arg(arg: &Bytes) -> String {
    String::from_utf8_lossy(arg).into_owned()
}

/// Dispatches commands against a shared store.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    store: Arc<Store>,
}

impl CommandHandler {
    /// Commands this handler understands, lowercase.
    pub const SUPPORTED: &'static [&'static str] = &[
        "append", "dbsize", "decr", "decrby", "del", "echo", "exists", "expire", "flushdb",
        "get", "getset", "incr", "incrby", "keys", "llen", "lpop", "lpush", "lrange", "mget",
        "mset", "persist", "ping", "rename", "rpop", "rpush", "set", "setex", "setnx",
        "strlen", "ttl", "type",
    ];

    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Executes `command` with `args`.
    pub fn execute(&self, command: &str, args: &[Bytes]) -> Reply {
        let command = command.to_uppercase();
        self.dispatch(&command, args)
    }

    fn dispatch(&self, cmd: &str, args: &[Bytes]) -> Reply {
        let result = match cmd {
            // Strings
            "SET" => self.cmd_set(args),
            "GET" => self.cmd_get(args),
            "GETSET" => self.cmd_getset(args),
            "SETNX" => self.cmd_setnx(args),
            "SETEX" => self.cmd_setex(args),
            "MSET" => self.cmd_mset(args),
            "MGET" => self.cmd_mget(args),
            "APPEND" => self.cmd_append(args),
            "STRLEN" => self.cmd_strlen(args),
            "INCR" => self.cmd_incr_by(cmd, args, 1, false),
            "DECR" => self.cmd_incr_by(cmd, args, -1, false),
            "INCRBY" => self.cmd_incr_by(cmd, args, 1, true),
            "DECRBY" => self.cmd_incr_by(cmd, args, -1, true),

            // Lists
            "LPUSH" => self.cmd_push(cmd, args, End::Front),
            "RPUSH" => self.cmd_push(cmd, args, End::Back),
            "LPOP" => self.cmd_pop(cmd, args, End::Front),
            "RPOP" => self.cmd_pop(cmd, args, End::Back),
            "LLEN" => self.cmd_llen(args),
            "LRANGE" => self.cmd_lrange(args),

            // Keys
            "DEL" => self.cmd_del(args),
            "EXISTS" => self.cmd_exists(args),
            "EXPIRE" => self.cmd_expire(args),
            "TTL" => self.cmd_ttl(args),
            "PERSIST" => self.cmd_persist(args),
            "KEYS" => self.cmd_keys(args),
            "TYPE" => self.cmd_type(args),
            "RENAME" => self.cmd_rename(args),

            // Server
            "PING" => Ok(match args {
                [] => Reply::Status("PONG".to_string()),
                [message] => Reply::bulk(message.clone()),
                _ => wrong_args(cmd),
            }),
            "ECHO" => Ok(match args {
                [message] => Reply::bulk(message.clone()),
                _ => wrong_args(cmd),
            }),
            "DBSIZE" => Ok(Reply::Integer(self.store.len() as i64)),
            "FLUSHDB" => {
                self.store.flush();
                Ok(Reply::ok())
            }

            _ => Ok(Reply::error(format!(
                "ERR unknown command '{}'",
                cmd.to_lowercase()
            ))),
        };

        result.unwrap_or_else(Reply::from)
    }

    // ========================================================================
    // String Commands
    // ========================================================================

    /// SET key value [EX seconds] [PX milliseconds] [NX|XX]
    fn cmd_set(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        let [key, value, options @ ..] = args else {
            return Ok(wrong_args("set"));
        };

        let mut ttl = None;
        let mut condition = SetCondition::Always;
        let mut options = options.iter();
        while let Some(option) = options.next() {
            match string_arg(option).to_uppercase().as_str() {
                unit @ ("EX" | "PX") => {
                    let unit = if unit == "EX" {
                        Duration::from_secs
                    } else {
                        Duration::from_millis
                    };
                    match options.next().and_then(integer_arg).and_then(|n| expiry(n, unit)) {
                        Some(duration) => ttl = Some(duration),
                        None => return Ok(invalid_expire("set")),
                    }
                }
                "NX" => condition = SetCondition::IfAbsent,
                "XX" => condition = SetCondition::IfPresent,
                _ => return Ok(Reply::error("ERR syntax error")),
            }
        }

        let stored = self
            .store
            .set_if(key.clone(), value.clone(), ttl, condition);
        Ok(if stored { Reply::ok() } else { Reply::Nil })
    }

    /// GET key
    fn cmd_get(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        let [key] = args else {
            return Ok(wrong_args("get"));
        };
        Ok(Reply::optional(self.store.get(key)?))
    }

    /// GETSET key value
    fn cmd_getset(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        let [key, value] = args else {
            return Ok(wrong_args("getset"));
        };
        Ok(Reply::optional(self.store.getset(key.clone(), value.clone())?))
    }

    /// SETNX key value
    fn cmd_setnx(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        let [key, value] = args else {
            return Ok(wrong_args("setnx"));
        };
        let stored = self
            .store
            .set_if(key.clone(), value.clone(), None, SetCondition::IfAbsent);
        Ok(Reply::Integer(stored as i64))
    }

    /// SETEX key seconds value
    fn cmd_setex(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        let [key, seconds, value] = args else {
            return Ok(wrong_args("setex"));
        };
        match integer_arg(seconds).and_then(|secs| expiry(secs, Duration::from_secs)) {
            Some(ttl) => {
                self.store.set_with_ttl(key.clone(), value.clone(), ttl);
                Ok(Reply::ok())
            }
            None => Ok(invalid_expire("setex")),
        }
    }

    /// MSET key value [key value ...]
    fn cmd_mset(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        if args.is_empty() || args.len() % 2 != 0 {
            return Ok(wrong_args("mset"));
        }
        for pair in args.chunks_exact(2) {
            self.store.set(pair[0].clone(), pair[1].clone());
        }
        Ok(Reply::ok())
    }

    /// MGET key [key ...]
    ///
    /// Keys holding a non-string value read as nil.
    fn cmd_mget(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        if args.is_empty() {
            return Ok(wrong_args("mget"));
        }
        let values = args
            .iter()
            .map(|key| Reply::optional(self.store.get(key).unwrap_or(None)))
            .collect();
        Ok(Reply::Array(values))
    }

    /// APPEND key value
    fn cmd_append(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        let [key, value] = args else {
            return Ok(wrong_args("append"));
        };
        Ok(Reply::Integer(self.store.append(key, value)? as i64))
    }

    /// STRLEN key
    fn cmd_strlen(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        let [key] = args else {
            return Ok(wrong_args("strlen"));
        };
        Ok(Reply::Integer(self.store.strlen(key)? as i64))
    }

    /// INCR / DECR key, INCRBY / DECRBY key amount
    fn cmd_incr_by(
        &self,
        cmd: &str,
        args: &[Bytes],
        sign: i64,
        with_amount: bool,
    ) -> Result<Reply, StoreError> {
        let (key, amount) = match (args, with_amount) {
            ([key], false) => (key, 1),
            ([key, amount], true) => (key, integer_arg(amount).ok_or(StoreError::NotAnInteger)?),
            _ => return Ok(wrong_args(cmd)),
        };
        let delta = amount.checked_mul(sign).ok_or(StoreError::Overflow)?;
        Ok(Reply::Integer(self.store.incr_by(key, delta)?))
    }

    // ========================================================================
    // List Commands
    // ========================================================================

    /// LPUSH / RPUSH key value [value ...]
    fn cmd_push(&self, cmd: &str, args: &[Bytes], end: End) -> Result<Reply, StoreError> {
        let [key, values @ ..] = args else {
            return Ok(wrong_args(cmd));
        };
        if values.is_empty() {
            return Ok(wrong_args(cmd));
        }
        Ok(Reply::Integer(self.store.push(key, values.to_vec(), end)? as i64))
    }

    /// LPOP / RPOP key
    fn cmd_pop(&self, cmd: &str, args: &[Bytes], end: End) -> Result<Reply, StoreError> {
        let [key] = args else {
            return Ok(wrong_args(cmd));
        };
        Ok(Reply::optional(self.store.pop(key, end)?))
    }

    /// LLEN key
    fn cmd_llen(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        let [key] = args else {
            return Ok(wrong_args("llen"));
        };
        Ok(Reply::Integer(self.store.llen(key)? as i64))
    }

    /// LRANGE key start stop
    fn cmd_lrange(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        let [key, start, stop] = args else {
            return Ok(wrong_args("lrange"));
        };
        let (Some(start), Some(stop)) = (integer_arg(start), integer_arg(stop)) else {
            return Err(StoreError::NotAnInteger);
        };
        let items = self.store.lrange(key, start, stop)?;
        Ok(Reply::Array(items.into_iter().map(Reply::Bulk).collect()))
    }

    // ========================================================================
    // Key Commands
    // ========================================================================

    /// DEL key [key ...]
    fn cmd_del(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        if args.is_empty() {
            return Ok(wrong_args("del"));
        }
        let deleted = args.iter().filter(|key| self.store.delete(key)).count();
        Ok(Reply::Integer(deleted as i64))
    }

    /// EXISTS key [key ...]
    fn cmd_exists(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        if args.is_empty() {
            return Ok(wrong_args("exists"));
        }
        let count = args.iter().filter(|key| self.store.exists(key)).count();
        Ok(Reply::Integer(count as i64))
    }

    /// EXPIRE key seconds
    fn cmd_expire(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        let [key, seconds] = args else {
            return Ok(wrong_args("expire"));
        };
        let secs = integer_arg(seconds).ok_or(StoreError::NotAnInteger)?;
        if secs <= 0 {
            return Ok(Reply::Integer(self.store.delete(key) as i64));
        }
        let Some(ttl) = expiry(secs, Duration::from_secs) else {
            return Ok(invalid_expire("expire"));
        };
        Ok(Reply::Integer(self.store.expire(key, ttl) as i64))
    }

    /// TTL key
    fn cmd_ttl(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        let [key] = args else {
            return Ok(wrong_args("ttl"));
        };
        Ok(Reply::Integer(self.store.ttl(key)))
    }

    /// PERSIST key
    fn cmd_persist(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        let [key] = args else {
            return Ok(wrong_args("persist"));
        };
        Ok(Reply::Integer(self.store.persist(key) as i64))
    }

    /// KEYS pattern
    fn cmd_keys(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        let [pattern] = args else {
            return Ok(wrong_args("keys"));
        };
        let keys = self.store.keys(&string_arg(pattern));
        Ok(Reply::Array(keys.into_iter().map(Reply::Bulk).collect()))
    }

    /// TYPE key
    fn cmd_type(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        let [key] = args else {
            return Ok(wrong_args("type"));
        };
        Ok(Reply::Status(self.store.key_type(key).to_string()))
    }

    /// RENAME key newkey
    fn cmd_rename(&self, args: &[Bytes]) -> Result<Reply, StoreError> {
        let [key, new_key] = args else {
            return Ok(wrong_args("rename"));
        };
        self.store.rename(key, new_key.clone())?;
        Ok(Reply::ok())
    }
}

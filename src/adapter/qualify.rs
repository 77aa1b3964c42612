//! Callback → future conversion.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter::future::{pending, CommandFuture, CommandResult};
use crate::codec;
use crate::config::Mapper;
use crate::method::{CallbackFn, Completion, Method, MethodTable, PromiseFn};

/// Produces a future-returning method for every name in `names`.
///
/// Each produced method, under `mapper.map(name)`, encodes its arguments when
/// `json` is set, invokes the original exactly once with a synthesized
/// completion and returns the future straight away. The completion rejects
/// with the client's error as-is, or resolves with the reply (decoded when
/// `json` is set).
///
/// Names missing from `table` are skipped with a warning.
pub fn qualify<R, I>(
    table: &MethodTable<CallbackFn<R>>,
    names: I,
    mapper: &Mapper,
    json: bool,
) -> MethodTable<PromiseFn<R>>
where
    R: 'static,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut qualified = MethodTable::new();

    for name in names {
        let name = name.as_ref();
        let Some(method) = table.get(name) else {
            warn!(function = %name, "skip: function not found");
            continue;
        };

        let mapped = mapper.map(name);
        debug!(function = %name, mapped = %mapped, json, "qualify function");

        let promised = promise(Arc::clone(method.func()), json);
        if qualified
            .insert(mapped.clone(), Method::new(method.arity(), promised))
            .is_some()
        {
            warn!(mapped = %mapped, "mapped name collides, overwriting");
        }
    }

    qualified
}

fn promise<R: 'static>(original: Arc<CallbackFn<R>>, json: bool) -> Arc<PromiseFn<R>> {
    Arc::new(move |receiver: &R, args: Vec<Value>| -> CommandFuture {
        let (settle, future) = pending();
        let args = if json { codec::encode(&args) } else { args };

        let done: Completion = Box::new(move |outcome: CommandResult| {
            settle.settle(outcome.map(|reply| if json { codec::decode(reply) } else { reply }));
        });
        original(receiver, args, done);

        future
    })
}

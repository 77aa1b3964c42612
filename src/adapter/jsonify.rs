//! Codec-only wrapping of synchronous methods.
//!
//! Batch command steps and the client's `multi` return straight away, so there
//! is nothing to turn into a future. They still get their arguments encoded.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::codec;
use crate::config::Mapper;
use crate::method::{BuilderFn, FactoryFn, Method, MethodTable};

/// Synchronous method shapes whose arguments can be routed through the codec.
pub trait Jsonify {
    /// Wraps `original` so it sees encoded arguments.
    fn jsonify(original: Arc<Self>) -> Arc<Self>;
}

impl<R: 'static> Jsonify for BuilderFn<R> {
    fn jsonify(original: Arc<Self>) -> Arc<Self> {
        Arc::new(move |receiver: &mut R, args: Vec<Value>| {
            original(receiver, codec::encode(&args))
        })
    }
}

impl<R: 'static, B: 'static> Jsonify for FactoryFn<R, B> {
    fn jsonify(original: Arc<Self>) -> Arc<Self> {
        Arc::new(move |receiver: &R, args: Vec<Value>| -> B {
            original(receiver, codec::encode(&args))
        })
    }
}

/// Produces an argument-encoding variant of every name in `names`.
///
/// The result holds only the new entries, under `mapper.map(name)`. Names
/// missing from `table` are skipped with a warning.
pub fn jsonify<F, I>(table: &MethodTable<F>, names: I, mapper: &Mapper) -> MethodTable<F>
where
    F: ?Sized + Jsonify,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut jsonified = MethodTable::new();

    for name in names {
        let name = name.as_ref();
        let Some(method) = table.get(name) else {
            warn!(function = %name, "skip: function not found");
            continue;
        };

        let mapped = mapper.map(name);
        debug!(function = %name, mapped = %mapped, "jsonify function");

        let wrapped = F::jsonify(Arc::clone(method.func()));
        if jsonified
            .insert(mapped.clone(), Method::new(method.arity(), wrapped))
            .is_some()
        {
            warn!(mapped = %mapped, "mapped name collides, overwriting");
        }
    }

    jsonified
}

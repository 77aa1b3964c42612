//! Module Composition
//!
//! A [`Module`] describes a client library: the client's callback commands,
//! its batch factory (`multi`), the batch builder's command steps and the
//! batch executor (`exec`). [`Adapter::adapt`] turns it into an [`Adapted`]
//! surface:
//!
//! ```text
//!  client:   multi ──jsonify (json only)──> mapper("multi")
//!            commands ──qualify──────────> mapper(cmd) -> CommandFuture
//!  batch:    commands ──jsonify (json only)──> mapper(cmd), chainable
//!            exec ──qualify──────────────> mapper("exec") -> CommandFuture
//! ```
//!
//! The module itself is never modified. Adapting it again, with the same or
//! different options, just builds another independent surface.

use tracing::info;

use crate::adapter::{jsonify, qualify, CommandFuture};
use crate::config::{Mapper, Options};
use crate::discover::discover;
use crate::error::{AdaptError, AdaptResult, Surface};
use crate::memory::{self, MemoryBatch, MemoryClient};
use crate::method::{BuilderFn, CallbackFn, Completion, FactoryFn, MethodTable, PromiseFn};
use serde_json::Value;

/// Name of the client method that opens a batch.
pub const BATCH_METHOD: &str = "multi";

/// Name of the batch method that runs the queued commands.
pub const EXEC_METHOD: &str = "exec";

/// The method tables of a client library, plus its reference command list.
pub struct Module<C, B> {
    /// Callback-terminated client commands.
    pub client: MethodTable<CallbackFn<C>>,
    /// Client methods that open a batch.
    pub factories: MethodTable<FactoryFn<C, B>>,
    /// Synchronous batch steps.
    pub builders: MethodTable<BuilderFn<B>>,
    /// Callback-terminated batch methods.
    pub executors: MethodTable<CallbackFn<B>>,
    /// Known remote command names, possibly with subcommands (`"config get"`).
    pub commands: Vec<String>,
}

impl<C, B> Clone for Module<C, B> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            factories: self.factories.clone(),
            builders: self.builders.clone(),
            executors: self.executors.clone(),
            commands: self.commands.clone(),
        }
    }
}

impl<C, B> std::fmt::Debug for Module<C, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("client", &self.client.len())
            .field("factories", &self.factories.len())
            .field("builders", &self.builders.len())
            .field("executors", &self.executors.len())
            .field("commands", &self.commands.len())
            .finish()
    }
}

/// Runs adaptation passes with a fixed set of options.
#[derive(Debug, Clone, Default)]
pub struct Adapter {
    options: Options,
}

impl Adapter {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Adapts `module`.
    pub fn adapt<C: 'static, B: 'static>(&self, module: &Module<C, B>) -> AdaptResult<Adapted<C, B>> {
        adapt(module, &self.options)
    }

    /// Adapts the built-in in-memory client library.
    pub fn adapt_default(&self) -> AdaptResult<Adapted<MemoryClient, MemoryBatch>> {
        adapt(&memory::module(), &self.options)
    }
}

/// Adapts `module` according to `options`.
///
/// With capabilities configured, every declared command must be present on
/// both the client and the batch builder, or this fails.
pub fn adapt<C: 'static, B: 'static>(
    module: &Module<C, B>,
    options: &Options,
) -> AdaptResult<Adapted<C, B>> {
    let mapper = options.mapper();
    let json = options.json;

    let (client_commands, batch_commands) = match &options.capabilities {
        Some(capabilities) => (
            capabilities.validate(Surface::Client, &module.client)?,
            capabilities.validate(Surface::Batch, &module.builders)?,
        ),
        None => (
            discover(&module.client, &module.commands),
            discover(&module.builders, &module.commands),
        ),
    };

    let mut factories = module.factories.clone();
    if json {
        factories.extend(jsonify(&module.factories, [BATCH_METHOD], &mapper));
    }
    let promised = qualify(&module.client, &client_commands, &mapper, json);

    let mut builders = module.builders.clone();
    if json {
        builders.extend(jsonify(&module.builders, &batch_commands, &mapper));
    }
    let batch_promised = qualify(&module.executors, [EXEC_METHOD], &mapper, json);

    info!(
        client = client_commands.len(),
        batch = batch_commands.len(),
        json,
        sample = %mapper.map("get"),
        "module adapted"
    );

    Ok(Adapted {
        mapper,
        json,
        client: module.client.clone(),
        promised,
        factories,
        builders,
        executors: module.executors.clone(),
        batch_promised,
    })
}

/// An adapted client library.
///
/// Holds the originals next to the produced methods, so both raw callback
/// calls and future-returning calls go through the same value.
pub struct Adapted<C, B> {
    mapper: Mapper,
    json: bool,
    client: MethodTable<CallbackFn<C>>,
    promised: MethodTable<PromiseFn<C>>,
    factories: MethodTable<FactoryFn<C, B>>,
    builders: MethodTable<BuilderFn<B>>,
    executors: MethodTable<CallbackFn<B>>,
    batch_promised: MethodTable<PromiseFn<B>>,
}

impl<C, B> Adapted<C, B> {
    /// Binds the surface to a client instance.
    pub fn bind<'a>(&'a self, client: &'a C) -> AdaptedClient<'a, C, B> {
        AdaptedClient {
            surface: self,
            client,
        }
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Future-returning client methods.
    pub fn client_methods(&self) -> Vec<&str> {
        self.promised.names()
    }

    /// Future-returning batch methods.
    pub fn batch_methods(&self) -> Vec<&str> {
        self.batch_promised.names()
    }

    /// Synchronous batch steps, originals included.
    pub fn builder_methods(&self) -> Vec<&str> {
        self.builders.names()
    }

    /// Client methods that open a batch, originals included.
    pub fn factory_methods(&self) -> Vec<&str> {
        self.factories.names()
    }
}

impl<C, B> std::fmt::Debug for Adapted<C, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapted")
            .field("mapper", &self.mapper)
            .field("json", &self.json)
            .field("client", &self.promised.len())
            .field("batch", &self.batch_promised.len())
            .finish()
    }
}

/// An adapted surface bound to one client.
pub struct AdaptedClient<'a, C, B> {
    surface: &'a Adapted<C, B>,
    client: &'a C,
}

impl<'a, C, B> AdaptedClient<'a, C, B> {
    /// Calls a future-returning method by its mapped name.
    pub fn call(&self, name: &str, args: Vec<Value>) -> AdaptResult<CommandFuture> {
        let method = self
            .surface
            .promised
            .get(name)
            .ok_or_else(|| AdaptError::NotAFunction(name.to_string()))?;
        Ok((method.func())(self.client, args))
    }

    /// Calls an original callback method, bypassing adaptation.
    pub fn invoke(&self, name: &str, args: Vec<Value>, done: Completion) -> AdaptResult<()> {
        let method = self
            .surface
            .client
            .get(name)
            .ok_or_else(|| AdaptError::NotAFunction(name.to_string()))?;
        (method.func())(self.client, args, done);
        Ok(())
    }

    /// Opens a batch through `multi` or its mapped variant.
    pub fn batch(&self, name: &str, args: Vec<Value>) -> AdaptResult<AdaptedBatch<'a, C, B>> {
        let method = self
            .surface
            .factories
            .get(name)
            .ok_or_else(|| AdaptError::NotAFunction(name.to_string()))?;
        Ok(AdaptedBatch {
            surface: self.surface,
            batch: (method.func())(self.client, args),
        })
    }

    pub fn client(&self) -> &'a C {
        self.client
    }
}

/// A batch opened from an [`AdaptedClient`].
pub struct AdaptedBatch<'a, C, B> {
    surface: &'a Adapted<C, B>,
    batch: B,
}

impl<'a, C, B> AdaptedBatch<'a, C, B> {
    /// Queues a command step, original or mapped, and returns `self` for chaining.
    pub fn queue(&mut self, name: &str, args: Vec<Value>) -> AdaptResult<&mut Self> {
        let method = self
            .surface
            .builders
            .get(name)
            .ok_or_else(|| AdaptError::NotAFunction(name.to_string()))?;
        (method.func())(&mut self.batch, args);
        Ok(self)
    }

    /// Calls a future-returning batch method such as the mapped `exec`.
    pub fn call(&self, name: &str, args: Vec<Value>) -> AdaptResult<CommandFuture> {
        let method = self
            .surface
            .batch_promised
            .get(name)
            .ok_or_else(|| AdaptError::NotAFunction(name.to_string()))?;
        Ok((method.func())(&self.batch, args))
    }

    /// Calls an original callback batch method such as `exec`.
    pub fn invoke(&self, name: &str, args: Vec<Value>, done: Completion) -> AdaptResult<()> {
        let method = self
            .surface
            .executors
            .get(name)
            .ok_or_else(|| AdaptError::NotAFunction(name.to_string()))?;
        (method.func())(&self.batch, args, done);
        Ok(())
    }

    pub fn get_ref(&self) -> &B {
        &self.batch
    }

    pub fn into_inner(self) -> B {
        self.batch
    }
}

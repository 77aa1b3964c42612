//! # FlashKV-Q - Future-Returning Adapter for Callback Key-Value Clients
//!
//! FlashKV-Q takes a callback-style key-value client library and builds a
//! second surface on top of it: every command gets a companion method that
//! returns a future instead of taking a completion callback. Optionally, the
//! companion methods route arguments and replies through a transparent JSON
//! codec so objects and arrays can be stored directly.
//!
//! ## Features
//!
//! - **Futures**: `getQ(key)` resolves with the reply or rejects with the error
//! - **Configurable names**: prefix/suffix or a custom mapping function
//! - **JSON mode**: non-string arguments are stringified, replies parsed back
//! - **Batches**: `multi` / command steps / `exec` work the same way
//! - **Non-destructive**: the original methods stay in place and callable
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              FlashKV-Q                                  │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │   Module    │───>│  discover / │───>│   qualify   │──> CommandFuture │
//! │  │ (originals) │    │ capabilities│    │   jsonify   │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐    │
//! │  │   Options   │    │                 Adapted                      │    │
//! │  │  (mapper,   │───>│  originals + mapped client / batch methods   │    │
//! │  │   json)     │    └──────────────────────────────────────────────┘    │
//! │  └─────────────┘                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use flashkv_q::memory::{MemoryClient, Store};
//! use flashkv_q::{Adapter, Options};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let adapted = Adapter::new(Options::new().with_json(true)).adapt_default()?;
//!     let client = MemoryClient::new(Arc::new(Store::new()));
//!     let client = adapted.bind(&client);
//!
//!     client.call("setQ", vec![json!("user"), json!({"name": "Ariz"})])?.await?;
//!     let user = client.call("getQ", vec![json!("user")])?.await?;
//!     assert_eq!(user, json!({"name": "Ariz"}));
//!
//!     let mut batch = client.batch("multiQ", vec![])?;
//!     batch
//!         .queue("setQ", vec![json!("n"), json!(1)])?
//!         .queue("incrQ", vec![json!("n")])?;
//!     let results = batch.call("execQ", vec![])?.await?;
//!     assert_eq!(results, json!(["OK", 2]));
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`method`]: method tables, arity and function shapes
//! - [`codec`]: transparent JSON encode/decode
//! - [`discover`]: structural command discovery and explicit capabilities
//! - [`adapter`]: `qualify` (callback to future) and `jsonify`
//! - [`module`]: composition of a whole client library
//! - [`config`]: adaptation options and naming
//! - [`memory`]: an in-process callback client to adapt
//!
//! ## Design Highlights
//!
//! ### Aliases Mark Commands
//!
//! A client registers each command under its lowercase and uppercase name,
//! pointing at the same function. Discovery checks that identity, so helper
//! methods that happen to share a command's name are left alone.
//!
//! ### One Channel Per Call
//!
//! Each future owns a `tokio::sync::oneshot` receiver; the completion handed
//! to the original owns the sender. Settling twice is impossible, and a
//! completion that is dropped unused rejects the future with
//! [`CommandError::Abandoned`].

pub mod adapter;
pub mod codec;
pub mod config;
pub mod discover;
pub mod error;
pub mod memory;
pub mod method;
pub mod module;

// Re-export commonly used types for convenience
pub use adapter::{jsonify, qualify, CommandFuture, CommandResult};
pub use config::{Mapper, Options, DEFAULT_SUFFIX};
pub use discover::{discover, Capabilities, Capability};
pub use error::{AdaptError, AdaptResult, CommandError, Surface};
pub use method::{Arity, Completion, Method, MethodTable};
pub use module::{adapt, Adapted, AdaptedBatch, AdaptedClient, Adapter, Module};
pub use serde_json::Value;

/// Version of FlashKV-Q
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! In-Process Client Library
//!
//! A small callback-style key-value client that runs against a local store,
//! so the adapter has a real target without a server.
//!
//! - `store`: sharded storage with lazy expiry
//! - `commands`: command dispatch and replies
//! - `client`: the callback client, its batch and the [`module`] tables

pub mod client;
pub mod commands;
pub mod store;

pub use client::{module, to_wire, MemoryBatch, MemoryClient, COMMANDS};
pub use commands::{CommandHandler, Reply};
pub use store::{Store, StoreError};

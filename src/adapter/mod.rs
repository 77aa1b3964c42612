//! Adapter Module
//!
//! Builds new methods on top of a surface's originals.
//!
//! ```text
//!   caller ──> adapted method ──> codec::encode ──> original(args, completion)
//!                  │                                          │
//!                  ▼                                          ▼
//!            CommandFuture <── settle <── codec::decode <── completion(result)
//! ```
//!
//! - [`qualify`]: callback-terminated method → future-returning method
//! - [`jsonify`]: synchronous method → same method with encoded arguments
//!
//! Both return a table of the *new* entries only. The originals are read,
//! never replaced.

pub mod future;
pub mod jsonify;
pub mod qualify;

pub use future::{pending, CommandFuture, CommandResult, Settle};
pub use jsonify::{jsonify, Jsonify};
pub use qualify::qualify;

//! Error types for adapted invocations and for the adaptation pass itself.
//!
//! Two families are kept apart on purpose:
//!
//! - [`CommandError`] is produced by the wrapped client. Adapted futures reject
//!   with exactly the value the client handed to its completion, never wrapped.
//! - [`AdaptError`] is produced by this crate when a surface is built or when a
//!   caller asks for a method that was never installed.
//!
//! Codec failures never show up here: the codec falls back to passing the
//! original value through.

use std::fmt;
use thiserror::Error;

use crate::method::Arity;

/// Failures reported by the wrapped client through a completion handler.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    /// An error reply from the store, e.g. `ERR wrong number of arguments`.
    #[error("{0}")]
    Reply(String),

    /// One of the commands queued into a batch failed during `exec`.
    #[error("EXECABORT command #{index} in batch failed: {message}")]
    Batch { index: usize, message: String },

    /// The client dropped the completion handler without invoking it.
    #[error("completion handler dropped before the command settled")]
    Abandoned,
}

impl CommandError {
    /// Creates a reply error.
    pub fn reply(message: impl Into<String>) -> Self {
        CommandError::Reply(message.into())
    }
}

/// Which side of a module a method lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    /// The single-command client.
    Client,
    /// The batch (transaction) builder.
    Batch,
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Surface::Client => write!(f, "client"),
            Surface::Batch => write!(f, "batch"),
        }
    }
}

/// Errors raised while adapting a module or calling into an adapted surface.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AdaptError {
    /// The requested name was never installed on the surface.
    #[error("{0} is not a function")]
    NotAFunction(String),

    /// A command declared in the capability table is missing on the target.
    #[error("declared command '{name}' is missing from the {surface} surface")]
    MissingCommand { surface: Surface, name: String },

    /// A declared command exists but with an incompatible arity.
    #[error("declared command '{name}' on the {surface} surface expects {expected} arguments, found {found}")]
    ArityMismatch {
        surface: Surface,
        name: String,
        expected: Arity,
        found: Arity,
    },
}

/// A specialized `Result` type for adaptation.
pub type AdaptResult<T> = std::result::Result<T, AdaptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_error_display_is_verbatim() {
        let err = CommandError::reply("ERR value is not an integer or out of range");
        assert_eq!(err.to_string(), "ERR value is not an integer or out of range");
    }

    #[test]
    fn test_batch_error_display() {
        let err = CommandError::Batch {
            index: 2,
            message: "WRONGTYPE Operation against a key holding the wrong kind of value"
                .to_string(),
        };
        assert_eq!(
            err.to_string(),
            "EXECABORT command #2 in batch failed: WRONGTYPE Operation against a key holding the wrong kind of value"
        );
    }

    #[test]
    fn test_not_a_function_display() {
        let err = AdaptError::NotAFunction("getQ".to_string());
        assert_eq!(err.to_string(), "getQ is not a function");
    }

    #[test]
    fn test_missing_command_display() {
        let err = AdaptError::MissingCommand {
            surface: Surface::Batch,
            name: "hget".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "declared command 'hget' is missing from the batch surface"
        );
    }

    #[test]
    fn test_arity_mismatch_display() {
        let err = AdaptError::ArityMismatch {
            surface: Surface::Client,
            name: "get".to_string(),
            expected: Arity::Fixed(1),
            found: Arity::Fixed(2),
        };
        assert_eq!(
            err.to_string(),
            "declared command 'get' on the client surface expects 1 arguments, found 2"
        );
    }
}

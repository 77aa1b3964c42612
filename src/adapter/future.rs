//! Single-settlement futures for adapted calls.
//!
//! [`pending`] hands out a [`Settle`] handle and the [`CommandFuture`] it
//! settles. `Settle` is consumed by the first `resolve`/`reject`, so a second
//! settlement cannot be expressed.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::CommandError;

/// The outcome of an adapted call.
pub type CommandResult = Result<Value, CommandError>;

/// Creates a new pending invocation.
pub fn pending() -> (Settle, CommandFuture) {
    let (tx, rx) = oneshot::channel();
    (Settle { tx }, CommandFuture { rx })
}

/// The write side of a pending invocation.
#[derive(Debug)]
pub struct Settle {
    tx: oneshot::Sender<CommandResult>,
}

impl Settle {
    pub fn resolve(self, value: Value) {
        self.settle(Ok(value));
    }

    pub fn reject(self, error: CommandError) {
        self.settle(Err(error));
    }

    pub fn settle(self, outcome: CommandResult) {
        // The caller may have dropped the future; nobody is left to tell.
        let _ = self.tx.send(outcome);
    }
}

/// A future resolving to the result of an adapted command.
///
/// If the completion handler is dropped without being called, the future
/// resolves to [`CommandError::Abandoned`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct CommandFuture {
    rx: oneshot::Receiver<CommandResult>,
}

impl CommandFuture {
    /// Returns a future that is already settled with `outcome`.
    pub fn settled(outcome: CommandResult) -> Self {
        let (settle, future) = pending();
        settle.settle(outcome);
        future
    }
}

impl Future for CommandFuture {
    type Output = CommandResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(CommandError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[test]
    fn test_pending_until_resolved() {
        let (settle, future) = pending();
        let mut future = task::spawn(future);
        assert_pending!(future.poll());

        settle.resolve(json!("OK"));
        assert!(future.is_woken());
        assert_ready_eq!(future.poll(), Ok(json!("OK")));
    }

    #[test]
    fn test_reject_carries_error() {
        let (settle, future) = pending();
        let mut future = task::spawn(future);
        settle.reject(CommandError::reply("ERR boom"));
        assert_ready_eq!(future.poll(), Err(CommandError::reply("ERR boom")));
    }

    #[test]
    fn test_dropped_settle_abandons() {
        let (settle, future) = pending();
        let mut future = task::spawn(future);
        drop(settle);
        assert_ready_eq!(future.poll(), Err(CommandError::Abandoned));
    }

    #[tokio::test]
    async fn test_settled_future() {
        let outcome = CommandFuture::settled(Ok(json!(1))).await;
        assert_eq!(outcome, Ok(json!(1)));
    }

    #[test]
    fn test_settle_after_future_dropped_is_harmless() {
        let (settle, future) = pending();
        drop(future);
        settle.resolve(json!(null));
    }
}

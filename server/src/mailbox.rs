//! Bounded, multi-producer single-consumer mailboxes for actor loops.
//!
//! Every match, the hub, and every connected player drains exactly one
//! mailbox. Sending to a full mailbox waits until the consumer catches up,
//! which throttles fast producers instead of buffering without bound.

use thiserror::Error;
use tokio::sync::mpsc;

/// Returned when the consumer side of a mailbox is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("mailbox is closed")]
pub struct MailboxClosed;

/// Sending side of a mailbox. Cheap to clone.
#[derive(Debug)]
pub struct Address<T> {
    sender: mpsc::Sender<T>,
}

impl<T> Clone for Address<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Receiving side of a mailbox, owned by the actor loop.
#[derive(Debug)]
pub struct Mailbox<T> {
    receiver: mpsc::Receiver<T>,
}

/// Creates a mailbox holding at most `capacity` pending messages (at least one).
pub fn mailbox<T>(capacity: usize) -> (Address<T>, Mailbox<T>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (Address { sender }, Mailbox { receiver })
}

impl<T> Address<T> {
    /// Delivers a message, waiting while the mailbox is full.
    pub async fn send(&self, message: T) -> Result<(), MailboxClosed> {
        self.sender.send(message).await.map_err(|_| MailboxClosed)
    }

}

impl<T> Mailbox<T> {
    /// Next message in arrival order; `None` once every address is dropped.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }
}

//! The narrow view of a connected player that matches and the hub work with.

use log::warn;
use shared::{Notification, PlayerSummary};

use crate::mailbox::Address;

/// Identity plus outbound mailbox of a connected player.
///
/// Matches never touch sockets: everything they have to say goes through
/// [`PlayerHandle::notify`], and the connection's write pump does the rest.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    uuid: String,
    username: String,
    level: u32,
    mailbox: Address<Notification>,
}

impl PlayerHandle {
    pub fn new(uuid: impl Into<String>, mailbox: Address<Notification>) -> Self {
        Self {
            uuid: uuid.into(),
            username: String::new(),
            level: 0,
            mailbox,
        }
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
    }

    /// Queues a notification, waiting while the player's mailbox is full.
    ///
    /// A closed mailbox means the connection is already gone; the transport
    /// will unregister the player, so the failure is only logged.
    pub async fn notify(&self, notification: Notification) {
        if self.mailbox.send(notification).await.is_err() {
            warn!("Dropped notification for disconnected player {}", self.uuid);
        }
    }

    pub fn as_sendable(&self) -> PlayerSummary {
        PlayerSummary {
            uuid: self.uuid.clone(),
            username: self.username.clone(),
            level: self.level,
        }
    }
}

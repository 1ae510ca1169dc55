//! The match registry.
//!
//! The hub is the actor that sits between the transport and the matches.
//! It knows every connected session and every running match, validates
//! requests that depend on membership (joining twice, leaving a match you
//! are not in, unknown match ids) and forwards the rest to the right match.

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::protocol::{NOT_FOUND, UNPROCESSABLE};
use shared::{Notification, Request};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::combat::{Combat, CombatCommand, CombatHandle, CombatSettings};
use crate::ids::{SequenceIds, COMBAT_PREFIX, PLAYER_PREFIX};
use crate::mailbox::{mailbox, Address, Mailbox, MailboxClosed};
use crate::player::PlayerHandle;

#[derive(Debug)]
pub enum HubCommand {
    /// A connection opened; the player gets a welcome.
    Register { player: PlayerHandle },
    /// A connection closed; the player leaves its match, if any.
    Unregister { uuid: String },
    /// A parsed client request from the player `uuid`.
    Request { uuid: String, request: Request },
    /// A match loop returned.
    CombatFinished { uuid: String },
}

/// Sending side of the hub, shared by every connection.
#[derive(Debug, Clone)]
pub struct HubHandle {
    address: Address<HubCommand>,
    player_ids: Arc<SequenceIds>,
}

impl HubHandle {
    /// Allocates an identity for a new connection.
    pub fn new_player(&self, mailbox: Address<Notification>) -> PlayerHandle {
        PlayerHandle::new(self.player_ids.next_id(), mailbox)
    }

    pub async fn notify(&self, command: HubCommand) -> Result<(), MailboxClosed> {
        self.address.send(command).await
    }
}

#[derive(Debug)]
struct Session {
    player: PlayerHandle,
    combat: Option<String>,
}

pub struct Hub {
    sessions: HashMap<String, Session>,
    combats: BTreeMap<String, CombatHandle>,
    combat_ids: SequenceIds,
    settings: CombatSettings,
    default_players: usize,
    capacity: usize,
    rng: StdRng,
    address: Address<HubCommand>,
    mailbox: Mailbox<HubCommand>,
}

impl Hub {
    /// `capacity` bounds the hub's mailbox and the mailbox of every match it creates.
    pub fn new(
        settings: CombatSettings,
        default_players: usize,
        capacity: usize,
        rng: StdRng,
    ) -> (Self, HubHandle) {
        let (address, mailbox) = mailbox(capacity);
        let handle = HubHandle {
            address: address.clone(),
            player_ids: Arc::new(SequenceIds::new(PLAYER_PREFIX)),
        };
        let hub = Self {
            sessions: HashMap::new(),
            combats: BTreeMap::new(),
            combat_ids: SequenceIds::new(COMBAT_PREFIX),
            settings,
            default_players: default_players.max(1),
            capacity,
            rng,
            address,
            mailbox,
        };
        (hub, handle)
    }

    pub async fn run(mut self) {
        while let Some(command) = self.mailbox.recv().await {
            match command {
                HubCommand::Register { player } => self.register(player).await,
                HubCommand::Unregister { uuid } => self.unregister(&uuid).await,
                HubCommand::Request { uuid, request } => self.handle_request(&uuid, request).await,
                HubCommand::CombatFinished { uuid } => self.forget_combat(&uuid),
            }
        }
    }

    async fn register(&mut self, player: PlayerHandle) {
        info!("Player {} connected", player.uuid());
        player
            .notify(Notification::Welcome {
                message: format!("Welcome, {}", player.uuid()),
            })
            .await;
        self.sessions.insert(
            player.uuid().to_string(),
            Session {
                player,
                combat: None,
            },
        );
    }

    async fn unregister(&mut self, uuid: &str) {
        let Some(session) = self.sessions.remove(uuid) else {
            return;
        };
        info!("Player {} disconnected", uuid);
        if let Some(combat) = session.combat.and_then(|id| self.combats.get(&id)) {
            let command = CombatCommand::RemovePlayer {
                player: session.player,
            };
            if combat.notify(command).await.is_err() {
                debug!("Combat {} was already gone", combat.uuid());
            }
        }
    }

    fn forget_combat(&mut self, uuid: &str) {
        if self.combats.remove(uuid).is_some() {
            info!("Combat {} removed", uuid);
        }
        for session in self.sessions.values_mut() {
            if session.combat.as_deref() == Some(uuid) {
                session.combat = None;
            }
        }
    }

    fn set_membership(&mut self, uuid: &str, combat: Option<String>) {
        if let Some(session) = self.sessions.get_mut(uuid) {
            session.combat = combat;
        }
    }

    fn create_combat(&mut self, max_players: usize) -> CombatHandle {
        let uuid = self.combat_ids.next_id();
        let (combat, handle) = Combat::new(
            uuid.clone(),
            max_players,
            self.settings.clone(),
            StdRng::seed_from_u64(self.rng.gen()),
            self.capacity,
        );
        let hub = self.address.clone();
        tokio::spawn(async move {
            combat.run().await;
            if hub.send(HubCommand::CombatFinished { uuid }).await.is_err() {
                debug!("Hub stopped before a combat finished");
            }
        });
        self.combats.insert(handle.uuid().to_string(), handle.clone());
        handle
    }

    async fn handle_request(&mut self, uuid: &str, request: Request) {
        let Some(session) = self.sessions.get_mut(uuid) else {
            warn!("Request from unknown player {}: {:?}", uuid, request);
            return;
        };
        if let Request::Register { username } = &request {
            session.player.set_username(username.clone());
        }
        let player = session.player.clone();
        let joined = session
            .combat
            .as_ref()
            .and_then(|id| self.combats.get(id))
            .cloned();

        match request {
            Request::Register { username } => {
                info!("Player {} registered as {}", uuid, username);
                if let Some(combat) = &joined {
                    let command = CombatCommand::UpdatePlayer {
                        player: player.clone(),
                    };
                    if combat.notify(command).await.is_err() {
                        debug!("Combat {} was already gone", combat.uuid());
                    }
                }
                player.notify(Notification::Registered { username }).await;
            }
            Request::CombatList => {
                if self.combats.is_empty() {
                    self.create_combat(self.default_players);
                }
                let mut combats = Vec::with_capacity(self.combats.len());
                for combat in self.combats.values() {
                    if let Some(summary) = combat.summarize().await {
                        combats.push(summary);
                    }
                }
                player.notify(Notification::CombatList { combats }).await;
            }
            Request::CombatCreate { max_players } => {
                if joined.is_some() {
                    reject(&player, UNPROCESSABLE, "already in a combat").await;
                } else if max_players == 0 {
                    reject(&player, UNPROCESSABLE, "a combat needs at least one player").await;
                } else {
                    let combat = self.create_combat(max_players);
                    self.join(&player, &combat).await;
                }
            }
            Request::CombatJoin { uuid: combat_id } => {
                let Some(combat) = self.combats.get(&combat_id).cloned() else {
                    reject(&player, NOT_FOUND, format!("no combat {}", combat_id)).await;
                    return;
                };
                if joined.is_some() {
                    reject(&player, UNPROCESSABLE, "already in a combat").await;
                } else {
                    self.join(&player, &combat).await;
                }
            }
            Request::CombatLeave => match joined {
                Some(combat) => {
                    self.set_membership(uuid, None);
                    self.forward(&player, &combat, CombatCommand::RemovePlayer {
                        player: player.clone(),
                    })
                    .await;
                }
                None => reject(&player, UNPROCESSABLE, "not in a combat").await,
            },
            Request::CombatPlayTurn {
                serial,
                piece_index,
                rotation,
                translation,
            } => match joined {
                Some(combat) => {
                    let command = CombatCommand::PlayTurn {
                        player: player.clone(),
                        serial,
                        piece_index,
                        rotation,
                        translation,
                    };
                    self.forward(&player, &combat, command).await;
                }
                None => reject(&player, UNPROCESSABLE, "not in a combat").await,
            },
        }
    }

    /// Membership is recorded only once the match has actually seated the
    /// player; a refused player stays free to create or join another match.
    async fn join(&mut self, player: &PlayerHandle, combat: &CombatHandle) {
        match combat.add_player(player.clone()).await {
            Some(true) => self.set_membership(player.uuid(), Some(combat.uuid().to_string())),
            Some(false) => debug!("Combat {} turned {} away", combat.uuid(), player.uuid()),
            None => reject(player, NOT_FOUND, format!("no combat {}", combat.uuid())).await,
        }
    }

    /// Sends a command to a match, answering 404 if it ended in the meantime.
    async fn forward(&mut self, player: &PlayerHandle, combat: &CombatHandle, command: CombatCommand) {
        if combat.notify(command).await.is_err() {
            self.set_membership(player.uuid(), None);
            reject(player, NOT_FOUND, format!("no combat {}", combat.uuid())).await;
        }
    }
}

async fn reject(player: &PlayerHandle, code: u16, reason: impl Into<String>) {
    let reason = reason.into();
    debug!("Rejecting request of {}: {} {}", player.uuid(), code, reason);
    player.notify(Notification::error(code, reason)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Rotation, Vector};
    use std::time::Duration;

    async fn next(inbox: &mut Mailbox<Notification>) -> Notification {
        tokio::time::timeout(Duration::from_secs(5), inbox.recv())
            .await
            .expect("timed out waiting for a notification")
            .expect("mailbox closed")
    }

    async fn connect(hub: &HubHandle) -> (String, Mailbox<Notification>) {
        let (address, mut inbox) = mailbox(32);
        let player = hub.new_player(address);
        let uuid = player.uuid().to_string();
        hub.notify(HubCommand::Register { player }).await.unwrap();
        assert!(matches!(next(&mut inbox).await, Notification::Welcome { .. }));
        (uuid, inbox)
    }

    async fn request(hub: &HubHandle, uuid: &str, request: Request) {
        hub.notify(HubCommand::Request {
            uuid: uuid.to_string(),
            request,
        })
        .await
        .unwrap();
    }

    fn start_hub() -> HubHandle {
        let (hub, handle) = Hub::new(
            CombatSettings::default(),
            2,
            64,
            StdRng::seed_from_u64(3),
        );
        tokio::spawn(hub.run());
        handle
    }

    #[tokio::test]
    async fn test_register_and_list_creates_default_combat() {
        let hub = start_hub();
        let (uuid, mut inbox) = connect(&hub).await;
        assert_eq!(uuid, "CLI1");

        request(&hub, &uuid, Request::Register { username: "bob".into() }).await;
        assert_eq!(
            next(&mut inbox).await,
            Notification::Registered {
                username: "bob".into()
            }
        );

        request(&hub, &uuid, Request::CombatList).await;
        match next(&mut inbox).await {
            Notification::CombatList { combats } => {
                assert_eq!(combats.len(), 1);
                assert_eq!(combats[0].uuid, "CBT1");
                assert_eq!(combats[0].max_players, 2);
                assert!(combats[0].players.is_empty());
            }
            other => panic!("Unexpected notification: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_membership_errors() {
        let hub = start_hub();
        let (uuid, mut inbox) = connect(&hub).await;

        request(&hub, &uuid, Request::CombatJoin { uuid: "CBT9".into() }).await;
        assert!(matches!(
            next(&mut inbox).await,
            Notification::Error { code: 404, .. }
        ));

        request(&hub, &uuid, Request::CombatLeave).await;
        assert!(matches!(
            next(&mut inbox).await,
            Notification::Error { code: 422, .. }
        ));

        request(
            &hub,
            &uuid,
            Request::CombatPlayTurn {
                serial: "1".into(),
                piece_index: 0,
                rotation: Rotation::IDENTITY,
                translation: Vector::ZERO,
            },
        )
        .await;
        assert!(matches!(
            next(&mut inbox).await,
            Notification::Error { code: 422, .. }
        ));

        request(&hub, &uuid, Request::CombatCreate { max_players: 0 }).await;
        assert!(matches!(
            next(&mut inbox).await,
            Notification::Error { code: 422, .. }
        ));
    }

    #[tokio::test]
    async fn test_create_join_and_leave() {
        let hub = start_hub();
        let (alice, mut alice_inbox) = connect(&hub).await;
        let (bob, mut bob_inbox) = connect(&hub).await;

        request(&hub, &alice, Request::CombatCreate { max_players: 3 }).await;
        let combat_id = match next(&mut alice_inbox).await {
            Notification::CombatJoin { combat } => {
                assert_eq!(combat.max_players, 3);
                assert_eq!(combat.players.len(), 1);
                combat.uuid
            }
            other => panic!("Unexpected notification: {:?}", other),
        };

        request(&hub, &alice, Request::CombatJoin { uuid: combat_id.clone() }).await;
        assert!(matches!(
            next(&mut alice_inbox).await,
            Notification::Error { code: 422, .. }
        ));

        request(&hub, &bob, Request::CombatJoin { uuid: combat_id.clone() }).await;
        match next(&mut bob_inbox).await {
            Notification::CombatJoin { combat } => assert_eq!(combat.players.len(), 2),
            other => panic!("Unexpected notification: {:?}", other),
        }
        match next(&mut alice_inbox).await {
            Notification::CombatPlayerJoined { player } => assert_eq!(player.uuid, bob),
            other => panic!("Unexpected notification: {:?}", other),
        }

        request(&hub, &bob, Request::CombatLeave).await;
        assert_eq!(
            next(&mut alice_inbox).await,
            Notification::CombatPlayerLeft { uuid: bob.clone() }
        );

        hub.notify(HubCommand::Unregister { uuid: alice }).await.unwrap();
        request(&hub, &bob, Request::CombatList).await;
        match next(&mut bob_inbox).await {
            Notification::CombatList { combats } => {
                assert!(combats.iter().all(|c| c.players.is_empty()));
            }
            other => panic!("Unexpected notification: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refused_join_keeps_player_free() {
        let hub = start_hub();
        let (alice, mut alice_inbox) = connect(&hub).await;
        let (bob, mut bob_inbox) = connect(&hub).await;
        let (carol, mut carol_inbox) = connect(&hub).await;

        request(&hub, &alice, Request::CombatCreate { max_players: 2 }).await;
        let combat_id = match next(&mut alice_inbox).await {
            Notification::CombatJoin { combat } => combat.uuid,
            other => panic!("Unexpected notification: {:?}", other),
        };
        // Bob fills the match, which starts preparing, then walks away.
        request(&hub, &bob, Request::CombatJoin { uuid: combat_id.clone() }).await;
        assert!(matches!(
            next(&mut bob_inbox).await,
            Notification::CombatJoin { .. }
        ));
        request(&hub, &bob, Request::CombatLeave).await;

        request(&hub, &carol, Request::CombatJoin { uuid: combat_id }).await;
        assert!(matches!(
            next(&mut carol_inbox).await,
            Notification::Error { code: 422, .. }
        ));

        request(&hub, &carol, Request::CombatCreate { max_players: 1 }).await;
        match next(&mut carol_inbox).await {
            Notification::CombatJoin { combat } => {
                assert_eq!(combat.players.len(), 1);
                assert_eq!(combat.players[0].uuid, carol);
            }
            other => panic!("Unexpected notification: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rename_reaches_the_match() {
        let hub = start_hub();
        let (alice, mut alice_inbox) = connect(&hub).await;
        let (bob, mut bob_inbox) = connect(&hub).await;

        request(&hub, &alice, Request::CombatCreate { max_players: 3 }).await;
        let combat_id = match next(&mut alice_inbox).await {
            Notification::CombatJoin { combat } => combat.uuid,
            other => panic!("Unexpected notification: {:?}", other),
        };
        request(&hub, &alice, Request::Register { username: "alice".into() }).await;
        assert_eq!(
            next(&mut alice_inbox).await,
            Notification::Registered {
                username: "alice".into()
            }
        );

        request(&hub, &bob, Request::CombatJoin { uuid: combat_id }).await;
        match next(&mut bob_inbox).await {
            Notification::CombatJoin { combat } => {
                let seated = combat.players.iter().find(|p| p.uuid == alice).unwrap();
                assert_eq!(seated.username, "alice");
            }
            other => panic!("Unexpected notification: {:?}", other),
        }
    }
}

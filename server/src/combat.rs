//! A single match: roster, preparation and turn bookkeeping.
//!
//! Each match is an actor. [`Combat::run`] drains the match's mailbox one
//! command at a time and is the only code that ever touches match state;
//! everything else talks to it through a [`CombatHandle`]. Preparation is
//! the one slow step (shape generation plus splitting), so it runs on its
//! own task and reports back into the same mailbox as a `Start` or
//! `PrepareFailed` command.

use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::protocol::{INTERNAL_ERROR, UNPROCESSABLE};
use shared::{CombatSummary, Notification, Piece, Rotation, Unit, Vector};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::ops::ControlFlow;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::generator::{GenerateError, ShapeGenerator, DEFAULT_SPREADING_FACTOR};
use crate::mailbox::{mailbox, Address, Mailbox, MailboxClosed};
use crate::player::PlayerHandle;
use crate::splitter::{SplitError, TerritorySplitter};

/// Largest translation component a move may use. Keeps every coordinate a
/// unit can hold far away from `i32` overflow.
pub const MAX_TRANSLATION: i32 = 1 << 16;

/// How targets are generated and split for a match.
#[derive(Debug, Clone, PartialEq)]
pub struct CombatSettings {
    pub target_size: Vector,
    pub density: f64,
    pub spreading_factor: f64,
    /// Pieces handed out per player; the split count is roster size times this.
    pub pieces_per_player: usize,
}

impl Default for CombatSettings {
    fn default() -> Self {
        Self {
            target_size: Vector::new(5, 5, 5),
            density: 0.5,
            spreading_factor: DEFAULT_SPREADING_FACTOR,
            pieces_per_player: 1,
        }
    }
}

/// Commands accepted by a match's mailbox.
#[derive(Debug)]
pub enum CombatCommand {
    /// Seats a player. The reply says whether the player got a seat.
    AddPlayer {
        player: PlayerHandle,
        reply: oneshot::Sender<bool>,
    },
    RemovePlayer {
        player: PlayerHandle,
    },
    /// Replaces the stored handle of a seated player, e.g. after a rename.
    UpdatePlayer {
        player: PlayerHandle,
    },
    Prepare,
    Start {
        target: Piece,
        pieces: Vec<Piece>,
        units: Vec<Unit>,
    },
    PrepareFailed {
        reason: String,
    },
    PlayTurn {
        player: PlayerHandle,
        serial: String,
        piece_index: usize,
        rotation: Rotation,
        translation: Vector,
    },
    Summarize {
        reply: oneshot::Sender<CombatSummary>,
    },
}

/// Why a move was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("combat has not started")]
    NotStarted,
    #[error("player {0} is not part of this combat")]
    UnknownPlayer(String),
    #[error("piece {0} does not exist")]
    UnknownPiece(usize),
    #[error("piece {0} has already been played")]
    AlreadyPlayed(usize),
    #[error("a piece has already been played this turn")]
    TurnAlreadyPlayed,
    #[error("rotation is not a multiple of 90 degrees")]
    IllegalRotation,
    #[error("translation {0} is out of range")]
    TranslationOutOfRange(Vector),
    #[error("piece collides with unit {0}")]
    Collision(usize),
}

impl MoveError {
    pub fn code(&self) -> u16 {
        UNPROCESSABLE
    }

    /// Placement failures are answered with a negative acknowledgment so
    /// the player can retry with another transform; everything else is a
    /// protocol error.
    pub fn is_placement(&self) -> bool {
        matches!(
            self,
            MoveError::IllegalRotation
                | MoveError::TranslationOutOfRange(_)
                | MoveError::Collision(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("target generation failed: {0}")]
    Generate(#[from] GenerateError),
    #[error("target splitting failed: {0}")]
    Split(#[from] SplitError),
}

/// Sending side of a running match.
#[derive(Debug, Clone)]
pub struct CombatHandle {
    uuid: String,
    address: Address<CombatCommand>,
}

impl CombatHandle {
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub async fn notify(&self, command: CombatCommand) -> Result<(), MailboxClosed> {
        self.address.send(command).await
    }

    /// Asks the match to seat `player`. `Some(false)` when the match turned
    /// the player away (and already told them why), `None` once it is gone.
    pub async fn add_player(&self, player: PlayerHandle) -> Option<bool> {
        let (reply, answer) = oneshot::channel();
        self.notify(CombatCommand::AddPlayer { player, reply })
            .await
            .ok()?;
        answer.await.ok()
    }

    /// Asks the match for a snapshot. `None` once the match is gone.
    pub async fn summarize(&self) -> Option<CombatSummary> {
        let (reply, answer) = oneshot::channel();
        self.notify(CombatCommand::Summarize { reply }).await.ok()?;
        answer.await.ok()
    }
}

/// State of a started match.
#[derive(Debug)]
struct Board {
    turn: usize,
    target: Piece,
    pieces: Vec<Piece>,
    units: Vec<Unit>,
    played: HashMap<String, HashSet<usize>>,
    player_index: HashMap<String, usize>,
}

impl Board {
    fn new<'a>(
        target: Piece,
        pieces: Vec<Piece>,
        units: Vec<Unit>,
        roster: impl Iterator<Item = &'a String>,
    ) -> Self {
        Self {
            turn: 1,
            target,
            pieces,
            units,
            played: HashMap::new(),
            player_index: roster
                .enumerate()
                .map(|(index, uuid)| (uuid.clone(), index))
                .collect(),
        }
    }

    fn played_count(&self, uuid: &str) -> usize {
        self.played.get(uuid).map_or(0, HashSet::len)
    }

    /// Unit a player builds on during the current turn. Shifts by one unit
    /// every turn so the units rotate through the roster.
    fn unit_of(&self, uuid: &str) -> Option<usize> {
        if self.units.is_empty() {
            return None;
        }
        let index = self.player_index.get(uuid)?;
        Some((index + self.turn) % self.units.len())
    }

    /// Validates and applies one move, returning the unit it went into.
    /// Nothing is mutated unless the move succeeds.
    fn play(
        &mut self,
        uuid: &str,
        piece_index: usize,
        rotation: &Rotation,
        translation: Vector,
    ) -> Result<usize, MoveError> {
        let piece = self
            .pieces
            .get(piece_index)
            .ok_or(MoveError::UnknownPiece(piece_index))?;
        if self
            .played
            .get(uuid)
            .is_some_and(|played| played.contains(&piece_index))
        {
            return Err(MoveError::AlreadyPlayed(piece_index));
        }
        if self.played_count(uuid) >= self.turn {
            return Err(MoveError::TurnAlreadyPlayed);
        }
        if !rotation.is_right_angled() {
            return Err(MoveError::IllegalRotation);
        }
        if [translation.x, translation.y, translation.z]
            .iter()
            .any(|c| c.unsigned_abs() > MAX_TRANSLATION as u32)
        {
            return Err(MoveError::TranslationOutOfRange(translation));
        }
        let unit_id = self
            .unit_of(uuid)
            .ok_or_else(|| MoveError::UnknownPlayer(uuid.to_string()))?;

        let placed = piece.transformed(rotation, translation);
        if placed.collides_with(&self.units[unit_id].piece) {
            return Err(MoveError::Collision(unit_id));
        }

        self.played
            .entry(uuid.to_string())
            .or_default()
            .insert(piece_index);
        self.units[unit_id].merge(uuid, piece_index, &placed);
        Ok(unit_id)
    }
}

#[derive(Debug)]
enum Phase {
    Filling,
    Preparing,
    Started(Box<Board>),
}

/// One match and its mailbox. Consumed by [`Combat::run`].
pub struct Combat {
    uuid: String,
    max_players: usize,
    players: BTreeMap<String, PlayerHandle>,
    phase: Phase,
    settings: CombatSettings,
    rng: StdRng,
    address: Address<CombatCommand>,
    mailbox: Mailbox<CombatCommand>,
    /// Commands the match queued for itself; served before the mailbox.
    followups: VecDeque<CombatCommand>,
}

impl Combat {
    pub fn new(
        uuid: impl Into<String>,
        max_players: usize,
        settings: CombatSettings,
        rng: StdRng,
        capacity: usize,
    ) -> (Self, CombatHandle) {
        let uuid = uuid.into();
        let (address, mailbox) = mailbox(capacity);
        let handle = CombatHandle {
            uuid: uuid.clone(),
            address: address.clone(),
        };
        let combat = Self {
            uuid,
            max_players: max_players.max(1),
            players: BTreeMap::new(),
            phase: Phase::Filling,
            settings,
            rng,
            address,
            mailbox,
            followups: VecDeque::new(),
        };
        (combat, handle)
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Processes commands until the match ends.
    pub async fn run(mut self) {
        info!(
            "Combat {} open for {} players",
            self.uuid, self.max_players
        );
        loop {
            let command = match self.followups.pop_front() {
                Some(command) => command,
                None => match self.mailbox.recv().await {
                    Some(command) => command,
                    None => break,
                },
            };
            if self.handle(command).await.is_break() {
                break;
            }
        }
        info!("Combat {} ended", self.uuid);
    }

    async fn handle(&mut self, command: CombatCommand) -> ControlFlow<()> {
        match command {
            CombatCommand::AddPlayer { player, reply } => {
                let uuid = player.uuid().to_string();
                let seated = self.add_player(player).await;
                if reply.send(seated).is_err() {
                    debug!("Nobody waited for {} to join combat {}", uuid, self.uuid);
                }
                ControlFlow::Continue(())
            }
            CombatCommand::RemovePlayer { player } => self.remove_player(&player).await,
            CombatCommand::UpdatePlayer { player } => {
                if let Some(seated) = self.players.get_mut(player.uuid()) {
                    *seated = player;
                }
                ControlFlow::Continue(())
            }
            CombatCommand::Prepare => {
                self.prepare();
                ControlFlow::Continue(())
            }
            CombatCommand::Start {
                target,
                pieces,
                units,
            } => {
                self.start(target, pieces, units).await;
                ControlFlow::Continue(())
            }
            CombatCommand::PrepareFailed { reason } => {
                error!("Combat {} could not be prepared: {}", self.uuid, reason);
                self.broadcast(Notification::error(INTERNAL_ERROR, reason))
                    .await;
                ControlFlow::Break(())
            }
            CombatCommand::PlayTurn {
                player,
                serial,
                piece_index,
                rotation,
                translation,
            } => {
                self.play_turn(&player, serial, piece_index, &rotation, translation)
                    .await
            }
            CombatCommand::Summarize { reply } => {
                if reply.send(self.summary()).is_err() {
                    debug!("Summary of combat {} was no longer wanted", self.uuid);
                }
                ControlFlow::Continue(())
            }
        }
    }

    fn summary(&self) -> CombatSummary {
        // A preparing match is already closed to newcomers, so it counts as started.
        let (started, turn) = match &self.phase {
            Phase::Filling => (false, 0),
            Phase::Preparing => (true, 0),
            Phase::Started(board) => (true, board.turn),
        };
        CombatSummary {
            uuid: self.uuid.clone(),
            max_players: self.max_players,
            started,
            turn,
            players: self.players.values().map(PlayerHandle::as_sendable).collect(),
        }
    }

    async fn broadcast(&self, notification: Notification) {
        for player in self.players.values() {
            player.notify(notification.clone()).await;
        }
    }

    /// Returns whether the player holds a seat afterwards.
    async fn add_player(&mut self, player: PlayerHandle) -> bool {
        if !matches!(self.phase, Phase::Filling) {
            player
                .notify(Notification::error(
                    UNPROCESSABLE,
                    "combat has already started",
                ))
                .await;
            return false;
        }
        if self.players.contains_key(player.uuid()) {
            player
                .notify(Notification::CombatJoin {
                    combat: self.summary(),
                })
                .await;
            return true;
        }
        if self.players.len() >= self.max_players {
            player
                .notify(Notification::error(UNPROCESSABLE, "combat is full"))
                .await;
            return false;
        }

        self.broadcast(Notification::CombatPlayerJoined {
            player: player.as_sendable(),
        })
        .await;
        self.players.insert(player.uuid().to_string(), player.clone());
        info!(
            "Player {} joined combat {} ({}/{})",
            player.uuid(),
            self.uuid,
            self.players.len(),
            self.max_players
        );
        player
            .notify(Notification::CombatJoin {
                combat: self.summary(),
            })
            .await;

        if self.players.len() == self.max_players {
            self.followups.push_back(CombatCommand::Prepare);
        }
        true
    }

    async fn remove_player(&mut self, player: &PlayerHandle) -> ControlFlow<()> {
        if self.players.remove(player.uuid()).is_none() {
            debug!(
                "Player {} is not in combat {}, nothing to remove",
                player.uuid(),
                self.uuid
            );
            return ControlFlow::Continue(());
        }
        info!("Player {} left combat {}", player.uuid(), self.uuid);
        self.broadcast(Notification::CombatPlayerLeft {
            uuid: player.uuid().to_string(),
        })
        .await;

        if self.players.is_empty() {
            return ControlFlow::Break(());
        }
        self.advance_if_complete().await
    }

    fn prepare(&mut self) {
        if !matches!(self.phase, Phase::Filling) {
            debug!("Combat {} is already prepared", self.uuid);
            return;
        }
        self.phase = Phase::Preparing;

        let roster = self.players.len();
        let settings = self.settings.clone();
        let address = self.address.clone();
        let uuid = self.uuid.clone();
        let mut rng = StdRng::seed_from_u64(self.rng.gen());
        info!("Preparing combat {} for {} players", uuid, roster);

        tokio::spawn(async move {
            let command = match build_board(&settings, roster, &mut rng).await {
                Ok((target, pieces)) => {
                    info!(
                        "Combat {} prepared: {} target cells in {} pieces",
                        uuid,
                        target.len(),
                        pieces.len()
                    );
                    CombatCommand::Start {
                        target,
                        pieces,
                        units: (0..roster).map(|_| Unit::new()).collect(),
                    }
                }
                Err(e) => CombatCommand::PrepareFailed {
                    reason: e.to_string(),
                },
            };
            if address.send(command).await.is_err() {
                warn!("Combat {} ended before preparation finished", uuid);
            }
        });
    }

    async fn start(&mut self, target: Piece, pieces: Vec<Piece>, units: Vec<Unit>) {
        if !matches!(self.phase, Phase::Preparing) {
            warn!("Ignoring unexpected start of combat {}", self.uuid);
            return;
        }
        let board = Board::new(target, pieces, units, self.players.keys());

        self.broadcast(Notification::CombatStart {
            uuid: self.uuid.clone(),
            target: board.target.clone(),
            units: board.units.clone(),
            pieces: board.pieces.clone(),
        })
        .await;
        notify_new_turn(&self.players, &board).await;
        self.phase = Phase::Started(Box::new(board));
    }

    async fn play_turn(
        &mut self,
        player: &PlayerHandle,
        serial: String,
        piece_index: usize,
        rotation: &Rotation,
        translation: Vector,
    ) -> ControlFlow<()> {
        let outcome = match &mut self.phase {
            Phase::Started(board) if self.players.contains_key(player.uuid()) => {
                board.play(player.uuid(), piece_index, rotation, translation)
            }
            Phase::Started(_) => Err(MoveError::UnknownPlayer(player.uuid().to_string())),
            _ => Err(MoveError::NotStarted),
        };

        let unit_id = match outcome {
            Ok(unit_id) => unit_id,
            Err(e) if e.is_placement() => {
                debug!("Rejected move of {}: {}", player.uuid(), e);
                player
                    .notify(Notification::MoveAcknowledgment {
                        serial,
                        valid: false,
                        error_message: e.to_string(),
                    })
                    .await;
                return ControlFlow::Continue(());
            }
            Err(e) => {
                debug!("Refused turn of {}: {}", player.uuid(), e);
                player.notify(Notification::error(e.code(), e.to_string())).await;
                return ControlFlow::Continue(());
            }
        };

        player
            .notify(Notification::MoveAcknowledgment {
                serial,
                valid: true,
                error_message: String::new(),
            })
            .await;

        if let Phase::Started(board) = &self.phase {
            let notification = Notification::CombatPlayerTurn {
                player_uuid: player.uuid().to_string(),
                piece_id: piece_index,
                unit_id,
                unit: board.units[unit_id].clone(),
            };
            self.broadcast(notification).await;
        }
        self.advance_if_complete().await
    }

    /// Moves to the next turn once every remaining player has played for
    /// the current one, ending the match after the last piece.
    async fn advance_if_complete(&mut self) -> ControlFlow<()> {
        let Phase::Started(board) = &mut self.phase else {
            return ControlFlow::Continue(());
        };
        let complete = self
            .players
            .keys()
            .all(|uuid| board.played_count(uuid) >= board.turn);
        if !complete {
            return ControlFlow::Continue(());
        }

        board.turn += 1;
        if board.turn > board.pieces.len() {
            info!("Combat {} played out all {} turns", self.uuid, board.pieces.len());
            for player in self.players.values() {
                player.notify(Notification::CombatEnd {}).await;
            }
            return ControlFlow::Break(());
        }
        debug!("Combat {} moves to turn {}", self.uuid, board.turn);
        notify_new_turn(&self.players, board).await;
        ControlFlow::Continue(())
    }
}

async fn notify_new_turn(players: &BTreeMap<String, PlayerHandle>, board: &Board) {
    for (uuid, player) in players {
        if let Some(unit_id) = board.unit_of(uuid) {
            player
                .notify(Notification::CombatNewTurn {
                    turn_id: board.turn,
                    unit_id,
                })
                .await;
        }
    }
}

/// Generates a target and splits it into one piece per player and round.
pub async fn build_board(
    settings: &CombatSettings,
    roster: usize,
    rng: &mut StdRng,
) -> Result<(Piece, Vec<Piece>), PrepareError> {
    let generator = ShapeGenerator::new(settings.spreading_factor);
    let target = generator.generate(settings.target_size, settings.density, rng)?;
    let count = roster * settings.pieces_per_player;
    let pieces = TerritorySplitter::new().split(&target, count, rng).await?;
    Ok((target, pieces))
}

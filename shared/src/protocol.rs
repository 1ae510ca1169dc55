use serde::{Deserialize, Serialize};

use crate::piece::Piece;
use crate::rotation::Rotation;
use crate::unit::Unit;
use crate::vector::Vector;

pub const NOT_FOUND: u16 = 404;
pub const UNPROCESSABLE: u16 = 422;
pub const INTERNAL_ERROR: u16 = 500;

/// Commands sent by clients, one JSON object per line, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    Register {
        username: String,
    },
    CombatList,
    #[serde(rename_all = "camelCase")]
    CombatCreate {
        max_players: usize,
    },
    CombatJoin {
        uuid: String,
    },
    CombatLeave,
    #[serde(rename_all = "camelCase")]
    CombatPlayTurn {
        #[serde(default)]
        serial: String,
        piece_index: usize,
        rotation: Rotation,
        translation: Vector,
    },
}

impl Request {
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}

/// Public view of a connected player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub uuid: String,
    pub username: String,
    pub level: u32,
}

/// Public view of a match, as listed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatSummary {
    pub uuid: String,
    pub max_players: usize,
    pub started: bool,
    pub turn: usize,
    pub players: Vec<PlayerSummary>,
}

/// Messages pushed to clients, serialized as `{"type": ..., "command": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "command")]
pub enum Notification {
    Welcome {
        message: String,
    },
    Registered {
        username: String,
    },
    Error {
        code: u16,
        reason: String,
    },
    CombatList {
        combats: Vec<CombatSummary>,
    },
    CombatJoin {
        combat: CombatSummary,
    },
    CombatPlayerJoined {
        player: PlayerSummary,
    },
    CombatPlayerLeft {
        uuid: String,
    },
    CombatStart {
        uuid: String,
        target: Piece,
        units: Vec<Unit>,
        pieces: Vec<Piece>,
    },
    #[serde(rename_all = "camelCase")]
    CombatNewTurn {
        turn_id: usize,
        unit_id: usize,
    },
    #[serde(rename_all = "camelCase")]
    CombatPlayerTurn {
        #[serde(rename = "playerUUID")]
        player_uuid: String,
        piece_id: usize,
        unit_id: usize,
        unit: Unit,
    },
    #[serde(rename_all = "camelCase")]
    MoveAcknowledgment {
        serial: String,
        valid: bool,
        error_message: String,
    },
    CombatEnd {},
}

impl Notification {
    pub fn error(code: u16, reason: impl Into<String>) -> Self {
        Notification::Error {
            code,
            reason: reason.into(),
        }
    }

    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

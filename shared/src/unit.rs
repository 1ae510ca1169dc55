use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::piece::Piece;

/// A shared construction that players merge pieces into, turn after turn.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Unit {
    #[serde(flatten)]
    pub piece: Piece,
    /// Player uuid to the piece indices that player merged into this unit, in play order.
    pub moves: BTreeMap<String, Vec<usize>>,
}

impl Unit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges an already transformed piece and records the move.
    ///
    /// The unit is re-centered afterwards, so later moves are expressed
    /// relative to the new bounding box.
    pub fn merge(&mut self, player: &str, piece_index: usize, placed: &Piece) {
        self.piece.merge(placed.content.iter().copied());
        self.moves
            .entry(player.to_string())
            .or_default()
            .push(piece_index);
        self.piece.clean_up();
    }

    pub fn moves_of(&self, player: &str) -> &[usize] {
        self.moves.get(player).map(Vec::as_slice).unwrap_or(&[])
    }
}

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

use crate::cell::Cell;
use crate::rotation::Rotation;
use crate::vector::{Vector, DIRECTIONS};

/// A set of voxels together with the size of its bounding box.
///
/// After [`Piece::clean_up`] every cell lies within `[-size/2, size/2]` on each axis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Piece {
    pub size: Vector,
    pub content: Vec<Cell>,
}

impl Piece {
    pub fn new(size: Vector, content: Vec<Cell>) -> Self {
        Self { size, content }
    }

    /// Builds a piece from loose cells, recomputing its size and centering it.
    pub fn from_cells(content: Vec<Cell>) -> Self {
        let mut piece = Self::new(Vector::ZERO, content);
        piece.clean_up();
        piece
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Smallest and largest corner of the cells actually present.
    pub fn bounds(&self) -> Option<(Vector, Vector)> {
        let first = self.content.first()?.at;
        Some(
            self.content
                .iter()
                .fold((first, first), |(lo, hi), cell| (lo.min(cell.at), hi.max(cell.at))),
        )
    }

    /// Shrinks the size to the real extent of the cells and re-centers them around the origin.
    pub fn clean_up(&mut self) {
        let Some((lo, hi)) = self.bounds() else {
            self.size = Vector::ZERO;
            return;
        };
        self.size = hi - lo + Vector::new(1, 1, 1);
        let offset = (lo + self.size.halved()).inverted();
        self.translate(offset);
    }

    pub fn translate(&mut self, offset: Vector) {
        for cell in &mut self.content {
            cell.translate(offset);
        }
    }

    pub fn rotate(&mut self, q: &Rotation) {
        for cell in &mut self.content {
            cell.rotate(q);
        }
    }

    /// A copy of this piece rotated around the origin, then translated.
    pub fn transformed(&self, q: &Rotation, offset: Vector) -> Piece {
        let mut piece = self.clone();
        piece.rotate(q);
        piece.translate(offset);
        piece
    }

    pub fn positions(&self) -> HashSet<Vector> {
        self.content.iter().map(|cell| cell.at).collect()
    }

    /// True if any cell of `other` sits on a position already occupied here.
    pub fn collides_with(&self, other: &Piece) -> bool {
        let occupied = self.positions();
        other.content.iter().any(|cell| occupied.contains(&cell.at))
    }

    pub fn merge(&mut self, cells: impl IntoIterator<Item = Cell>) {
        self.content.extend(cells);
    }

    /// True if every cell can be reached from every other through face-adjacent cells.
    pub fn is_connected(&self) -> bool {
        let positions = self.positions();
        let Some(start) = self.content.first().map(|cell| cell.at) else {
            return true;
        };

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for direction in DIRECTIONS {
                let neighbor = current + direction;
                if positions.contains(&neighbor) && visited.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        visited.len() == positions.len()
    }
}

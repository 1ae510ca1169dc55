use crate::cell::Cell;
use crate::piece::Piece;
use crate::vector::Vector;

/// Dense 3D grid of integers covering a piece's bounding box.
///
/// Grid indices run from zero to `size - 1` on each axis; `origin` is the
/// piece coordinate of index `(0, 0, 0)`. Zero means empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentArray {
    size: Vector,
    origin: Vector,
    content: Vec<i32>,
}

impl ContentArray {
    /// A zero-filled grid.
    pub fn new(size: Vector, origin: Vector) -> Self {
        Self::filled(size, origin, 0)
    }

    pub fn filled(size: Vector, origin: Vector, value: i32) -> Self {
        Self {
            size,
            origin,
            content: vec![value; size.volume()],
        }
    }

    /// A grid spanning the cells of `piece`, with every cell position set to `fill`.
    pub fn from_piece(piece: &Piece, fill: i32) -> Self {
        let Some((lo, hi)) = piece.bounds() else {
            return Self::new(Vector::ZERO, Vector::ZERO);
        };
        let mut array = Self::new(hi - lo + Vector::new(1, 1, 1), lo);
        for cell in &piece.content {
            array.set(cell.at - lo, fill);
        }
        array
    }

    pub fn size(&self) -> Vector {
        self.size
    }

    pub fn contains(&self, at: Vector) -> bool {
        at.x >= 0
            && at.y >= 0
            && at.z >= 0
            && at.x < self.size.x
            && at.y < self.size.y
            && at.z < self.size.z
    }

    fn index(&self, at: Vector) -> Option<usize> {
        if !self.contains(at) {
            return None;
        }
        let (sx, sy) = (self.size.x as usize, self.size.y as usize);
        Some((at.z as usize * sy + at.y as usize) * sx + at.x as usize)
    }

    /// Value at a grid index, or zero outside the grid.
    pub fn get(&self, at: Vector) -> i32 {
        self.index(at).map_or(0, |i| self.content[i])
    }

    /// Writes a value; returns false if `at` is outside the grid.
    pub fn set(&mut self, at: Vector, value: i32) -> bool {
        match self.index(at) {
            Some(i) => {
                self.content[i] = value;
                true
            }
            None => false,
        }
    }

    /// Adds `delta` to the value at `at`; ignored outside the grid.
    pub fn increment(&mut self, at: Vector, delta: i32) {
        if let Some(i) = self.index(at) {
            self.content[i] += delta;
        }
    }

    /// Iterates every grid index together with its value.
    pub fn iter(&self) -> impl Iterator<Item = (Vector, i32)> + '_ {
        let (sx, sy) = (self.size.x.max(0), self.size.y.max(0));
        self.content.iter().enumerate().map(move |(i, value)| {
            let i = i as i32;
            (Vector::new(i % sx, (i / sx) % sy, i / (sx * sy)), *value)
        })
    }

    /// Converts a grid index to the piece coordinate it stands for.
    pub fn to_world(&self, at: Vector) -> Vector {
        at + self.origin
    }

    pub fn count(&self, predicate: impl Fn(i32) -> bool) -> usize {
        self.content.iter().filter(|value| predicate(**value)).count()
    }

    /// One cell per non-zero entry, carrying its value, in piece coordinates.
    pub fn to_piece(&self) -> Piece {
        let content = self
            .iter()
            .filter(|(_, value)| *value != 0)
            .map(|(at, value)| Cell::new(self.to_world(at), value))
            .collect();
        Piece::new(self.size, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_is_zeroed() {
        let array = ContentArray::new(Vector::new(3, 4, 5), Vector::ZERO);
        assert_eq!(array.iter().count(), 60);
        assert_eq!(array.count(|v| v != 0), 0);
    }

    #[test]
    fn test_get_set_bounds() {
        let mut array = ContentArray::new(Vector::new(2, 2, 2), Vector::ZERO);
        assert!(array.set(Vector::new(1, 0, 1), 5));
        assert!(!array.set(Vector::new(2, 0, 0), 5));
        assert!(!array.set(Vector::new(0, -1, 0), 5));
        assert_eq!(array.get(Vector::new(1, 0, 1)), 5);
        assert_eq!(array.get(Vector::new(9, 9, 9)), 0);
    }

    #[test]
    fn test_iter_visits_each_index_once() {
        let array = ContentArray::new(Vector::new(2, 3, 4), Vector::ZERO);
        let seen: HashSet<Vector> = array.iter().map(|(at, _)| at).collect();
        assert_eq!(seen.len(), 24);
        assert!(seen.iter().all(|at| array.contains(*at)));
    }

    #[test]
    fn test_increment() {
        let mut array = ContentArray::new(Vector::new(1, 1, 1), Vector::ZERO);
        array.increment(Vector::ZERO, 2);
        array.increment(Vector::ZERO, 1);
        array.increment(Vector::new(1, 0, 0), 1);
        assert_eq!(array.get(Vector::ZERO), 3);
    }

    #[test]
    fn test_piece_round_trip_keeps_filled_cells() {
        let mut array = ContentArray::new(Vector::new(5, 5, 5), Vector::new(-2, -2, -2));
        for at in [Vector::new(0, 0, 0), Vector::new(2, 2, 2), Vector::new(4, 1, 3)] {
            array.set(at, 1);
        }
        let piece = array.to_piece();
        assert_eq!(piece.len(), 3);
        assert!(piece.positions().contains(&Vector::ZERO));

        let back = ContentArray::from_piece(&piece, 1);
        let filled = |a: &ContentArray| -> HashSet<Vector> {
            a.iter()
                .filter(|(_, v)| *v != 0)
                .map(|(at, _)| a.to_world(at))
                .collect()
        };
        assert_eq!(filled(&array), filled(&back));
    }

    #[test]
    fn test_from_empty_piece() {
        let array = ContentArray::from_piece(&Piece::default(), -1);
        assert_eq!(array.size().volume(), 0);
        assert_eq!(array.to_piece().len(), 0);
    }
}

use serde::{Deserialize, Serialize};

use crate::rotation::Rotation;
use crate::vector::Vector;

/// A voxel position tagged with a value.
///
/// The value means "filled" (generation round) for generated shapes and
/// "owner" (partition id) once a shape has been split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    #[serde(flatten)]
    pub at: Vector,
    pub value: i32,
}

impl Cell {
    pub const fn new(at: Vector, value: i32) -> Self {
        Self { at, value }
    }

    pub const fn from_ints(x: i32, y: i32, z: i32, value: i32) -> Self {
        Self::new(Vector::new(x, y, z), value)
    }

    pub fn translate(&mut self, offset: Vector) {
        self.at = self.at + offset;
    }

    pub fn rotate(&mut self, q: &Rotation) {
        self.at = self.at.rotated(q);
    }

    /// Two cells collide when they occupy the same lattice position, whatever their values.
    pub fn collides_with(&self, other: &Cell) -> bool {
        self.at == other.at
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

use crate::rotation::Rotation;

/// A point (or extent) on the integer voxel lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// The six face-adjacent directions of a voxel.
pub const DIRECTIONS: [Vector; 6] = [
    Vector::new(-1, 0, 0),
    Vector::new(1, 0, 0),
    Vector::new(0, -1, 0),
    Vector::new(0, 1, 0),
    Vector::new(0, 0, -1),
    Vector::new(0, 0, 1),
];

impl Vector {
    pub const ZERO: Vector = Vector::new(0, 0, 0);

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn inverted(self) -> Vector {
        -self
    }

    /// Integer half of each component, used to find the center of an extent.
    pub fn halved(self) -> Vector {
        Vector::new(self.x / 2, self.y / 2, self.z / 2)
    }

    pub fn abs(self) -> Vector {
        Vector::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    pub fn min(self, other: Vector) -> Vector {
        Vector::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    pub fn max(self, other: Vector) -> Vector {
        Vector::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    /// Number of lattice cells in an extent of this size. Non-positive extents are empty.
    pub fn volume(self) -> usize {
        if self.x <= 0 || self.y <= 0 || self.z <= 0 {
            return 0;
        }
        self.x as usize * self.y as usize * self.z as usize
    }

    /// True when every component is positive and odd, so the extent has a unique center cell.
    pub fn is_odd_extent(self) -> bool {
        [self.x, self.y, self.z].iter().all(|c| *c > 0 && c % 2 == 1)
    }

    /// Rotates this point around the origin and snaps the result back onto the lattice.
    pub fn rotated(self, q: &Rotation) -> Vector {
        let (px, py, pz) = (self.x as f64, self.y as f64, self.z as f64);
        let (x, y, z, w) = (q.x, q.y, q.z, q.w);
        Vector::new(
            round_half_up(
                w * w * px + 2.0 * y * w * pz - 2.0 * z * w * py + x * x * px + 2.0 * y * x * py
                    + 2.0 * z * x * pz
                    - z * z * px
                    - y * y * px,
            ),
            round_half_up(
                2.0 * x * y * px + y * y * py + 2.0 * z * y * pz + 2.0 * w * z * px - z * z * py
                    + w * w * py
                    - 2.0 * x * w * pz
                    - x * x * py,
            ),
            round_half_up(
                2.0 * x * z * px + 2.0 * y * z * py + z * z * pz - 2.0 * w * y * px - y * y * pz
                    + 2.0 * w * x * py
                    - x * x * pz
                    + w * w * pz,
            ),
        )
    }
}

fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, other: Vector) -> Vector {
        Vector::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vector {
    type Output = Vector;

    fn sub(self, other: Vector) -> Vector {
        Vector::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Neg for Vector {
    type Output = Vector;

    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y, -self.z)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

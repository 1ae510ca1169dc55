//! Procedural target shapes grown by a weighted, cellular-automaton style flood fill.
//!
//! Growth starts from the center cell of the requested extent. Every empty
//! cell touching the shape carries a weight equal to the number of filled
//! neighbours it has; each round draws a batch of those frontier cells at
//! random, proportionally to their weight, and fills them. Cells surrounded
//! by more of the shape are preferred, which keeps the blob compact instead
//! of spindly, and since only frontier cells are ever drawn the result is
//! always a single face-connected shape.

use log::{debug, error};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use shared::{ContentArray, Piece, Vector, DIRECTIONS};
use thiserror::Error;

/// Default growth rate: each round adds about this fraction of the current shape.
pub const DEFAULT_SPREADING_FACTOR: f64 = 0.1;

/// Upper bound on the cells filled in a single round.
const MAX_CELLS_PER_ROUND: usize = 100;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerateError {
    #[error("shape size {0} must have positive, odd components")]
    InvalidSize(Vector),
    #[error("density {0} must lie within [0, 1]")]
    InvalidDensity(f64),
}

/// Grows random connected voxel shapes.
#[derive(Debug, Clone, Copy)]
pub struct ShapeGenerator {
    spreading_factor: f64,
}

impl Default for ShapeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SPREADING_FACTOR)
    }
}

impl ShapeGenerator {
    /// `spreading_factor` only trades round count against batch size; it has
    /// no influence on the validity of the result.
    pub fn new(spreading_factor: f64) -> Self {
        Self { spreading_factor }
    }

    /// Number of cells a shape of this size and density should contain.
    pub fn target_count(size: Vector, density: f64) -> usize {
        (size.volume() as f64 * density).floor() as usize
    }

    /// Grows one shape filling about `density` of `size`, centered on the origin.
    ///
    /// The center cell is always filled, so a density of zero still yields a
    /// single-cell piece. The returned piece keeps `size` as its bounding box.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        size: Vector,
        density: f64,
        rng: &mut R,
    ) -> Result<Piece, GenerateError> {
        if !size.is_odd_extent() {
            return Err(GenerateError::InvalidSize(size));
        }
        if !(0.0..=1.0).contains(&density) {
            return Err(GenerateError::InvalidDensity(density));
        }

        let target = Self::target_count(size, density).max(1);
        let mut growth = Growth::new(size);
        let mut round = 1;
        growth.fill(size.halved(), round);

        while growth.filled < target {
            round += 1;
            let frontier: Vec<(Vector, i32)> =
                growth.weights.iter().filter(|(_, weight)| *weight > 0).collect();
            let wanted = self
                .cells_per_round(growth.filled, target)
                .min(frontier.len());

            let lottery = match WeightedIndex::new(frontier.iter().map(|(_, w)| *w as u32)) {
                Ok(lottery) => lottery,
                Err(e) => {
                    error!("Shape growth stalled at {} / {} cells: {}", growth.filled, target, e);
                    break;
                }
            };

            let mut placed = 0;
            while placed < wanted {
                let (at, _) = frontier[lottery.sample(rng)];
                if growth.fill(at, round) {
                    placed += 1;
                }
            }
        }

        debug!(
            "Grew a {} shape of {} cells in {} rounds",
            size, growth.filled, round
        );
        Ok(growth.cells.to_piece())
    }

    fn cells_per_round(&self, filled: usize, target: usize) -> usize {
        let wanted = (filled as f64 * self.spreading_factor).max(1.0).round() as usize;
        wanted.min(MAX_CELLS_PER_ROUND).min(target.saturating_sub(filled))
    }
}

/// Working grids of one generation run.
struct Growth {
    /// Non-zero entries are filled, holding the round they were filled in.
    cells: ContentArray,
    /// Number of filled neighbours of each empty cell.
    weights: ContentArray,
    filled: usize,
}

impl Growth {
    fn new(size: Vector) -> Self {
        let origin = size.halved().inverted();
        Self {
            cells: ContentArray::new(size, origin),
            weights: ContentArray::new(size, origin),
            filled: 0,
        }
    }

    /// Fills a cell and raises the weight of its empty neighbours.
    /// Returns false if the cell was already filled.
    fn fill(&mut self, at: Vector, round: i32) -> bool {
        if self.cells.get(at) != 0 {
            return false;
        }
        self.cells.set(at, round);
        self.weights.set(at, 0);
        self.filled += 1;

        for direction in DIRECTIONS {
            let neighbor = at + direction;
            if self.cells.contains(neighbor) && self.cells.get(neighbor) == 0 {
                self.weights.increment(neighbor, 1);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn cube(side: i32) -> Vector {
        Vector::new(side, side, side)
    }

    #[test]
    fn test_rejects_even_or_empty_sizes() {
        let mut rng = StdRng::seed_from_u64(1);
        let generator = ShapeGenerator::default();
        for size in [Vector::new(4, 5, 5), Vector::new(5, 5, 0), Vector::new(-3, 3, 3)] {
            assert_eq!(
                generator.generate(size, 0.5, &mut rng),
                Err(GenerateError::InvalidSize(size))
            );
        }
    }

    #[test]
    fn test_rejects_density_out_of_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let generator = ShapeGenerator::default();
        assert!(matches!(
            generator.generate(cube(5), -0.1, &mut rng),
            Err(GenerateError::InvalidDensity(_))
        ));
        assert!(matches!(
            generator.generate(cube(5), 1.5, &mut rng),
            Err(GenerateError::InvalidDensity(_))
        ));
        assert!(generator.generate(cube(5), f64::NAN, &mut rng).is_err());
    }

    #[test]
    fn test_zero_density_yields_center_cell() {
        let mut rng = StdRng::seed_from_u64(7);
        let piece = ShapeGenerator::default()
            .generate(cube(5), 0.0, &mut rng)
            .unwrap();
        assert_eq!(piece.len(), 1);
        assert_eq!(piece.content[0].at, Vector::ZERO);
        assert_eq!(piece.size, cube(5));
    }

    #[test]
    fn test_full_density_fills_every_cell() {
        let mut rng = StdRng::seed_from_u64(7);
        let piece = ShapeGenerator::default()
            .generate(cube(5), 1.0, &mut rng)
            .unwrap();
        assert_eq!(piece.len(), 125);
        assert_eq!(piece.positions().len(), 125);
    }

    #[test]
    fn test_shapes_are_connected_and_centered() {
        let generator = ShapeGenerator::default();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let size = Vector::new(7, 5, 3);
            let density = 0.1 + (seed as f64) * 0.04;
            let piece = generator.generate(size, density, &mut rng).unwrap();

            assert_eq!(
                piece.len(),
                ShapeGenerator::target_count(size, density).max(1)
            );
            assert!(piece.is_connected(), "seed {} produced a split shape", seed);
            assert!(piece.positions().contains(&Vector::ZERO));

            let half = size.halved();
            for cell in &piece.content {
                assert!(cell.at.abs().x <= half.x);
                assert!(cell.at.abs().y <= half.y);
                assert!(cell.at.abs().z <= half.z);
                assert!(cell.value >= 1);
            }
        }
    }

    #[test]
    fn test_fast_spreading_still_hits_target() {
        let mut rng = StdRng::seed_from_u64(3);
        let piece = ShapeGenerator::new(0.9)
            .generate(cube(9), 0.8, &mut rng)
            .unwrap();
        assert_eq!(piece.len(), ShapeGenerator::target_count(cube(9), 0.8));
        assert!(piece.is_connected());
    }

    #[test]
    fn test_same_seed_same_shape() {
        let generator = ShapeGenerator::default();
        let a = generator
            .generate(cube(5), 0.5, &mut StdRng::seed_from_u64(11))
            .unwrap();
        let b = generator
            .generate(cube(5), 0.5, &mut StdRng::seed_from_u64(11))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_cells_per_round_limits() {
        let generator = ShapeGenerator::new(0.1);
        assert_eq!(generator.cells_per_round(1, 50), 1);
        assert_eq!(generator.cells_per_round(25, 50), 3);
        assert_eq!(generator.cells_per_round(5000, 10000), MAX_CELLS_PER_ROUND);
        assert_eq!(generator.cells_per_round(48, 50), 2);
        assert_eq!(generator.cells_per_round(50, 50), 0);
    }
}

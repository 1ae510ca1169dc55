//! Splits a shape into connected, disjoint territories.
//!
//! One recursor task per territory walks the shape depth first, trying the
//! six neighbours of each claimed cell in a random order and descending into
//! every neighbour it manages to claim. Recursors never run freely: the
//! coordinator, which alone holds the ownership grid, hands out one
//! `Advance` at a time in strict rotation. The advanced recursor probes a
//! single cell, the coordinator claims it if it is still free and answers
//! with a verdict, then moves on to the next recursor. Growth is therefore
//! interleaved fairly between territories instead of letting the first
//! recursor swallow the whole shape.
//!
//! Protocol, per tick:
//!
//! ```text
//! coordinator -> recursor : Advance
//! recursor -> coordinator : Probe { at } | Done
//! coordinator -> recursor : Verdict(claimed)      (only after a Probe)
//! ```

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::{Cell, ContentArray, Piece, Vector, DIRECTIONS};
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::mpsc;

/// Grid marker for a filled cell no territory owns yet.
const UNCLAIMED: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("cannot split an empty piece")]
    EmptyPiece,
    #[error("cannot split a piece into zero territories")]
    NoTerritories,
    #[error("cannot split {cells} cells into {count} territories")]
    TooManyTerritories { count: usize, cells: usize },
    #[error("recursor #{0} stopped responding")]
    RecursorLost(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Advance,
    Verdict(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Report {
    Probe { id: i32, at: Vector },
    Done { id: i32 },
}

/// Coordinator-side handle on a running recursor.
struct Link {
    id: i32,
    signals: mpsc::Sender<Signal>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TerritorySplitter;

impl TerritorySplitter {
    pub fn new() -> Self {
        Self
    }

    /// Partitions `piece` into `count` connected territories.
    ///
    /// Each territory holds at least its seed cell and carries its 1-based
    /// territory id as cell value. Territories are pairwise disjoint; cells
    /// no recursor could reach are left out.
    pub async fn split<R: Rng>(
        &self,
        piece: &Piece,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<Piece>, SplitError> {
        if piece.is_empty() {
            return Err(SplitError::EmptyPiece);
        }
        if count == 0 {
            return Err(SplitError::NoTerritories);
        }
        if count >= piece.len() {
            return Err(SplitError::TooManyTerritories {
                count,
                cells: piece.len(),
            });
        }

        let grid = ContentArray::from_piece(piece, UNCLAIMED);
        let free: Vec<Vector> = grid
            .iter()
            .filter(|(_, value)| *value == UNCLAIMED)
            .map(|(at, _)| at)
            .collect();
        let seeds: Vec<Vector> = free.choose_multiple(rng, count).copied().collect();
        self.grow(grid, seeds, rng).await
    }

    /// Runs one recursor per seed (grid coordinates) over the unclaimed cells
    /// of `grid` until every recursor is done.
    async fn grow<R: Rng>(
        &self,
        mut grid: ContentArray,
        seeds: Vec<Vector>,
        rng: &mut R,
    ) -> Result<Vec<Piece>, SplitError> {
        let count = seeds.len();
        let bounds = grid.size();
        let (report_tx, mut reports) = mpsc::channel(count);
        let mut territories: Vec<Vec<Cell>> = vec![Vec::new(); count];
        let mut active = VecDeque::with_capacity(count);

        for (index, seed) in seeds.into_iter().enumerate() {
            let id = index as i32 + 1;
            grid.set(seed, id);
            territories[index].push(Cell::new(grid.to_world(seed), id));

            let (signal_tx, signal_rx) = mpsc::channel(2);
            let recursor = Recursor {
                id,
                bounds,
                rng: StdRng::seed_from_u64(rng.gen()),
                signals: signal_rx,
                reports: report_tx.clone(),
            };
            tokio::spawn(recursor.run(seed));
            active.push_back(Link {
                id,
                signals: signal_tx,
            });
        }
        drop(report_tx);
        debug!(
            "Spawned {} recursors over {} cells",
            count,
            grid.count(|value| value != 0)
        );

        while let Some(link) = active.pop_front() {
            if link.signals.send(Signal::Advance).await.is_err() {
                return Err(SplitError::RecursorLost(link.id));
            }
            match reports.recv().await {
                Some(Report::Probe { id, at }) if id == link.id => {
                    let claimed = grid.get(at) == UNCLAIMED;
                    if claimed {
                        grid.set(at, id);
                        territories[index_of(id)].push(Cell::new(grid.to_world(at), id));
                    }
                    if link.signals.send(Signal::Verdict(claimed)).await.is_err() {
                        return Err(SplitError::RecursorLost(link.id));
                    }
                    active.push_back(link);
                }
                Some(Report::Done { id }) if id == link.id => {
                    debug!(
                        "Recursor #{} is done with {} cells, {} still running",
                        id,
                        territories[index_of(id)].len(),
                        active.len()
                    );
                }
                _ => return Err(SplitError::RecursorLost(link.id)),
            }
        }

        let leftovers = grid.count(|value| value == UNCLAIMED);
        if leftovers > 0 {
            debug!("{} cells were out of every recursor's reach", leftovers);
        }
        Ok(territories.into_iter().map(Piece::from_cells).collect())
    }
}

fn index_of(id: i32) -> usize {
    (id - 1) as usize
}

/// A pending position in the depth-first walk: a claimed cell and the
/// directions it has yet to try.
struct Frame {
    at: Vector,
    pending: Vec<Vector>,
}

/// One flood-fill worker. Owns no part of the grid; it only proposes cells.
struct Recursor {
    id: i32,
    bounds: Vector,
    rng: StdRng,
    signals: mpsc::Receiver<Signal>,
    reports: mpsc::Sender<Report>,
}

impl Recursor {
    async fn run(mut self, seed: Vector) {
        let mut stack = vec![self.frame(seed)];

        while let Some(frame) = stack.last_mut() {
            let Some(direction) = frame.pending.pop() else {
                stack.pop();
                continue;
            };
            let at = frame.at + direction;
            if !self.in_bounds(at) {
                continue;
            }
            match self.probe(at).await {
                Some(true) => {
                    let next = self.frame(at);
                    stack.push(next);
                }
                Some(false) => {}
                None => return,
            }
        }

        if self.wait_for_turn().await {
            let _ = self.reports.send(Report::Done { id: self.id }).await;
        }
    }

    fn frame(&mut self, at: Vector) -> Frame {
        let mut pending = DIRECTIONS.to_vec();
        pending.shuffle(&mut self.rng);
        Frame { at, pending }
    }

    fn in_bounds(&self, at: Vector) -> bool {
        at.x >= 0
            && at.y >= 0
            && at.z >= 0
            && at.x < self.bounds.x
            && at.y < self.bounds.y
            && at.z < self.bounds.z
    }

    async fn wait_for_turn(&mut self) -> bool {
        matches!(self.signals.recv().await, Some(Signal::Advance))
    }

    /// Asks the coordinator for `at` once advanced. `None` when the coordinator is gone.
    async fn probe(&mut self, at: Vector) -> Option<bool> {
        if !self.wait_for_turn().await {
            return None;
        }
        self.reports
            .send(Report::Probe { id: self.id, at })
            .await
            .ok()?;
        match self.signals.recv().await {
            Some(Signal::Verdict(claimed)) => Some(claimed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ShapeGenerator;

    fn solid_cube(side: i32) -> Piece {
        let mut cells = Vec::new();
        for x in 0..side {
            for y in 0..side {
                for z in 0..side {
                    cells.push(Cell::from_ints(x, y, z, 1));
                }
            }
        }
        Piece::from_cells(cells)
    }

    fn line(length: i32) -> Piece {
        Piece::from_cells((0..length).map(|x| Cell::from_ints(x, 0, 0, 1)).collect())
    }

    #[tokio::test]
    async fn test_rejects_invalid_parameters() {
        let mut rng = StdRng::seed_from_u64(1);
        let splitter = TerritorySplitter::new();

        assert_eq!(
            splitter.split(&Piece::default(), 1, &mut rng).await,
            Err(SplitError::EmptyPiece)
        );
        assert_eq!(
            splitter.split(&line(4), 0, &mut rng).await,
            Err(SplitError::NoTerritories)
        );
        assert_eq!(
            splitter.split(&line(4), 4, &mut rng).await,
            Err(SplitError::TooManyTerritories { count: 4, cells: 4 })
        );
    }

    #[tokio::test]
    async fn test_count_one_below_cell_count_succeeds() {
        let mut rng = StdRng::seed_from_u64(2);
        let pieces = TerritorySplitter::new()
            .split(&line(4), 3, &mut rng)
            .await
            .unwrap();
        assert_eq!(pieces.len(), 3);
        assert!(pieces.iter().all(|p| !p.is_empty()));
        assert_eq!(pieces.iter().map(Piece::len).sum::<usize>(), 4);
    }

    #[tokio::test]
    async fn test_territories_partition_a_connected_shape() {
        let target = solid_cube(4);

        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let pieces = TerritorySplitter::new()
                .split(&target, 3, &mut rng)
                .await
                .unwrap();

            assert_eq!(pieces.len(), 3);
            let total: usize = pieces.iter().map(Piece::len).sum();
            assert_eq!(total, target.len());
            for (index, piece) in pieces.iter().enumerate() {
                assert!(!piece.is_empty());
                assert!(piece.is_connected());
                assert!(piece
                    .content
                    .iter()
                    .all(|cell| cell.value == index as i32 + 1));
            }
        }
    }

    #[tokio::test]
    async fn test_territories_are_disjoint_subsets_of_generated_shape() {
        let mut rng = StdRng::seed_from_u64(5);
        let target = ShapeGenerator::default()
            .generate(Vector::new(7, 7, 7), 0.4, &mut rng)
            .unwrap();
        let pieces = TerritorySplitter::new()
            .split(&target, 4, &mut rng)
            .await
            .unwrap();

        // Territories come back re-centered, so compare by count and disjointness
        // of the claimed cells, which the coordinator never hands out twice.
        let total: usize = pieces.iter().map(Piece::len).sum();
        assert!(total <= target.len());
        assert_eq!(total, target.len(), "a connected target is fully claimed");
        for piece in &pieces {
            assert_eq!(piece.positions().len(), piece.len());
        }
    }

    #[tokio::test]
    async fn test_disconnected_leftovers_are_dropped() {
        let piece = Piece::from_cells(vec![
            Cell::from_ints(0, 0, 0, 1),
            Cell::from_ints(1, 0, 0, 1),
            Cell::from_ints(5, 0, 0, 1),
        ]);
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let pieces = TerritorySplitter::new()
                .split(&piece, 1, &mut rng)
                .await
                .unwrap();
            assert_eq!(pieces.len(), 1);
            let claimed = pieces[0].len();
            assert!(claimed == 1 || claimed == 2);
        }
    }

    #[tokio::test]
    async fn test_recursors_take_turns() {
        // Seeds at both ends of a line. Run one after the other, the first
        // recursor would eat all but the far seed. Taking turns, each walks
        // toward the middle and spends at most two ticks per claimed cell,
        // so neither can end up with less than a third of the line.
        let line = line(41);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let grid = ContentArray::from_piece(&line, UNCLAIMED);
            let seeds = vec![Vector::new(0, 0, 0), Vector::new(40, 0, 0)];
            let pieces = TerritorySplitter::new()
                .grow(grid, seeds, &mut rng)
                .await
                .unwrap();

            let sizes: Vec<usize> = pieces.iter().map(Piece::len).collect();
            assert_eq!(sizes.iter().sum::<usize>(), 41);
            assert!(
                sizes.iter().all(|size| *size >= 13),
                "unbalanced territories {:?} for seed {}",
                sizes,
                seed
            );
        }
    }

    #[tokio::test]
    async fn test_two_recursors_share_a_line() {
        // Two recursors racing along the same line meet somewhere in between;
        // together they still claim every cell and neither is cut in two.
        let mut rng = StdRng::seed_from_u64(9);
        let pieces = TerritorySplitter::new()
            .split(&line(40), 2, &mut rng)
            .await
            .unwrap();
        let total: usize = pieces.iter().map(Piece::len).sum();
        assert_eq!(total, 40);
        assert!(pieces.iter().all(Piece::is_connected));
    }
}

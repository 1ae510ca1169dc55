//! Performance benchmarks for match preparation and move validation

use assert_approx_eq::assert_approx_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::generator::ShapeGenerator;
use server::splitter::TerritorySplitter;
use shared::{Cell, Piece, Rotation, Vector};
use std::time::Instant;

/// Benchmarks shape generation at the default density
#[test]
fn benchmark_shape_generation() {
    let generator = ShapeGenerator::default();
    let size = Vector::new(11, 11, 11);
    let mut rng = StdRng::seed_from_u64(1);

    let iterations = 20;
    let start = Instant::now();

    for _ in 0..iterations {
        let piece = generator.generate(size, 0.5, &mut rng).unwrap();
        assert_eq!(piece.len(), ShapeGenerator::target_count(size, 0.5));
    }

    let duration = start.elapsed();
    println!(
        "Shape generation: {} shapes in {:?} ({:.2} ms/shape)",
        iterations,
        duration,
        duration.as_millis() as f64 / iterations as f64
    );

    // Should complete in under 10 seconds
    assert!(duration.as_secs() < 10);
}

/// Benchmarks the lock-step splitter on a generated target
#[test]
fn benchmark_territory_split() {
    let mut rng = StdRng::seed_from_u64(2);
    let target = ShapeGenerator::default()
        .generate(Vector::new(9, 9, 9), 0.5, &mut rng)
        .unwrap();

    let iterations = 10;
    let start = Instant::now();

    for _ in 0..iterations {
        let pieces = tokio_test::block_on(TerritorySplitter::new().split(&target, 4, &mut rng)).unwrap();
        let claimed: usize = pieces.iter().map(Piece::len).sum();
        assert_eq!(claimed, target.len());
    }

    let duration = start.elapsed();
    println!(
        "Territory split: {} splits of {} cells in {:?} ({:.2} ms/split)",
        iterations,
        target.len(),
        duration,
        duration.as_millis() as f64 / iterations as f64
    );

    // Should complete in under 10 seconds
    assert!(duration.as_secs() < 10);
}

/// Benchmarks rotation legality checks and piece transforms
#[test]
fn benchmark_move_validation() {
    let half = std::f64::consts::FRAC_1_SQRT_2;
    let rotations = [
        Rotation::IDENTITY,
        Rotation::new(half, 0.0, 0.0, half),
        Rotation::new(0.0, half, 0.0, half),
        Rotation::new(0.0, 0.0, 0.2588190451, 0.9659258263),
    ];
    let piece = Piece::from_cells(
        (0..27)
            .map(|i| Cell::from_ints(i % 3, (i / 3) % 3, i / 9, 1))
            .collect(),
    );

    let iterations = 10_000;
    let start = Instant::now();
    let mut legal = 0;

    for i in 0..iterations {
        let rotation = &rotations[i % rotations.len()];
        if rotation.is_right_angled() {
            let placed = piece.transformed(rotation, Vector::new(1, 0, 0));
            assert!(placed.collides_with(&piece));
            legal += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Move validation: {} checks in {:?} ({:.2} μs/check)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_approx_eq!(legal as f64 / iterations as f64, 0.75, 1e-9);
    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

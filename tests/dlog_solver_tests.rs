//! Generic tests for the discrete log tables.
//!
//! Every table kind is exercised through the `DiscreteLogSolver` trait: for
//! small bit sizes all values in [0, 2^ℓ) are checked, then random values and
//! time budgets for larger tables.

use confidential_balance::bsgs::BabyStepGiantStep;
use confidential_balance::errors::DecryptionError;
use confidential_balance::kangaroo::Kangaroo;
use confidential_balance::tiered::TieredSolver;
use confidential_balance::{utils, DiscreteLogSolver};
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::traits::Identity;
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

/// Checks every value in [0, 2^secret_bits).
fn test_all_values<S: DiscreteLogSolver>(secret_bits: u8) {
    let solver = S::new_and_compute_table(secret_bits).expect("Failed to create solver");

    let max_value = 1u64 << secret_bits;
    let mut pk = RistrettoPoint::identity();

    for x in 0..max_value {
        let result = solver
            .solve(&pk)
            .expect("Solver returned error")
            .expect("Solver returned None");

        assert_eq!(
            result, x,
            "Failed for secret_bits={}, x={}: got {}",
            secret_bits, x, result
        );

        pk += RISTRETTO_BASEPOINT_POINT;
    }
}

/// Checks `count` random values of `secret_bits` bits with a fixed seed.
fn test_random_values<S: DiscreteLogSolver>(solver: &S, secret_bits: u8, count: usize, seed: u64) {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);

    for _ in 0..count {
        let (sk, pk) = utils::generate_dlog_instance_with_rng(secret_bits, &mut rng).unwrap();
        let expected = utils::scalar_to_u64(&sk);

        assert_eq!(
            solver.solve(&pk).unwrap(),
            Some(expected),
            "Failed for secret_bits={}, x={}",
            secret_bits,
            expected
        );
    }
}

#[test]
fn bsgs_solves_every_small_value() {
    for bits in 1..=8 {
        test_all_values::<BabyStepGiantStep>(bits);
    }
}

#[test]
fn kangaroo_solves_every_small_value() {
    for bits in 1..=6 {
        test_all_values::<Kangaroo>(bits);
    }
}

#[test]
fn bsgs_solves_random_24_bit_values() {
    let bsgs = BabyStepGiantStep::new_and_compute_table(24).unwrap();
    test_random_values(&bsgs, 24, 20, 24);
}

#[test]
fn kangaroo_solves_random_16_bit_values() {
    let kangaroo = Kangaroo::new_and_compute_table(16).unwrap();
    test_random_values(&kangaroo, 16, 20, 16);
}

#[test]
fn budgets_are_respected() {
    // 2^30 is outside both tables.
    let pk = RISTRETTO_BASEPOINT_POINT * utils::u64_to_scalar(1 << 30);
    let budget = Some(Duration::from_millis(100));

    let kangaroo = Kangaroo::new_and_compute_table(12).unwrap();
    assert_eq!(kangaroo.solve_dlp(&pk, budget).unwrap(), None);

    let bsgs = BabyStepGiantStep::new_and_compute_table(12).unwrap();
    assert_eq!(DiscreteLogSolver::solve_dlp(&bsgs, &pk, budget).unwrap(), None);
}

#[test]
fn unbudgeted_kangaroo_gives_up_out_of_range() {
    let pk = RISTRETTO_BASEPOINT_POINT * utils::u64_to_scalar(1 << 40);
    let kangaroo = Kangaroo::new_and_compute_table(8).unwrap();

    assert_eq!(kangaroo.solve_dlp(&pk, None).unwrap(), None);
}

#[test]
fn unbounded_kangaroo_terminal_tier_fails() {
    let pk = RISTRETTO_BASEPOINT_POINT * utils::u64_to_scalar(1 << 40);
    let table: Arc<dyn DiscreteLogSolver> = Arc::new(Kangaroo::new_and_compute_table(8).unwrap());
    let solver = TieredSolver::from_tables([(table, None)]);

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(solver.solve(&pk));
    });

    let result = rx
        .recv_timeout(Duration::from_secs(20))
        .expect("terminal tier kept searching");
    assert!(matches!(result, Err(DecryptionError::Failure)));
}

#[test]
fn tables_report_their_size() {
    let tables: Vec<Box<dyn DiscreteLogSolver>> = vec![
        Box::new(BabyStepGiantStep::new_and_compute_table(10).unwrap()),
        Box::new(Kangaroo::new_and_compute_table(10).unwrap()),
    ];

    for table in &tables {
        assert_eq!(table.max_num_bits(), 10);
    }
}

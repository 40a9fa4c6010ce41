//! Traits for discrete logarithm tables.

use anyhow::Result;
use curve25519_dalek::ristretto::RistrettoPoint;
use web_time::Duration;

/// A precomputed discrete logarithm table.
///
/// Implementors can precompute tables for solving DLog on values < 2^ℓ,
/// and then solve discrete logarithms, optionally within a time budget.
/// Tables are immutable once built and are shared between tiers and
/// worker threads, hence the `Send + Sync` bound.
pub trait DiscreteLogSolver: Send + Sync {
    /// Creates a new solver with precomputed tables for solving DLog
    /// on values in the range [0, 2^max_num_bits).
    fn new_and_compute_table(max_num_bits: u8) -> Result<Self>
    where
        Self: Sized;

    /// Solves the discrete logarithm problem.
    ///
    /// Given `pk = g^x` where `g` is the Ristretto basepoint, finds `x`.
    ///
    /// # Returns
    /// * `Ok(Some(x))` - The discrete log if found.
    /// * `Ok(None)` - If `max_time` elapsed or no solution exists in the valid range.
    /// * `Err(_)` - On error.
    fn solve_dlp(&self, pk: &RistrettoPoint, max_time: Option<Duration>) -> Result<Option<u64>>;

    /// Solves without a time budget.
    fn solve(&self, pk: &RistrettoPoint) -> Result<Option<u64>> {
        self.solve_dlp(pk, None)
    }

    /// Returns the maximum number of bits this solver can handle.
    fn max_num_bits(&self) -> u8;
}

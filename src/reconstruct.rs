//! Turns a chunked ciphertext back into an amount by solving one discrete
//! log per chunk.

use crate::elgamal::{recombine, ConfidentialCiphertext, DecryptionKey};
use crate::errors::{DecryptionError, Result, TimeoutStage};
use crate::tiered::{SolverStats, TieredSolver};

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::traits::Identity;
use futures::future::try_join_all;
use std::sync::Arc;
use web_time::{Duration, Instant};

/// Counters of both tier schedules of a [`ChunkReconstructor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructorStats {
    pub low_digits: SolverStats,
    pub high_digits: SolverStats,
    shared: bool,
}

impl ReconstructorStats {
    /// Table invocations across both schedules, counting a shared schedule once.
    pub fn total_invocations(&self) -> u64 {
        if self.shared {
            self.low_digits.total_invocations()
        } else {
            self.low_digits.total_invocations() + self.high_digits.total_invocations()
        }
    }
}

/// Solves every chunk of a ciphertext concurrently and recombines the digits.
///
/// Chunks in the lower half of the ciphertext go through the `low_digits`
/// schedule, the rest through `high_digits`. The whole reconstruction is
/// bounded by `timeout`; searches still running when it elapses keep going on
/// the blocking pool but their results are discarded.
pub struct ChunkReconstructor {
    low_digits: Arc<TieredSolver>,
    high_digits: Arc<TieredSolver>,
    chunk_bits: u8,
    timeout: Duration,
}

impl ChunkReconstructor {
    pub fn new(
        low_digits: Arc<TieredSolver>,
        high_digits: Arc<TieredSolver>,
        chunk_bits: u8,
        timeout: Duration,
    ) -> Self {
        ChunkReconstructor {
            low_digits,
            high_digits,
            chunk_bits,
            timeout,
        }
    }

    /// Uses one schedule for every chunk.
    pub fn with_solver(solver: Arc<TieredSolver>, chunk_bits: u8, timeout: Duration) -> Self {
        Self::new(Arc::clone(&solver), solver, chunk_bits, timeout)
    }

    pub fn chunk_bits(&self) -> u8 {
        self.chunk_bits
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn stats(&self) -> ReconstructorStats {
        ReconstructorStats {
            low_digits: self.low_digits.stats(),
            high_digits: self.high_digits.stats(),
            shared: Arc::ptr_eq(&self.low_digits, &self.high_digits),
        }
    }

    /// Decodes the wire encodings and reconstructs.
    pub async fn reconstruct_bytes(&self, ciphertext: &[u8], key: &[u8]) -> Result<u128> {
        let ciphertext = ConfidentialCiphertext::from_bytes(ciphertext)?;
        let key = DecryptionKey::from_bytes(key)?;

        self.reconstruct(&ciphertext, &key).await
    }

    pub async fn reconstruct(
        &self,
        ciphertext: &ConfidentialCiphertext,
        key: &DecryptionKey,
    ) -> Result<u128> {
        let started = Instant::now();
        let half = ciphertext.len() / 2;

        let solves = ciphertext
            .chunks()
            .iter()
            .enumerate()
            .map(|(idx, chunk)| {
                let solver = if idx < half {
                    Arc::clone(&self.low_digits)
                } else {
                    Arc::clone(&self.high_digits)
                };
                solve_chunk(idx, chunk.target(key), solver)
            });

        let digits = match tokio::time::timeout(self.timeout, try_join_all(solves)).await {
            Ok(digits) => digits?,
            Err(_) => {
                tracing::warn!(
                    chunks = ciphertext.len(),
                    timeout = ?self.timeout,
                    "reconstruction timed out"
                );
                return Err(DecryptionError::Timeout {
                    stage: TimeoutStage::Reconstruct,
                    after: self.timeout,
                });
            }
        };

        let amount = recombine(&digits, self.chunk_bits)?;

        tracing::debug!(
            chunks = ciphertext.len(),
            elapsed = ?started.elapsed(),
            "reconstructed amount"
        );

        Ok(amount)
    }
}

async fn solve_chunk(idx: usize, target: RistrettoPoint, solver: Arc<TieredSolver>) -> Result<u64> {
    if target.eq(&RistrettoPoint::identity()) {
        tracing::trace!(chunk = idx, "zero chunk, skipping search");
        return Ok(0);
    }

    match tokio::task::spawn_blocking(move || solver.solve(&target)).await {
        Ok(digit) => digit,
        // A crashed search takes its caller down with it.
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => {
            tracing::warn!(chunk = idx, error = %err, "chunk search was cancelled");
            Err(DecryptionError::Failure)
        }
    }
}

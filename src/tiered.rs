//! Escalating discrete-log search over an ordered list of tables.

use crate::errors::{DecryptionError, Result};
use crate::DiscreteLogSolver;

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::traits::Identity;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use web_time::{Duration, Instant};

/// One rung of the ladder: a table and the time it may spend.
/// `budget == None` means the search only ends once the table gives up.
pub struct Tier {
    table: Arc<dyn DiscreteLogSolver>,
    budget: Option<Duration>,
    invocations: AtomicU64,
    solved: AtomicU64,
}

impl Tier {
    pub fn new(table: Arc<dyn DiscreteLogSolver>, budget: Option<Duration>) -> Self {
        Tier {
            table,
            budget,
            invocations: AtomicU64::new(0),
            solved: AtomicU64::new(0),
        }
    }

    pub fn max_num_bits(&self) -> u8 {
        self.table.max_num_bits()
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }
}

/// Snapshot of one tier's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierStats {
    pub max_num_bits: u8,
    pub budget: Option<Duration>,
    pub invocations: u64,
    pub solved: u64,
}

/// Per-tier counters of a [`TieredSolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverStats {
    pub tiers: Vec<TierStats>,
}

impl SolverStats {
    /// Total number of table invocations across all tiers.
    pub fn total_invocations(&self) -> u64 {
        self.tiers.iter().map(|t| t.invocations).sum()
    }
}

/// Tries each tier in order and returns the first answer.
///
/// Tier `k` only runs after tier `k - 1` came back empty, either because it
/// ran out of budget, exhausted its range or reported an error.
pub struct TieredSolver {
    tiers: Vec<Tier>,
}

impl TieredSolver {
    pub fn new(tiers: Vec<Tier>) -> Self {
        TieredSolver { tiers }
    }

    /// Builds tiers from `(table, budget)` pairs.
    pub fn from_tables<I>(tables: I) -> Self
    where
        I: IntoIterator<Item = (Arc<dyn DiscreteLogSolver>, Option<Duration>)>,
    {
        Self::new(
            tables
                .into_iter()
                .map(|(table, budget)| Tier::new(table, budget))
                .collect(),
        )
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Finds `x` with `x·G == point`.
    ///
    /// The identity is answered with 0 without consulting any table.
    pub fn solve(&self, point: &RistrettoPoint) -> Result<u64> {
        if point.eq(&RistrettoPoint::identity()) {
            return Ok(0);
        }

        for (idx, tier) in self.tiers.iter().enumerate() {
            tier.invocations.fetch_add(1, Ordering::Relaxed);
            let started = Instant::now();

            match tier.table.solve_dlp(point, tier.budget) {
                Ok(Some(x)) => {
                    tier.solved.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(
                        tier = idx,
                        bits = tier.max_num_bits(),
                        elapsed = ?started.elapsed(),
                        "discrete log solved"
                    );
                    return Ok(x);
                }
                Ok(None) => {
                    tracing::trace!(
                        tier = idx,
                        bits = tier.max_num_bits(),
                        elapsed = ?started.elapsed(),
                        "tier exhausted, escalating"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        tier = idx,
                        bits = tier.max_num_bits(),
                        error = %err,
                        "tier failed, escalating"
                    );
                }
            }
        }

        Err(DecryptionError::Failure)
    }

    pub fn stats(&self) -> SolverStats {
        SolverStats {
            tiers: self
                .tiers
                .iter()
                .map(|tier| TierStats {
                    max_num_bits: tier.max_num_bits(),
                    budget: tier.budget,
                    invocations: tier.invocations.load(Ordering::Relaxed),
                    solved: tier.solved.load(Ordering::Relaxed),
                })
                .collect(),
        }
    }
}

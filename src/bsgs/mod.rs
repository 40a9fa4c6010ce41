//! Baby-step Giant-step algorithm for solving discrete logarithms.
//!
//! Deterministic and cheap to build for small bit budgets, which makes it the
//! table of choice for the lowest decryption tier and for tests.

pub mod generator;
pub mod solver;

use anyhow::{Context, Result};
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use web_time::Duration;

/// Largest bit budget a table can be built for (baby-step indices are `u16`).
pub const MAX_NUM_BITS: u8 = 32;

/// Baby-step Giant-step algorithm for solving discrete logarithms.
///
/// The table is wrapped in `Arc` so tiers sharing a table do not duplicate
/// the (up to ~2.5 MiB) baby-step map.
#[derive(Clone)]
pub struct BabyStepGiantStep {
    pub table: Arc<BabyStepGiantStepTable>,
}

/// Defines generated table values for BSGS.
pub struct BabyStepGiantStepTable {
    /// Size of a secret to look for (in bits).
    pub max_num_bits: u8,

    /// m = ceil(sqrt(2^max_num_bits)), the number of baby steps.
    pub m: u64,

    /// Baby-step lookup table: maps `compress(g^j)` to `j` for j in [0, m).
    pub baby_steps: HashMap<CompressedRistretto, u16>,

    /// Precomputed giant step: g^(-m) used to compute h * (g^(-m))^i.
    pub giant_step: RistrettoPoint,
}

/// Compact serialization format for BSGS table.
/// Points are stored in order by discrete log (points[i] = compress(g^i)),
/// so values are implicit and don't need to be stored.
#[derive(Serialize, Deserialize)]
struct BabyStepGiantStepTableSerialized {
    max_num_bits: u8,
    m: u64,
    baby_steps: Vec<CompressedRistretto>,
    giant_step: RistrettoPoint,
}

impl BabyStepGiantStepTable {
    /// Deserialize from compact format, rebuilding the HashMap.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let serialized: BabyStepGiantStepTableSerialized =
            bincode::deserialize(bytes).context("failed to deserialize BSGS table")?;

        if !(1..=MAX_NUM_BITS).contains(&serialized.max_num_bits) {
            anyhow::bail!(
                "BSGS table is for {}-bit secrets, supported sizes are 1..={}",
                serialized.max_num_bits,
                MAX_NUM_BITS
            );
        }

        // Same rule as `generate`; also keeps every index within u16.
        let expected_m = 1u64 << ((serialized.max_num_bits + 1) / 2);
        if serialized.m != expected_m {
            anyhow::bail!(
                "BSGS table for {}-bit secrets has m={}, expected {}",
                serialized.max_num_bits,
                serialized.m,
                expected_m
            );
        }

        if serialized.baby_steps.len() as u64 != serialized.m {
            anyhow::bail!(
                "BSGS table holds {} baby steps, expected m={}",
                serialized.baby_steps.len(),
                serialized.m
            );
        }

        let baby_steps = serialized
            .baby_steps
            .into_iter()
            .enumerate()
            .map(|(j, point)| (point, j as u16))
            .collect();

        Ok(BabyStepGiantStepTable {
            max_num_bits: serialized.max_num_bits,
            m: serialized.m,
            baby_steps,
            giant_step: serialized.giant_step,
        })
    }

    /// Serialize to compact format (points only, no values).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut points: Vec<(u16, CompressedRistretto)> =
            self.baby_steps.iter().map(|(k, &v)| (v, *k)).collect();
        points.sort_by_key(|(v, _)| *v);

        let serialized = BabyStepGiantStepTableSerialized {
            max_num_bits: self.max_num_bits,
            m: self.m,
            baby_steps: points.into_iter().map(|(_, k)| k).collect(),
            giant_step: self.giant_step,
        };

        bincode::serialize(&serialized).context("failed to serialize BSGS table")
    }
}

impl BabyStepGiantStep {
    /// Wraps a table decoded from [`BabyStepGiantStepTable::to_bytes`] output.
    pub fn from_bytes(bytes: &[u8]) -> Result<BabyStepGiantStep> {
        Ok(BabyStepGiantStep {
            table: Arc::new(BabyStepGiantStepTable::from_bytes(bytes)?),
        })
    }

    /// Returns a clone of the Arc-wrapped table.
    pub fn table(&self) -> Arc<BabyStepGiantStepTable> {
        Arc::clone(&self.table)
    }
}

impl crate::DiscreteLogSolver for BabyStepGiantStep {
    fn new_and_compute_table(max_num_bits: u8) -> Result<Self> {
        let table = BabyStepGiantStepTable::generate(max_num_bits)?;
        Ok(BabyStepGiantStep {
            table: Arc::new(table),
        })
    }

    fn solve_dlp(&self, pk: &RistrettoPoint, max_time: Option<Duration>) -> Result<Option<u64>> {
        Ok(BabyStepGiantStep::solve_dlp(self, pk, max_time))
    }

    fn max_num_bits(&self) -> u8 {
        self.table.max_num_bits
    }
}

use super::{walk, Parameters, Table, WalkEnd};
use crate::utils;

use anyhow::{Context, Result};
use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT, ristretto::RistrettoPoint, scalar::Scalar,
};
use std::collections::HashMap;
use std::ops::Mul;

impl Table {
    /// Collects `N` distinguished points by walking from random starting logs.
    ///
    /// Gives up early (with a smaller table) when the search space does not
    /// contain enough distinct distinguished points.
    pub fn generate(parameters: &Parameters) -> Result<Table> {
        if parameters.secret_size < 1 || parameters.secret_size > 64 {
            return Err(anyhow::anyhow!("secret size must be between 1 and 64"));
        }
        if !parameters.W.is_power_of_two() || !parameters.R.is_power_of_two() {
            return Err(anyhow::anyhow!("W and R must be powers of two"));
        }

        let (slog, s) = Self::s_values_init(parameters)?;

        let mut table = Table {
            s,
            slog,
            table: HashMap::with_capacity(parameters.N as usize),
        };

        let mut attempts = 0u64;
        let max_attempts = parameters.N * 1000;

        while (table.table.len() as u64) < parameters.N {
            attempts += 1;
            if attempts > max_attempts {
                break;
            }

            let mut wlog = utils::generate_random_scalar(parameters.secret_size)
                .context("failed to generate `wlog` scalar")?;
            let mut w = RISTRETTO_BASEPOINT_POINT.mul(wlog);

            if let WalkEnd::Distinguished(w_compressed) =
                walk(parameters, &table, &mut w, &mut wlog, None, &mut 0)
            {
                table.table.insert(w_compressed, wlog);
            }
        }

        tracing::debug!(
            secret_size = parameters.secret_size,
            distinguished = table.table.len(),
            attempts,
            "generated kangaroo table"
        );

        Ok(table)
    }

    fn s_values_init(parameters: &Parameters) -> Result<(Vec<Scalar>, Vec<RistrettoPoint>)> {
        // Jump sizes are chosen so a walk covers the search space in roughly
        // W steps. Tiny spaces jump across the whole space.
        let slog_size = if parameters.secret_size < 8 {
            parameters.secret_size.max(1)
        } else {
            let search_space = 1u64 << parameters.secret_size.min(62);
            let ratio = search_space
                .saturating_div(4)
                .saturating_div(parameters.W.max(1));
            if ratio > 0 {
                ratio.ilog2().max(1) as u8
            } else {
                1
            }
        };

        let mut scalars = Vec::with_capacity(parameters.R as usize);
        let mut points = Vec::with_capacity(parameters.R as usize);

        for _ in 0..parameters.R {
            // Jumps live in [1, 2^slog_size] so no walk stands still.
            let random_part = utils::generate_random_scalar(slog_size)
                .context("failed to generate `slog` scalar")?;
            let slog = random_part + Scalar::ONE;

            scalars.push(slog);
            points.push(RISTRETTO_BASEPOINT_POINT.mul(slog));
        }

        Ok((scalars, points))
    }
}

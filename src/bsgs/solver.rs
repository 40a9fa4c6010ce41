use super::BabyStepGiantStep;
use crate::utils;

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::traits::Identity;
use std::ops::Add;
use web_time::{Duration, Instant};

impl BabyStepGiantStep {
    /// Solves the discrete logarithm problem using Baby-step Giant-step.
    ///
    /// Given pk = g^x, finds x where x is in [0, m^2) ⊇ [0, 2^max_num_bits).
    ///
    /// Algorithm:
    /// 1. For i = 0, 1, ..., m-1:
    ///    - Compute gamma = pk * (g^(-m))^i
    ///    - If gamma is in baby_steps table with value j, then x = i*m + j
    ///
    /// Returns `None` when the range is exhausted or `max_time` elapsed.
    pub fn solve_dlp(&self, pk: &RistrettoPoint, max_time: Option<Duration>) -> Option<u64> {
        if pk.eq(&RistrettoPoint::identity()) {
            return Some(0);
        }

        let start_time = Instant::now();
        let m = self.table.m;

        // gamma starts as pk, then we multiply by g^(-m) each iteration
        let mut gamma = *pk;

        for i in 0..m {
            if let Some(max_time) = max_time {
                if start_time.elapsed() >= max_time {
                    return None;
                }
            }

            // NOTE: This is the most expensive step, actually!
            let gamma_compressed = gamma.compress();

            if let Some(&j) = self.table.baby_steps.get(&gamma_compressed) {
                let x = i * m + j as u64;

                debug_assert!({
                    let computed = curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT
                        * utils::u64_to_scalar(x);
                    computed.eq(pk)
                });

                return Some(x);
            }

            gamma = gamma.add(self.table.giant_step);
        }

        None
    }
}

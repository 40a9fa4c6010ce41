#![allow(non_snake_case)]

//! Pollard kangaroo discrete logarithm solver with distinguished points.
//!
//! Implements the algorithm from "Computing small discrete logarithms faster"
//! by Daniel J. Bernstein and Tanja Lange (2012).
//! https://cr.yp.to/dlog/cuberoot-20120919.pdf
//!
//! Tables are generated once (see [`generator`]) and then shipped as bincode
//! blobs; the 16, 32 and 48-bit tables back the decryption tiers.

pub mod generator;
pub mod presets;

use crate::utils;

use anyhow::{Context, Result};
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand_core::{CryptoRng, OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::collections::HashMap;
use std::ops::{Add, AddAssign, Mul, Sub};
use web_time::{Duration, Instant};

/// Kangaroo solver: a parameter set plus the table generated for it.
#[derive(Serialize, Deserialize)]
pub struct Kangaroo {
    pub parameters: Parameters,
    pub table: Table,
}

/// Defines generated table values.
#[serde_as]
#[derive(Serialize, Deserialize)]
pub struct Table {
    /// Jump points `slog[h] * G`, selected by the [`hash`] of the current point.
    pub s: Vec<RistrettoPoint>,

    /// Jump distances matching [`Table::s`].
    pub slog: Vec<Scalar>,

    /// Distinguished points (see [`is_distinguished`]) mapped to their discrete log.
    #[serde_as(as = "Vec<(_, _)>")]
    pub table: HashMap<CompressedRistretto, Scalar>,
}

/// Defines constants based on which the algorithm runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    /// Coefficient to increase [`W`] constant.
    ///
    /// [`W`]:Parameters::W
    pub i: u64,
    /// Inverse frequency of distinguished points; a walk is abandoned after `i * W` jumps.
    /// Must be a power of two.
    pub W: u64,
    /// Number of distinguished points stored in the table.
    pub N: u64,
    /// Number of jump distances. Must be a power of two.
    pub R: u64,
    /// Size of a secret to look for.
    pub secret_size: u8,
}

/// How a single walk ended.
pub(crate) enum WalkEnd {
    Distinguished(CompressedRistretto),
    TooLong,
    OutOfTime,
}

impl Kangaroo {
    pub fn from_parameters(parameters: Parameters) -> Result<Kangaroo> {
        let table = Table::generate(&parameters).context("failed to generate table")?;

        Ok(Kangaroo { parameters, table })
    }

    /// Decodes a table produced by [`Kangaroo::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Kangaroo> {
        let kangaroo: Kangaroo =
            bincode::deserialize(bytes).context("failed to deserialize kangaroo table")?;

        let p = &kangaroo.parameters;
        if !p.W.is_power_of_two() || !p.R.is_power_of_two() {
            anyhow::bail!("W and R must be powers of two (W={}, R={})", p.W, p.R);
        }
        if kangaroo.table.s.len() as u64 != p.R || kangaroo.table.slog.len() as u64 != p.R {
            anyhow::bail!(
                "jump table has {} points and {} scalars, expected R={}",
                kangaroo.table.s.len(),
                kangaroo.table.slog.len(),
                p.R
            );
        }

        Ok(kangaroo)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).context("failed to serialize kangaroo table")
    }

    /// Solves the discrete log problem, drawing walk offsets from `rng`.
    ///
    /// Gives up with `Ok(None)` once `max_time` has elapsed or, without a
    /// budget, after [`Parameters::max_search_jumps`] jumps in total. Points
    /// outside [0, 2^secret_size) always end up there.
    pub fn solve_dlp_with_rng<R: RngCore + CryptoRng>(
        &self,
        pk: &RistrettoPoint,
        max_time: Option<Duration>,
        rng: &mut R,
    ) -> Result<Option<u64>> {
        if pk.eq(&RistrettoPoint::identity()) {
            return Ok(Some(0));
        }

        let deadline = max_time.map(|budget| (Instant::now(), budget));

        // Large tables start close to the target; small ones still need
        // enough distinct starting points to escape walks that miss the table.
        let secret_size = self.parameters.secret_size;
        let wdist_bits = secret_size.saturating_sub(8).max(secret_size.min(6));

        let max_jumps = self.parameters.max_search_jumps();
        let mut jumps = 0u64;

        loop {
            if jumps >= max_jumps {
                tracing::trace!(
                    secret_size,
                    jumps,
                    "kangaroo search exhausted without a match"
                );
                return Ok(None);
            }
            // A restart counts as a jump, so walks ending at once still
            // use up the limit.
            jumps += 1;

            // w = sk * G + wdist * G
            let mut wdist = utils::generate_random_scalar_with_rng(wdist_bits, rng)
                .context("failed to generate `wdist` scalar")?;
            let mut w = pk.add(RISTRETTO_BASEPOINT_POINT.mul(wdist));

            match walk(&self.parameters, &self.table, &mut w, &mut wdist, deadline, &mut jumps) {
                WalkEnd::OutOfTime => return Ok(None),
                WalkEnd::TooLong => continue,
                WalkEnd::Distinguished(w_compressed) => {
                    let Some(value) = self.table.table.get(&w_compressed) else {
                        continue;
                    };

                    // value * G = sk * G + wdist * G => sk = value - wdist
                    let sk = value.sub(wdist);

                    // A walk started outside the range can still collide; its
                    // answer does not fit and the walk is restarted.
                    if !utils::scalar_fits_in_bits(&sk, self.parameters.secret_size) {
                        continue;
                    }

                    debug_assert!(RISTRETTO_BASEPOINT_POINT.mul(sk).eq(pk));

                    return Ok(Some(utils::scalar_to_u64(&sk)));
                }
            }
        }
    }
}

/// Walks from `w` (whose log relative to the target is tracked in `wlog`)
/// until a distinguished point, `i * W` jumps, or the deadline. Every jump is
/// added to `jumps`.
pub(crate) fn walk(
    parameters: &Parameters,
    table: &Table,
    w: &mut RistrettoPoint,
    wlog: &mut Scalar,
    deadline: Option<(Instant, Duration)>,
    jumps: &mut u64,
) -> WalkEnd {
    for _ in 0..parameters.i * parameters.W {
        let w_compressed = w.compress();

        if is_distinguished(&w_compressed, parameters) {
            return WalkEnd::Distinguished(w_compressed);
        }

        if let Some((start, budget)) = deadline {
            if start.elapsed() >= budget {
                return WalkEnd::OutOfTime;
            }
        }

        let h = hash(&w_compressed, parameters) as usize;

        wlog.add_assign(&table.slog[h]);
        w.add_assign(&table.s[h]);
        *jumps += 1;
    }

    WalkEnd::TooLong
}

fn is_distinguished(compressed_point: &CompressedRistretto, parameters: &Parameters) -> bool {
    let point_bytes = get_last_point_bytes(compressed_point);

    (point_bytes & (parameters.W - 1)) == 0
}

/// Gets a new index from the provided compressed Ristretto point. The index is meant to be used
/// for retrieving elements from [`Table`] `s` and `slog` vectors.
///
/// Not a real hash; the name follows the Bernstein-Lange paper.
fn hash(compressed_point: &CompressedRistretto, parameters: &Parameters) -> u64 {
    let point_bytes = get_last_point_bytes(compressed_point);

    point_bytes & (parameters.R - 1)
}

fn get_last_point_bytes(compressed_point: &CompressedRistretto) -> u64 {
    let mut point_bytes = [0u8; 8];
    point_bytes.copy_from_slice(&compressed_point.as_bytes()[32 - size_of::<u64>()..]);

    u64::from_be_bytes(point_bytes)
}

impl crate::DiscreteLogSolver for Kangaroo {
    fn new_and_compute_table(max_num_bits: u8) -> Result<Self> {
        let parameters = match presets::for_bits(max_num_bits) {
            Some(parameters) => parameters,
            None => Parameters::for_secret_bits(max_num_bits)?,
        };
        Self::from_parameters(parameters)
    }

    fn solve_dlp(&self, pk: &RistrettoPoint, max_time: Option<Duration>) -> Result<Option<u64>> {
        self.solve_dlp_with_rng(pk, max_time, &mut OsRng)
    }

    fn max_num_bits(&self) -> u8 {
        self.parameters.secret_size
    }
}

/// Headroom over the expected number of jumps before an unbudgeted search
/// is abandoned.
const SEARCH_JUMPS_FACTOR: f64 = 32.0;

/// Floor on the jump limit so tiny tables get plenty of restarts.
const MIN_SEARCH_JUMPS: u64 = 1 << 16;

impl Parameters {
    /// Total jumps an unbudgeted search may take before giving up.
    ///
    /// The expected work of a search is about `1.93 * sqrt(2^secret_size / N) + 2W`
    /// jumps; an in-range secret is found well before this limit.
    pub fn max_search_jumps(&self) -> u64 {
        let space = 2f64.powi(self.secret_size as i32);
        let expected = 1.93 * (space / self.N.max(1) as f64).sqrt() + 2.0 * self.W as f64;

        ((expected * SEARCH_JUMPS_FACTOR) as u64).max(MIN_SEARCH_JUMPS)
    }

    /// Creates reasonable parameters for a given secret bit size.
    pub fn for_secret_bits(secret_bits: u8) -> Result<Self> {
        if !(1..=64).contains(&secret_bits) {
            return Err(anyhow::anyhow!("secret_bits must be between 1 and 64"));
        }

        // Tiny spaces still exercise the walk: W > 1 means not every point is
        // distinguished, and N stays below the number of distinguished points
        // that exist so generation does not stall.
        if secret_bits < 8 {
            let w = if secret_bits <= 3 { 2 } else { 4 };
            let n = 1u64 << secret_bits;
            let r = if secret_bits <= 4 { 4 } else { 8 };

            return Ok(Parameters {
                i: 16,
                W: w,
                N: n,
                R: r,
                secret_size: secret_bits,
            });
        }

        let space = 2f64.powi(secret_bits as i32);

        let n: u64 = match secret_bits {
            8..=16 => 1000u64.min(1 << (secret_bits - 3)),
            17..=24 => 4000,
            25..=32 => 8000,
            33..=40 => 20000,
            41..=48 => 40000,
            _ => 80000,
        };

        // W ~ 2 * sqrt(space / N), rounded down to a power of two.
        let w_estimate = (2.0 * (space / n as f64).sqrt()) as u64;
        let w = 1u64 << w_estimate.max(2).ilog2();

        let r = match secret_bits {
            8..=16 => 64,
            17..=32 => 128,
            _ => 256,
        };

        Ok(Parameters {
            i: 8,
            W: w,
            N: n,
            R: r,
            secret_size: secret_bits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DiscreteLogSolver;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn kangaroo_handles_identity_point() {
        let kangaroo = Kangaroo::new_and_compute_table(4).unwrap();

        assert_eq!(kangaroo.solve(&RistrettoPoint::identity()).unwrap(), Some(0));
    }

    #[test]
    fn kangaroo_solves_all_8_bit_values() {
        let kangaroo = Kangaroo::new_and_compute_table(8).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(8);

        let mut pk = RistrettoPoint::identity();
        for x in 0..256u64 {
            let result = kangaroo.solve_dlp_with_rng(&pk, None, &mut rng).unwrap();
            assert_eq!(result, Some(x), "failed for x={}", x);
            pk = pk + RISTRETTO_BASEPOINT_POINT;
        }
    }

    #[test]
    fn kangaroo_gives_up_when_out_of_time() {
        let kangaroo = Kangaroo::new_and_compute_table(8).unwrap();

        // 2^40 is far outside an 8-bit table; only the budget ends the search
        let pk = RISTRETTO_BASEPOINT_POINT.mul(utils::u64_to_scalar(1 << 40));
        let result = kangaroo
            .solve_dlp(&pk, Some(Duration::from_millis(50)))
            .unwrap();

        assert_eq!(result, None);
    }

    #[test]
    fn kangaroo_gives_up_without_budget() {
        let kangaroo = Kangaroo::new_and_compute_table(8).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(40);

        let pk = RISTRETTO_BASEPOINT_POINT.mul(utils::u64_to_scalar(1 << 40));
        let result = kangaroo.solve_dlp_with_rng(&pk, None, &mut rng).unwrap();

        assert_eq!(result, None);
    }

    #[test]
    fn search_limit_covers_expected_work() {
        for bits in [8, 16, 32, 48] {
            let p = presets::for_bits(bits)
                .map_or_else(|| Parameters::for_secret_bits(bits), Ok)
                .unwrap();
            assert!(p.max_search_jumps() >= MIN_SEARCH_JUMPS);
            assert!(p.max_search_jumps() > 2 * p.i * p.W, "limit below one walk for {} bits", bits);
        }
    }

    #[test]
    fn kangaroo_table_survives_serialization() {
        let kangaroo = Kangaroo::new_and_compute_table(8).unwrap();
        let bytes = kangaroo.to_bytes().unwrap();
        let restored = Kangaroo::from_bytes(&bytes).unwrap();

        assert_eq!(restored.parameters, kangaroo.parameters);
        assert_eq!(restored.table.table.len(), kangaroo.table.table.len());

        let pk = RISTRETTO_BASEPOINT_POINT.mul(utils::u64_to_scalar(200));
        assert_eq!(restored.solve(&pk).unwrap(), Some(200));
    }

    #[test]
    fn kangaroo_rejects_truncated_bytes() {
        let kangaroo = Kangaroo::new_and_compute_table(4).unwrap();
        let bytes = kangaroo.to_bytes().unwrap();

        assert!(Kangaroo::from_bytes(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn parameters_are_powers_of_two() {
        for bits in 1..=64 {
            let p = Parameters::for_secret_bits(bits).unwrap();
            assert!(p.W.is_power_of_two(), "W not a power of two for {} bits", bits);
            assert!(p.R.is_power_of_two(), "R not a power of two for {} bits", bits);
        }
        assert!(Parameters::for_secret_bits(0).is_err());
        assert!(Parameters::for_secret_bits(65).is_err());
    }
}

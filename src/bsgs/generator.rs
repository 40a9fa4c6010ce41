use super::{BabyStepGiantStepTable, MAX_NUM_BITS};

use anyhow::Result;
use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT, ristretto::RistrettoPoint, scalar::Scalar,
};
use std::collections::HashMap;
use std::ops::Mul;

impl BabyStepGiantStepTable {
    /// Generates the BSGS table with baby steps.
    ///
    /// Baby step: Compute g^j for j = 0, 1, ..., m-1 and store in a hash table.
    /// Also precompute g^(-m) for the giant step phase.
    pub fn generate(max_num_bits: u8) -> Result<BabyStepGiantStepTable> {
        if max_num_bits < 1 || max_num_bits > MAX_NUM_BITS {
            anyhow::bail!(
                "max_num_bits must be between 1 and {}, got {} (u16 values require m <= 65536)",
                MAX_NUM_BITS,
                max_num_bits
            );
        }

        // m = ceil(sqrt(2^max_num_bits)) = 2^(ceil(max_num_bits/2))
        let m: u64 = 1 << ((max_num_bits + 1) / 2);

        let g = RISTRETTO_BASEPOINT_POINT;
        let mut baby_steps = HashMap::with_capacity(m as usize);
        let mut current = RistrettoPoint::default(); // identity

        for j in 0..m {
            baby_steps.insert(current.compress(), j as u16);
            current += g;
        }

        let giant_step = g.mul(-Scalar::from(m));

        Ok(BabyStepGiantStepTable {
            max_num_bits,
            m,
            baby_steps,
            giant_step,
        })
    }
}

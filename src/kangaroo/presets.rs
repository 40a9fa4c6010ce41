//! Parameter sets for the tables shipped with the decryption tiers.

use crate::kangaroo::Parameters;

pub const PARAMETERS_16: Parameters = Parameters {
    i: 8,
    W: 8,
    N: 8000,
    R: 64,
    secret_size: 16,
};

pub const PARAMETERS_32: Parameters = Parameters {
    i: 8,
    W: 2048,
    N: 4000,
    R: 128,
    secret_size: 32,
};

pub const PARAMETERS_48: Parameters = Parameters {
    i: 8,
    W: 65536,
    N: 40000,
    R: 128,
    secret_size: 48,
};

/// Returns the tuned preset for `bits`, if there is one.
pub fn for_bits(bits: u8) -> Option<Parameters> {
    match bits {
        16 => Some(PARAMETERS_16),
        32 => Some(PARAMETERS_32),
        48 => Some(PARAMETERS_48),
        _ => None,
    }
}

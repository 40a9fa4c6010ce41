use anyhow::{Context, Result};
use core::ops::Mul;
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, OsRng, RngCore};

/// Generates a random scalar with the specified number of bits.
/// The returned scalar will be in the range [0, 2^bits).
pub fn generate_random_scalar(bits: u8) -> Result<Scalar> {
    generate_random_scalar_with_rng(bits, &mut OsRng)
}

/// Same as [`generate_random_scalar`], drawing from the given RNG.
pub fn generate_random_scalar_with_rng<R: RngCore + CryptoRng>(
    bits: u8,
    rng: &mut R,
) -> Result<Scalar> {
    if bits > 64 {
        return Err(anyhow::anyhow!("bits must be less than or equal to 64"));
    }

    let mut key = [0u8; 32];

    let last_byte = ((bits + 7) >> 3) as usize;
    rng.fill_bytes(&mut key[..last_byte]);

    if bits & 0x07 != 0 {
        key[last_byte - 1] &= (1 << (bits & 0x07)) - 1;
    }

    Option::from(Scalar::from_canonical_bytes(key)).context("failed to construct scalar")
}

/// Converts a scalar to a u64. Only valid for scalars < 2^64.
pub fn scalar_to_u64(scalar: &Scalar) -> u64 {
    let mut u64_bytes = [0u8; 8];
    u64_bytes.copy_from_slice(&scalar.as_bytes()[..8]);

    u64::from_le_bytes(u64_bytes)
}

/// Converts a u64 to a scalar.
pub fn u64_to_scalar(value: u64) -> Scalar {
    Scalar::from(value)
}

/// Returns `true` if the scalar, read as an integer, is < 2^bits.
pub fn scalar_fits_in_bits(scalar: &Scalar, bits: u8) -> bool {
    let bytes = scalar.as_bytes();
    if bytes[8..].iter().any(|&b| b != 0) {
        return false;
    }

    bits >= 64 || scalar_to_u64(scalar) >> bits == 0
}

/// Generates a random discrete log instance: a scalar x and the point g^x.
pub fn generate_dlog_instance(bits: u8) -> Result<(Scalar, RistrettoPoint)> {
    generate_dlog_instance_with_rng(bits, &mut OsRng)
}

/// Same as [`generate_dlog_instance`], drawing from the given RNG.
pub fn generate_dlog_instance_with_rng<R: RngCore + CryptoRng>(
    bits: u8,
    rng: &mut R,
) -> Result<(Scalar, RistrettoPoint)> {
    let sk = generate_random_scalar_with_rng(bits, rng).context("failed to generate secret")?;

    Ok((sk, RISTRETTO_BASEPOINT_POINT.mul(sk)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_random_scalar_bounds() {
        for bits in 1..=64 {
            let max_value = if bits == 64 {
                u64::MAX
            } else {
                (1u64 << bits) - 1
            };

            for _ in 0..100 {
                let scalar = generate_random_scalar(bits).unwrap();
                let value = scalar_to_u64(&scalar);

                assert!(
                    value <= max_value,
                    "generate_random_scalar({}) produced value {} which exceeds max {}",
                    bits,
                    value,
                    max_value
                );
                assert!(scalar_fits_in_bits(&scalar, bits));
            }
        }
    }

    #[test]
    fn test_generate_random_scalar_zero_bits_edge_case() {
        // 0 bits fills no bytes at all
        let scalar = generate_random_scalar(0).unwrap();
        assert_eq!(scalar_to_u64(&scalar), 0);
    }

    #[test]
    fn test_scalar_to_u64_roundtrip() {
        let test_values: Vec<u64> = vec![
            0,
            1,
            42,
            65535,
            65536,
            u32::MAX as u64 + 1,
            u64::MAX - 1,
            u64::MAX,
        ];

        for value in test_values {
            let scalar = u64_to_scalar(value);
            assert_eq!(value, scalar_to_u64(&scalar), "roundtrip failed for {}", value);
        }
    }

    #[test]
    fn test_scalar_fits_in_bits() {
        assert!(scalar_fits_in_bits(&u64_to_scalar(0), 1));
        assert!(scalar_fits_in_bits(&u64_to_scalar(255), 8));
        assert!(!scalar_fits_in_bits(&u64_to_scalar(256), 8));
        assert!(scalar_fits_in_bits(&u64_to_scalar(u64::MAX), 64));

        // -1 mod l is a huge integer
        assert!(!scalar_fits_in_bits(&-Scalar::ONE, 64));
    }

    #[test]
    fn test_generate_random_scalar_rejects_large_bits() {
        assert!(generate_random_scalar(65).is_err());
        assert!(generate_random_scalar(128).is_err());
    }
}

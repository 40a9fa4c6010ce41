//! Twisted ElGamal over ristretto255, as used for chunked confidential
//! balances.
//!
//! A digit `v` is encrypted under `ek = dk⁻¹·H` as `C = v·G + r·H`,
//! `D = r·ek`, so `C − dk·D = v·G` and decryption reduces to a bounded
//! discrete log.

use crate::errors::{DecryptionError, Result};

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_COMPRESSED;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use lazy_static::lazy_static;
use sha3::Sha3_512;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of one compressed ristretto point.
pub const POINT_SIZE: usize = 32;

/// Size of one serialized chunk: `C‖D`.
pub const CHUNK_SIZE: usize = 2 * POINT_SIZE;

lazy_static! {
    /// Second generator `H`, hashed from the compressed basepoint.
    pub static ref H: RistrettoPoint =
        RistrettoPoint::hash_from_bytes::<Sha3_512>(RISTRETTO_BASEPOINT_COMPRESSED.as_bytes());
}

/// Number and width of the digits an amount is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    pub chunks: usize,
    pub chunk_bits: u8,
}

impl ChunkLayout {
    /// Confidential balances: 8 digits of 16 bits.
    pub const BALANCE: ChunkLayout = ChunkLayout {
        chunks: 8,
        chunk_bits: 16,
    };

    /// Transfer amounts: 4 digits of 16 bits.
    pub const AMOUNT: ChunkLayout = ChunkLayout {
        chunks: 4,
        chunk_bits: 16,
    };

    /// Splits `amount` into little-endian digits of `chunk_bits` each.
    ///
    /// Bits above `chunks * chunk_bits` are dropped.
    pub fn split(&self, amount: u128) -> Vec<u64> {
        let mask = if self.chunk_bits >= 64 {
            u64::MAX as u128
        } else {
            (1u128 << self.chunk_bits) - 1
        };

        (0..self.chunks)
            .map(|i| {
                let shift = i as u32 * self.chunk_bits as u32;
                if shift >= 128 {
                    0
                } else {
                    ((amount >> shift) & mask) as u64
                }
            })
            .collect()
    }
}

/// Recombines little-endian digits: `Σ digit_i · 2^(chunk_bits · i)`.
///
/// Digits may exceed `2^chunk_bits` (homomorphic sums carry), so the sum is
/// computed with overflow checks rather than by bit packing.
pub fn recombine(digits: &[u64], chunk_bits: u8) -> Result<u128> {
    digits
        .iter()
        .enumerate()
        .try_fold(0u128, |acc, (i, &digit)| {
            if digit == 0 {
                return Some(acc);
            }
            let shift = (i as u32).checked_mul(chunk_bits as u32)?;
            let weight = 1u128.checked_shl(shift)?;
            (digit as u128)
                .checked_mul(weight)
                .and_then(|term| acc.checked_add(term))
        })
        .ok_or(DecryptionError::AmountOverflow)
}

/// Decryption key scalar `dk`. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DecryptionKey(Scalar);

impl DecryptionKey {
    /// Wraps a non-zero scalar.
    pub fn new(dk: Scalar) -> Result<Self> {
        if dk == Scalar::ZERO {
            return Err(DecryptionError::InvalidKey);
        }
        Ok(DecryptionKey(dk))
    }

    /// Decodes the 32-byte canonical little-endian encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| DecryptionError::InvalidKey)?;
        let scalar: Option<Scalar> = Scalar::from_canonical_bytes(bytes).into();
        Self::new(scalar.ok_or(DecryptionError::InvalidKey)?)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn scalar(&self) -> &Scalar {
        &self.0
    }

    /// Encryption key `ek = dk⁻¹·H`.
    pub fn public_key(&self) -> EncryptionKey {
        EncryptionKey(self.0.invert() * *H)
    }
}

impl fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DecryptionKey(..)")
    }
}

/// Encryption (public) key `ek`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncryptionKey(pub RistrettoPoint);

impl EncryptionKey {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.compress().to_bytes()
    }
}

/// One encrypted digit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncryptedChunk {
    pub c: RistrettoPoint,
    pub d: RistrettoPoint,
}

impl EncryptedChunk {
    /// Decodes `C‖D` from exactly [`CHUNK_SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CHUNK_SIZE {
            return Err(DecryptionError::InvalidCiphertext(format!(
                "chunk must be {} bytes, got {}",
                CHUNK_SIZE,
                bytes.len()
            )));
        }
        let (c, d) = bytes.split_at(POINT_SIZE);

        Ok(EncryptedChunk {
            c: decompress(c)?,
            d: decompress(d)?,
        })
    }

    pub fn to_bytes(&self) -> [u8; CHUNK_SIZE] {
        let mut bytes = [0u8; CHUNK_SIZE];
        bytes[..POINT_SIZE].copy_from_slice(self.c.compress().as_bytes());
        bytes[POINT_SIZE..].copy_from_slice(self.d.compress().as_bytes());
        bytes
    }

    /// Discrete-log target `C − dk·D = digit·G`.
    pub fn target(&self, dk: &DecryptionKey) -> RistrettoPoint {
        self.c - dk.scalar() * self.d
    }
}

fn decompress(bytes: &[u8]) -> Result<RistrettoPoint> {
    CompressedRistretto::from_slice(bytes)
        .ok()
        .and_then(|compressed| compressed.decompress())
        .ok_or_else(|| DecryptionError::InvalidCiphertext("point is not a valid encoding".into()))
}

/// Ordered chunks of one encrypted amount, least significant digit first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfidentialCiphertext {
    chunks: Vec<EncryptedChunk>,
}

impl ConfidentialCiphertext {
    /// The chunk count must be non-zero and even.
    pub fn new(chunks: Vec<EncryptedChunk>) -> Result<Self> {
        if chunks.is_empty() || chunks.len() % 2 != 0 {
            return Err(DecryptionError::InvalidCiphertext(format!(
                "chunk count must be even and non-zero, got {}",
                chunks.len()
            )));
        }
        Ok(ConfidentialCiphertext { chunks })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % CHUNK_SIZE != 0 {
            return Err(DecryptionError::InvalidCiphertext(format!(
                "length {} is not a multiple of {}",
                bytes.len(),
                CHUNK_SIZE
            )));
        }

        let chunks = bytes
            .chunks_exact(CHUNK_SIZE)
            .map(EncryptedChunk::from_bytes)
            .collect::<Result<Vec<_>>>()?;

        Self::new(chunks)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.chunks.iter().flat_map(|chunk| chunk.to_bytes()).collect()
    }

    pub fn chunks(&self) -> &[EncryptedChunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Returns `true` when every chunk is the trivial encryption of zero.
    pub fn is_trivial_zero(&self) -> bool {
        let identity = RistrettoPoint::identity();
        self.chunks
            .iter()
            .all(|chunk| chunk.c == identity && chunk.d == identity)
    }
}

/// Encrypts one digit with randomness `r`.
#[cfg(any(test, feature = "testing"))]
pub(crate) fn encrypt_digit(digit: u64, r: &Scalar, ek: &EncryptionKey) -> EncryptedChunk {
    EncryptedChunk {
        c: curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT * Scalar::from(digit) + r * *H,
        d: r * ek.0,
    }
}

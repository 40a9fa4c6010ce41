//! Fixtures for tests and benchmarks: encryption of known amounts and tables
//! with injected faults.
//!
//! The engine itself never encrypts; these helpers only exist so callers can
//! produce ciphertexts to decrypt.

use crate::bsgs::BabyStepGiantStep;
use crate::elgamal::{
    encrypt_digit, ChunkLayout, ConfidentialCiphertext, DecryptionKey, EncryptionKey,
};
use crate::{utils, DiscreteLogSolver};

use anyhow::Result;
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, OsRng, RngCore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use web_time::{Duration, Instant};

/// Used for testing/benchmarking.
pub fn random_decryption_key() -> DecryptionKey {
    random_decryption_key_with_rng(&mut OsRng)
}

pub fn random_decryption_key_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> DecryptionKey {
    loop {
        if let Ok(dk) = DecryptionKey::new(Scalar::random(rng)) {
            return dk;
        }
    }
}

/// Encrypts `amount` under `ek` with fresh randomness per chunk.
pub fn encrypt_amount(amount: u128, layout: ChunkLayout, ek: &EncryptionKey) -> ConfidentialCiphertext {
    encrypt_digits(&layout.split(amount), ek)
}

/// Encrypts raw digits, which may exceed the chunk width (as after a
/// homomorphic sum).
pub fn encrypt_digits(digits: &[u64], ek: &EncryptionKey) -> ConfidentialCiphertext {
    let chunks = digits
        .iter()
        .map(|&digit| encrypt_digit(digit, &Scalar::random(&mut OsRng), ek))
        .collect();

    ConfidentialCiphertext::new(chunks).expect("digit count must be even and non-zero")
}

/// A BSGS table for `bits`, ready to be used as a tier.
pub fn bsgs_table(bits: u8) -> Arc<dyn DiscreteLogSolver> {
    Arc::new(BabyStepGiantStep::new_and_compute_table(bits).expect("valid BSGS size"))
}

/// A table that never finds anything: it burns its whole budget and reports
/// no answer. Without a budget it gives up immediately.
pub struct StallingTable {
    max_num_bits: u8,
    invocations: AtomicU64,
}

impl StallingTable {
    pub fn new(max_num_bits: u8) -> Self {
        StallingTable {
            max_num_bits,
            invocations: AtomicU64::new(0),
        }
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }
}

impl DiscreteLogSolver for StallingTable {
    fn new_and_compute_table(max_num_bits: u8) -> Result<Self> {
        Ok(Self::new(max_num_bits))
    }

    fn solve_dlp(&self, _pk: &RistrettoPoint, max_time: Option<Duration>) -> Result<Option<u64>> {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        if let Some(budget) = max_time {
            thread::sleep(budget);
        }
        Ok(None)
    }

    fn max_num_bits(&self) -> u8 {
        self.max_num_bits
    }
}

/// Wraps a table and delays every search by a fixed amount. A budget shorter
/// than the delay is spent in full and reported as no answer.
pub struct SlowTable {
    inner: Arc<dyn DiscreteLogSolver>,
    delay: Duration,
}

impl SlowTable {
    pub fn new(inner: Arc<dyn DiscreteLogSolver>, delay: Duration) -> Self {
        SlowTable { inner, delay }
    }
}

impl DiscreteLogSolver for SlowTable {
    fn new_and_compute_table(max_num_bits: u8) -> Result<Self> {
        Ok(Self::new(
            Arc::new(BabyStepGiantStep::new_and_compute_table(max_num_bits)?),
            Duration::from_millis(100),
        ))
    }

    fn solve_dlp(&self, pk: &RistrettoPoint, max_time: Option<Duration>) -> Result<Option<u64>> {
        let started = Instant::now();
        match max_time {
            Some(budget) if budget < self.delay => {
                thread::sleep(budget);
                Ok(None)
            }
            _ => {
                thread::sleep(self.delay);
                let remaining = max_time.map(|budget| budget.saturating_sub(started.elapsed()));
                self.inner.solve_dlp(pk, remaining)
            }
        }
    }

    fn max_num_bits(&self) -> u8 {
        self.inner.max_num_bits()
    }
}

/// Wraps a table and panics when asked for `poison·G`.
pub struct PanickingTable {
    inner: Arc<dyn DiscreteLogSolver>,
    poison: RistrettoPoint,
}

impl PanickingTable {
    pub fn new(inner: Arc<dyn DiscreteLogSolver>, poison: u64) -> Self {
        PanickingTable {
            inner,
            poison: RISTRETTO_BASEPOINT_POINT * utils::u64_to_scalar(poison),
        }
    }
}

impl DiscreteLogSolver for PanickingTable {
    fn new_and_compute_table(max_num_bits: u8) -> Result<Self> {
        Ok(Self::new(
            Arc::new(BabyStepGiantStep::new_and_compute_table(max_num_bits)?),
            1,
        ))
    }

    fn solve_dlp(&self, pk: &RistrettoPoint, max_time: Option<Duration>) -> Result<Option<u64>> {
        if pk.eq(&self.poison) {
            panic!("poisoned discrete log requested");
        }
        self.inner.solve_dlp(pk, max_time)
    }

    fn max_num_bits(&self) -> u8 {
        self.inner.max_num_bits()
    }
}

/// Wraps a table and counts invocations.
pub struct CountingTable {
    inner: Arc<dyn DiscreteLogSolver>,
    calls: AtomicU64,
}

impl CountingTable {
    pub fn new(inner: Arc<dyn DiscreteLogSolver>) -> Self {
        CountingTable {
            inner,
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl DiscreteLogSolver for CountingTable {
    fn new_and_compute_table(max_num_bits: u8) -> Result<Self> {
        Ok(Self::new(Arc::new(
            BabyStepGiantStep::new_and_compute_table(max_num_bits)?,
        )))
    }

    fn solve_dlp(&self, pk: &RistrettoPoint, max_time: Option<Duration>) -> Result<Option<u64>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.solve_dlp(pk, max_time)
    }

    fn max_num_bits(&self) -> u8 {
        self.inner.max_num_bits()
    }
}

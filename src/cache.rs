//! LRU cache of decrypted amounts.

use lru::LruCache;
use parking_lot::Mutex;
use sha3::{Digest, Sha3_256};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of cached amounts.
pub const DEFAULT_CAPACITY: usize = 100;

/// SHA3-256 of the ciphertext bytes followed by the public key bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn derive(ciphertext: &[u8], public_key: &[u8]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(ciphertext);
        hasher.update(public_key);
        CacheKey(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Thread-safe, capacity-bounded map from [`CacheKey`] to a decrypted amount.
///
/// Only successful decryptions are stored.
pub struct DecryptionCache {
    entries: Mutex<LruCache<CacheKey, u128>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DecryptionCache {
    /// A zero capacity is bumped to one entry.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        DecryptionCache {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up `key`, marking it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<u128> {
        let amount = self.entries.lock().get(key).copied();
        match amount {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        amount
    }

    pub fn put(&self, key: CacheKey, amount: u128) {
        if let Some((evicted, _)) = self.entries.lock().push(key, amount) {
            if evicted != key {
                tracing::trace!(key = ?evicted, "evicted cached amount");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl Default for DecryptionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

//! Caller-facing decryption: cache lookup in front of a pluggable backend.

use crate::cache::{CacheKey, DecryptionCache};
use crate::config::EngineConfig;
use crate::elgamal::{ConfidentialCiphertext, DecryptionKey};
use crate::errors::{ConfigError, Result};
use crate::pool::WorkerPool;
use crate::reconstruct::ChunkReconstructor;
use crate::tables::TableRegistry;

use async_trait::async_trait;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Something that turns serialized ciphertext and key bytes into an amount.
#[async_trait]
pub trait AmountDecryptor: Send + Sync {
    async fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<u128>;
}

/// Decrypts in the calling task.
#[async_trait]
impl AmountDecryptor for ChunkReconstructor {
    async fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<u128> {
        self.reconstruct_bytes(ciphertext, key).await
    }
}

/// Decrypts on a pool worker.
#[async_trait]
impl AmountDecryptor for WorkerPool {
    async fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<u128> {
        self.dispatch(ciphertext.to_vec(), key).await
    }
}

/// Both components of a confidential balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptedBalance {
    pub pending: u128,
    pub available: u128,
}

impl DecryptedBalance {
    pub fn total(&self) -> Option<u128> {
        self.pending.checked_add(self.available)
    }
}

/// Serves decryptions from the cache, falling back to `backend` on a miss.
///
/// Only successful results are cached. Two concurrent requests for the same
/// input both reach the backend.
#[derive(Clone)]
pub struct BalanceDecryptor {
    cache: Arc<DecryptionCache>,
    backend: Arc<dyn AmountDecryptor>,
}

impl BalanceDecryptor {
    pub fn new(cache: Arc<DecryptionCache>, backend: Arc<dyn AmountDecryptor>) -> Self {
        BalanceDecryptor { cache, backend }
    }

    pub fn cache(&self) -> &Arc<DecryptionCache> {
        &self.cache
    }

    pub async fn decrypt_amount(
        &self,
        ciphertext: &ConfidentialCiphertext,
        key: &DecryptionKey,
    ) -> Result<u128> {
        let key_bytes = Zeroizing::new(key.to_bytes());
        self.decrypt_with_public_key(&ciphertext.to_bytes(), &key_bytes[..], key)
            .await
    }

    /// Same as [`decrypt_amount`](Self::decrypt_amount) on wire encodings.
    pub async fn decrypt_amount_bytes(&self, ciphertext: &[u8], key: &[u8]) -> Result<u128> {
        let decryption_key = DecryptionKey::from_bytes(key)?;
        self.decrypt_with_public_key(ciphertext, key, &decryption_key)
            .await
    }

    /// Decrypts the pending and available parts concurrently.
    pub async fn decrypt_balance(
        &self,
        pending: &ConfidentialCiphertext,
        available: &ConfidentialCiphertext,
        key: &DecryptionKey,
    ) -> Result<DecryptedBalance> {
        let (pending, available) = tokio::try_join!(
            self.decrypt_amount(pending, key),
            self.decrypt_amount(available, key)
        )?;

        Ok(DecryptedBalance { pending, available })
    }

    async fn decrypt_with_public_key(
        &self,
        ciphertext: &[u8],
        key_bytes: &[u8],
        key: &DecryptionKey,
    ) -> Result<u128> {
        let cache_key = CacheKey::derive(ciphertext, &key.public_key().to_bytes());

        if let Some(amount) = self.cache.get(&cache_key) {
            tracing::debug!(key = ?cache_key, "decryption cache hit");
            return Ok(amount);
        }

        let amount = self.backend.decrypt(ciphertext, key_bytes).await?;
        self.cache.put(cache_key, amount);
        tracing::debug!(key = ?cache_key, "cached decrypted amount");

        Ok(amount)
    }
}

/// Reconstructor, worker pool, cache and decryptor wired from one
/// [`EngineConfig`].
pub struct DecryptionEngine {
    config: EngineConfig,
    reconstructor: Arc<ChunkReconstructor>,
    pool: Arc<WorkerPool>,
    decryptor: BalanceDecryptor,
}

impl DecryptionEngine {
    /// Builds the engine from tables already present in `registry`.
    pub fn from_config(config: EngineConfig, registry: &TableRegistry) -> Result<Self, ConfigError> {
        config.validate()?;

        let reconstructor = Arc::new(config.build_reconstructor(registry)?);
        let pool = Arc::new(WorkerPool::new(
            Arc::clone(&reconstructor),
            config.pool.clone(),
        ));
        let cache = Arc::new(DecryptionCache::new(config.cache_capacity));
        let decryptor = BalanceDecryptor::new(cache, Arc::clone(&pool) as Arc<dyn AmountDecryptor>);

        tracing::info!(
            workers = config.pool.workers,
            cache_capacity = config.cache_capacity,
            tables = ?registry.sizes(),
            "decryption engine ready"
        );

        Ok(DecryptionEngine {
            config,
            reconstructor,
            pool,
            decryptor,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn decryptor(&self) -> &BalanceDecryptor {
        &self.decryptor
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn reconstructor(&self) -> &Arc<ChunkReconstructor> {
        &self.reconstructor
    }

    pub fn cache(&self) -> &Arc<DecryptionCache> {
        self.decryptor.cache()
    }

    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TableKind, TierConfig};
    use crate::elgamal::ChunkLayout;
    use crate::testing::{encrypt_amount, random_decryption_key};

    fn engine() -> DecryptionEngine {
        let mut registry = TableRegistry::new();
        registry.compute(TableKind::BabyStepGiantStep, 8).unwrap();
        registry.compute(TableKind::BabyStepGiantStep, 16).unwrap();

        let config = EngineConfig {
            high_digit_tiers: vec![TierConfig::bounded(8, 200), TierConfig::unbounded(16)],
            low_digit_tiers: vec![TierConfig::unbounded(16)],
            ..Default::default()
        };

        DecryptionEngine::from_config(config, &registry).unwrap()
    }

    #[tokio::test]
    async fn engine_decrypts_through_the_pool() {
        let engine = engine();
        let dk = random_decryption_key();
        let ciphertext = encrypt_amount(1_000_000_007, ChunkLayout::BALANCE, &dk.public_key());

        let amount = engine.decryptor().decrypt_amount(&ciphertext, &dk).await.unwrap();

        assert_eq!(amount, 1_000_000_007);
        assert_eq!(engine.pool().dispatched(), 1);
        assert_eq!(engine.cache().len(), 1);
    }

    #[tokio::test]
    async fn balance_parts_are_decrypted_independently() {
        let engine = engine();
        let dk = random_decryption_key();
        let ek = dk.public_key();

        let pending = encrypt_amount(50, ChunkLayout::BALANCE, &ek);
        let available = encrypt_amount(60, ChunkLayout::BALANCE, &ek);

        let balance = engine
            .decryptor()
            .decrypt_balance(&pending, &available, &dk)
            .await
            .unwrap();

        assert_eq!(balance, DecryptedBalance { pending: 50, available: 60 });
        assert_eq!(balance.total(), Some(110));
        assert_eq!(engine.pool().dispatched(), 2);
    }

    #[tokio::test]
    async fn byte_api_shares_the_cache() {
        let engine = engine();
        let dk = random_decryption_key();
        let ciphertext = encrypt_amount(31337, ChunkLayout::AMOUNT, &dk.public_key());

        let decryptor = engine.decryptor();
        decryptor.decrypt_amount(&ciphertext, &dk).await.unwrap();
        let again = decryptor
            .decrypt_amount_bytes(&ciphertext.to_bytes(), &dk.to_bytes())
            .await
            .unwrap();

        assert_eq!(again, 31337);
        assert_eq!(engine.pool().dispatched(), 1);
        assert_eq!(engine.cache().hits(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let engine = engine();
        engine.shutdown();

        let dk = random_decryption_key();
        let ciphertext = encrypt_amount(5, ChunkLayout::AMOUNT, &dk.public_key());

        assert!(engine.decryptor().decrypt_amount(&ciphertext, &dk).await.is_err());
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn engine_requires_registered_tables() {
        let registry = TableRegistry::new();
        assert!(matches!(
            DecryptionEngine::from_config(EngineConfig::default(), &registry),
            Err(ConfigError::MissingTable(_))
        ));
    }
}

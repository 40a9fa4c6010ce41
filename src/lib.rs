//! Decryption of chunked twisted ElGamal balances over ristretto255 and
//! deposit readiness checks for confidential transfers.

pub mod bsgs;
pub mod cache;
pub mod config;
pub mod decryptor;
pub mod elgamal;
pub mod errors;
pub mod kangaroo;
pub mod pool;
pub mod readiness;
pub mod reconstruct;
pub mod tables;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tiered;
pub mod traits;
pub mod utils;

pub use cache::{CacheKey, DecryptionCache};
pub use config::{EngineConfig, PoolConfig, TableKind, TableSource, TierConfig};
pub use decryptor::{AmountDecryptor, BalanceDecryptor, DecryptedBalance, DecryptionEngine};
pub use elgamal::{ChunkLayout, ConfidentialCiphertext, DecryptionKey, EncryptedChunk, EncryptionKey};
pub use errors::{ConfigError, DecryptionError, ReadinessError, TimeoutStage};
pub use pool::{TaskId, WorkerPool};
pub use readiness::{
    Address, BalanceReadiness, DepositPath, DepositPlan, DepositTransactionBuilder,
    PublicBalanceSource, Readiness, TokenStatus, TransactionSubmitter,
};
pub use reconstruct::ChunkReconstructor;
pub use tables::{TableLoader, TableRegistry};
pub use tiered::{SolverStats, Tier, TieredSolver};
pub use traits::DiscreteLogSolver;

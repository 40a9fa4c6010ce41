use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Which timeout layer gave up waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStage {
    /// The absolute budget around one whole reconstruction.
    Reconstruct,
    /// The per-request budget of the worker pool.
    Dispatch,
}

impl fmt::Display for TimeoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutStage::Reconstruct => f.write_str("reconstruction"),
            TimeoutStage::Dispatch => f.write_str("dispatch"),
        }
    }
}

/// Errors surfaced by the decryption pipeline.
#[derive(Error, Debug)]
pub enum DecryptionError {
    /// Every solver tier was exhausted without finding the discrete log.
    #[error("discrete log not found in any solver tier")]
    Failure,

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: TimeoutStage, after: Duration },

    /// The worker running the request crashed. The request is lost and must
    /// be re-issued by the caller.
    #[error("worker {worker} crashed while handling the request")]
    WorkerFault { worker: usize },

    #[error("worker pool has been shut down")]
    PoolShutDown,

    #[error("failed to spawn worker: {0}")]
    WorkerSpawn(#[from] io::Error),

    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    #[error("invalid decryption key")]
    InvalidKey,

    #[error("decrypted amount does not fit in 128 bits")]
    AmountOverflow,
}

impl DecryptionError {
    /// Returns `true` for either timeout layer.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DecryptionError::Timeout { .. })
    }
}

/// Errors returned by the balance readiness orchestrator.
///
/// Each variant carries the collaborator's error unchanged.
#[derive(Error, Debug)]
pub enum ReadinessError {
    #[error("failed to query public balance: {0:#}")]
    BalanceQuery(anyhow::Error),

    #[error("failed to build deposit transaction: {0:#}")]
    TxBuild(anyhow::Error),

    #[error("failed to submit deposit transaction: {0:#}")]
    TxSubmit(anyhow::Error),
}

/// Errors produced while validating an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("chunk_bits must be in 1..=64, got {0}")]
    ChunkBits(u8),

    #[error("{0} tier schedule is empty")]
    EmptySchedule(&'static str),

    #[error("{schedule} tier schedule must be strictly ascending in max_num_bits")]
    UnorderedSchedule { schedule: &'static str },

    #[error("{schedule} tier schedule must end with an unbounded tier")]
    BoundedTerminalTier { schedule: &'static str },

    #[error("{0} must be non-zero")]
    Zero(&'static str),

    #[error("no table available for {0}-bit secrets")]
    MissingTable(u8),
}

pub type Result<T, E = DecryptionError> = std::result::Result<T, E>;

//! Engine configuration.
//!
//! Loaded from JSON; every field has a default so a partial document (or
//! `{}`) is a valid configuration.

use crate::errors::ConfigError;
use crate::reconstruct::ChunkReconstructor;
use crate::tables::TableRegistry;
use crate::tiered::{Tier, TieredSolver};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// One rung of a tier schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Secret size of the table to use.
    pub max_num_bits: u8,
    /// Search budget; `None` for the terminal tier.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl TierConfig {
    pub const fn bounded(max_num_bits: u8, timeout_ms: u64) -> Self {
        TierConfig {
            max_num_bits,
            timeout_ms: Some(timeout_ms),
        }
    }

    pub const fn unbounded(max_num_bits: u8) -> Self {
        TierConfig {
            max_num_bits,
            timeout_ms: None,
        }
    }

    pub fn budget(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub workers: usize,
    pub dispatch_timeout_ms: u64,
    /// Release the workers whenever no request is pending.
    pub teardown_when_idle: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            dispatch_timeout_ms: 10_000,
            teardown_when_idle: true,
        }
    }
}

impl PoolConfig {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }
}

/// Algorithm a serialized table was produced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Kangaroo,
    BabyStepGiantStep,
}

/// Where to fetch a precomputed table from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSource {
    pub kind: TableKind,
    pub max_num_bits: u8,
    /// `http(s)://` URL or a filesystem path.
    pub location: String,
    /// Hex SHA3-256 of the file; the table is rejected on mismatch.
    pub sha3_256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Width of one ciphertext chunk.
    pub chunk_bits: u8,
    /// Schedule for the upper half of the chunks.
    pub high_digit_tiers: Vec<TierConfig>,
    /// Schedule for the lower half of the chunks.
    pub low_digit_tiers: Vec<TierConfig>,
    pub reconstruct_timeout_ms: u64,
    pub cache_capacity: usize,
    pub pool: PoolConfig,
    pub tables: Vec<TableSource>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_bits: 16,
            high_digit_tiers: vec![
                TierConfig::bounded(16, 1_000),
                TierConfig::bounded(32, 3_000),
                TierConfig::unbounded(48),
            ],
            low_digit_tiers: vec![TierConfig::bounded(32, 3_000), TierConfig::unbounded(48)],
            reconstruct_timeout_ms: 5_000,
            cache_capacity: crate::cache::DEFAULT_CAPACITY,
            pool: PoolConfig::default(),
            tables: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=64).contains(&self.chunk_bits) {
            return Err(ConfigError::ChunkBits(self.chunk_bits));
        }

        validate_schedule("high digit", &self.high_digit_tiers)?;
        validate_schedule("low digit", &self.low_digit_tiers)?;

        if self.reconstruct_timeout_ms == 0 {
            return Err(ConfigError::Zero("reconstruct_timeout_ms"));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Zero("cache_capacity"));
        }
        if self.pool.workers == 0 {
            return Err(ConfigError::Zero("pool.workers"));
        }
        if self.pool.dispatch_timeout_ms == 0 {
            return Err(ConfigError::Zero("pool.dispatch_timeout_ms"));
        }

        Ok(())
    }

    pub fn reconstruct_timeout(&self) -> Duration {
        Duration::from_millis(self.reconstruct_timeout_ms)
    }

    /// Every table size either schedule refers to, ascending and deduplicated.
    pub fn required_table_bits(&self) -> Vec<u8> {
        let mut bits: Vec<u8> = self
            .high_digit_tiers
            .iter()
            .chain(&self.low_digit_tiers)
            .map(|tier| tier.max_num_bits)
            .collect();
        bits.sort_unstable();
        bits.dedup();
        bits
    }

    /// Builds the `(low_digits, high_digits)` solvers from `registry`.
    pub fn build_solvers(
        &self,
        registry: &TableRegistry,
    ) -> Result<(TieredSolver, TieredSolver), ConfigError> {
        Ok((
            build_schedule(&self.low_digit_tiers, registry)?,
            build_schedule(&self.high_digit_tiers, registry)?,
        ))
    }

    pub fn build_reconstructor(
        &self,
        registry: &TableRegistry,
    ) -> Result<ChunkReconstructor, ConfigError> {
        let (low, high) = self.build_solvers(registry)?;

        Ok(ChunkReconstructor::new(
            Arc::new(low),
            Arc::new(high),
            self.chunk_bits,
            self.reconstruct_timeout(),
        ))
    }
}

fn validate_schedule(schedule: &'static str, tiers: &[TierConfig]) -> Result<(), ConfigError> {
    let Some(last) = tiers.last() else {
        return Err(ConfigError::EmptySchedule(schedule));
    };

    if tiers
        .windows(2)
        .any(|pair| pair[0].max_num_bits >= pair[1].max_num_bits)
    {
        return Err(ConfigError::UnorderedSchedule { schedule });
    }

    if last.timeout_ms.is_some() {
        return Err(ConfigError::BoundedTerminalTier { schedule });
    }

    Ok(())
}

fn build_schedule(tiers: &[TierConfig], registry: &TableRegistry) -> Result<TieredSolver, ConfigError> {
    tiers
        .iter()
        .map(|tier| {
            registry
                .get(tier.max_num_bits)
                .map(|table| Tier::new(table, tier.budget()))
                .ok_or(ConfigError::MissingTable(tier.max_num_bits))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(TieredSolver::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();

        assert_eq!(config.required_table_bits(), vec![16, 32, 48]);
        assert_eq!(config.reconstruct_timeout(), Duration::from_millis(5000));
        assert_eq!(config.pool.dispatch_timeout(), Duration::from_millis(10_000));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = EngineConfig::from_json_str(
            r#"{
                "cache_capacity": 10,
                "pool": { "workers": 2 },
                "low_digit_tiers": [
                    { "max_num_bits": 16, "timeout_ms": 200 },
                    { "max_num_bits": 32 }
                ],
                "tables": [{
                    "kind": "baby_step_giant_step",
                    "max_num_bits": 16,
                    "location": "tables/bsgs16.bin",
                    "sha3_256": "00"
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(config.cache_capacity, 10);
        assert_eq!(config.pool.workers, 2);
        assert_eq!(config.pool.dispatch_timeout_ms, 10_000);
        assert_eq!(config.low_digit_tiers[1], TierConfig::unbounded(32));
        assert_eq!(config.tables[0].kind, TableKind::BabyStepGiantStep);
    }

    #[test]
    fn rejects_invalid_schedules() {
        let mut config = EngineConfig::default();
        config.high_digit_tiers = vec![];
        assert!(matches!(config.validate(), Err(ConfigError::EmptySchedule(_))));

        config.high_digit_tiers = vec![TierConfig::bounded(32, 10), TierConfig::unbounded(16)];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnorderedSchedule { .. })
        ));

        config.high_digit_tiers = vec![TierConfig::bounded(16, 10), TierConfig::bounded(32, 10)];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BoundedTerminalTier { .. })
        ));
    }

    #[test]
    fn rejects_zero_sizes() {
        let config = EngineConfig {
            chunk_bits: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ChunkBits(0))));

        let config = EngineConfig {
            cache_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Zero(_))));

        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "pool": { "workers": 0 } }"#),
            Err(ConfigError::Zero("pool.workers"))
        ));
    }

    #[test]
    fn missing_tables_are_reported() {
        let registry = TableRegistry::new();
        assert!(matches!(
            EngineConfig::default().build_solvers(&registry),
            Err(ConfigError::MissingTable(_))
        ));
    }

    #[test]
    fn builds_schedules_from_registry() {
        let mut registry = TableRegistry::new();
        registry.compute(TableKind::BabyStepGiantStep, 8).unwrap();
        registry.compute(TableKind::BabyStepGiantStep, 16).unwrap();

        let config = EngineConfig {
            high_digit_tiers: vec![TierConfig::bounded(8, 100), TierConfig::unbounded(16)],
            low_digit_tiers: vec![TierConfig::unbounded(16)],
            ..Default::default()
        };

        let (low, high) = config.build_solvers(&registry).unwrap();
        assert_eq!(low.tiers().len(), 1);
        assert_eq!(high.tiers().len(), 2);
        assert_eq!(high.tiers()[0].budget(), Some(Duration::from_millis(100)));
        assert_eq!(high.tiers()[1].max_num_bits(), 16);
    }
}

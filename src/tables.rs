//! Provisioning of discrete-log tables: computing them locally or fetching
//! precomputed ones by content address.

use crate::bsgs::BabyStepGiantStep;
use crate::config::{TableKind, TableSource};
use crate::kangaroo::Kangaroo;
use crate::DiscreteLogSolver;

use anyhow::{Context, Result};
use sha3::{Digest, Sha3_256};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Hex SHA3-256 of `bytes`, the content address of a table file.
pub fn content_address(bytes: &[u8]) -> String {
    hex::encode(Sha3_256::digest(bytes))
}

/// Decodes a serialized table of the given kind.
pub fn decode_table(kind: TableKind, bytes: &[u8]) -> Result<Arc<dyn DiscreteLogSolver>> {
    let table: Arc<dyn DiscreteLogSolver> = match kind {
        TableKind::Kangaroo => Arc::new(Kangaroo::from_bytes(bytes)?),
        TableKind::BabyStepGiantStep => Arc::new(BabyStepGiantStep::from_bytes(bytes)?),
    };
    Ok(table)
}

/// Tables available to the tier schedules, keyed by secret size.
#[derive(Clone, Default)]
pub struct TableRegistry {
    tables: BTreeMap<u8, Arc<dyn DiscreteLogSolver>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `table` under its own `max_num_bits`, replacing any previous
    /// table of that size.
    pub fn insert(&mut self, table: Arc<dyn DiscreteLogSolver>) {
        self.tables.insert(table.max_num_bits(), table);
    }

    pub fn get(&self, max_num_bits: u8) -> Option<Arc<dyn DiscreteLogSolver>> {
        self.tables.get(&max_num_bits).cloned()
    }

    pub fn contains(&self, max_num_bits: u8) -> bool {
        self.tables.contains_key(&max_num_bits)
    }

    /// Sizes currently registered, ascending.
    pub fn sizes(&self) -> Vec<u8> {
        self.tables.keys().copied().collect()
    }

    /// Builds a table locally and registers it.
    ///
    /// Large kangaroo tables take minutes; prefer [`TableLoader`] for those.
    pub fn compute(&mut self, kind: TableKind, max_num_bits: u8) -> Result<Arc<dyn DiscreteLogSolver>> {
        let table: Arc<dyn DiscreteLogSolver> = match kind {
            TableKind::Kangaroo => Arc::new(Kangaroo::new_and_compute_table(max_num_bits)?),
            TableKind::BabyStepGiantStep => {
                Arc::new(BabyStepGiantStep::new_and_compute_table(max_num_bits)?)
            }
        };
        tracing::debug!(?kind, bits = max_num_bits, "computed table");

        self.insert(Arc::clone(&table));
        Ok(table)
    }
}

/// Fetches serialized tables and checks them against their content address.
pub struct TableLoader {
    #[cfg(feature = "http")]
    http: reqwest::Client,
}

impl Default for TableLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TableLoader {
    pub fn new() -> Self {
        TableLoader {
            #[cfg(feature = "http")]
            http: reqwest::Client::new(),
        }
    }

    /// Loads every source into `registry`.
    pub async fn load_all(&self, sources: &[TableSource], registry: &mut TableRegistry) -> Result<()> {
        for source in sources {
            registry.insert(self.load(source).await?);
        }
        Ok(())
    }

    /// Fetches, verifies and decodes one table.
    pub async fn load(&self, source: &TableSource) -> Result<Arc<dyn DiscreteLogSolver>> {
        let bytes = self.fetch(&source.location).await?;

        let digest = content_address(&bytes);
        if !digest.eq_ignore_ascii_case(source.sha3_256.trim()) {
            anyhow::bail!(
                "table at {} has digest {}, expected {}",
                source.location,
                digest,
                source.sha3_256
            );
        }

        let kind = source.kind;
        let table = tokio::task::spawn_blocking(move || decode_table(kind, &bytes))
            .await
            .context("table decoding task failed")??;

        if table.max_num_bits() != source.max_num_bits {
            anyhow::bail!(
                "table at {} solves {}-bit secrets, expected {}",
                source.location,
                table.max_num_bits(),
                source.max_num_bits
            );
        }

        tracing::info!(
            kind = ?source.kind,
            bits = source.max_num_bits,
            location = %source.location,
            "loaded table"
        );

        Ok(table)
    }

    async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        if location.starts_with("http://") || location.starts_with("https://") {
            return self.fetch_remote(location).await;
        }

        tokio::fs::read(location)
            .await
            .with_context(|| format!("failed to read table file {}", location))
    }

    #[cfg(feature = "http")]
    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to fetch table from {}", url))?;

        if !resp.status().is_success() {
            anyhow::bail!("HTTP {} from {}", resp.status(), url);
        }

        let bytes = resp
            .bytes()
            .await
            .with_context(|| format!("failed to read table body from {}", url))?;

        Ok(bytes.to_vec())
    }

    #[cfg(not(feature = "http"))]
    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>> {
        anyhow::bail!("cannot fetch {}: built without the `http` feature", url)
    }
}

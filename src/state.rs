use anyhow::{Context, Result};
use tracing::info;

use crate::config::{Config, IndexBackend};
use crate::services::catalog::Catalog;
use crate::services::index::{HttpIndex, MemoryIndex, SearchIndex};
use crate::services::translation_memory::store;

/// Everything a request handler needs.
pub struct CoreState {
    pub config: Config,
    pub catalog: Catalog,
}

impl CoreState {
    pub fn new(config: Config, index: Box<dyn SearchIndex>) -> Self {
        Self {
            config,
            catalog: Catalog::new(index),
        }
    }

    /// Builds the configured backend and restores the catalog from the store.
    pub fn open(config: Config) -> Result<Self> {
        let index: Box<dyn SearchIndex> = match config.index_backend {
            IndexBackend::Memory => Box::new(MemoryIndex::new()),
            IndexBackend::Elasticsearch => Box::new(
                HttpIndex::connect(&config.elasticsearch_url, &config.index_name, config.http_timeout)
                    .context("failed to prepare elasticsearch index")?,
            ),
        };

        let snapshot = store::load(&config.store_path)
            .with_context(|| format!("failed to load {}", config.store_path.display()))?;

        let mut state = Self::new(config, index);
        let indexed = state
            .catalog
            .restore(snapshot)
            .context("failed to index stored translations")?;

        info!(
            backend = state.catalog.index().backend_name(),
            keys = state.catalog.key_count(),
            indexed,
            "core ready"
        );

        Ok(state)
    }
}

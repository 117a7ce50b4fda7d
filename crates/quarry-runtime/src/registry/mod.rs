//! Source Registry
//!
//! Name-to-source mapping shared across concurrent requests. Each entry keeps
//! the definition it was registered with and one constructed [`Source`],
//! which is reused by every fetch so pooled connections are shared.
//!
//! Bulk loads are all-or-nothing: every entry is validated and checked for
//! name conflicts before any of them becomes visible.

pub mod env_vars;
mod loader;

use crate::datasource::{DataSource, Source, SourceConfig, SourceType};
use quarry_core::{ColumnInfo, ConfigError, Error, RegistrationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Listing entry returned by [`SourceRegistry::list`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub name: String,

    #[serde(rename = "type")]
    pub source_type: SourceType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

struct Entry {
    config: SourceConfig,
    source: Arc<Source>,
}

#[derive(Default)]
struct RegistryState {
    /// Names in insertion order
    order: Vec<String>,
    entries: HashMap<String, Entry>,
}

impl RegistryState {
    fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    fn insert(&mut self, config: SourceConfig, source: Arc<Source>) {
        self.order.push(config.name.clone());
        self.entries
            .insert(config.name.clone(), Entry { config, source });
    }
}

/// Registry of named data sources
#[derive(Default)]
pub struct SourceRegistry {
    state: RwLock<RegistryState>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry populated from a sources file
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let registry = Self::new();
        registry.load_from_file(path).await?;
        Ok(registry)
    }

    /// Validate and construct a source without touching shared state
    fn prepare(config: &SourceConfig) -> std::result::Result<Arc<Source>, RegistrationError> {
        let invalid = |source: ConfigError| RegistrationError::InvalidConfig {
            name: config.name.clone(),
            source,
        };

        if config.name.trim().is_empty() {
            return Err(invalid(ConfigError::InvalidField {
                field: "name".to_string(),
                reason: "must not be empty".to_string(),
            }));
        }

        Source::from_config(config).map(Arc::new).map_err(invalid)
    }

    /// Register one source
    ///
    /// Fails with a duplicate error if the name is taken, or an invalid-config
    /// error if validation rejects the definition. No I/O is performed.
    pub async fn register(&self, config: SourceConfig) -> Result<()> {
        let source = Self::prepare(&config)?;

        let mut state = self.state.write().await;
        if state.entries.contains_key(&config.name) {
            return Err(RegistrationError::Duplicate { name: config.name }.into());
        }

        info!(
            "Registered data source '{}' ({})",
            config.name, config.source_type
        );
        state.insert(config, source);
        Ok(())
    }

    /// Look up a source by name
    pub async fn resolve(&self, name: &str) -> Result<Arc<Source>> {
        let state = self.state.read().await;
        state
            .entries
            .get(name)
            .map(|entry| Arc::clone(&entry.source))
            .ok_or_else(|| Error::not_found(name, &state.names()))
    }

    /// Definition a source was registered with
    pub async fn config(&self, name: &str) -> Result<SourceConfig> {
        let state = self.state.read().await;
        state
            .entries
            .get(name)
            .map(|entry| entry.config.clone())
            .ok_or_else(|| Error::not_found(name, &state.names()))
    }

    /// Remove a source; handles already resolved keep working
    pub async fn remove(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.entries.remove(name).is_none() {
            return Err(Error::not_found(name, &state.names()));
        }
        state.order.retain(|n| n != name);
        info!("Removed data source '{}'", name);
        Ok(())
    }

    /// Registered sources in insertion order
    pub async fn list(&self) -> Vec<SourceSummary> {
        let state = self.state.read().await;
        state
            .order
            .iter()
            .filter_map(|name| state.entries.get(name))
            .map(|entry| SourceSummary {
                name: entry.config.name.clone(),
                source_type: entry.config.source_type,
                description: entry.config.description.clone(),
            })
            .collect()
    }

    pub async fn names(&self) -> Vec<String> {
        self.state.read().await.names()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.state.read().await.entries.contains_key(name)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Schema of a registered source
    pub async fn get_schema(&self, name: &str) -> Result<Vec<ColumnInfo>> {
        // The lock is released before the backend is contacted
        let source = self.resolve(name).await?;
        source.get_schema().await
    }

    /// Load every source defined in a YAML file
    ///
    /// Returns the number of sources registered. On any error nothing from the
    /// file is registered.
    pub async fn load_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        debug!("Loading sources from: {}", path.display());

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            RegistrationError::Load {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        self.load_from_str(&content, &path.display().to_string())
            .await
    }

    /// Load every source defined in a YAML document
    ///
    /// `origin` names the document in error messages.
    pub async fn load_from_str(&self, content: &str, origin: &str) -> Result<usize> {
        self.load_with_env(content, origin, &env_vars::from_process_env)
            .await
    }

    async fn load_with_env(
        &self,
        content: &str,
        origin: &str,
        lookup: &(dyn Fn(&str) -> Option<String> + Sync),
    ) -> Result<usize> {
        let configs = loader::parse_sources(content, origin, lookup)?;

        let mut prepared = Vec::with_capacity(configs.len());
        for config in configs {
            let source = Self::prepare(&config)?;
            prepared.push((config, source));
        }

        let mut state = self.state.write().await;
        let mut seen = HashSet::new();
        for (config, _) in &prepared {
            if state.entries.contains_key(&config.name) || !seen.insert(config.name.as_str()) {
                return Err(RegistrationError::Duplicate {
                    name: config.name.clone(),
                }
                .into());
            }
        }

        let count = prepared.len();
        for (config, source) in prepared {
            state.insert(config, source);
        }

        info!("Loaded {} data sources from {}", count, origin);
        Ok(count)
    }
}

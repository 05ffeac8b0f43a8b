use std::{collections::HashMap, sync::Arc};

use tracing::{debug, info};

use {
    courier_config::PluginChainConfig,
    courier_pipeline::{MessagePlugin, PluginChain},
};

use crate::error::{Error, Result};

/// Builds a plugin instance from its configured parameters.
pub type PluginFactory =
    Box<dyn Fn(&serde_json::Value) -> anyhow::Result<Arc<dyn MessagePlugin>> + Send + Sync>;

/// Registry mapping plugin identifiers to factories.
#[derive(Default)]
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
}

impl PluginRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `id`. Re-registering an id replaces the
    /// previous factory.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Value) -> anyhow::Result<Arc<dyn MessagePlugin>>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered plugin ids, sorted for stable diagnostics.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Instantiate every configured chain, validating identifiers now
    /// rather than at first use. Disabled entries are skipped; a plugin
    /// whose reported id disagrees with its configured id is rejected.
    pub fn build_chains(&self, configs: &[PluginChainConfig]) -> Result<Vec<PluginChain>> {
        let mut chains = Vec::with_capacity(configs.len());
        for (chain_idx, config) in configs.iter().enumerate() {
            let mut chain: PluginChain = Vec::new();
            for entry in &config.plugins {
                if !entry.enabled {
                    debug!(chain = chain_idx, plugin = %entry.id, "skipping disabled plugin");
                    continue;
                }
                let factory = self
                    .factories
                    .get(&entry.id)
                    .ok_or_else(|| Error::UnknownPlugin {
                        id: entry.id.clone(),
                    })?;
                let plugin = factory(&entry.params).map_err(|source| Error::Construct {
                    id: entry.id.clone(),
                    source,
                })?;
                if plugin.id() != entry.id {
                    return Err(Error::IdMismatch {
                        expected: entry.id.clone(),
                        actual: plugin.id().to_string(),
                    });
                }
                chain.push(plugin);
            }
            info!(
                chain = chain_idx,
                alias = config.alias.as_deref().unwrap_or(""),
                plugins = chain.len(),
                "plugin chain built"
            );
            chains.push(chain);
        }
        Ok(chains)
    }
}

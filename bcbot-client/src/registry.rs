// ABOUTME: Named chat client factories, so the server picks its client from config.
// ABOUTME: Ships with "mock"; embedders add real protocol clients with `register`.

use crate::config::ClientConfig;
use crate::traits::ChatClient;
use anyhow::{bail, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds a client from the `[client]` options table, passed as JSON
pub type ClientFactory = Box<dyn Fn(&Value) -> Result<Arc<dyn ChatClient>> + Send + Sync>;

pub struct ClientRegistry {
    factories: BTreeMap<String, ClientFactory>,
}

impl ClientRegistry {
    /// A registry with no clients, not even "mock"
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Add or replace the factory for `name`
    pub fn register<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&Value) -> Result<Arc<dyn ChatClient>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
        self
    }

    pub fn create(&self, name: &str, options: &Value) -> Result<Arc<dyn ChatClient>> {
        match self.factories.get(name) {
            Some(factory) => factory(options),
            None => bail!(
                "Unknown chat client: {} (available: {})",
                name,
                self.available().join(", ")
            ),
        }
    }

    /// Registered client names, sorted
    pub fn available(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn create_from_config(&self, config: &ClientConfig) -> Result<Arc<dyn ChatClient>> {
        self.create(config.client_type(), &config.to_json_value())
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new().register("mock", crate::backends::mock::MockClient::factory())
    }
}

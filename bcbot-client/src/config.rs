// ABOUTME: Client selection config: a type discriminator plus free-form options.
// ABOUTME: Options are forwarded to the registered factory as JSON.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_client_type() -> String {
    "mock".to_string()
}

/// `[client]` section: which protocol client to build, and its options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Client type registered in the ClientRegistry, e.g. "mock"
    #[serde(rename = "type", default = "default_client_type")]
    pub client_type: String,

    /// Remaining fields passed to the client factory
    #[serde(flatten)]
    pub options: toml::Table,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_type: default_client_type(),
            options: toml::Table::new(),
        }
    }
}

impl ClientConfig {
    /// Parse a `[client]` table from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Wrapper {
            client: ClientConfig,
        }
        let wrapper: Wrapper = toml::from_str(content).context("Failed to parse client config TOML")?;
        Ok(wrapper.client)
    }

    pub fn client_type(&self) -> &str {
        &self.client_type
    }

    /// Convert the option table to serde_json::Value for the registry
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(&self.options).unwrap_or_else(|_| serde_json::json!({}))
    }
}

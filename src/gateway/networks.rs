use std::collections::BTreeMap;
use once_cell::sync::Lazy;

use crate::error::GatewayError;
use crate::gateway::RpcClient;
use crate::logging::LogContext;

/// Network selected when nothing else is configured
pub const DEFAULT_NETWORK: &str = "testnet";

/// Built-in network profiles, name -> REST base URL
static BUILTIN_NETWORKS: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        ("mainnet", "https://fullnode.mainnet.aptoslabs.com/v1"),
        ("testnet", "https://fullnode.testnet.aptoslabs.com/v1"),
        ("devnet", "https://fullnode.devnet.aptoslabs.com/v1"),
        ("local", "http://127.0.0.1:8080/v1"),
    ])
});

/// Named network profiles plus the one currently selected.
///
/// Each registry is an independent value: two pollers built from two
/// registries never observe each other's selection.
#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    profiles: BTreeMap<String, String>,
    current: String,
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkRegistry {
    /// Registry with the built-in profiles and `testnet` selected
    pub fn new() -> Self {
        let profiles = BUILTIN_NETWORKS
            .iter()
            .map(|(name, url)| (name.to_string(), url.to_string()))
            .collect();

        Self {
            profiles,
            current: DEFAULT_NETWORK.to_string(),
        }
    }

    /// Select a registered network
    pub fn set_network(&mut self, name: &str) -> Result<(), GatewayError> {
        if !self.profiles.contains_key(name) {
            return Err(GatewayError::UnknownNetwork {
                name: name.to_string(),
                available: self.names(),
            });
        }

        self.current = name.to_string();
        LogContext::new("gateway", "set_network")
            .with_metadata("network", serde_json::json!(name))
            .with_endpoint(self.current_url())
            .debug(&format!("Selected network {}", name));
        Ok(())
    }

    /// Register or override a network's base URL
    pub fn set_custom_endpoint(&mut self, name: &str, url: &str) {
        let previous = self.profiles.insert(name.to_string(), url.to_string());
        if let Some(previous) = previous {
            LogContext::new("gateway", "set_custom_endpoint")
                .with_metadata("network", serde_json::json!(name))
                .with_metadata("previous", serde_json::json!(previous))
                .with_endpoint(url)
                .debug(&format!("Overrode endpoint for network {}", name));
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Base URL of the selected network
    pub fn current_url(&self) -> &str {
        // profiles are never removed, so the selected name always resolves
        self.profiles
            .get(&self.current)
            .map(String::as_str)
            .unwrap_or_else(|| BUILTIN_NETWORKS[DEFAULT_NETWORK])
    }

    pub fn url_for(&self, name: &str) -> Option<&str> {
        self.profiles.get(name).map(String::as_str)
    }

    /// Registered network names, sorted
    pub fn names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    pub fn profiles(&self) -> impl Iterator<Item = (&str, &str)> {
        self.profiles.iter().map(|(name, url)| (name.as_str(), url.as_str()))
    }

    /// RPC client bound to the selected network's endpoint
    pub fn client(&self, timeout_seconds: u64) -> RpcClient {
        RpcClient::new_with_config(self.current_url().to_string(), timeout_seconds)
    }
}

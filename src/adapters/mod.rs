//! Connectivity adapters: one strategy per HTTP client stack.
//!
//! Every adapter turns network trouble (refused connections, DNS errors,
//! timeouts, unexpected statuses) into a failed [`TestResult`]. Only
//! programmer errors such as invalid catalog options come back as an
//! [`AdapterFault`], which aborts the run.

mod auth_probe;
mod reqwest_client;
mod tunnel;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
pub use auth_probe::AuthProbeAdapter;
use hashbrown::HashMap;
pub use reqwest_client::ReqwestAdapter;
use reqwest::Url;
use serde_json::{Map, Value};
pub use tunnel::HyperTunnelAdapter;

use crate::{error::AdapterFault, models::TestResult, proxy::models::ResolvedProxy};

/// Everything an adapter needs for one invocation.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Proxy to use; [`ResolvedProxy::Direct`] means no proxy at all, never
    /// the ambient one.
    pub proxy: ResolvedProxy,
    pub endpoint: Url,
    pub timeout: Duration,
    pub user_agent: String,
    pub verbose: bool,
    /// Adapter-specific arguments from the catalog.
    pub options: Map<String, Value>,
}

impl AdapterConfig {
    pub fn new(endpoint: Url, proxy: ResolvedProxy) -> Self {
        Self {
            proxy,
            endpoint,
            timeout: Duration::from_secs(30),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            verbose: false,
            options: Map::new(),
        }
    }

    pub fn option_bool(&self, key: &str) -> Result<Option<bool>, AdapterFault> {
        match self.options.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(value)) => Ok(Some(*value)),
            Some(other) => Err(AdapterFault::InvalidOption {
                option: key.to_string(),
                reason: format!("expected a boolean, got {}", other),
            }),
        }
    }

    pub fn option_u64(&self, key: &str) -> Result<Option<u64>, AdapterFault> {
        match self.options.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| AdapterFault::InvalidOption {
                option: key.to_string(),
                reason: format!("expected a non-negative integer, got {}", value),
            }),
        }
    }
}

/// The contract shared by every connectivity adapter.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Identifier used by catalog records to reference this adapter.
    fn name(&self) -> &'static str;

    /// Human-readable label for results; must reflect whether a proxy was used.
    fn method(&self, proxied: bool) -> String;

    async fn run(&self, config: &AdapterConfig) -> Result<TestResult, AdapterFault>;
}

/// Maps adapter identifiers to implementations.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<&'static str, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every adapter shipped in this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ReqwestAdapter));
        registry.register(Arc::new(HyperTunnelAdapter));
        registry.register(Arc::new(AuthProbeAdapter));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn Adapter>) {
        self.adapters.insert(adapter.name(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(name).cloned()
    }

    /// Registered identifiers, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.adapters.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = AdapterRegistry::builtin();
        assert_eq!(registry.names(), vec!["auth-probe", "hyper-tunnel", "reqwest"]);
        assert!(registry.get("reqwest").is_some());
        assert!(registry.get("needle").is_none());
    }

    #[test]
    fn test_option_accessors() {
        let mut config = AdapterConfig::new(
            Url::parse("https://example.test/").unwrap(),
            ResolvedProxy::Direct,
        );
        config.options.insert("insecure".into(), Value::Bool(true));
        config.options.insert("expectedStatus".into(), Value::from(401));
        config.options.insert("bad".into(), Value::from("yes"));

        assert_eq!(config.option_bool("insecure").unwrap(), Some(true));
        assert_eq!(config.option_bool("missing").unwrap(), None);
        assert_eq!(config.option_u64("expectedStatus").unwrap(), Some(401));
        assert!(config.option_bool("bad").is_err());
        assert!(config.option_u64("bad").is_err());
    }
}

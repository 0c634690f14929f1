//! A set of limiters built from configuration over one shared store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use super::limiter::Limiter;
use crate::clock::{Clock, SystemClock};
use crate::config::{LimiterConfig, LimitsConfig};
use crate::error::{LimiterError, Result};
use crate::store::WindowStore;

/// Limiters indexed by their logical key.
pub struct LimiterRegistry {
    limiters: RwLock<HashMap<String, Arc<Limiter>>>,
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
}

impl LimiterRegistry {
    /// Create an empty registry over `store`.
    pub fn new(store: Arc<dyn WindowStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Create an empty registry whose limiters use `clock`.
    pub fn with_clock(store: Arc<dyn WindowStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            limiters: RwLock::new(HashMap::new()),
            store,
            clock,
        }
    }

    /// Build a registry with one limiter per configured entry.
    pub async fn from_config(config: &LimitsConfig, store: Arc<dyn WindowStore>) -> Result<Self> {
        Self::from_config_with_clock(config, store, Arc::new(SystemClock)).await
    }

    /// Build a registry from configuration, driving every limiter with `clock`.
    pub async fn from_config_with_clock(
        config: &LimitsConfig,
        store: Arc<dyn WindowStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let registry = Self::with_clock(store, clock);
        for limiter in &config.limiters {
            registry.register(limiter.clone()).await?;
        }
        info!(count = registry.len(), "Limiter registry loaded");
        Ok(registry)
    }

    /// Build and add a limiter. Fails if the key is already registered.
    pub async fn register(&self, config: LimiterConfig) -> Result<Arc<Limiter>> {
        if self.limiters.read().contains_key(&config.key) {
            return Err(LimiterError::Config(format!(
                "Duplicate limiter key '{}'",
                config.key
            )));
        }

        let limiter = Arc::new(
            Limiter::with_clock(config, self.store.clone(), self.clock.clone()).await?,
        );

        let mut limiters = self.limiters.write();
        if limiters.contains_key(limiter.key()) {
            return Err(LimiterError::Config(format!(
                "Duplicate limiter key '{}'",
                limiter.key()
            )));
        }
        limiters.insert(limiter.key().to_string(), limiter.clone());
        Ok(limiter)
    }

    /// Get the limiter for `key`.
    pub fn get(&self, key: &str) -> Option<Arc<Limiter>> {
        self.limiters.read().get(key).cloned()
    }

    /// Reserve a slot on the limiter for `key`. Unknown keys are denied.
    pub async fn try_acquire(&self, key: &str) -> bool {
        match self.get(key) {
            Some(limiter) => limiter.try_acquire().await,
            None => {
                warn!(key = %key, "No limiter registered");
                false
            }
        }
    }

    /// Refresh usage on the limiter for `key`. Unknown keys are denied.
    pub async fn check_limit(&self, key: &str) -> bool {
        match self.get(key) {
            Some(limiter) => limiter.check_limit().await,
            None => {
                warn!(key = %key, "No limiter registered");
                false
            }
        }
    }

    /// Reset every registered limiter, stopping at the first failure.
    pub async fn reset_all(&self) -> Result<()> {
        let limiters: Vec<Arc<Limiter>> = self.limiters.read().values().cloned().collect();
        for limiter in limiters {
            limiter.reset().await?;
        }
        Ok(())
    }

    /// Number of registered limiters.
    pub fn len(&self) -> usize {
        self.limiters.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.limiters.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn setup() -> (Arc<ManualClock>, Arc<MemoryStore>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000_000));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        (clock, store)
    }

    #[tokio::test]
    async fn test_registry_from_yaml() {
        let (clock, store) = setup();
        let yaml = r#"
limiters:
  - key: login
    limit: 2
    period_secs: 60
  - key: search
    limit: 50
    period_secs: 10
    stop_burst: true
"#;
        let config = LimitsConfig::from_yaml(yaml).unwrap();
        let registry = LimiterRegistry::from_config_with_clock(&config, store, clock.clone())
            .await
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("search").unwrap().is_strict_burst());
        assert!(!registry.get("login").unwrap().is_strict_burst());

        registry.reset_all().await.unwrap();
        assert!(registry.try_acquire("login").await);
        clock.advance(Duration::from_secs(1));
        assert!(registry.try_acquire("login").await);
        clock.advance(Duration::from_secs(1));
        assert!(!registry.try_acquire("login").await);
        assert!(registry.check_limit("login").await);
        assert_eq!(registry.get("login").unwrap().usage(), 2);
    }

    #[tokio::test]
    async fn test_unknown_key_is_denied() {
        let (clock, store) = setup();
        let registry = LimiterRegistry::with_clock(store, clock);

        assert!(registry.is_empty());
        assert!(!registry.try_acquire("missing").await);
        assert!(!registry.check_limit("missing").await);
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected() {
        let (clock, store) = setup();
        let registry = LimiterRegistry::with_clock(store, clock);

        registry.register(LimiterConfig::new("api", 10, 2)).await.unwrap();
        let err = registry
            .register(LimiterConfig::new("api", 20, 4))
            .await
            .unwrap_err();
        assert!(matches!(err, LimiterError::Config(_)));
        assert_eq!(registry.get("api").unwrap().limit(), 10);
    }

    #[tokio::test]
    async fn test_invalid_entry_fails_whole_config() {
        let (clock, store) = setup();
        let mut config = LimitsConfig::default();
        config.limiters.push(LimiterConfig::new("ok", 10, 2));
        config.limiters.push(LimiterConfig::new("", 10, 2));

        let result = LimiterRegistry::from_config_with_clock(&config, store, clock).await;
        assert!(matches!(result, Err(LimiterError::EmptyKey)));
    }
}

//! Driver Registry
//!
//! Maps provider names (`"postgres"`, `"sqlite"`, ...) to the backend
//! factory that handles them. A registry is built once at startup, each
//! backend registering itself, and is shared read-only afterwards.
//!
//! ```rust
//! use sqltrail_migrate::registry::DriverRegistry;
//!
//! let registry = DriverRegistry::with_builtin();
//! assert!(registry.contains("postgres"));
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::driver::DriverFactory;
use crate::error::{MigrateError, MigrateResult};

/// Thread-safe map from provider name to driver factory
#[derive(Default)]
pub struct DriverRegistry {
    factories: RwLock<HashMap<String, Arc<dyn DriverFactory>>>,
}

impl DriverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every bundled backend registered
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        crate::backends::register_builtin(&registry);
        registry
    }

    /// Register a driver factory under a provider name
    ///
    /// # Panics
    /// Panics if the name is empty or already registered.
    pub fn register(&self, name: &str, factory: Arc<dyn DriverFactory>) {
        if name.is_empty() {
            panic!("Register called with an empty driver name");
        }

        let mut factories = self.factories.write();
        if factories.contains_key(name) {
            panic!("Register called twice for driver {}", name);
        }

        factories.insert(name.to_string(), factory);
        tracing::debug!(driver = name, "registered database driver");
    }

    /// Look up the factory for a provider
    pub fn get(&self, provider: &str) -> MigrateResult<Arc<dyn DriverFactory>> {
        self.factories
            .read()
            .get(provider)
            .cloned()
            .ok_or_else(|| MigrateError::UnknownDriver {
                provider: provider.to_string(),
            })
    }

    /// Whether a provider has been registered
    pub fn contains(&self, provider: &str) -> bool {
        self.factories.read().contains_key(provider)
    }

    /// Registered provider names, sorted
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{MemoryDatabase, MemoryDriverFactory};

    fn memory_factory() -> Arc<dyn DriverFactory> {
        Arc::new(MemoryDriverFactory::new(MemoryDatabase::new()))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = DriverRegistry::new();
        registry.register("memory", memory_factory());

        assert!(registry.contains("memory"));
        assert!(registry.get("memory").is_ok());
        assert_eq!(registry.providers(), vec!["memory".to_string()]);
    }

    #[test]
    fn test_unknown_driver_names_provider() {
        let registry = DriverRegistry::new();

        match registry.get("oracle") {
            Err(MigrateError::UnknownDriver { provider }) => assert_eq!(provider, "oracle"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("lookup of an unregistered driver succeeded"),
        }
    }

    #[test]
    #[should_panic(expected = "Register called twice for driver memory")]
    fn test_duplicate_registration_panics() {
        let registry = DriverRegistry::new();
        registry.register("memory", memory_factory());
        registry.register("memory", memory_factory());
    }

    #[test]
    #[should_panic(expected = "empty driver name")]
    fn test_empty_name_panics() {
        DriverRegistry::new().register("", memory_factory());
    }

    #[test]
    fn test_builtin_registry() {
        let registry = DriverRegistry::with_builtin();
        assert_eq!(
            registry.providers(),
            vec!["postgres".to_string(), "postgresql".to_string(), "sqlite".to_string()]
        );
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(DriverRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.register(&format!("memory{}", i), memory_factory()))
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.providers().len(), 8);
    }
}

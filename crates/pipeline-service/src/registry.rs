//! Named service lookup.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use pipeline_core::traits::Service;

/// Maps service names to live service instances.
///
/// Built once at startup and shared by handle; registering a name twice
/// replaces the earlier service.
#[derive(Default, Clone)]
pub struct ServiceRegistry {
    services: Arc<DashMap<String, Arc<dyn Service>>>,
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.names())
            .finish()
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service` under its own name.
    pub fn register(&self, service: Arc<dyn Service>) {
        self.register_as(service.name().to_string(), service);
    }

    pub fn register_as(&self, name: impl Into<String>, service: Arc<dyn Service>) {
        let name = name.into();
        debug!(service = %name, "Registered service");
        self.services.insert(name, service);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of every registered service.
    pub fn get_all(&self) -> Vec<(String, Arc<dyn Service>)> {
        self.services
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pipeline_core::AppResult;
    use pipeline_core::types::Record;
    use serde_json::{Value, json};

    use super::*;

    struct Echo(&'static str);

    #[async_trait]
    impl Service for Echo {
        fn name(&self) -> &str {
            self.0
        }

        async fn execute(&self, operation: &str, _args: Record) -> AppResult<Value> {
            Ok(json!(operation))
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = ServiceRegistry::new();
        registry.register(Arc::new(Echo("echo")));
        registry.register(Arc::new(Echo("audit")));

        assert_eq!(registry.names(), vec!["audit", "echo"]);
        let svc = registry.get("echo").unwrap();
        assert_eq!(svc.run("ping", Record::new()).await.unwrap(), json!("ping"));
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.get_all().len(), 2);
    }

    #[test]
    fn test_registries_are_independent() {
        let a = ServiceRegistry::new();
        let b = ServiceRegistry::new();
        a.register(Arc::new(Echo("echo")));
        assert!(b.get("echo").is_none());

        let shared = a.clone();
        assert!(shared.get("echo").is_some());
    }
}

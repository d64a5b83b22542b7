//! Lifecycle registry for the process-wide singletons (`LocalStore`,
//! `Membership`, ...).
//!
//! Mirrors the rest of this codebase's `init -> run -> shutdown` composition
//! style: components are registered in dependency order, `init_all` runs
//! them forwards, `shutdown_all` runs them in reverse.

use std::any::{Any, TypeId};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

/// A process-wide singleton with an explicit startup/teardown hook.
#[async_trait]
pub trait ManagedService: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Holds every registered service by name and by concrete type, and
/// remembers registration order so `shutdown_all` can reverse it.
pub struct ServiceRegistry {
    by_name: DashMap<&'static str, Arc<dyn ManagedService>>,
    by_type: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    init_order: RwLock<Vec<&'static str>>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_name: DashMap::new(),
            by_type: DashMap::new(),
            init_order: RwLock::new(Vec::new()),
        }
    }

    pub fn register<T: ManagedService>(&self, service: T) {
        let arc = Arc::new(service);
        let name = arc.name();
        self.by_name.insert(name, arc.clone() as Arc<dyn ManagedService>);
        self.by_type.insert(TypeId::of::<T>(), arc as Arc<dyn Any + Send + Sync>);
        self.init_order.write().push(name);
    }

    #[must_use]
    pub fn get<T: ManagedService>(&self) -> Option<Arc<T>> {
        self.by_type
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value().clone().downcast::<T>().ok())
    }

    /// Runs `init()` for every registered service in registration order.
    pub async fn init_all(&self) -> anyhow::Result<()> {
        let order = self.init_order.read().clone();
        for name in order {
            if let Some(service) = self.by_name.get(name) {
                tracing::info!(service = name, "initializing");
                service.init().await?;
            }
        }
        Ok(())
    }

    /// Runs `shutdown()` for every registered service in reverse registration order.
    pub async fn shutdown_all(&self) -> anyhow::Result<()> {
        let order = self.init_order.read().clone();
        for name in order.into_iter().rev() {
            if let Some(service) = self.by_name.get(name) {
                tracing::info!(service = name, "shutting down");
                service.shutdown().await?;
            }
        }
        Ok(())
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

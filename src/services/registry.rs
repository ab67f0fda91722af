//! Coordinator registry: explicit map from instance id to its coordinator.
//!
//! Owned by the service state. Setup inserts, teardown removes and shuts the
//! coordinator down; nothing else holds coordinators.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::services::coordinator::RefreshCoordinator;

#[derive(Clone, Default)]
pub struct CoordinatorRegistry {
    coordinators: Arc<RwLock<BTreeMap<String, RefreshCoordinator>>>,
}

impl CoordinatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a coordinator under its unique id. A second sensor for the
    /// same facility and sport is rejected.
    pub async fn insert(&self, coordinator: RefreshCoordinator) -> Result<(), AppError> {
        let id = coordinator.unique_id();
        let mut map = self.coordinators.write().await;
        if map.contains_key(&id) {
            return Err(AppError::InvalidConfiguration(format!(
                "sensor '{}' is already configured",
                id
            )));
        }
        map.insert(id, coordinator);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Option<RefreshCoordinator> {
        self.coordinators.read().await.get(id).cloned()
    }

    /// All coordinators, ordered by id.
    pub async fn all(&self) -> Vec<RefreshCoordinator> {
        self.coordinators.read().await.values().cloned().collect()
    }

    /// Remove a coordinator and tear it down. Returns false if unknown.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.coordinators.write().await.remove(id);
        match removed {
            Some(coordinator) => {
                coordinator.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Tear down every coordinator.
    pub async fn shutdown_all(&self) {
        let drained: Vec<RefreshCoordinator> = {
            let mut map = self.coordinators.write().await;
            std::mem::take(&mut *map).into_values().collect()
        };
        futures::future::join_all(drained.iter().map(|c| c.shutdown())).await;
    }
}

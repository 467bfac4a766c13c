use crate::model::ModelDefinition;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Notified after each successful registration.
pub trait RegistrationListener: Send + Sync {
    fn on_registered(&self, model: &Arc<ModelDefinition>);
}

/// In-memory source of truth for the live model definitions.
#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<BTreeMap<String, Arc<ModelDefinition>>>,
    listeners: RwLock<Vec<Arc<dyn RegistrationListener>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn RegistrationListener>) {
        self.listeners.write().unwrap_or_else(|e| e.into_inner()).push(listener);
    }

    /// Returns `false` without touching anything when the name, or the table
    /// it would be served under, is already taken.
    pub fn register(&self, model: ModelDefinition) -> bool {
        let model = Arc::new(model);
        {
            let mut models = self.models.write().unwrap_or_else(|e| e.into_inner());
            if models.contains_key(&model.name) {
                info!("Model {} already registered; skipping", model.name);
                return false;
            }
            if let Some(owner) = models.values().find(|m| m.table_name == model.table_name) {
                info!("Table {} already served by model {}; skipping {}", model.table_name, owner.name, model.name);
                return false;
            }
            models.insert(model.name.clone(), Arc::clone(&model));
        }
        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner()).clone();
        for listener in listeners {
            listener.on_registered(&model);
        }
        info!("Registered model {} ({})", model.name, model.table_name);
        true
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModelDefinition>> {
        self.models.read().unwrap_or_else(|e| e.into_inner()).get(name).cloned()
    }

    pub fn all(&self) -> Vec<Arc<ModelDefinition>> {
        self.models.read().unwrap_or_else(|e| e.into_inner()).values().cloned().collect()
    }
}

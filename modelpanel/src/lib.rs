pub mod access;
pub mod admin;
pub mod catalog;
pub mod error;
pub mod field;
pub mod handlers;
pub mod logger;
pub mod materializer;
pub mod model;
pub mod openapi;
pub mod publisher;
pub mod record;
pub mod registry;
pub mod rest;
pub mod settings;
pub mod store;
pub mod users;
pub mod views;

pub use access::{AccessGate, Decision, DenyReason, Requester};
pub use catalog::ModelCatalog;
pub use error::{AppError, ErrorResponse, PageError};
pub use field::{FieldDescriptor, FieldKind};
pub use materializer::{MountedRoutes, RouteMaterializer};
pub use model::{ModelDefinition, Operation, Permission};
pub use publisher::{ModelPublisher, ModelSubmission, PublishOutcome};
pub use record::Record;
pub use registry::{ModelRegistry, RegistrationListener};
pub use rest::{build_router, serve, AppJson};
pub use settings::AppConfig;
pub use store::{FileStore, MemoryStore, RecordStore, StoreError};

use axum::extract::FromRef;
use settings::StorageSettings;
use std::sync::Arc;
use tracing::info;

/// Shared state of the outer router.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub store: Arc<dyn RecordStore>,
    pub publisher: Arc<ModelPublisher>,
    pub routes: MountedRoutes,
}

impl AppState {
    /// Wires the registry to the route materializer; nothing is loaded yet.
    pub fn new(store: Arc<dyn RecordStore>, catalog: ModelCatalog) -> Self {
        let registry = Arc::new(ModelRegistry::new());
        let routes = MountedRoutes::default();
        registry.subscribe(Arc::new(RouteMaterializer::new(Arc::clone(&store), routes.clone())));
        let publisher = Arc::new(ModelPublisher::new(catalog, Arc::clone(&store), Arc::clone(&registry)));
        Self { registry, store, publisher, routes }
    }

    /// File-backed state with every persisted model registered.
    pub async fn bootstrap(storage: &StorageSettings) -> Result<Self, AppError> {
        let store = FileStore::open(&storage.data_dir).await?;
        let catalog = ModelCatalog::open(&storage.models_dir).await?;
        info!("Storing records in {} using {}", store.data_dir().display(), store.backend_name());
        let state = Self::new(Arc::new(store), catalog);
        let loaded = state.publisher.load_persisted().await?;
        info!("Loaded {} persisted models from {}", loaded, storage.models_dir);
        Ok(state)
    }
}

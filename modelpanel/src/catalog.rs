use crate::model::ModelDefinition;
use crate::store::file::write_atomic;
use crate::AppError;
use futures::future::join_all;
use std::path::PathBuf;
use tokio::fs;
use tracing::warn;

/// Persisted model descriptions, one `<name>.json` per model.
#[derive(Clone)]
pub struct ModelCatalog {
    models_dir: PathBuf,
}

impl ModelCatalog {
    pub async fn open(models_dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let models_dir = models_dir.into();
        fs::create_dir_all(&models_dir).await?;
        Ok(Self { models_dir })
    }

    pub fn model_path(&self, name: &str) -> PathBuf {
        self.models_dir.join(format!("{}.json", name))
    }

    pub async fn save(&self, model: &ModelDefinition) -> Result<(), AppError> {
        let bytes = serde_json::to_vec_pretty(model).map_err(|e| encoding_failed(&model.name, e))?;
        write_atomic(&self.model_path(&model.name), &bytes).await?;
        Ok(())
    }

    /// Loads every `*.json` description; files are read concurrently and
    /// returned sorted by file name so startup registration is deterministic.
    /// Unreadable or invalid files are skipped with a warning.
    pub async fn load_all(&self) -> Result<Vec<ModelDefinition>, AppError> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.models_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let loaded = join_all(paths.into_iter().map(|path| async move {
            let parsed = match fs::read(&path).await {
                Ok(bytes) => serde_json::from_slice::<ModelDefinition>(&bytes).map_err(AppError::from),
                Err(e) => Err(AppError::from(e)),
            };
            (path, parsed)
        }))
        .await;

        let mut models = Vec::with_capacity(loaded.len());
        for (path, parsed) in loaded {
            match parsed.and_then(|m| m.validate().map(|_| m)) {
                Ok(model) => models.push(model),
                Err(e) => warn!("Skipping model file {:?}: {}", path, e),
            }
        }
        Ok(models)
    }
}

/// Our own definitions failed to encode; never the client's fault.
fn encoding_failed(name: &str, source: serde_json::Error) -> AppError {
    AppError::Internal(format!("cannot encode model {}: {}", name, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldDescriptor, FieldKind};

    async fn temp_catalog() -> ModelCatalog {
        let dir = std::env::temp_dir().join("modelpanel").join(format!("models_{}", rand::random::<u64>()));
        ModelCatalog::open(dir).await.unwrap()
    }

    #[tokio::test]
    async fn saved_models_load_back() {
        let catalog = temp_catalog().await;
        let product = ModelDefinition::new("Product", vec![FieldDescriptor::new("price", FieldKind::Number)]);
        let order = ModelDefinition::new("Order", vec![]).with_owner_field("ownerId");
        catalog.save(&product).await.unwrap();
        catalog.save(&order).await.unwrap();

        let loaded = catalog.load_all().await.unwrap();
        assert_eq!(loaded, vec![order, product]);
        assert!(catalog.model_path("Product").exists());
    }

    #[tokio::test]
    async fn invalid_files_are_skipped() {
        let catalog = temp_catalog().await;
        fs::write(catalog.model_path("junk"), b"[1,2").await.unwrap();
        fs::write(catalog.model_path("notes").with_extension("txt"), b"ignored").await.unwrap();
        fs::create_dir_all(catalog.model_path("nested")).await.unwrap();
        catalog.save(&ModelDefinition::new("Tag", vec![])).await.unwrap();

        let loaded = catalog.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "Tag");
    }

    #[test]
    fn encoding_failures_are_server_errors() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = encoding_failed("Product", source);
        assert_eq!(err.status_code(), http::StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("Product"));
    }
}

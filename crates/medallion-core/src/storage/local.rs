//! Local filesystem warehouses.

use object_store::ObjectStore;
use object_store::local::LocalFileSystem;
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{IoSnafu, NotADirectorySnafu, ObjectStoreSnafu, StorageError};

use super::{BackendConfig, StorageProvider};

/// An absolute directory path; relative paths are resolved during URL parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    pub path: String,
}

impl StorageProvider {
    /// Open a local root, creating it when missing.
    pub(super) async fn construct_local(config: LocalConfig) -> Result<Self, StorageError> {
        match tokio::fs::metadata(&config.path).await {
            Ok(meta) => ensure!(
                meta.is_dir(),
                NotADirectorySnafu {
                    path: config.path.as_str()
                }
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::create_dir_all(&config.path)
                    .await
                    .context(IoSnafu)?;
            }
            Err(source) => return Err(StorageError::Io { source }),
        }

        let object_store: Arc<dyn ObjectStore> =
            Arc::new(LocalFileSystem::new_with_prefix(&config.path).context(ObjectStoreSnafu)?);

        Ok(Self {
            canonical_url: format!("file://{}", config.path),
            config: BackendConfig::Local(config),
            object_store,
            storage_options: HashMap::new(),
        })
    }
}

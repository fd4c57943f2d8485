//! Object storage abstraction.
//!
//! Provides a unified interface for working with S3 and the local
//! filesystem. All paths handed to a [`StorageProvider`] are relative to
//! the URL it was created for.

mod local;
mod s3;
mod url_parser;

pub use local::LocalConfig;
pub use s3::S3Config;
pub use url_parser::BackendConfig;

use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore, PutMode, PutOptions, PutPayload};
use snafu::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::emit;
use crate::error::{ObjectStoreSnafu, StorageError};
use crate::metrics::events::{
    RequestStatus, StorageOperation, StorageRequest, StorageRequestDuration,
};

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

/// Storage provider that abstracts over different storage backends.
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) canonical_url: String,
    pub(crate) storage_options: HashMap<String, String>,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

/// Record the outcome and latency of one storage request.
fn record_request<T, E>(operation: StorageOperation, start: Instant, result: &Result<T, E>) {
    let status = if result.is_ok() {
        RequestStatus::Success
    } else {
        RequestStatus::Error
    };
    emit!(StorageRequest { operation, status });
    emit!(StorageRequestDuration {
        operation,
        duration: start.elapsed(),
    });
}

impl StorageProvider {
    /// Create a storage provider for the given URL with storage options.
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        match BackendConfig::parse_url(url)? {
            BackendConfig::S3(config) => Self::construct_s3(config, options).await,
            BackendConfig::Local(config) => Self::construct_local(config).await,
        }
    }

    /// Create a storage provider for the given URL without extra options.
    pub async fn for_url(url: &str) -> Result<Self, StorageError> {
        Self::for_url_with_options(url, HashMap::new()).await
    }

    /// Canonical URL of the storage root.
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    /// Storage options used to build this provider.
    pub fn storage_options(&self) -> &HashMap<String, String> {
        &self.storage_options
    }

    /// Get the backend configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Qualify a path with the configured key prefix.
    pub fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match self.config.key() {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    /// List objects under `prefix` (relative to the storage root), recursively.
    ///
    /// Returned metadata carries locations relative to the storage root.
    pub fn list(
        &self,
        prefix: Option<&str>,
    ) -> impl Stream<Item = Result<ObjectMeta, StorageError>> + '_ {
        emit!(StorageRequest {
            operation: StorageOperation::List,
            status: RequestStatus::Success,
        });

        let key_part_count = self
            .config
            .key()
            .map(|key| key.parts().count())
            .unwrap_or_default();

        let full_prefix: Option<Path> = match (self.config.key(), prefix) {
            (Some(key), Some(prefix)) => {
                Some(key.parts().chain(Path::from(prefix).parts()).collect())
            }
            (Some(key), None) => Some(key.clone()),
            (None, Some(prefix)) => Some(Path::from(prefix)),
            (None, None) => None,
        };

        self.object_store
            .list(full_prefix.as_ref())
            .map(move |meta| {
                let mut meta = meta.context(ObjectStoreSnafu)?;
                // Strip the root so callers get paths they can hand back to get/put
                meta.location = meta.location.parts().skip(key_part_count).collect();
                Ok(meta)
            })
    }

    /// List object locations under `prefix`, sorted lexicographically.
    ///
    /// A prefix that does not exist yields an empty list.
    pub async fn list_paths(&self, prefix: Option<&str>) -> Result<Vec<Path>, StorageError> {
        let listed: Vec<ObjectMeta> = match self.list(prefix).try_collect().await {
            Ok(listed) => listed,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };

        let mut paths: Vec<Path> = listed.into_iter().map(|meta| meta.location).collect();
        paths.sort();
        Ok(paths)
    }

    /// Get the contents of a file.
    pub async fn get(&self, path: &Path) -> Result<Bytes, StorageError> {
        let start = Instant::now();
        let result = self.object_store.get(&self.qualify_path(path)).await;
        record_request(StorageOperation::Get, start, &result);

        result
            .context(ObjectStoreSnafu)?
            .bytes()
            .await
            .context(ObjectStoreSnafu)
    }

    /// Check whether an object exists.
    pub async fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        let start = Instant::now();
        let result = self.object_store.head(&self.qualify_path(path)).await;
        record_request(StorageOperation::Head, start, &result);

        match result {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(source) => Err(StorageError::ObjectStore { source }),
        }
    }

    /// Put a payload to a path, replacing any existing object.
    pub async fn put_payload(&self, path: &Path, payload: PutPayload) -> Result<(), StorageError> {
        self.put_payload_with_opts(path, payload, PutOptions::default())
            .await
    }

    /// Put a payload only if nothing exists at `path` yet.
    ///
    /// Fails with an "already exists" error (see
    /// [`StorageError::is_already_exists`]) when another writer got there first.
    pub async fn put_if_absent(&self, path: &Path, payload: PutPayload) -> Result<(), StorageError> {
        self.put_payload_with_opts(path, payload, PutOptions::from(PutMode::Create))
            .await
    }

    async fn put_payload_with_opts(
        &self,
        path: &Path,
        payload: PutPayload,
        opts: PutOptions,
    ) -> Result<(), StorageError> {
        let path = self.qualify_path(path);
        let start = Instant::now();
        let result = self.object_store.put_opts(&path, payload, opts).await;
        record_request(StorageOperation::Put, start, &result);

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Delete a file at the given path.
    pub async fn delete(&self, path: &Path) -> Result<(), StorageError> {
        let path = self.qualify_path(path);
        let start = Instant::now();
        let result = self.object_store.delete(&path).await;
        record_request(StorageOperation::Delete, start, &result);

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Atomically write content to a path using temp file + rename.
    ///
    /// 1. Write to `{path}.tmp`
    /// 2. Rename `{path}.tmp` to `{path}`
    ///
    /// If the write or rename fails, the original file (if any) is unchanged.
    pub async fn atomic_write(&self, path: &Path, content: Vec<u8>) -> Result<(), StorageError> {
        let temp_path = Path::from(format!("{path}.tmp"));
        self.put_payload(&temp_path, PutPayload::from(Bytes::from(content)))
            .await?;
        self.rename(&temp_path, path).await
    }

    /// Server-side rename (move) operation.
    ///
    /// - **S3**: `CopyObject` + `DeleteObject`
    /// - **Local**: `std::fs::rename`
    pub async fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError> {
        let from_qualified = self.qualify_path(from);
        let to_qualified = self.qualify_path(to);
        let start = Instant::now();
        let result = self
            .object_store
            .rename(&from_qualified, &to_qualified)
            .await;
        record_request(StorageOperation::Rename, start, &result);

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }
}

//! Client for the host's persistent file store.
//!
//! Workers import output files into the store and hand the returned id back
//! to the caller instead of raw bytes. Blobs live on the shared filesystem,
//! so [`FileStore::get_path`] is the cheap way to read one.
//!
//! ```ignore
//! let store = FileStore::from_config(&config)?;
//! let id = store.import_file("/tmp/out.png", Some("out.png"), 3600).await?;
//! let path = store.get_path(&id).await?;
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::WorkerConfig;

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the file store.
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// The source file to import does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The store answered with an `{"error": ..}` body.
    #[error("{0}")]
    Server(String),

    /// The store answered with an error status and no usable body.
    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },

    /// The store could not be reached.
    #[error("Connection failed: {0}")]
    Connection(#[from] reqwest::Error),

    /// The store's reply did not have the expected shape.
    #[error("Unexpected reply from file store: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Metadata of a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub sha256: String,
    /// Filesystem path of the blob.
    #[serde(default)]
    pub path: String,
    pub created_at: i64,
    /// Unix time the file expires; 0 means permanent.
    #[serde(default)]
    pub expires_at: i64,
}

impl FileInfo {
    pub fn is_permanent(&self) -> bool {
        self.expires_at == 0
    }
}

#[derive(Deserialize)]
struct Imported {
    id: String,
}

#[derive(Deserialize)]
struct Listing {
    #[serde(default)]
    files: Option<Vec<FileInfo>>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Async HTTP client for `{base}/v1/store`.
#[derive(Debug, Clone)]
pub struct FileStore {
    client: Client,
    store_url: String,
}

impl FileStore {
    /// Client for the store at `base_url` (e.g. `http://localhost:9800`).
    pub fn new(base_url: &str) -> Result<Self, FileStoreError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            store_url: format!("{}/v1/store", base_url.trim_end_matches('/')),
        })
    }

    pub fn from_config(config: &WorkerConfig) -> Result<Self, FileStoreError> {
        Self::new(&config.store_url)
    }

    /// Collection URL, `{base}/v1/store`.
    pub fn store_url(&self) -> &str {
        &self.store_url
    }

    /// Copy a local file into the store and return its id.
    ///
    /// `name` defaults to the file name; a `ttl` of 0 keeps the file forever.
    pub async fn import_file(
        &self,
        path: impl AsRef<Path>,
        name: Option<&str>,
        ttl: u64,
    ) -> Result<String, FileStoreError> {
        let path = path.as_ref();
        let absolute =
            std::fs::canonicalize(path).map_err(|_| FileStoreError::NotFound(path.to_path_buf()))?;
        let name = match name {
            Some(name) => name.to_string(),
            None => absolute
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        let body = json!({
            "path": absolute.to_string_lossy(),
            "name": name,
            "ttl": ttl,
        });
        let imported: Imported = self
            .call(self.client.post(&self.store_url).json(&body))
            .await?;
        debug!(id = %imported.id, path = %absolute.display(), "Imported file");
        Ok(imported.id)
    }

    /// Metadata of one file.
    pub async fn info(&self, id: &str) -> Result<FileInfo, FileStoreError> {
        self.call(self.client.get(self.file_url(id))).await
    }

    /// Blob path of one file, for reading it directly.
    pub async fn get_path(&self, id: &str) -> Result<PathBuf, FileStoreError> {
        Ok(PathBuf::from(self.info(id).await?.path))
    }

    /// All files, optionally including expired ones.
    pub async fn list(&self, include_expired: bool) -> Result<Vec<FileInfo>, FileStoreError> {
        let mut request = self.client.get(&self.store_url);
        if include_expired {
            request = request.query(&[("include_expired", "true")]);
        }
        let listing: Listing = self.call(request).await?;
        Ok(listing.files.unwrap_or_default())
    }

    /// Change a file's display name.
    pub async fn rename(&self, id: &str, name: &str) -> Result<FileInfo, FileStoreError> {
        self.patch(id, json!({ "name": name })).await
    }

    /// Change a file's time to live (0 = permanent).
    pub async fn set_ttl(&self, id: &str, ttl: u64) -> Result<FileInfo, FileStoreError> {
        self.patch(id, json!({ "ttl": ttl })).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), FileStoreError> {
        self.send(self.client.request(Method::DELETE, self.file_url(id)))
            .await
            .map(drop)
    }

    async fn patch(&self, id: &str, body: Value) -> Result<FileInfo, FileStoreError> {
        self.call(self.client.patch(self.file_url(id)).json(&body))
            .await
    }

    fn file_url(&self, id: &str) -> String {
        format!("{}/{}", self.store_url, id)
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, FileStoreError> {
        let body = self.send(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn send(&self, request: RequestBuilder) -> Result<bytes::Bytes, FileStoreError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            return Ok(body);
        }

        match serde_json::from_slice::<ErrorBody>(&body) {
            Ok(ErrorBody { error }) => Err(FileStoreError::Server(error)),
            Err(_) => Err(FileStoreError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            }),
        }
    }
}

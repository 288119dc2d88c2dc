//! Artifact storage.
//!
//! Every job owns one storage scope named after its id; each uploaded image is
//! one object inside it, named by a freshly generated token. Caller-supplied
//! file names only contribute a sanitised extension and never reach path
//! construction.

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DEFAULT_EXTENSION: &str = "jpg";
const MAX_EXTENSION_LEN: usize = 5;
const R2_PREFIX: &str = "artifacts";

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist bytes under the job's scope, returning a location token.
    async fn save(
        &self,
        job_id: Uuid,
        suggested_name: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError>;

    /// Read an artifact back. Unknown tokens are `StorageError::NotFound`.
    async fn read(&self, location: &str) -> Result<Vec<u8>, StorageError>;

    /// Delete one artifact. `Ok(false)` if it did not exist.
    async fn delete(&self, location: &str) -> Result<bool, StorageError>;

    /// Delete every artifact of a job and the scope itself.
    /// `Ok(false)` if the scope never existed.
    async fn delete_all(&self, job_id: Uuid) -> Result<bool, StorageError>;

    /// Cheap connectivity check for `/health`.
    async fn health_check(&self) -> Result<(), StorageError>;
}

/// Generate a collision-free object name, keeping only a safe extension.
pub fn generate_object_name(suggested_name: &str) -> String {
    let extension = Path::new(suggested_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| {
            !e.is_empty()
                && e.len() <= MAX_EXTENSION_LEN
                && e.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

    format!("{}.{}", Uuid::new_v4().simple(), extension)
}

/// Split a `"<job_id>/<object>"` token, rejecting anything else.
fn parse_location(location: &str) -> Result<(Uuid, &str), StorageError> {
    let invalid = || StorageError::InvalidLocation(location.to_string());

    let (scope, object) = location.split_once('/').ok_or_else(invalid)?;
    let job_id = Uuid::parse_str(scope).map_err(|_| invalid())?;
    if object.is_empty()
        || object.starts_with('.')
        || !object
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.')
    {
        return Err(invalid());
    }
    Ok((job_id, object))
}

/// Filesystem-backed store rooted at a base directory.
pub struct LocalArtifactStore {
    base_dir: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn scope_dir(&self, job_id: Uuid) -> PathBuf {
        self.base_dir.join(job_id.to_string())
    }

    fn resolve(&self, location: &str) -> Result<PathBuf, StorageError> {
        let (job_id, object) = parse_location(location)?;
        Ok(self.scope_dir(job_id).join(object))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn save(
        &self,
        job_id: Uuid,
        suggested_name: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let scope = self.scope_dir(job_id);
        tokio::fs::create_dir_all(&scope).await?;

        let object = generate_object_name(suggested_name);
        tokio::fs::write(scope.join(&object), bytes).await?;

        tracing::debug!(%job_id, object = %object, size = bytes.len(), "Artifact saved");
        Ok(format!("{}/{}", job_id, object))
    }

    async fn read(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(location)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(location.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, location: &str) -> Result<bool, StorageError> {
        let path = self.resolve(location)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_all(&self, job_id: Uuid) -> Result<bool, StorageError> {
        match tokio::fs::remove_dir_all(self.scope_dir(job_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        let metadata = tokio::fs::metadata(&self.base_dir).await?;
        if metadata.is_dir() {
            Ok(())
        } else {
            Err(StorageError::Config(format!(
                "{} is not a directory",
                self.base_dir.display()
            )))
        }
    }
}

/// Client for Cloudflare R2 object storage (S3-compatible).
pub struct R2ArtifactStore {
    bucket: Box<Bucket>,
}

impl R2ArtifactStore {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self { bucket })
    }

    fn key(location: &str) -> Result<String, StorageError> {
        let (job_id, object) = parse_location(location)?;
        Ok(format!("{}/{}/{}", R2_PREFIX, job_id, object))
    }

    fn scope_prefix(job_id: Uuid) -> String {
        format!("{}/{}/", R2_PREFIX, job_id)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.bucket.head_object(key).await {
            Ok((_, 404)) => Ok(false),
            Ok((_, code)) if code < 300 => Ok(true),
            Ok((_, code)) => Err(StorageError::Status(code)),
            Err(s3::error::S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => Err(StorageError::S3(e)),
        }
    }
}

#[async_trait]
impl ArtifactStore for R2ArtifactStore {
    async fn save(
        &self,
        job_id: Uuid,
        suggested_name: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let location = format!("{}/{}", job_id, generate_object_name(suggested_name));
        let response = self
            .bucket
            .put_object(Self::key(&location)?, bytes)
            .await?;
        if response.status_code() >= 300 {
            return Err(StorageError::Status(response.status_code()));
        }
        Ok(location)
    }

    async fn read(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        match self.bucket.get_object(Self::key(location)?).await {
            Ok(response) if response.status_code() == 404 => {
                Err(StorageError::NotFound(location.to_string()))
            }
            Ok(response) if response.status_code() >= 300 => {
                Err(StorageError::Status(response.status_code()))
            }
            Ok(response) => Ok(response.to_vec()),
            Err(s3::error::S3Error::HttpFailWithBody(404, _)) => {
                Err(StorageError::NotFound(location.to_string()))
            }
            Err(e) => Err(StorageError::S3(e)),
        }
    }

    async fn delete(&self, location: &str) -> Result<bool, StorageError> {
        let key = Self::key(location)?;
        if !self.exists(&key).await? {
            return Ok(false);
        }
        self.bucket.delete_object(&key).await?;
        Ok(true)
    }

    async fn delete_all(&self, job_id: Uuid) -> Result<bool, StorageError> {
        let pages = self
            .bucket
            .list(Self::scope_prefix(job_id), None)
            .await?;

        let keys: Vec<String> = pages
            .into_iter()
            .flat_map(|page| page.contents.into_iter().map(|object| object.key))
            .collect();
        if keys.is_empty() {
            return Ok(false);
        }

        for key in &keys {
            self.bucket.delete_object(key).await?;
        }
        tracing::debug!(%job_id, deleted = keys.len(), "Artifact scope removed from R2");
        Ok(true)
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        self.bucket
            .list(format!("{}/", R2_PREFIX), Some("/".to_string()))
            .await?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("S3 request returned status {0}")]
    Status(u16),

    #[error("Filesystem operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact location: {0}")]
    InvalidLocation(String),

    #[error("Storage configuration error: {0}")]
    Config(String),
}

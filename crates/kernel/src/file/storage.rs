//! Object store backends for uploaded assets.
//!
//! Assets are addressed by a backend URI (`local://…`, `s3://…`) that is
//! stable for the life of the object. Visitors only ever see the public URL.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

#[cfg(feature = "s3")]
use crate::config::S3Config;

/// Longest stored file name, after sanitizing.
const MAX_STORED_NAME_LEN: usize = 120;

/// Object store port used by the upload coordinator.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store `data` under `uri`. A failed or abandoned write leaves nothing
    /// readable at the public URL.
    async fn write(&self, uri: &str, data: &[u8]) -> Result<()>;

    /// Remove the object at `uri`. Removing a missing object succeeds.
    async fn delete(&self, uri: &str) -> Result<()>;

    /// A fresh, never-reused URI for an upload named `filename`.
    fn generate_uri(&self, filename: &str) -> String;

    fn public_url(&self, uri: &str) -> String;

    /// Backend name reported by the health check ("local", "s3").
    fn scheme(&self) -> &'static str;
}

/// Object key for a new asset: `YYYY/MM/<uuid v7>-<name>`.
///
/// The full v7 id keeps keys unique and roughly time ordered.
pub fn asset_key(filename: &str) -> String {
    let now = chrono::Utc::now();
    format!(
        "{}/{}-{}",
        now.format("%Y/%m"),
        uuid::Uuid::now_v7().simple(),
        stored_name(filename)
    )
}

/// Reduce an uploaded file name to a safe, lowercase object name.
///
/// Directory parts are dropped and runs of unsafe characters become one `_`.
pub fn stored_name(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim_start_matches('.');

    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-') {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
        if out.len() >= MAX_STORED_NAME_LEN {
            break;
        }
    }

    let out = out.trim_matches('_');
    if out.is_empty() {
        "upload".to_string()
    } else {
        out.to_string()
    }
}

fn join_url(base: &str, parts: &[&str]) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    for part in parts {
        let part = part.trim_matches('/');
        if !part.is_empty() {
            url.push('/');
            url.push_str(part);
        }
    }
    url
}

/// Assets on the local filesystem, served by the app under `FILES_URL`.
#[derive(Debug)]
pub struct LocalFileStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    /// Filesystem path for a `local://` URI. Only plain relative paths are
    /// accepted.
    fn resolve(&self, uri: &str) -> Result<PathBuf> {
        let Some(key) = uri.strip_prefix("local://") else {
            bail!("not a local storage URI: {uri}");
        };
        if !Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            bail!("storage URI must be a plain relative path: {uri}");
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn write(&self, uri: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(uri)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }

        // Readers never see a partially written asset
        let partial = path.with_extension("partial");
        if let Err(e) = fs::write(&partial, data).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e).context("failed to write asset");
        }
        fs::rename(&partial, &path)
            .await
            .context("failed to move asset into place")?;

        debug!(%uri, size = data.len(), "asset stored");
        Ok(())
    }

    async fn delete(&self, uri: &str) -> Result<()> {
        let path = self.resolve(uri)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(%uri, "asset deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("failed to delete asset"),
        }
    }

    fn generate_uri(&self, filename: &str) -> String {
        format!("local://{}", asset_key(filename))
    }

    fn public_url(&self, uri: &str) -> String {
        join_url(&self.base_url, &[uri.strip_prefix("local://").unwrap_or(uri)])
    }

    fn scheme(&self) -> &'static str {
        "local"
    }
}

/// Assets in an S3-compatible bucket, served from `S3_PUBLIC_URL`.
#[cfg(feature = "s3")]
pub struct S3FileStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: Option<String>,
    public_url: String,
}

#[cfg(feature = "s3")]
impl S3FileStorage {
    /// Connect with the default AWS credential chain. A configured endpoint
    /// targets an S3-compatible service such as MinIO.
    pub async fn connect(config: &S3Config) -> Result<Self> {
        let mut loader = aws_config::from_env();
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        Ok(Self {
            client: aws_sdk_s3::Client::new(&sdk_config),
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
            public_url: config.public_url.clone(),
        })
    }

    fn object_key(&self, uri: &str) -> Result<String> {
        let Some(key) = uri.strip_prefix("s3://") else {
            bail!("not an S3 storage URI: {uri}");
        };
        Ok(match &self.prefix {
            Some(prefix) => format!("{}/{key}", prefix.trim_matches('/')),
            None => key.to_string(),
        })
    }
}

#[cfg(feature = "s3")]
#[async_trait]
impl FileStorage for S3FileStorage {
    async fn write(&self, uri: &str, data: &[u8]) -> Result<()> {
        let key = self.object_key(uri)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(aws_sdk_s3::primitives::ByteStream::from(data.to_vec()))
            .send()
            .await
            .with_context(|| format!("failed to put s3://{}/{key}", self.bucket))?;

        debug!(%uri, %key, size = data.len(), "asset stored in S3");
        Ok(())
    }

    async fn delete(&self, uri: &str) -> Result<()> {
        let key = self.object_key(uri)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .with_context(|| format!("failed to delete s3://{}/{key}", self.bucket))?;

        debug!(%uri, "asset deleted from S3");
        Ok(())
    }

    fn generate_uri(&self, filename: &str) -> String {
        format!("s3://{}", asset_key(filename))
    }

    fn public_url(&self, uri: &str) -> String {
        let key = uri.strip_prefix("s3://").unwrap_or(uri);
        join_url(
            &self.public_url,
            &[self.prefix.as_deref().unwrap_or(""), key],
        )
    }

    fn scheme(&self) -> &'static str {
        "s3"
    }
}

#[cfg(feature = "s3")]
impl std::fmt::Debug for S3FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3FileStorage")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("public_url", &self.public_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn stored_names_are_flat_and_lowercase() {
        assert_eq!(stored_name("Hero Image.PNG"), "hero_image.png");
        assert_eq!(stored_name("../../etc/passwd"), "passwd");
        assert_eq!(stored_name("..\\..\\win\\boot.ini"), "boot.ini");
        assert_eq!(stored_name("a<script>.jpg"), "a_script_.jpg");
        assert_eq!(stored_name(".env"), "env");
        assert_eq!(stored_name("???"), "upload");
        assert_eq!(stored_name(""), "upload");
    }

    #[test]
    fn asset_keys_are_unique() {
        let a = asset_key("logo.png");
        let b = asset_key("logo.png");
        assert_ne!(a, b);
        assert!(a.ends_with("-logo.png"));
        assert_eq!(a.split('/').count(), 3);
    }

    #[test]
    fn public_url_joins_cleanly() {
        let storage = LocalFileStorage::new("/tmp/uploads", "https://example.com/files/");
        assert_eq!(
            storage.public_url("local://2026/02/abc-test.jpg"),
            "https://example.com/files/2026/02/abc-test.jpg"
        );
    }

    #[test]
    fn only_plain_local_uris_resolve() {
        let storage = LocalFileStorage::new("/tmp/uploads", "/files");
        assert!(storage.resolve("local://2026/01/x.png").is_ok());
        assert!(storage.resolve("local://../secret").is_err());
        assert!(storage.resolve("local:///etc/passwd").is_err());
        assert!(storage.resolve("s3://2026/01/x.png").is_err());
    }

    #[tokio::test]
    async fn write_then_delete() {
        let dir = std::env::temp_dir().join(format!("showcase-{}", uuid::Uuid::now_v7()));
        let storage = LocalFileStorage::new(&dir, "/files");
        let uri = storage.generate_uri("a.txt");

        storage.write(&uri, b"hello").await.unwrap();
        let path = storage.resolve(&uri).unwrap();
        assert_eq!(fs::read(&path).await.unwrap(), b"hello");
        assert!(!path.with_extension("partial").exists());

        storage.delete(&uri).await.unwrap();
        assert!(!path.exists());
        // Deleting again is fine
        storage.delete(&uri).await.unwrap();

        let _ = fs::remove_dir_all(&dir).await;
    }
}

//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::content::slug::DEFAULT_MAX_PROBES;
use crate::file::upload::{DEFAULT_UPLOAD_CONCURRENCY, DEFAULT_UPLOAD_TIMEOUT};

/// Default cap on insert attempts when a slug is claimed concurrently.
pub const DEFAULT_MAX_PUBLISH_ATTEMPTS: u32 = 5;

/// Default timeout for a single content store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Publish pipeline knobs, independent of the server environment.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Slug candidates probed per resolution.
    pub max_probes: u32,

    /// Insert attempts before giving up on concurrent slug claims.
    pub max_publish_attempts: u32,

    /// Uploads in flight at once.
    pub upload_concurrency: usize,

    /// Timeout for one file upload.
    pub upload_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_probes: DEFAULT_MAX_PROBES,
            max_publish_attempts: DEFAULT_MAX_PUBLISH_ATTEMPTS,
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }
}

/// S3 settings, used when `S3_BUCKET` is set.
#[cfg(feature = "s3")]
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub prefix: Option<String>,
    /// Custom endpoint for S3-compatible services.
    pub endpoint: Option<String>,
    pub public_url: String,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Path to uploads directory (default: ./uploads).
    pub uploads_dir: PathBuf,

    /// Base URL for serving uploaded files (default: /files).
    pub files_url: String,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Timeout for a single content store call (default: 10s).
    pub store_timeout: Duration,

    pub pipeline: PipelineConfig,

    #[cfg(feature = "s3")]
    pub s3: Option<S3Config>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = parse_var("PORT", 3000u16)?;

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = parse_var("DATABASE_MAX_CONNECTIONS", 10u32)?;

        let uploads_dir = env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));

        let files_url = env::var("FILES_URL").unwrap_or_else(|_| "/files".to_string());

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let store_timeout = Duration::from_secs(parse_var(
            "STORE_TIMEOUT_SECS",
            DEFAULT_STORE_TIMEOUT.as_secs(),
        )?);

        let pipeline = PipelineConfig {
            max_probes: parse_var("SLUG_MAX_PROBES", DEFAULT_MAX_PROBES)?,
            max_publish_attempts: parse_var("PUBLISH_MAX_ATTEMPTS", DEFAULT_MAX_PUBLISH_ATTEMPTS)?,
            upload_concurrency: parse_var("UPLOAD_CONCURRENCY", DEFAULT_UPLOAD_CONCURRENCY)?,
            upload_timeout: Duration::from_secs(parse_var(
                "UPLOAD_TIMEOUT_SECS",
                DEFAULT_UPLOAD_TIMEOUT.as_secs(),
            )?),
        };

        #[cfg(feature = "s3")]
        let s3 = match env::var("S3_BUCKET") {
            Ok(bucket) => {
                let public_url = env::var("S3_PUBLIC_URL")
                    .context("S3_PUBLIC_URL is required when S3_BUCKET is set")?;
                Some(S3Config {
                    bucket,
                    prefix: env::var("S3_PREFIX").ok(),
                    endpoint: env::var("S3_ENDPOINT").ok(),
                    public_url,
                })
            }
            Err(_) => None,
        };

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            uploads_dir,
            files_url,
            cors_allowed_origins,
            store_timeout,
            pipeline,
            #[cfg(feature = "s3")]
            s3,
        })
    }
}

/// Read `name`, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a valid {}", std::any::type_name::<T>())),
        Err(_) => Ok(default),
    }
}

//! Configuration for Catalog API

use core_config::{AppInfo, FromEnv, app_info, env_parse, server::ServerConfig};
use database::common::RetryConfig;
use database::postgres::PostgresConfig;
use domain_catalog::StorageConfig;
use domain_catalog::image::MAX_IMAGE_BYTES;

pub use core_config::Environment;

/// Room for multipart framing and the JSON around a Base64 image
const REQUEST_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    /// `None` when running on the in-memory repositories
    pub database: Option<PostgresConfig>,
    /// Backoff while PostgreSQL is still starting
    pub db_retry: RetryConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub environment: Environment,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let server = ServerConfig::from_env()?; // HOST=0.0.0.0, PORT=8080 by default
        let storage = StorageConfig::from_env()?;

        let use_in_memory: bool = env_parse("CATALOG_USE_IN_MEMORY", "false")?;
        let database = if use_in_memory {
            None
        } else {
            Some(PostgresConfig::from_env()?) // DATABASE_URL is required here
        };

        Ok(Self {
            app: app_info!(),
            database,
            db_retry: RetryConfig::from_env()?,
            storage,
            server,
            environment,
            run_migrations: env_parse("RUN_MIGRATIONS", "true")?,
        })
    }

    /// Largest accepted request body: an image upload, or a product whose
    /// Base64 image sits at the size limit.
    pub fn body_limit_bytes(&self) -> usize {
        let base64_image = MAX_IMAGE_BYTES.div_ceil(3) * 4;
        let largest = self.storage.max_file_size_bytes.max(base64_image);

        usize::try_from(largest)
            .unwrap_or(usize::MAX)
            .saturating_add(REQUEST_OVERHEAD_BYTES)
    }
}

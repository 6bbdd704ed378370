//! Configuration module
//!
//! Server configuration read from the process environment (a `.env` file is
//! loaded first when present).

use std::env;

const PORT: u16 = 4000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_CHUNK_FILE_SIZE_MB: u64 = 500;
const MAX_FILES_PER_REQUEST: usize = 2000;
const MAX_SINGLE_UPLOAD_SIZE_MB: u64 = 100;
const MAX_REQUEST_BODY_MB: u64 = 4096;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;

/// Upload server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub storage_path: String,
    /// Largest multipart file part accepted by the upload routes
    pub max_chunk_file_size_bytes: u64,
    /// Largest number of file parts in one multipart request
    pub max_files_per_request: usize,
    /// Per-file cap on the single-request upload path
    pub max_single_upload_size_bytes: u64,
    /// Transport-level cap for one request body
    pub max_request_body_bytes: u64,
    pub http_concurrency_limit: usize,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ServerConfig>);

impl Config {
    fn inner(&self) -> &ServerConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.inner().environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ServerConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().server_port
    }

    pub fn environment(&self) -> &str {
        &self.inner().environment
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().cors_origins
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().db_timeout_seconds
    }

    pub fn jwt_secret(&self) -> &str {
        &self.inner().jwt_secret
    }

    pub fn storage_path(&self) -> &str {
        &self.inner().storage_path
    }

    pub fn max_chunk_file_size_bytes(&self) -> u64 {
        self.inner().max_chunk_file_size_bytes
    }

    pub fn max_files_per_request(&self) -> usize {
        self.inner().max_files_per_request
    }

    pub fn max_single_upload_size_bytes(&self) -> u64 {
        self.inner().max_single_upload_size_bytes
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.inner().http_concurrency_limit
    }

    /// Upper bound for a whole request body on the multipart routes.
    pub fn max_request_body_bytes(&self) -> usize {
        usize::try_from(self.inner().max_request_body_bytes).unwrap_or(usize::MAX)
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_chunk_file_size_mb = env::var("MAX_CHUNK_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_CHUNK_FILE_SIZE_MB.to_string())
            .parse::<u64>()
            .unwrap_or(MAX_CHUNK_FILE_SIZE_MB);

        let max_single_upload_size_mb = env::var("MAX_SINGLE_UPLOAD_SIZE_MB")
            .unwrap_or_else(|_| MAX_SINGLE_UPLOAD_SIZE_MB.to_string())
            .parse::<u64>()
            .unwrap_or(MAX_SINGLE_UPLOAD_SIZE_MB);

        Ok(ServerConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            cors_origins,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            storage_path: env::var("STORAGE_PATH").unwrap_or_else(|_| "./data/dicom".to_string()),
            max_chunk_file_size_bytes: max_chunk_file_size_mb * 1024 * 1024,
            max_files_per_request: env::var("MAX_FILES_PER_REQUEST")
                .unwrap_or_else(|_| MAX_FILES_PER_REQUEST.to_string())
                .parse()
                .unwrap_or(MAX_FILES_PER_REQUEST),
            max_single_upload_size_bytes: max_single_upload_size_mb * 1024 * 1024,
            max_request_body_bytes: env::var("MAX_REQUEST_BODY_MB")
                .unwrap_or_else(|_| MAX_REQUEST_BODY_MB.to_string())
                .parse::<u64>()
                .unwrap_or(MAX_REQUEST_BODY_MB)
                * 1024
                * 1024,
            http_concurrency_limit: env::var("HTTP_CONCURRENCY_LIMIT")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(HTTP_CONCURRENCY_LIMIT)
                .max(1),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.storage_path.trim().is_empty() {
            return Err(anyhow::anyhow!("STORAGE_PATH must not be empty"));
        }

        if self.max_files_per_request == 0 {
            return Err(anyhow::anyhow!("MAX_FILES_PER_REQUEST must be at least 1"));
        }

        if self.max_chunk_file_size_bytes == 0 || self.max_single_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("Upload size limits must be greater than zero"));
        }

        if self.max_request_body_bytes < self.max_chunk_file_size_bytes {
            return Err(anyhow::anyhow!(
                "MAX_REQUEST_BODY_MB must be at least MAX_CHUNK_FILE_SIZE_MB"
            ));
        }

        Ok(())
    }
}

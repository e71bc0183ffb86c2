//! Configuration for the AgroSense gateway
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Secret used when dev mode runs without JWT_SECRET
pub const DEV_JWT_SECRET: &str = "dev-mode-secret-not-for-production-use-123456";

/// Seven days, the default session lifetime
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// AgroSense API gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "agrosense")]
#[command(about = "Farmer accounts, crop scan and yield prediction relay")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// Enable development mode (built-in JWT secret, in-memory store fallback)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "agrosense")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value_t = DEFAULT_TOKEN_TTL_SECS)]
    pub jwt_expiry_seconds: u64,

    /// Base URL of the prediction service (serves /ml/disease and /ml/yield)
    #[arg(long, env = "ML_SERVICE_URL", default_value = "http://localhost:8001")]
    pub ml_service_url: String,

    /// Directory where scan uploads are spooled while they are relayed
    #[arg(long, env = "UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Maximum accepted size of a scan upload, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "10485760")]
    pub max_upload_bytes: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

impl Args {
    /// Get effective JWT secret (uses the built-in secret in dev mode)
    pub fn jwt_secret(&self) -> Option<String> {
        match &self.jwt_secret {
            Some(secret) => Some(secret.clone()),
            None if self.dev_mode => Some(DEV_JWT_SECRET.to_string()),
            None => None,
        }
    }

    /// Prediction service URL without a trailing slash
    pub fn ml_base_url(&self) -> &str {
        self.ml_service_url.trim_end_matches('/')
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        match self.jwt_secret() {
            None => return Err("JWT_SECRET is required in production mode".to_string()),
            Some(secret) if secret.len() < 32 => {
                return Err("JWT_SECRET must be at least 32 characters".to_string())
            }
            Some(_) => {}
        }

        if self.jwt_expiry_seconds == 0 {
            return Err("JWT_EXPIRY_SECONDS must be greater than zero".to_string());
        }

        if reqwest::Url::parse(&self.ml_service_url).is_err() {
            return Err(format!("ML_SERVICE_URL is not a valid URL: {}", self.ml_service_url));
        }

        if self.max_upload_bytes == 0 {
            return Err("MAX_UPLOAD_BYTES must be greater than zero".to_string());
        }

        Ok(())
    }
}

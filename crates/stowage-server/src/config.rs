use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

use stowage_api::secret::{SECRET_LEN, generate_secret};
use stowage_types::models::{DEFAULT_FREE_PLAN_LIMIT, PlanQuotas};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 1234;
const DEFAULT_DB_PATH: &str = "stowage.db";
const DEFAULT_BLOB_DIR: &str = "./blob-storage";

/// Process configuration, read from the environment exactly once at startup
/// and immutable afterwards.
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Symmetric secret for signing session credentials.
    pub secret: String,
    pub db_path: PathBuf,
    pub blob_dir: PathBuf,
    pub quotas: PlanQuotas,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = env_or("STOWAGE_HOST", DEFAULT_HOST);

        let port = match std::env::var("STOWAGE_PORT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("STOWAGE_PORT is not a valid port: {raw}"))?,
            Err(_) => DEFAULT_PORT,
        };

        let secret = match std::env::var("STOWAGE_SECRET") {
            Ok(s) if !s.is_empty() => s,
            _ => {
                // Known tradeoff: without a configured secret, every restart
                // invalidates all outstanding sessions.
                warn!(
                    "STOWAGE_SECRET is not set; using a temporary random secret. \
                     All session credentials will become invalid when this process exits."
                );
                generate_secret(SECRET_LEN)
            }
        };

        let free = match std::env::var("STOWAGE_FREE_PLAN_LIMIT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("STOWAGE_FREE_PLAN_LIMIT is not a byte count: {raw}"))?,
            Err(_) => DEFAULT_FREE_PLAN_LIMIT,
        };

        // Premium is unlimited unless a limit is configured explicitly.
        let premium = match std::env::var("STOWAGE_PREMIUM_PLAN_LIMIT") {
            Ok(raw) => Some(raw.parse().with_context(|| {
                format!("STOWAGE_PREMIUM_PLAN_LIMIT is not a byte count: {raw}")
            })?),
            Err(_) => None,
        };

        Ok(Self {
            host,
            port,
            secret,
            db_path: env_or("STOWAGE_DB_PATH", DEFAULT_DB_PATH).into(),
            blob_dir: env_or("STOWAGE_BLOB_DIR", DEFAULT_BLOB_DIR).into(),
            quotas: PlanQuotas { free, premium },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

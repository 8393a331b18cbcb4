use std::{path::PathBuf, time::Duration};

use anyhow::Context;

use crate::store::LedgerStrategy;

/// Runtime settings read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// `None` selects the local credentials table instead of Firebase.
    pub firebase_api_key: Option<String>,
    pub blob_dir: PathBuf,
    pub session_minutes: i64,
    pub ledger: LedgerStrategy,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let database_url = var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_owned());
        let firebase_api_key = var("FIREBASE_API_KEY").filter(|key| !key.trim().is_empty());
        let blob_dir = var("BLOB_DIR").unwrap_or_else(|| "./blobs".to_owned()).into();

        let session_minutes = match var("SESSION_MINUTES") {
            Some(raw) => raw.parse().context("SESSION_MINUTES must be a number")?,
            None => 60,
        };
        let max_attempts: u32 = match var("LEDGER_MAX_ATTEMPTS") {
            Some(raw) => raw.parse().context("LEDGER_MAX_ATTEMPTS must be a number")?,
            None => 5,
        };
        anyhow::ensure!(max_attempts >= 1, "LEDGER_MAX_ATTEMPTS must be at least 1");
        let ledger = match var("LEDGER_STRATEGY").as_deref() {
            None | Some("atomic") => LedgerStrategy::Atomic,
            Some("retry") => LedgerStrategy::CompareAndRetry { max_attempts },
            Some(other) => anyhow::bail!("unknown LEDGER_STRATEGY {other:?}, expected atomic or retry"),
        };
        let http_timeout = match var("HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().context("HTTP_TIMEOUT_SECS must be a number")?),
            None => Duration::from_secs(10),
        };

        Ok(Config {
            database_url,
            bind_addr,
            firebase_api_key,
            blob_dir,
            session_minutes,
            ledger,
            http_timeout,
        })
    }
}

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use pairup_engine::{EngineConfig, EpochPolicy};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// Unset disables venue suggestions.
    pub venue_url: Option<String>,
    pub venue_retry_interval: Duration,
    pub engine: EngineConfig,
}

impl ServerConfig {
    /// Read `PAIRUP_*` variables on top of the engine defaults.
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("PAIRUP_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("PAIRUP_JWT_SECRET is unset or still a placeholder; it must match the identity service's secret");
        }

        let defaults = EngineConfig::default();
        let mut retry = defaults.retry;
        retry.max_attempts = env_or("PAIRUP_RETRY_ATTEMPTS", retry.max_attempts)?;
        retry.base_delay = millis_or("PAIRUP_RETRY_BASE_MS", retry.base_delay)?;

        let engine = EngineConfig {
            min_score: env_or("PAIRUP_MIN_SCORE", defaults.min_score)?,
            max_candidates: env_or("PAIRUP_MAX_CANDIDATES", defaults.max_candidates)?,
            scan_limit: env_or("PAIRUP_SCAN_LIMIT", defaults.scan_limit)?,
            search_timeout: millis_or("PAIRUP_SEARCH_TIMEOUT_MS", defaults.search_timeout)?,
            cache_ttl: Duration::from_secs(env_or("PAIRUP_CACHE_TTL_SECS", defaults.cache_ttl.as_secs())?),
            cache_capacity: env_or("PAIRUP_CACHE_CAPACITY", defaults.cache_capacity)?,
            retry,
            epoch_policy: match std::env::var("PAIRUP_EPOCH_POLICY") {
                Ok(v) => v.parse::<EpochPolicy>().map_err(anyhow::Error::msg)?,
                Err(_) => defaults.epoch_policy,
            },
            venue_timeout: millis_or("PAIRUP_VENUE_TIMEOUT_MS", defaults.venue_timeout)?,
        };

        Ok(Self {
            host: std::env::var("PAIRUP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("PAIRUP_PORT", 3000)?,
            db_path: std::env::var("PAIRUP_DB_PATH")
                .unwrap_or_else(|_| "pairup.db".into())
                .into(),
            jwt_secret,
            venue_url: std::env::var("PAIRUP_VENUE_URL").ok().filter(|v| !v.trim().is_empty()),
            venue_retry_interval: Duration::from_secs(env_or("PAIRUP_VENUE_RETRY_SECS", 60)?),
            engine,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => v.trim().parse().with_context(|| format!("invalid {}='{}'", key, v)),
        Err(_) => Ok(default),
    }
}

fn millis_or(key: &str, default: Duration) -> Result<Duration> {
    Ok(Duration::from_millis(env_or(key, default.as_millis() as u64)?))
}

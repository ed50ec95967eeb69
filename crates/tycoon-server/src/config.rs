//! Server configuration from the environment.

use anyhow::Context;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::store::RetryPolicy;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_REPLY_TIMEOUT_MS: u64 = 5000;
const DEFAULT_STORE_RETRIES: u32 = 3;
const STORE_BACKOFF_BASE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Directory for room files; in-memory store when unset
    pub data_dir: Option<PathBuf>,
    /// Bound on create/join/start/rejoin replies
    pub reply_timeout: Duration,
    pub store_retries: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            data_dir: None,
            reply_timeout: Duration::from_millis(DEFAULT_REPLY_TIMEOUT_MS),
            store_retries: DEFAULT_STORE_RETRIES,
        }
    }
}

impl ServerConfig {
    /// Read `SERVER_ADDR`, `TYCOON_DATA_DIR`, `TYCOON_REPLY_TIMEOUT_MS` and
    /// `TYCOON_STORE_RETRIES`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let addr: SocketAddr = get("SERVER_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.into())
            .parse()
            .context("SERVER_ADDR is not a socket address")?;

        let data_dir = get("TYCOON_DATA_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        let reply_timeout_ms = match get("TYCOON_REPLY_TIMEOUT_MS") {
            Some(raw) => raw
                .parse::<u64>()
                .context("TYCOON_REPLY_TIMEOUT_MS must be a whole number of milliseconds")?,
            None => DEFAULT_REPLY_TIMEOUT_MS,
        };

        let store_retries = match get("TYCOON_STORE_RETRIES") {
            Some(raw) => raw
                .parse::<u32>()
                .context("TYCOON_STORE_RETRIES must be a whole number")?
                .max(1),
            None => DEFAULT_STORE_RETRIES,
        };

        Ok(Self {
            addr,
            data_dir,
            reply_timeout: Duration::from_millis(reply_timeout_ms),
            store_retries,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.store_retries,
            base_delay: STORE_BACKOFF_BASE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.data_dir, None);
        assert_eq!(config.reply_timeout, Duration::from_secs(5));
        assert_eq!(config.retry_policy().attempts, 3);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SERVER_ADDR", "127.0.0.1:9000"),
            ("TYCOON_DATA_DIR", "/var/lib/tycoon"),
            ("TYCOON_REPLY_TIMEOUT_MS", "250"),
            ("TYCOON_STORE_RETRIES", "5"),
        ]))
        .unwrap();

        assert_eq!(config.addr.port(), 9000);
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/tycoon")));
        assert_eq!(config.reply_timeout, Duration::from_millis(250));
        assert_eq!(config.store_retries, 5);
    }

    #[test]
    fn test_bad_values_are_reported() {
        let err = ServerConfig::from_lookup(lookup(&[("TYCOON_REPLY_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("TYCOON_REPLY_TIMEOUT_MS"));

        assert!(ServerConfig::from_lookup(lookup(&[("SERVER_ADDR", "nowhere")])).is_err());
    }
}

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::sync::Semaphore;
use tracing::info;

/// Runtime settings, read from `MARKET_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketConfig {
    /// Recompute and check the hash of every inbound message.
    pub verify_inbound_hashes: bool,
    /// Upper bound on inbound messages processed at the same time.
    pub inbound_concurrency: usize,
    /// sled database directory. Without it state is kept in memory.
    pub database_path: Option<PathBuf>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            verify_inbound_hashes: true,
            inbound_concurrency: 64,
            database_path: None,
        }
    }
}

impl MarketConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`MarketConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let verify_inbound_hashes = match lookup("MARKET_VERIFY_INBOUND_HASHES") {
            Some(value) => value
                .trim()
                .parse()
                .with_context(|| format!("MARKET_VERIFY_INBOUND_HASHES={value:?}"))?,
            None => defaults.verify_inbound_hashes,
        };
        let inbound_concurrency = match lookup("MARKET_INBOUND_CONCURRENCY") {
            Some(value) => value
                .trim()
                .parse()
                .with_context(|| format!("MARKET_INBOUND_CONCURRENCY={value:?}"))?,
            None => defaults.inbound_concurrency,
        };
        if inbound_concurrency == 0 {
            anyhow::bail!("MARKET_INBOUND_CONCURRENCY must be at least 1");
        }
        if inbound_concurrency > Semaphore::MAX_PERMITS {
            anyhow::bail!(
                "MARKET_INBOUND_CONCURRENCY must be at most {}",
                Semaphore::MAX_PERMITS
            );
        }
        let database_path = lookup("MARKET_DATABASE_PATH")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let config = Self {
            verify_inbound_hashes,
            inbound_concurrency,
            database_path,
        };
        info!(
            verify_inbound_hashes = config.verify_inbound_hashes,
            inbound_concurrency = config.inbound_concurrency,
            database = ?config.database_path,
            "loaded market config"
        );
        Ok(config)
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
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = MarketConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, MarketConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = MarketConfig::from_lookup(lookup(&[
            ("MARKET_VERIFY_INBOUND_HASHES", "false"),
            ("MARKET_INBOUND_CONCURRENCY", "8"),
            ("MARKET_DATABASE_PATH", "/var/lib/market"),
        ]))
        .unwrap();

        assert!(!config.verify_inbound_hashes);
        assert_eq!(config.inbound_concurrency, 8);
        assert_eq!(config.database_path, Some(PathBuf::from("/var/lib/market")));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(MarketConfig::from_lookup(lookup(&[("MARKET_VERIFY_INBOUND_HASHES", "maybe")])).is_err());
        assert!(MarketConfig::from_lookup(lookup(&[("MARKET_INBOUND_CONCURRENCY", "0")])).is_err());

        for too_many in [Semaphore::MAX_PERMITS + 1, usize::MAX] {
            let value = too_many.to_string();
            let err = MarketConfig::from_lookup(lookup(&[(
                "MARKET_INBOUND_CONCURRENCY",
                value.as_str(),
            )]))
            .unwrap_err();
            assert!(err.to_string().contains("at most"));
        }

        let most = Semaphore::MAX_PERMITS.to_string();
        let config = MarketConfig::from_lookup(lookup(&[(
            "MARKET_INBOUND_CONCURRENCY",
            most.as_str(),
        )]))
        .unwrap();
        assert_eq!(config.inbound_concurrency, Semaphore::MAX_PERMITS);
    }
}

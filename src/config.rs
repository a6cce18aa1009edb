// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::env;
use std::path::PathBuf;
use std::sync::Once;
use std::time::Duration;

pub const DEFAULT_RATES_URL: &str = "https://openexchangerates.org/api/";
pub const DEFAULT_RATES_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_SYMBOLS: [&str; 4] = ["EUR", "GBP", "HUF", "USD"];

static DOTENV: Once = Once::new();

/// Process configuration taken from the environment (and a `.env` file, if
/// one is present in the working directory).
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: Option<PathBuf>,
    pub rates: RatesConfig,
}

#[derive(Debug, Clone)]
pub struct RatesConfig {
    pub app_id: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for RatesConfig {
    fn default() -> Self {
        RatesConfig {
            app_id: None,
            base_url: DEFAULT_RATES_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_RATES_TIMEOUT_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Config {
        DOTENV.call_once(|| {
            if let Ok(path) = dotenvy::dotenv() {
                tracing::debug!(path = %path.display(), "loaded .env");
            }
        });
        Config::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Config {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timeout = non_empty("PURSE_RATES_TIMEOUT_SECS")
            .and_then(|v| match v.parse::<u64>() {
                Ok(secs) => Some(secs),
                Err(_) => {
                    tracing::warn!(value = %v, "ignoring invalid PURSE_RATES_TIMEOUT_SECS");
                    None
                }
            })
            .unwrap_or(DEFAULT_RATES_TIMEOUT_SECS);

        Config {
            db_path: non_empty("PURSE_DB").map(PathBuf::from),
            rates: RatesConfig {
                app_id: non_empty("PURSE_RATES_APP_ID"),
                base_url: non_empty("PURSE_RATES_URL").unwrap_or_else(|| DEFAULT_RATES_URL.to_string()),
                timeout: Duration::from_secs(timeout),
            },
        }
    }
}

/// Installs the global tracing subscriber once. `RUST_LOG` overrides the
/// default `purse=info` filter.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("purse=info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("PURSE_DB", "/tmp/purse.sqlite"),
            ("PURSE_RATES_APP_ID", " abc "),
            ("PURSE_RATES_TIMEOUT_SECS", "3"),
        ]
        .into_iter()
        .collect();
        let cfg = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.db_path, Some(PathBuf::from("/tmp/purse.sqlite")));
        assert_eq!(cfg.rates.app_id.as_deref(), Some("abc"));
        assert_eq!(cfg.rates.timeout, Duration::from_secs(3));
        assert_eq!(cfg.rates.base_url, DEFAULT_RATES_URL);
    }

    #[test]
    fn bad_timeout_falls_back() {
        let cfg = Config::from_lookup(|k| (k == "PURSE_RATES_TIMEOUT_SECS").then(|| "soon".to_string()));
        assert_eq!(cfg.rates.timeout, Duration::from_secs(DEFAULT_RATES_TIMEOUT_SECS));
        assert!(cfg.db_path.is_none());
    }
}

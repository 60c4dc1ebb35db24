// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names and default values for the session core.
//! Embedding applications call [`SessionConfig::from_env`] at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SESSION_ACQUISITION_TIMEOUT_SECS` | Max wait for the token acquisition permit | `30` |
//! | `CACHE_REFRESH_INTERVAL_SECS` | Default periodic refresh interval for caches | `180` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,relational_session_core=debug` |

use std::env;
use std::time::Duration;

use crate::telemetry::LogFormat;

/// Environment variable name for the token acquisition wait bound, in seconds.
pub const ACQUISITION_TIMEOUT_ENV: &str = "SESSION_ACQUISITION_TIMEOUT_SECS";

/// Environment variable name for the default cache refresh interval, in seconds.
pub const REFRESH_INTERVAL_ENV: &str = "CACHE_REFRESH_INTERVAL_SECS";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default token acquisition wait bound.
pub const DEFAULT_ACQUISITION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default periodic refresh interval (3 minutes).
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(180);

/// Resolved configuration for caches and the authentication executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub acquisition_timeout: Duration,
    pub default_refresh_interval: Duration,
    pub log_format: LogFormat,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            acquisition_timeout: DEFAULT_ACQUISITION_TIMEOUT,
            default_refresh_interval: DEFAULT_REFRESH_INTERVAL,
            log_format: LogFormat::Pretty,
        }
    }
}

impl SessionConfig {
    /// Load configuration from the process environment.
    ///
    /// Missing or unparsable values fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |name: &str, fallback: Duration| {
            lookup(name)
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        Self {
            acquisition_timeout: secs(ACQUISITION_TIMEOUT_ENV, defaults.acquisition_timeout),
            default_refresh_interval: secs(REFRESH_INTERVAL_ENV, defaults.default_refresh_interval),
            log_format: lookup(LOG_FORMAT_ENV)
                .map(|raw| LogFormat::parse(&raw))
                .unwrap_or(defaults.log_format),
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
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = SessionConfig::from_lookup(lookup(&[]));
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.acquisition_timeout, Duration::from_secs(30));
    }

    #[test]
    fn reads_overrides() {
        let config = SessionConfig::from_lookup(lookup(&[
            (ACQUISITION_TIMEOUT_ENV, "5"),
            (REFRESH_INTERVAL_ENV, " 60 "),
            (LOG_FORMAT_ENV, "json"),
        ]));
        assert_eq!(config.acquisition_timeout, Duration::from_secs(5));
        assert_eq!(config.default_refresh_interval, Duration::from_secs(60));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn garbage_falls_back_to_default() {
        let config = SessionConfig::from_lookup(lookup(&[(ACQUISITION_TIMEOUT_ENV, "soon")]));
        assert_eq!(config.acquisition_timeout, DEFAULT_ACQUISITION_TIMEOUT);
    }
}

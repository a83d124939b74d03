// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Server configuration.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use kairos_sdk::{SdkConfig, SdkError};
use thiserror::Error;

/// Configuration errors raised at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid KAIROS_HTTP_PORT: {0}")]
    InvalidPort(String),

    #[error("invalid KAIROS_ENGINE_MODE: {0} (expected \"remote\" or \"embedded\")")]
    InvalidEngineMode(String),

    #[error(transparent)]
    Sdk(#[from] SdkError),
}

/// Where the engine lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineMode {
    /// A separate engine reached over HTTP; workers run in their own processes.
    #[default]
    Remote,
    /// An in-memory engine plus a hello worker inside the server process.
    Embedded,
}

impl FromStr for EngineMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(EngineMode::Remote),
            "embedded" => Ok(EngineMode::Embedded),
            _ => Err(ConfigError::InvalidEngineMode(s.to_string())),
        }
    }
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineMode::Remote => write!(f, "remote"),
            EngineMode::Embedded => write!(f, "embedded"),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port (default: 3000)
    pub http_port: u16,
    /// Engine mode (default: remote)
    pub engine_mode: EngineMode,
    /// Engine connection settings shared with the SDK
    pub sdk: SdkConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Optional Environment Variables
    /// - `KAIROS_HTTP_PORT` - HTTP listen port (default: 3000)
    /// - `KAIROS_ENGINE_MODE` - "remote" or "embedded" (default: remote)
    /// - every `KAIROS_*` variable read by [`SdkConfig::from_env`]
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_port = match env::var("KAIROS_HTTP_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidPort(format!("{}: {}", value, e)))?,
            Err(_) => 3000,
        };

        let engine_mode = match env::var("KAIROS_ENGINE_MODE") {
            Ok(value) => value.parse()?,
            Err(_) => EngineMode::default(),
        };

        Ok(Self {
            http_port,
            engine_mode,
            sdk: SdkConfig::from_env()?,
        })
    }

    /// Address the HTTP server binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.http_port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &["KAIROS_HTTP_PORT", "KAIROS_ENGINE_MODE", "KAIROS_TASK_QUEUE"];

    /// Clears the variables on creation and restores them on drop.
    struct EnvGuard {
        saved: Vec<(&'static str, Option<String>)>,
    }

    impl EnvGuard {
        fn clean() -> Self {
            let saved = VARS.iter().map(|k| (*k, env::var(k).ok())).collect();
            for key in VARS {
                // SAFETY: tests holding ENV_MUTEX are the only env mutators
                unsafe { env::remove_var(key) };
            }
            Self { saved }
        }

        fn set(&self, key: &str, value: &str) {
            // SAFETY: see `clean`
            unsafe { env::set_var(key, value) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in &self.saved {
                // SAFETY: see `clean`
                unsafe {
                    match value {
                        Some(v) => env::set_var(key, v),
                        None => env::remove_var(key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _env = EnvGuard::clean();

        let config = Config::from_env().unwrap();
        assert_eq!(config.http_port, 3000);
        assert_eq!(config.engine_mode, EngineMode::Remote);
        assert_eq!(config.sdk.task_queue, "hello-world-task-queue");
        assert_eq!(config.bind_addr().port(), 3000);
    }

    #[test]
    fn test_embedded_mode_and_port() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let env = EnvGuard::clean();
        env.set("KAIROS_HTTP_PORT", "8080");
        env.set("KAIROS_ENGINE_MODE", "Embedded");
        env.set("KAIROS_TASK_QUEUE", "other-queue");

        let config = Config::from_env().unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.engine_mode, EngineMode::Embedded);
        assert_eq!(config.sdk.task_queue, "other-queue");
    }

    #[test]
    fn test_invalid_values() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let env = EnvGuard::clean();

        env.set("KAIROS_HTTP_PORT", "not-a-port");
        assert!(matches!(Config::from_env(), Err(ConfigError::InvalidPort(_))));

        env.set("KAIROS_HTTP_PORT", "3000");
        env.set("KAIROS_ENGINE_MODE", "cloud");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("cloud"));
    }
}

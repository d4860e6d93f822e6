//! Environment configuration for different deployment stages

use std::env;
use std::str::FromStr;
use std::time::Duration;

use relay_queue::BrokerSettings;

/// Application environment configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment (uses `LocalStack`)
    Development,
}

/// Reads `key`, falling back to `default` when unset or unparsable
fn var_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn string_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// # Panics
    ///
    /// Panics if `APP_ENV` contains an invalid value
    #[must_use]
    pub fn from_env() -> Self {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            "development" => Self::Development,
            _ => panic!("Invalid environment: {env}"),
        }
    }

    /// Whether this is the production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Whether logs should be emitted as JSON
    #[must_use]
    pub const fn json_logs(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }

    /// Returns the daemon host
    #[must_use]
    pub fn daemon_host(&self) -> String {
        string_var_or("DAEMON_HOST", "127.0.0.1")
    }

    /// Returns the daemon RPC port
    #[must_use]
    pub fn daemon_port(&self) -> u16 {
        var_or("DAEMON_PORT", 11898)
    }

    /// Returns the per-call daemon timeout
    #[must_use]
    pub fn daemon_timeout(&self) -> Duration {
        Duration::from_millis(var_or("DAEMON_TIMEOUT_MS", 2000))
    }

    /// Returns the name of the queue this agent consumes
    #[must_use]
    pub fn relay_queue_name(&self) -> String {
        string_var_or("RELAY_AGENT_QUEUE", "request.network")
    }

    /// Returns the broker connection settings
    #[must_use]
    pub fn broker_settings(&self) -> BrokerSettings {
        BrokerSettings {
            server: string_var_or("RELAY_QUEUE_SERVER", "localhost"),
            username: string_var_or("RELAY_QUEUE_USERNAME", ""),
            password: string_var_or("RELAY_QUEUE_PASSWORD", ""),
            region: string_var_or("RELAY_QUEUE_REGION", "us-east-1"),
        }
    }

    /// Returns the consumer prefetch count, at least 1
    #[must_use]
    pub fn prefetch(&self) -> u16 {
        var_or("RELAY_PREFETCH", 1u16).max(1)
    }

    /// Returns the number of workers kept alive, at least 1
    #[must_use]
    pub fn num_workers(&self) -> usize {
        var_or("RELAY_WORKERS", 1usize).max(1)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Development => "development",
        };
        f.write_str(name)
    }
}

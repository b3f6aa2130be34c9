//! Runtime configuration read from the environment (and `.env`, if present).

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

/// Top-level configuration for the service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub telemetry: TelemetryConfig,
    pub pricing: PricingConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(&lookup, "APP_PORT", 8090u16)?;
        let log_level = lookup("APP_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5u32)?;

        let order_number_attempts = parse_or(&lookup, "ORDER_NUMBER_ATTEMPTS", 3u32)?;
        if order_number_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "ORDER_NUMBER_ATTEMPTS",
                value: "0".to_string(),
                expected: "an integer of at least 1",
            });
        }
        let cache_ttl_secs = parse_or(&lookup, "CATALOG_CACHE_TTL_SECS", 300u64)?;

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            telemetry: TelemetryConfig { log_level },
            pricing: PricingConfig {
                order_number_attempts,
                catalog_cache_ttl: Duration::from_secs(cache_ttl_secs),
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
            key,
            value: raw,
            expected: std::any::type_name::<T>(),
        }),
    }
}

/// HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Required by the server binary; optional for library use.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn require_url(&self) -> Result<&str, ConfigError> {
        self.url.as_deref().ok_or(ConfigError::Missing("DATABASE_URL"))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Insert attempts when a freshly computed order number is taken.
    pub order_number_attempts: u32,
    pub catalog_cache_ttl: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key}='{value}' is invalid, expected {expected}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost {
        #[source]
        source: std::net::AddrParseError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 8090);
        assert_eq!(cfg.telemetry.log_level, "info");
        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.pricing.order_number_attempts, 3);
        assert_eq!(cfg.pricing.catalog_cache_ttl, Duration::from_secs(300));
        assert!(matches!(
            cfg.database.require_url(),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("APP_HOST", "localhost"),
            ("APP_PORT", "9000"),
            ("DATABASE_URL", "postgres://localhost/receptivo"),
            ("ORDER_NUMBER_ATTEMPTS", "5"),
            ("CATALOG_CACHE_TTL_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(
            cfg.server.socket_addr().unwrap(),
            "127.0.0.1:9000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            cfg.database.require_url().unwrap(),
            "postgres://localhost/receptivo"
        );
        assert_eq!(cfg.pricing.order_number_attempts, 5);
        assert_eq!(cfg.pricing.catalog_cache_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&[("APP_PORT", "eighty")]),
            Err(ConfigError::Invalid { key: "APP_PORT", .. })
        ));
        assert!(matches!(
            config(&[("ORDER_NUMBER_ATTEMPTS", "0")]),
            Err(ConfigError::Invalid {
                key: "ORDER_NUMBER_ATTEMPTS",
                ..
            })
        ));

        let cfg = config(&[("APP_HOST", "not-an-ip")]).unwrap();
        assert!(matches!(
            cfg.server.socket_addr(),
            Err(ConfigError::InvalidHost { .. })
        ));
    }
}

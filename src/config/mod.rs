use std::net::SocketAddr;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Deserialize;

/// Log output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Configuration for the application
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,
    /// Secret used to sign and verify access tokens
    pub jwt_secret: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_jwt_ttl_hours")]
    pub jwt_ttl_hours: i64,
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    /// Working directory for rendered exports
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Seconds a single pandoc conversion may run
    #[serde(default = "default_pandoc_timeout_secs")]
    pub pandoc_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_jwt_ttl_hours() -> i64 {
    24
}

fn default_max_connections() -> u32 {
    10
}

fn default_bcrypt_cost() -> u32 {
    10
}

fn default_export_dir() -> String {
    "exports".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_pandoc_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Variables from a `.env` file are loaded first when the file exists.
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let config = envy::from_env::<Config>().context("invalid environment configuration")?;
        config.validate()?;

        Ok(config)
    }

    /// Build a configuration from explicit key/value pairs
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, Config>(pairs)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }
        if self.jwt_ttl_hours <= 0 {
            anyhow::bail!("JWT_TTL_HOURS must be positive");
        }
        if self.pandoc_timeout_secs == 0 {
            anyhow::bail!("PANDOC_TIMEOUT_SECS must be positive");
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            anyhow::bail!("BCRYPT_COST must be between 4 and 31");
        }
        Ok(())
    }

    /// Get a direct reference to the database URL
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Socket address the HTTP server binds to
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

/// Initialize environment variables and load configuration
pub fn init() -> Result<Config> {
    Config::load()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(extra: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut base = vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/timesheets".to_string()),
            ("JWT_SECRET".to_string(), "secret".to_string()),
        ];
        base.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        base
    }

    #[test]
    fn defaults_apply_when_only_required_keys_are_set() {
        let config = Config::from_pairs(pairs(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.jwt_ttl_hours, 24);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.bcrypt_cost, 10);
        assert_eq!(config.export_dir, "exports");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.pandoc_timeout_secs, 60);
        assert_eq!(config.bind_addr().unwrap().port(), 3000);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_pairs(pairs(&[
            ("PORT", "8081"),
            ("HOST", "127.0.0.1"),
            ("LOG_FORMAT", "json"),
            ("BCRYPT_COST", "4"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:8081");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.bcrypt_cost, 4);
    }

    #[test]
    fn missing_secret_is_rejected() {
        let only_db = vec![("DATABASE_URL".to_string(), "postgres://x".to_string())];
        assert!(Config::from_pairs(only_db).is_err());
        assert!(Config::from_pairs(pairs(&[("JWT_SECRET", "  ")])).is_err());
    }

    #[test]
    fn zero_pandoc_timeout_is_rejected() {
        assert!(Config::from_pairs(pairs(&[("PANDOC_TIMEOUT_SECS", "0")])).is_err());
    }

    #[test]
    fn out_of_range_bcrypt_cost_is_rejected() {
        assert!(Config::from_pairs(pairs(&[("BCRYPT_COST", "2")])).is_err());
    }
}

//! Application configuration loaded from environment variables.

use std::time::Duration;

use crate::mailer::SmtpConfig;

/// Submission port used when `SMTP_PORT` is unset.
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset runs on the in-memory store
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `SWEEP_INTERVAL_SECS`: seconds between completion sweeps (default: `120`)
/// - `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD`: mail relay for completion
///   emails; all three are needed, otherwise emails are only logged
/// - `SMTP_PORT`: relay port (default: `587`)
/// - `SMTP_FROM`: sender address (default: `SMTP_USERNAME`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub sweep_interval: Duration,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            database_max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            sweep_interval: lookup("SWEEP_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            smtp: smtp_from_lookup(&lookup),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn smtp_from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Option<SmtpConfig> {
    let present = |key: &str| lookup(key).filter(|value| !value.is_empty());
    let host = present("SMTP_HOST")?;
    let username = present("SMTP_USERNAME")?;
    let password = present("SMTP_PASSWORD")?;

    Some(SmtpConfig {
        host,
        port: lookup("SMTP_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_SMTP_PORT),
        from: present("SMTP_FROM").unwrap_or_else(|| username.clone()),
        username,
        password,
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 5,
            sweep_interval: scheduler::DEFAULT_SWEEP_INTERVAL,
            smtp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.database_url, None);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.sweep_interval, Duration::from_secs(120));
        assert_eq!(config.smtp, None);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_values_from_environment() {
        let config = from_pairs(&[
            ("PORT", "8081"),
            ("DATABASE_URL", "postgres://localhost/wash"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("SWEEP_INTERVAL_SECS", "30"),
        ]);
        assert_eq!(config.port, 8081);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/wash"));
        assert_eq!(config.database_max_connections, 12);
        assert_eq!(config.sweep_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "http"),
            ("DATABASE_URL", ""),
            ("SWEEP_INTERVAL_SECS", "0"),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_url, None);
        assert_eq!(config.sweep_interval, Duration::from_secs(120));
    }

    #[test]
    fn test_smtp_settings() {
        let config = from_pairs(&[
            ("SMTP_HOST", "smtp.gmail.com"),
            ("SMTP_USERNAME", "wash@example.com"),
            ("SMTP_PASSWORD", "app-password"),
        ]);
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.host, "smtp.gmail.com");
        assert_eq!(smtp.port, DEFAULT_SMTP_PORT);
        assert_eq!(smtp.from, "wash@example.com");

        let config = from_pairs(&[
            ("SMTP_HOST", "mail.local"),
            ("SMTP_PORT", "2525"),
            ("SMTP_USERNAME", "relay"),
            ("SMTP_PASSWORD", "secret"),
            ("SMTP_FROM", "noreply@wash.test"),
        ]);
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.port, 2525);
        assert_eq!(smtp.from, "noreply@wash.test");
    }

    #[test]
    fn test_incomplete_smtp_settings_are_ignored() {
        let config = from_pairs(&[("SMTP_HOST", "smtp.gmail.com"), ("SMTP_PASSWORD", "x")]);
        assert_eq!(config.smtp, None);
    }
}

//! Runtime configuration read from the environment.
//!
//! The database credentials come from the same `PG_*` variables the
//! deployment has always used. Unlike the original scripts, absence is
//! reported up front with every missing name in one error instead of
//! surfacing later as a connect failure.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variables: {}", .0.join(", "))]
    MissingVars(Vec<String>),
    #[error("PG_PORT is not a port number: {0:?}")]
    BadPort(String),
}

/// Postgres connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

// Keep the password out of logs.
impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"****")
            .field("database", &self.database)
            .finish()
    }
}

impl DbConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary lookup, validating all
    /// variables before failing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut get = |name: &str| match lookup(name) {
            Some(v) if !v.is_empty() => Some(v),
            _ => {
                missing.push(name.to_string());
                None
            }
        };

        let host = get("PG_HOST");
        let port = get("PG_PORT");
        let user = get("PG_USER");
        let password = get("PG_PASSWORD");
        let database = get("PG_DATABASE");

        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }

        let port_raw = port.unwrap();
        let port = port_raw
            .parse::<u16>()
            .map_err(|_| ConfigError::BadPort(port_raw))?;

        Ok(DbConfig {
            host: host.unwrap(),
            port,
            user: user.unwrap(),
            password: password.unwrap(),
            database: database.unwrap(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("PG_HOST", "db.internal"),
            ("PG_PORT", "5432"),
            ("PG_USER", "collector"),
            ("PG_PASSWORD", "secret"),
            ("PG_DATABASE", "stocks"),
        ])
    }

    fn lookup_in(
        map: HashMap<&'static str, &'static str>,
    ) -> impl Fn(&str) -> Option<String> {
        move |name| map.get(name).map(|v| v.to_string())
    }

    #[test]
    fn test_full_environment_parses() {
        let cfg = DbConfig::from_lookup(lookup_in(full_env())).unwrap();
        assert_eq!(cfg.host, "db.internal");
        assert_eq!(cfg.port, 5432);
        assert_eq!(cfg.database, "stocks");
    }

    #[test]
    fn test_all_missing_vars_reported_at_once() {
        let mut env = full_env();
        env.remove("PG_HOST");
        env.remove("PG_PASSWORD");
        let err = DbConfig::from_lookup(lookup_in(env)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingVars(vec!["PG_HOST".to_string(), "PG_PASSWORD".to_string()])
        );
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut env = full_env();
        env.insert("PG_USER", "");
        let err = DbConfig::from_lookup(lookup_in(env)).unwrap_err();
        assert_eq!(err, ConfigError::MissingVars(vec!["PG_USER".to_string()]));
    }

    #[test]
    fn test_bad_port_is_its_own_error() {
        let mut env = full_env();
        env.insert("PG_PORT", "not-a-port");
        let err = DbConfig::from_lookup(lookup_in(env)).unwrap_err();
        assert_eq!(err, ConfigError::BadPort("not-a-port".to_string()));
    }

    #[test]
    fn test_debug_masks_password() {
        let cfg = DbConfig::from_lookup(lookup_in(full_env())).unwrap();
        let debug = format!("{:?}", cfg);
        assert!(debug.contains("****"));
        assert!(!debug.contains("secret"));
    }
}

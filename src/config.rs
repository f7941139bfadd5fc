use std::env;
use std::str::FromStr;

use chrono::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings read from the environment (and `.env` via dotenv).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_address: String,
    pub max_connections: u32,
    pub session_ttl: Duration,
    pub remember_me_ttl: Duration,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let server_address = lookup("SERVER_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?;
        let session_minutes = parse_or(&lookup, "SESSION_TTL_MINUTES", 30)?;
        let remember_me_days = parse_or(&lookup, "REMEMBER_ME_TTL_DAYS", 10)?;
        let bcrypt_cost = parse_or(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;

        Ok(Config {
            database_url,
            server_address,
            max_connections,
            session_ttl: Duration::minutes(session_minutes),
            remember_me_ttl: Duration::days(remember_me_days),
            bcrypt_cost,
        })
    }

    /// Lifetime of a new session.
    pub fn session_lifetime(&self, remember_me: bool) -> Duration {
        if remember_me {
            self.remember_me_ttl
        } else {
            self.session_ttl
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
impl Config {
    /// Settings for handler tests: no database, cheap hashing.
    pub fn for_tests() -> Config {
        Config {
            database_url: String::new(),
            server_address: "127.0.0.1:0".to_string(),
            max_connections: 1,
            session_ttl: Duration::minutes(30),
            remember_me_ttl: Duration::days(10),
            bcrypt_cost: 4,
        }
    }
}

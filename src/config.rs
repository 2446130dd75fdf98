use std::env;
use std::fmt::Display;
use std::str::FromStr;

use chrono::Duration;
use thiserror::Error;
use tracing::{info, warn};
use warp::http::Uri;

/// One year.
const MAX_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: Option<String>,
    pub token_ttl: Duration,
    pub cors_origin: String,
    pub pool_size: u32,
    pub bcrypt_cost: u32,
    pub admin_emails: Vec<String>,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first if a
    /// `.env` file should be honored.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("JWT_SECRET_KEY").filter(|s| !s.is_empty());
        if jwt_secret.is_none() {
            warn!("JWT_SECRET_KEY not set, tokens will be signed with a random per-process key");
        }

        let cors_origin: String = try_load(&lookup, "CORS_ORIGIN", "http://localhost:3000")?;
        validate_origin(&cors_origin)?;

        let token_ttl_minutes: i64 = try_load(&lookup, "TOKEN_TTL_MINUTES", "15")?;
        let token_ttl = Some(token_ttl_minutes)
            .filter(|minutes| (1..=MAX_TOKEN_TTL_MINUTES).contains(minutes))
            .and_then(Duration::try_minutes)
            .ok_or_else(|| ConfigError::Invalid {
                key: "TOKEN_TTL_MINUTES",
                value: token_ttl_minutes.to_string(),
                reason: format!("must be between 1 and {MAX_TOKEN_TTL_MINUTES}"),
            })?;

        let bcrypt_cost: u32 = try_load(&lookup, "BCRYPT_COST", &bcrypt::DEFAULT_COST.to_string())?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
                reason: String::from("must be between 4 and 31"),
            });
        }

        let admin_emails = lookup("ADMIN_EMAILS")
            .map(|emails| {
                emails
                    .split(',')
                    .map(str::trim)
                    .filter(|email| !email.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url: try_load(&lookup, "DATABASE_URL", "polling_app.db")?,
            port: try_load(&lookup, "PORT", "5000")?,
            jwt_secret,
            token_ttl,
            cors_origin,
            pool_size: try_load(&lookup, "DB_POOL_SIZE", "8")?,
            bcrypt_cost,
            admin_emails,
        })
    }
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        String::from(default)
    });
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

// warp panics on an origin it cannot parse, so reject it at startup instead.
fn validate_origin(origin: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        key: "CORS_ORIGIN",
        value: String::from(origin),
        reason: String::from(reason),
    };
    let uri: Uri = origin.parse().map_err(|_| invalid("not a URI"))?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(invalid("expected scheme://host[:port]"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.database_url, "polling_app.db");
        assert_eq!(config.port, 5000);
        assert_eq!(config.jwt_secret, None);
        assert_eq!(config.token_ttl, Duration::minutes(15));
        assert_eq!(config.cors_origin, "http://localhost:3000");
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert!(config.admin_emails.is_empty());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = load(&[
            ("DATABASE_URL", "/tmp/polls.db"),
            ("PORT", "8080"),
            ("JWT_SECRET_KEY", "s3cret"),
            ("TOKEN_TTL_MINUTES", "60"),
            ("ADMIN_EMAILS", "a@x.com, b@x.com,,"),
        ])
        .unwrap();
        assert_eq!(config.database_url, "/tmp/polls.db");
        assert_eq!(config.port, 8080);
        assert_eq!(config.jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.token_ttl, Duration::minutes(60));
        assert_eq!(config.admin_emails, vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn unparsable_values_are_errors() {
        assert!(load(&[("PORT", "eighty")]).is_err());
        assert!(load(&[("TOKEN_TTL_MINUTES", "0")]).is_err());
        assert!(load(&[("TOKEN_TTL_MINUTES", "9223372036854775807")]).is_err());
        assert!(load(&[("BCRYPT_COST", "2")]).is_err());
        assert!(load(&[("CORS_ORIGIN", "localhost")]).is_err());
    }

    #[test]
    fn empty_secret_counts_as_unset() {
        let config = load(&[("JWT_SECRET_KEY", "")]).unwrap();
        assert_eq!(config.jwt_secret, None);
    }
}

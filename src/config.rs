//! Runtime configuration read from the environment (and `.env` when present).
//!
//! Required: `DATABASE_URL`, `SECRET`.
//! Optional: `BIND_ADDRESS` (default `0.0.0.0:3000`), `TOKEN_TTL_MINUTES`
//! (default 10, 1 to 1440), `UPLOAD_DIR` (default `./uploads`),
//! `FILE_SIZE_LIMIT` in bytes (default 5 MiB), `BCRYPT_COST` (default 10).

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_FILE_SIZE_LIMIT: usize = 5 * 1024 * 1024;
pub const DEFAULT_BCRYPT_COST: u32 = 10;
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 10;
pub const MAX_TOKEN_TTL_MINUTES: i64 = 24 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_address: String,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub upload_dir: PathBuf,
    pub file_size_limit: usize,
    pub bcrypt_cost: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_owned()),
            jwt_secret: required("SECRET")?,
            token_ttl_minutes: token_ttl(std::env::var("TOKEN_TTL_MINUTES").ok())?,
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./uploads")),
            file_size_limit: parsed("FILE_SIZE_LIMIT", DEFAULT_FILE_SIZE_LIMIT)?,
            bcrypt_cost: parsed("BCRYPT_COST", DEFAULT_BCRYPT_COST)?,
        })
    }
}

fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidEnvVar(key.to_owned(), raw)),
        Err(_) => Ok(default),
    }
}

fn token_ttl(raw: Option<String>) -> Result<i64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_TOKEN_TTL_MINUTES);
    };

    match raw.trim().parse::<i64>() {
        Ok(minutes) if (1..=MAX_TOKEN_TTL_MINUTES).contains(&minutes) => Ok(minutes),
        _ => Err(ConfigError::InvalidEnvVar(
            "TOKEN_TTL_MINUTES".to_owned(),
            raw,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_ttl_defaults_when_unset() {
        assert_eq!(token_ttl(None).unwrap(), DEFAULT_TOKEN_TTL_MINUTES);
        assert_eq!(token_ttl(Some("1440".to_owned())).unwrap(), 1440);
    }

    #[test]
    fn token_ttl_outside_range_is_rejected() {
        for raw in ["0", "-5", "1441", "9223372036854775807", "soon"] {
            assert!(matches!(
                token_ttl(Some(raw.to_owned())),
                Err(ConfigError::InvalidEnvVar(key, _)) if key == "TOKEN_TTL_MINUTES"
            ));
        }
    }
}

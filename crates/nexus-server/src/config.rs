use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Accepted range for `NEXUS_TOKEN_TTL_DAYS`.
const TOKEN_TTL_DAYS: std::ops::RangeInclusive<i64> = 1..=365;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your_secret_key",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub token_ttl_days: i64,
    /// Allowed browser origin; permissive CORS when unset.
    pub cors_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("NEXUS_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("NEXUS_JWT_SECRET is unset or still a placeholder");
        }

        let db_path = get("NEXUS_DB_PATH").unwrap_or_else(|| "nexus.db".into()).into();
        let host = get("NEXUS_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("NEXUS_PORT")
            .unwrap_or_else(|| "5005".into())
            .parse()
            .context("NEXUS_PORT must be a port number")?;
        let token_ttl_days: i64 = get("NEXUS_TOKEN_TTL_DAYS")
            .unwrap_or_else(|| "7".into())
            .parse()
            .context("NEXUS_TOKEN_TTL_DAYS must be a whole number of days")?;
        if !TOKEN_TTL_DAYS.contains(&token_ttl_days) {
            bail!(
                "NEXUS_TOKEN_TTL_DAYS must be between {} and {}, got {}",
                TOKEN_TTL_DAYS.start(),
                TOKEN_TTL_DAYS.end(),
                token_ttl_days
            );
        }
        let addr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
            token_ttl_days,
            cors_origin: get("NEXUS_CORS_ORIGIN").filter(|s| !s.is_empty()),
        })
    }
}

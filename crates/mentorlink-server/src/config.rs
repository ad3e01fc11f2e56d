use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::info;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub db_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = env::var("MENTORLINK_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("MENTORLINK_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let host: String = try_load("MENTORLINK_HOST", "0.0.0.0")?;
        let port: u16 = try_load("MENTORLINK_PORT", "3000")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            jwt_secret,
            db_path: try_load::<String>("MENTORLINK_DB_PATH", "mentorlink.db")?.into(),
            addr,
            db_timeout: Duration::from_millis(try_load("MENTORLINK_DB_TIMEOUT_MS", "5000")?),
        })
    }
}

fn try_load<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| anyhow::anyhow!("invalid {key} value '{raw}': {e}"))
}

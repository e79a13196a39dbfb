//! Process configuration, read once at startup.

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Default sweep period: once a day.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 24 * 60 * 60;

pub struct Config {
    pub http_port: u16,
    /// Decoded HMAC key. Never log or echo this.
    pub signing_key: Vec<u8>,
    /// SQLite URL; `None` falls back to the in-memory stores.
    pub db_url: Option<String>,
    /// Sweep period in seconds; 0 disables the cleanup task.
    pub cleanup_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let http_port = std::env::var("TURNSTILE_HTTP_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);
        let secret = std::env::var("TURNSTILE_JWT_SECRET")
            .context("TURNSTILE_JWT_SECRET must be set (base64-encoded HMAC key)")?;
        let signing_key = STANDARD
            .decode(secret.trim())
            .context("TURNSTILE_JWT_SECRET is not valid base64")?;
        let db_url = std::env::var("TURNSTILE_DB_URL").ok().filter(|s| !s.is_empty());
        let cleanup_interval_secs = std::env::var("TURNSTILE_CLEANUP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_CLEANUP_INTERVAL_SECS);
        Ok(Self {
            http_port,
            signing_key,
            db_url,
            cleanup_interval_secs,
        })
    }
}

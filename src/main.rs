use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default
    // verbosity. The signing secret is deliberately absent here.
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port = std::env::var("TURNSTILE_HTTP_PORT").unwrap_or_else(|_| "8080".to_string());
    let db_url = std::env::var("TURNSTILE_DB_URL").unwrap_or_else(|_| "<memory>".to_string());
    let cleanup = std::env::var("TURNSTILE_CLEANUP_INTERVAL_SECS")
        .unwrap_or_else(|_| "86400".to_string());
    info!(
        target: "turnstile",
        "Turnstile starting: RUST_LOG='{}', http_port={}, db_url='{}', cleanup_interval_secs={}",
        rust_log, http_port, db_url, cleanup
    );

    turnstile::server::run().await
}

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Log filter env var; falls back to `RUST_LOG`, then `warn`.
const LOG_ENV: &str = "SEARCH_URL_LOG";

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();
    search_url_state::run().await
}

fn init_tracing() {
    let filter = dotenvy::var(LOG_ENV)
        .or_else(|_| dotenvy::var("RUST_LOG"))
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

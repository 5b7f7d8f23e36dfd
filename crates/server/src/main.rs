use server::config;
use server::intake::NicknamePolicy;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env();

    let policy = NicknamePolicy::load(&config.blocklist_path);

    let handle = server::start(&config, policy).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!(
        active = handle.registry.active_count().await,
        waiting = handle.registry.waiting_count().await,
        "Shutting down"
    );
    handle.abort();
    Ok(())
}

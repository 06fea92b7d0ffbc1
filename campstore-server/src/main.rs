use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinSet;

use campstore_server::config::Config;
use campstore_server::store;
use campstore_server::transport::{AppState, Transport, http::HttpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("campstore={}", config.log_level).parse()?)
                .add_directive(format!("campstore_server={}", config.log_level).parse()?),
        )
        .init();

    let registry = store::create_registry(&config.storage)?;
    let limiter = store::create_rate_limiter(&config.rate_limit);

    if config.security.admin_token.is_none() {
        tracing::warn!("No admin token configured; admin routes are open to anyone");
    }

    tracing::info!(
        "campstore server started with storage type: {:?}",
        config.storage.storage_type
    );
    tracing::info!(
        "Rate limit: {} submissions per {}s per client",
        config.rate_limit.limit,
        config.rate_limit.window
    );

    let state = Arc::new(
        AppState::new(registry, limiter)
            .admin_token(config.security.admin_token.clone())
            .trust_forwarded_for(config.security.trust_forwarded_for),
    );

    let mut transport_tasks = JoinSet::new();

    let transport = HttpTransport::new(&config.http.host, config.http.port)?;
    let http_state = Arc::clone(&state);
    transport_tasks.spawn(async move {
        tracing::info!("Starting HTTP transport");
        transport.start(http_state).await
    });

    while let Some(result) = transport_tasks.join_next().await {
        match result {
            Ok(Ok(())) => {
                tracing::info!("Transport task completed successfully");
            }
            Ok(Err(e)) => {
                tracing::error!("Transport task failed: {}", e);
                return Err(e);
            }
            Err(e) => {
                tracing::error!("Transport task panicked: {}", e);
                return Err(anyhow::anyhow!("Transport task panicked"));
            }
        }
    }

    Ok(())
}

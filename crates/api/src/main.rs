use anyhow::Context;

use shipsync_infra::{AppConfig, SyncScheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    shipsync_observability::init(config.log_format);

    let services = shipsync_api::app::build_services(&config).await?;

    let scheduler = SyncScheduler::new(services.runner.clone(), config.run_interval).spawn();
    let app = shipsync_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!(
        addr = %config.listen_addr,
        sync_enabled = config.policy.enabled,
        max_attempts = config.policy.max_attempts,
        carrier = %config.carrier.name,
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    scheduler.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

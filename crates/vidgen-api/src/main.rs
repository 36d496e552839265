use vidgen_api::api;
use vidgen_api::config::Config;
use vidgen_api::state::{self, AppState};

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let store = state::open_store(&config).await?;
    let state = AppState::new(store);

    if config.resume_on_start {
        match state.simulator.resume_unfinished().await {
            Ok(resumed) => tracing::info!(resumed, "resumed unfinished generations"),
            Err(err) => tracing::warn!(%err, "failed to resume unfinished generations"),
        }
    }

    let simulator = state.simulator.clone();
    let app = api::router(state);

    let addr = config.bind_addr;
    tracing::info!(%addr, "vidgen-api HTTP listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    simulator.shutdown().await;
    tracing::info!("simulation runs stopped");

    Ok(())
}

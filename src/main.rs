use anyhow::Context;
use clap::Parser;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use gleaner::api::{AppState, create_router};
use gleaner::config::Config;

const JANITOR_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(version, about = "Streams web-search augmented answers over SSE")]
struct Cli {
    /// Address to bind, overrides LISTEN_ADDR.
    #[arg(long)]
    listen: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The fmt subscriber also picks up `log` records from the library modules.
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(true)
        .init();

    let mut config = Config::from_env()?;
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if config.max_iterations().is_none() {
        tracing::warn!("MAX_ITERATIONS is missing or invalid, /stream requests will be rejected");
    }

    let shutdown = CancellationToken::new();
    let state = AppState::from_config(config.clone(), shutdown.clone())?;

    let store = state.store.clone();
    let janitor = state.registry.clone().spawn_janitor(
        JANITOR_INTERVAL,
        config.session_ttl,
        move |session| store.forget_session(session),
        shutdown.clone(),
    );

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!("server started at http://{}", listener.local_addr()?);

    let on_shutdown = shutdown.clone();
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutting down");
            on_shutdown.cancel();
        })
        .await
        .context("Server error")?;

    shutdown.cancel();
    janitor.await.ok();
    Ok(())
}

use anyhow::Context;
use backend_lib::{
    config::{LogFormat, Settings, DEFAULT_CONFIG_FILE},
    router::create_router,
    AppState,
};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Interval of the expired-key sweep for the in-memory store
const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Authentication service with rate limiting and login backoff
#[derive(Parser, Debug)]
#[command(name = "authgate", version, about)]
struct Cli {
    /// Configuration file (TOML); `AUTHGATE_*` variables override it
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.to_ascii_lowercase()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match settings.log_format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_from(&cli.config)
        .with_context(|| format!("cannot load configuration from {}", cli.config.display()))?;
    init_tracing(&settings);

    let addr = settings.bind_addr;
    let state = AppState::new(settings).await?;

    if let Some(memory) = state.memory_store.clone() {
        tokio::spawn(memory.as_ref().clone().purge_periodically(PURGE_INTERVAL));
    }

    let app = create_router(Arc::new(state));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

use anyhow::Context;
use clap::Parser;
use dond_backend::{Api, Backend, Config, Verifier};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration.
    #[arg(short, long)]
    config: PathBuf,

    /// Overrides the configured port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args
    let args = Args::parse();

    // Load config
    let raw = std::fs::read_to_string(&args.config)
        .with_context(|| format!("failed to read {}", args.config.display()))?;
    let config: Config = serde_yaml::from_str(&raw).context("failed to parse config")?;
    let config = config.validate().context("invalid config")?;

    // Create logger
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    // Restore state
    let verifier = Verifier::from(&config.payment);
    let backend = match &config.journal {
        Some(path) => Backend::with_journal(verifier, config.admin_key.clone(), path)
            .await
            .with_context(|| format!("failed to open journal {}", path.display()))?,
        None => Backend::new(verifier, config.admin_key.clone()),
    };
    let backend = Arc::new(backend);
    backend
        .bootstrap(config.settings)
        .await
        .context("failed to bootstrap state")?;
    backend.spawn_period_ticker(config.period_check);

    let api = Api::new(backend, config.rate_limit);
    let app = api.router();

    // Start server
    let port = args.port.unwrap_or(config.port);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("axum server error")?;

    Ok(())
}

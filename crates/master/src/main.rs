//! Master node entry point

use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use master::{api::HttpApi, Master, MasterArgs, MasterConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = MasterArgs::parse();

    let mut config = match &args.config {
        Some(path) => MasterConfig::from_file(path)?,
        None => MasterConfig::default(),
    };
    config.merge_args(&args);

    // Initialize logging
    let level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting master node...");
    info!("  Cluster: {}", config.cluster_name);
    info!("  Node: {} ({})", config.node_id, config.node_version);
    info!("  Data dir: {}", config.data_dir);
    info!("  HTTP API: {}", config.http_addr);

    let master = Arc::new(Master::new(config.clone()).await?);

    let state = master.state();
    info!(
        "Cluster ready: {} nodes, {} indices, state version {}",
        state.nodes().len(),
        state.metadata().index_count(),
        state.version()
    );

    // Start HTTP API
    let http_api = HttpApi::new(master.clone());
    let app = http_api.router();

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!("HTTP API listening on {}", config.http_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

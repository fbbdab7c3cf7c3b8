// src/main.rs
// Entrypoint: parse CLI overrides, load env config, connect peers, serve
// HTTP/SSE. Grounded on mira-chat/src/main.rs's clap + dotenvy +
// tracing-subscriber setup and its own axum::serve call in server.rs.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use orchestrator::api::build_router;
use orchestrator::config::OrchestratorConfig;
use orchestrator::Orchestrator;

#[derive(Parser, Debug)]
#[command(name = "orchestrator")]
#[command(about = "Multi-agent MCP orchestrator with lexical routing and parallel RCA")]
struct Args {
    /// Override ORCHESTRATOR_HOST
    #[arg(long)]
    host: Option<String>,

    /// Override ORCHESTRATOR_PORT
    #[arg(long)]
    port: Option<u16>,

    /// Override ORCHESTRATOR_SESSIONS_DIR
    #[arg(long)]
    sessions_dir: Option<String>,

    /// Directory the static UI is served from
    #[arg(long, default_value = "static")]
    static_dir: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let mut config = OrchestratorConfig::from_env()?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(sessions_dir) = args.sessions_dir {
        config.sessions_dir = sessions_dir;
    }

    tracing::info!(host = %config.host, port = config.port, model = %config.model_name, "starting orchestrator");

    let orchestrator = Arc::new(Orchestrator::connect(config.clone()).await?);
    let app = build_router(orchestrator.clone(), &args.static_dir);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator.cleanup().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
}

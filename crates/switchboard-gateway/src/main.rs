use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use switchboard_agent::AgentRuntime;
use switchboard_core::config::SwitchboardConfig;
use switchboard_engine::{AssistantClient, Dispatcher};
use switchboard_store::{CommandStore, SqliteStore};

mod app;
mod auth;
mod error;
mod http;
mod provider;
mod ws;

#[derive(Parser, Debug)]
#[command(name = "switchboard-gateway", version, about = "Command dispatch gateway")]
struct Cli {
    /// Config file (default: ~/.switchboard/switchboard.toml, or SWITCHBOARD_CONFIG).
    #[arg(long)]
    config: Option<String>,

    /// Override gateway.port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "switchboard_gateway=info,switchboard_engine=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // explicit flag > SWITCHBOARD_CONFIG env > ~/.switchboard/switchboard.toml
    let config_path = cli.config.or_else(|| std::env::var("SWITCHBOARD_CONFIG").ok());
    let mut config = SwitchboardConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        SwitchboardConfig::default()
    });
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    let db_path = config.database.path.clone();
    info!(path = %db_path, "opening SQLite database");
    let store: Arc<dyn CommandStore> = Arc::new(SqliteStore::open(Path::new(&db_path))?);

    let runtime = Arc::new(AgentRuntime::new(
        provider::build_provider(&config),
        config.agent.model.clone(),
        config.agent.classifier_model.clone(),
    ));
    let dispatcher = Dispatcher::from_config(
        Arc::new(AssistantClient::new(Arc::clone(&runtime))),
        &config.services,
    )?;

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(config, store, runtime, dispatcher));
    let router = app::build_router(state);

    info!("Switchboard gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

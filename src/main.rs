use std::env;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use homebot_backend::core::config::{AppConfig, AppPaths, ConfigService};
use homebot_backend::core::logging;
use homebot_backend::server;
use homebot_backend::state::error::InitializationError;
use homebot_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    let config_service = ConfigService::new(paths.clone());

    let config = match config_service.load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Configuration error: {}", err);
            eprintln!(
                "Expected environment:\n{}",
                ConfigService::env_template(&AppConfig::default())
            );
            return Err(InitializationError::Config(err).into());
        }
    };

    logging::init(&paths, &config.logging);
    tracing::info!(
        "Starting {} v{} ({})",
        config.app_name,
        config.version,
        config.environment
    );
    tracing::info!("Config file: {}", config_service.config_path().display());

    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(config.server.port);
    let bind_addr = format!("{}:{}", config.server.host, port);
    let env_template = ConfigService::env_template(&config);

    let state = match AppState::initialize(paths, config).await {
        Ok(state) => state,
        Err(err) => {
            tracing::error!("{}", err);
            if matches!(err, InitializationError::Llm(_)) {
                eprintln!("Expected environment:\n{}", env_template);
            }
            return Err(err.into());
        }
    };

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router(state);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

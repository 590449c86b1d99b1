use dotenvy::dotenv;
use log::{error, info};

use cspserver::core::config::AppConfig;
use cspserver::main_module::{build_state, init_logging, run_axum_server};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    init_logging();

    let config = AppConfig::from_env().map_err(|e| {
        error!("Invalid configuration: {e:#}");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    info!(
        "Starting cspserver {} ({}) on {}",
        env!("CARGO_PKG_VERSION"),
        config.environment,
        config.bind_address()
    );

    let state = build_state(config).await.map_err(|e| {
        error!("Startup failed: {e:#}");
        std::io::Error::other(e.to_string())
    })?;

    run_axum_server(state).await
}

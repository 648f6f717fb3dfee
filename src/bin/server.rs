use log::{error, info, warn};
use std::net::SocketAddr;

use rusty_chat::config::ServerConfig;
use rusty_chat::routes::routes;
use rusty_chat::storage::Storage;
use rusty_chat::AppState;

#[tokio::main]
async fn main() {
    // Initialize env
    let dotenv_result = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match dotenv_result {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(e) => warn!("No .env file loaded: {}", e),
    }

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, rate limit {} req / {}s",
        config.host,
        config.port,
        config.rate_limit.max_requests,
        config.rate_limit.window.as_secs()
    );

    let storage = match Storage::from_url(&config.database_url) {
        Ok(storage) => storage,
        Err(e) => {
            error!("Failed to initialize storage: {}", e);
            std::process::exit(1);
        }
    };

    // Build the server address
    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    let state = AppState::new(config, storage);
    state.start_background_tasks();

    info!("Starting Rusty Chat server on {}", addr);
    warp::serve(routes(state)).run(addr).await;
}

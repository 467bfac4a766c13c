use modelpanel::{logger, serve, AppConfig, AppError, AppState};
use tokio::sync::watch;
use tower_http::cors::{self, CorsLayer};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AppConfig::new("config/settings")?;
    logger::init(&config.log.level);

    let state = AppState::bootstrap(&config.storage).await?;
    let cors = config.http.cors.then(|| {
        CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods(cors::Any)
            .allow_headers(cors::Any)
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, shutting down..."),
            Err(e) => error!("Unable to listen for SIGINT: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    info!("Starting http server at {}", config.http.bind_address);
    serve(state, config.http.bind_address, cors, shutdown_rx).await
}

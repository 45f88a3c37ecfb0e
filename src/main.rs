use std::sync::Arc;

use log::{info, warn};

use emergency_dispatch::app;
use emergency_dispatch::handlers::AppState;
use emergency_dispatch::{DispatchConfig, DispatchRouter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init_timed();

    let config = DispatchConfig::from_env()?;
    info!("Country code: +{}", config.country_code);
    match &config.default_recipient {
        Some(recipient) => info!("Default recipient: {}", recipient),
        None => info!("No default recipient, requests must carry a phone number"),
    }
    if config.api_key.is_none() {
        warn!("EMERGENCY_API_KEY is not set, the API is open to anyone who can reach it");
    }

    let router = DispatchRouter::from_config(&config)?;
    if router.sms_direct_available() {
        info!("Direct SMS enabled");
    } else {
        warn!("Direct SMS unavailable, SMS requests will open the compose screen");
    }

    let port = config.port;
    let state = Arc::new(AppState { router, config });
    let app = app::build(state);

    let addr = format!("0.0.0.0:{}", port);
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

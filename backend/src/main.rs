use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use medidrop_backend::{
    AppState, config::ServiceConfig, create_router, sentinel::SentinelHubClient,
    weather::OpenWeatherClient,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = ServiceConfig::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "medidrop_backend=debug,tower_http=debug,axum::rejection=trace".into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let weather = OpenWeatherClient::new(&config).context("build weather client")?;
    if !weather.has_credentials() {
        tracing::warn!("OPENWEATHER_API_KEY not set, /api/weather will answer 503");
    }
    let sentinel = Arc::new(SentinelHubClient::new(&config).context("build Sentinel Hub client")?);
    if !sentinel.has_credentials() {
        tracing::warn!(
            "SENTINEL_CLIENT_ID/SENTINEL_CLIENT_SECRET not set, /api/satellite and /api/terrain will answer 503"
        );
    }

    let state = AppState {
        weather: Arc::new(weather),
        imagery: sentinel.clone(),
        rasters: sentinel,
    };
    let app = create_router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!("starting backend on http://{addr}");
    tracing::info!("API endpoints:");
    tracing::info!("  GET /api/weather?lat&lon - current conditions");
    tracing::info!("  GET /api/satellite?lat&lon - Sentinel-2 true colour PNG");
    tracing::info!("  GET /api/terrain?base_lat&base_lon&lat&lon[&samples] - GeoJSON terrain profile");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("backend stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

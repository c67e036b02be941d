pub mod config;
pub mod error;
pub mod models;
pub mod raster;
pub mod satellite;
pub mod sentinel;
pub mod terrain;
pub mod weather;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use shared::{ApiError, WeatherReport};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::{ServiceError, api_error};
use crate::models::{PointQuery, TerrainQuery};
use crate::raster::RasterProvider;
use crate::satellite::{SatelliteImagery, fetch_satellite_image};
use crate::terrain::sample_terrain_path;
use crate::weather::WeatherProvider;

pub const GEOJSON_CONTENT_TYPE: &str = "application/geo+json";
pub const TERRAIN_FILENAME: &str = "terrain_path.geojson";

#[derive(Clone)]
pub struct AppState {
    pub weather: Arc<dyn WeatherProvider>,
    pub imagery: Arc<dyn SatelliteImagery>,
    pub rasters: Arc<dyn RasterProvider>,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/weather", get(weather_handler))
        .route("/api/satellite", get(satellite_handler))
        .route("/api/terrain", get(terrain_handler))
        .route("/api/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

async fn weather_handler(
    State(state): State<AppState>,
    query: Result<Query<PointQuery>, QueryRejection>,
) -> ApiResult<Json<WeatherReport>> {
    let Query(query) = query.map_err(bad_query)?;
    let location = query.coordinate().map_err(api_error)?;
    tracing::info!("weather request for ({}, {})", location.lat, location.lon);

    let report = state
        .weather
        .current_weather(location)
        .await
        .map_err(|e| api_error(e.into()))?;
    Ok(Json(report))
}

async fn satellite_handler(
    State(state): State<AppState>,
    query: Result<Query<PointQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query.map_err(bad_query)?;
    let location = query.coordinate().map_err(api_error)?;
    tracing::info!("satellite request for ({}, {})", location.lat, location.lon);

    let png = fetch_satellite_image(state.imagery.as_ref(), location)
        .await
        .map_err(api_error)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

async fn terrain_handler(
    State(state): State<AppState>,
    query: Result<Query<TerrainQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query.map_err(bad_query)?;
    let base = query.base().map_err(api_error)?;
    let delivery = query.delivery().map_err(api_error)?;
    let count = query.sample_count().map_err(api_error)?;
    tracing::info!(
        "terrain request: base ({}, {}) -> delivery ({}, {}), {} samples",
        base.lat,
        base.lon,
        delivery.lat,
        delivery.lon,
        count
    );

    let collection = sample_terrain_path(state.rasters.as_ref(), base, delivery, count)
        .await
        .map_err(api_error)?;
    let body = serde_json::to_vec(&collection)
        .map_err(|e| api_error(ServiceError::from(e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, GEOJSON_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{TERRAIN_FILENAME}\""),
            ),
        ],
        body,
    ))
}

async fn health_handler() -> &'static str {
    "ok"
}

fn bad_query(rejection: QueryRejection) -> (StatusCode, Json<ApiError>) {
    api_error(ServiceError::invalid(rejection.body_text()))
}

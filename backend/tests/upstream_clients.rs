//! Drives the real Sentinel Hub and OpenWeatherMap clients against a local mock upstream.

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Form, Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use clap::Parser;
use medidrop_backend::{
    config::ServiceConfig,
    error::UpstreamError,
    models::{BoundingBox, Coordinate},
    raster::RasterProvider,
    satellite::SatelliteImagery,
    sentinel::SentinelHubClient,
    weather::{OpenWeatherClient, WeatherProvider},
};
use serde_json::{Value, json};
use std::collections::HashMap;
use tiff::encoder::{TiffEncoder, colortype};

#[derive(Default)]
struct MockUpstream {
    token_requests: AtomicUsize,
    process_bodies: std::sync::Mutex<Vec<Value>>,
}

async fn token(
    State(mock): State<Arc<MockUpstream>>,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    mock.token_requests.fetch_add(1, Ordering::SeqCst);
    if form.get("grant_type").map(String::as_str) != Some("client_credentials")
        || form.get("client_secret").map(String::as_str) != Some("secret")
    {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_client"})));
    }
    (
        StatusCode::OK,
        Json(json!({"access_token": "test-token", "expires_in": 3600, "token_type": "Bearer"})),
    )
}

async fn process(
    State(mock): State<Arc<MockUpstream>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    if headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        != Some("Bearer test-token")
    {
        return (StatusCode::UNAUTHORIZED, "missing bearer token").into_response();
    }
    mock.process_bodies.lock().unwrap().push(body.clone());

    let width = body["output"]["width"].as_u64().unwrap() as u32;
    let height = body["output"]["height"].as_u64().unwrap() as u32;
    match body["output"]["responses"][0]["format"]["type"].as_str() {
        Some("image/tiff") => {
            let data: Vec<f32> = (0..width * height).map(|i| 100.0 + i as f32).collect();
            let mut buffer = Cursor::new(Vec::new());
            TiffEncoder::new(&mut buffer)
                .unwrap()
                .write_image::<colortype::Gray32Float>(width, height, &data)
                .unwrap();
            ([(header::CONTENT_TYPE, "image/tiff")], buffer.into_inner()).into_response()
        }
        Some("image/png") => {
            ([(header::CONTENT_TYPE, "image/png")], b"\x89PNG\r\n\x1a\n".to_vec()).into_response()
        }
        _ => (StatusCode::BAD_REQUEST, "unsupported format").into_response(),
    }
}

async fn weather(Query(params): Query<HashMap<String, String>>) -> axum::response::Response {
    if params.get("appid").map(String::as_str) != Some("owm-key") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"cod": 401, "message": "Invalid API key"})),
        )
            .into_response();
    }
    assert_eq!(params.get("units").map(String::as_str), Some("metric"));
    Json(json!({
        "weather": [{"main": "Rain"}],
        "main": {"temp": 14.0, "humidity": 88},
        "visibility": 6000,
        "wind": {"speed": 9.5, "deg": 270},
        "rain": {"1h": 1.2},
        "clouds": {"all": 75},
        "dt": 1747476000
    }))
    .into_response()
}

async fn spawn_upstream() -> (SocketAddr, Arc<MockUpstream>) {
    let mock = Arc::new(MockUpstream::default());
    let app = Router::new()
        .route("/oauth/token", post(token))
        .route("/api/v1/process", post(process))
        .route("/data/2.5/weather", get(weather))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, mock)
}

fn config_for(addr: SocketAddr, secret: &str) -> ServiceConfig {
    let base = format!("http://{addr}");
    ServiceConfig::try_parse_from([
        "medidrop-backend".to_string(),
        "--sentinel-base-url".to_string(),
        base.clone(),
        "--sentinel-token-url".to_string(),
        format!("{base}/oauth/token"),
        "--sentinel-client-id".to_string(),
        "client".to_string(),
        "--sentinel-client-secret".to_string(),
        secret.to_string(),
        "--openweather-base-url".to_string(),
        base,
        "--openweather-api-key".to_string(),
        "owm-key".to_string(),
        "--request-timeout-secs".to_string(),
        "5".to_string(),
    ])
    .unwrap()
}

fn delivery_bbox() -> BoundingBox {
    BoundingBox::around(Coordinate { lat: 52.52, lon: 13.405 }, 0.01)
}

#[tokio::test]
async fn dem_raster_is_fetched_with_bearer_token_and_decoded() {
    let (addr, mock) = spawn_upstream().await;
    let client = SentinelHubClient::new(&config_for(addr, "secret")).unwrap();

    let raster = client
        .fetch_elevation_raster(delivery_bbox(), 30.0)
        .await
        .unwrap();
    // 0.02 deg at 52.52N: ~1351 m wide, 2220 m tall.
    assert_eq!(raster.width(), 45);
    assert_eq!(raster.height(), 74);
    assert_eq!(raster.get(0, 0), Some(100.0));
    assert_eq!(raster.get(1, 0), Some(145.0));
    assert_eq!(raster.bbox(), &delivery_bbox());

    let bodies = mock.process_bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["input"]["data"][0]["type"], "dem");
}

#[tokio::test]
async fn access_token_is_reused_between_requests() {
    let (addr, mock) = spawn_upstream().await;
    let client = SentinelHubClient::new(&config_for(addr, "secret")).unwrap();

    client
        .fetch_elevation_raster(delivery_bbox(), 30.0)
        .await
        .unwrap();
    client
        .fetch_true_color(delivery_bbox(), 64, 64)
        .await
        .unwrap();

    assert_eq!(mock.token_requests.load(Ordering::SeqCst), 1);
    assert_eq!(mock.process_bodies.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn true_color_tile_is_passed_through() {
    let (addr, mock) = spawn_upstream().await;
    let client = SentinelHubClient::new(&config_for(addr, "secret")).unwrap();

    let png = client
        .fetch_true_color(delivery_bbox(), 137, 222)
        .await
        .unwrap();
    assert!(png.starts_with(b"\x89PNG"));

    let bodies = mock.process_bodies.lock().unwrap();
    let data = &bodies[0]["input"]["data"][0];
    assert_eq!(data["type"], "sentinel-2-l1c");
    assert!(data["dataFilter"]["timeRange"]["from"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn rejected_credentials_surface_as_status_error() {
    let (addr, _mock) = spawn_upstream().await;
    let client = SentinelHubClient::new(&config_for(addr, "wrong")).unwrap();

    let err = client
        .fetch_elevation_raster(delivery_bbox(), 30.0)
        .await
        .unwrap_err();
    match err {
        UpstreamError::Status { status, .. } => assert_eq!(status.as_u16(), 401),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn weather_is_fetched_and_reshaped() {
    let (addr, _mock) = spawn_upstream().await;
    let client = OpenWeatherClient::new(&config_for(addr, "secret")).unwrap();

    let report = client
        .current_weather(Coordinate { lat: 52.52, lon: 13.405 })
        .await
        .unwrap();
    assert_eq!(report.timestamp, "2025-05-17T10:00:00Z");
    assert_eq!(report.wind_speed, 9.5);
    assert_eq!(report.precipitation, 1.2);
    assert_eq!(report.visibility, Some(6000.0));
    assert!(!report.storm_warning);
}

#[tokio::test]
async fn unreachable_upstream_is_a_request_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = OpenWeatherClient::new(&config_for(addr, "secret")).unwrap();
    let err = client
        .current_weather(Coordinate { lat: 0.0, lon: 0.0 })
        .await
        .unwrap_err();
    assert!(matches!(err, UpstreamError::Request { .. }));
}

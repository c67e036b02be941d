//! Sentinel Hub Process API client.
//!
//! Serves both the Copernicus DEM rasters used for terrain sampling and the
//! Sentinel-2 true-colour tiles returned by the satellite endpoint.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use reqwest::{header, Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::config::ServiceConfig;
use crate::error::UpstreamError;
use crate::models::BoundingBox;
use crate::raster::{pixel_dimensions, Raster, RasterProvider};
use crate::satellite::SatelliteImagery;

const PROVIDER: &str = "sentinel hub";
const CRS84: &str = "http://www.opengis.net/def/crs/OGC/1.3/CRS84";
/// Refresh tokens this long before the provider says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const DEM_EVALSCRIPT: &str = r#"//VERSION=3
function setup() {
  return { input: ["DEM"], output: { bands: 1, sampleType: "FLOAT32" } };
}
function evaluatePixel(sample) {
  return [sample.DEM];
}
"#;

const TRUE_COLOR_EVALSCRIPT: &str = r#"//VERSION=3
function setup() {
  return { input: ["B04", "B03", "B02"], output: { bands: 3 } };
}
function evaluatePixel(sample) {
  return [2.5 * sample.B04, 2.5 * sample.B03, 2.5 * sample.B02];
}
"#;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct SentinelHubClient {
    http: Client,
    base_url: String,
    token_url: String,
    credentials: Option<(String, String)>,
    lookback_days: u32,
    token: Mutex<Option<CachedToken>>,
}

impl SentinelHubClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self {
            http,
            base_url: config.sentinel_base_url.trim_end_matches('/').to_string(),
            token_url: config.sentinel_token_url.clone(),
            credentials: config.sentinel_credentials(),
            lookback_days: config.satellite_lookback_days,
            token: Mutex::new(None),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    async fn access_token(&self) -> Result<String, UpstreamError> {
        let (client_id, client_secret) = self
            .credentials
            .as_ref()
            .ok_or(UpstreamError::MissingCredentials(PROVIDER))?;

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        tracing::debug!("requesting Sentinel Hub access token");
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(request_error)?;
        let token: TokenResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| UpstreamError::payload(PROVIDER, format!("token response: {e}")))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn process(&self, body: &Value, accept: &str) -> Result<Bytes, UpstreamError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!("{}/api/v1/process", self.base_url))
            .bearer_auth(token)
            .header(header::ACCEPT, accept)
            .json(body)
            .send()
            .await
            .map_err(request_error)?;

        ensure_success(response)
            .await?
            .bytes()
            .await
            .map_err(request_error)
    }
}

/// Process API request for a single-band FLOAT32 Copernicus 30 m DEM GeoTIFF.
pub fn dem_request(bbox: &BoundingBox, width: u32, height: u32) -> Value {
    json!({
        "input": {
            "bounds": {
                "bbox": bbox.as_array(),
                "properties": { "crs": CRS84 }
            },
            "data": [{
                "type": "dem",
                "dataFilter": { "demInstance": "COPERNICUS_30" }
            }]
        },
        "output": {
            "width": width,
            "height": height,
            "responses": [{
                "identifier": "default",
                "format": { "type": "image/tiff" }
            }]
        },
        "evalscript": DEM_EVALSCRIPT
    })
}

/// Process API request for a least-cloudy Sentinel-2 L1C true-colour PNG.
pub fn true_color_request(
    bbox: &BoundingBox,
    width: u32,
    height: u32,
    from: &str,
    to: &str,
) -> Value {
    json!({
        "input": {
            "bounds": {
                "bbox": bbox.as_array(),
                "properties": { "crs": CRS84 }
            },
            "data": [{
                "type": "sentinel-2-l1c",
                "dataFilter": {
                    "timeRange": { "from": from, "to": to },
                    "mosaickingOrder": "leastCC"
                }
            }]
        },
        "output": {
            "width": width,
            "height": height,
            "responses": [{
                "identifier": "default",
                "format": { "type": "image/png" }
            }]
        },
        "evalscript": TRUE_COLOR_EVALSCRIPT
    })
}

#[async_trait]
impl RasterProvider for SentinelHubClient {
    async fn fetch_elevation_raster(
        &self,
        bbox: BoundingBox,
        resolution_m: f64,
    ) -> Result<Raster, UpstreamError> {
        let (width, height) = pixel_dimensions(&bbox, resolution_m);
        let body = dem_request(&bbox, width, height);
        let tiff = self.process(&body, "image/tiff").await?;

        Raster::from_geotiff(bbox, &tiff).map_err(|e| UpstreamError::payload(PROVIDER, e.to_string()))
    }
}

#[async_trait]
impl SatelliteImagery for SentinelHubClient {
    async fn fetch_true_color(
        &self,
        bbox: BoundingBox,
        width: u32,
        height: u32,
    ) -> Result<Bytes, UpstreamError> {
        let now = Utc::now();
        let from = now - chrono::Duration::days(i64::from(self.lookback_days));
        let body = true_color_request(
            &bbox,
            width,
            height,
            &from.to_rfc3339_opts(SecondsFormat::Secs, true),
            &now.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        self.process(&body, "image/png").await
    }
}

fn request_error(source: reqwest::Error) -> UpstreamError {
    UpstreamError::Request {
        provider: PROVIDER,
        source,
    }
}

async fn ensure_success(response: Response) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(UpstreamError::Status {
        provider: PROVIDER,
        status,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use crate::models::Coordinate;

    fn bbox() -> BoundingBox {
        BoundingBox::around(Coordinate { lat: 52.52, lon: 13.405 }, 0.01)
    }

    #[test]
    fn dem_request_targets_copernicus_tiff() {
        let body = dem_request(&bbox(), 46, 74);
        assert_eq!(body["input"]["data"][0]["type"], "dem");
        assert_eq!(
            body["input"]["data"][0]["dataFilter"]["demInstance"],
            "COPERNICUS_30"
        );
        assert_eq!(body["output"]["width"], 46);
        assert_eq!(body["output"]["height"], 74);
        assert_eq!(
            body["output"]["responses"][0]["format"]["type"],
            "image/tiff"
        );
        assert_eq!(body["input"]["bounds"]["properties"]["crs"], CRS84);

        let coords = body["input"]["bounds"]["bbox"].as_array().unwrap();
        assert_eq!(coords.len(), 4);
        assert!((coords[0].as_f64().unwrap() - 13.395).abs() < 1e-9);
        assert!((coords[3].as_f64().unwrap() - 52.53).abs() < 1e-9);
        assert!(body["evalscript"].as_str().unwrap().contains("FLOAT32"));
    }

    #[test]
    fn true_color_request_carries_time_range() {
        let body = true_color_request(
            &bbox(),
            137,
            222,
            "2025-05-01T00:00:00Z",
            "2025-05-17T00:00:00Z",
        );
        let data = &body["input"]["data"][0];
        assert_eq!(data["type"], "sentinel-2-l1c");
        assert_eq!(data["dataFilter"]["timeRange"]["from"], "2025-05-01T00:00:00Z");
        assert_eq!(data["dataFilter"]["timeRange"]["to"], "2025-05-17T00:00:00Z");
        assert_eq!(
            body["output"]["responses"][0]["format"]["type"],
            "image/png"
        );
    }

    #[tokio::test]
    async fn missing_credentials_fail_without_network() {
        let config = ServiceConfig::try_parse_from([
            "medidrop-backend",
            "--sentinel-client-id",
            "",
            "--sentinel-token-url",
            "http://127.0.0.1:9/unreachable",
        ])
        .unwrap();
        let client = SentinelHubClient::new(&config).unwrap();
        assert!(!client.has_credentials());

        let err = client
            .fetch_elevation_raster(bbox(), 30.0)
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::MissingCredentials(_)));
    }
}

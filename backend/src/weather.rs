//! Current conditions from the OpenWeatherMap 2.5 API, reshaped for the dispatch client.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use reqwest::Client;
use serde::Deserialize;
use shared::{Coordinate, WeatherReport};

use crate::config::ServiceConfig;
use crate::error::UpstreamError;

const PROVIDER: &str = "openweathermap";

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current_weather(&self, location: Coordinate) -> Result<WeatherReport, UpstreamError>;
}

#[derive(Debug, Deserialize)]
pub struct OwmResponse {
    pub dt: i64,
    pub main: OwmMain,
    pub wind: OwmWind,
    pub clouds: OwmClouds,
    #[serde(default)]
    pub rain: Option<OwmRain>,
    #[serde(default)]
    pub visibility: Option<f64>,
    #[serde(default)]
    pub weather: Vec<OwmCondition>,
}

#[derive(Debug, Deserialize)]
pub struct OwmMain {
    pub temp: f64,
    pub humidity: f64,
}

#[derive(Debug, Deserialize)]
pub struct OwmWind {
    pub speed: f64,
    #[serde(default)]
    pub deg: f64,
}

#[derive(Debug, Deserialize)]
pub struct OwmClouds {
    pub all: f64,
}

#[derive(Debug, Deserialize)]
pub struct OwmRain {
    #[serde(rename = "1h", default)]
    pub one_hour: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct OwmCondition {
    pub main: String,
}

impl OwmResponse {
    pub fn into_report(self, location: Coordinate) -> Result<WeatherReport, UpstreamError> {
        let timestamp = DateTime::from_timestamp(self.dt, 0)
            .ok_or_else(|| UpstreamError::payload(PROVIDER, format!("invalid timestamp {}", self.dt)))?
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        let storm_warning = self
            .weather
            .first()
            .is_some_and(|c| c.main.eq_ignore_ascii_case("thunderstorm"));

        Ok(WeatherReport {
            location,
            timestamp,
            wind_speed: self.wind.speed,
            wind_direction: self.wind.deg,
            temperature: self.main.temp,
            precipitation: self.rain.and_then(|r| r.one_hour).unwrap_or(0.0),
            visibility: self.visibility,
            cloud_cover: self.clouds.all,
            humidity: self.main.humidity,
            storm_warning,
        })
    }
}

pub struct OpenWeatherClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenWeatherClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self {
            http,
            base_url: config.openweather_base_url.trim_end_matches('/').to_string(),
            api_key: config.openweather_key(),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn current_weather(&self, location: Coordinate) -> Result<WeatherReport, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::MissingCredentials(PROVIDER))?;

        let response = self
            .http
            .get(format!("{}/data/2.5/weather", self.base_url))
            .query(&[
                ("lat", location.lat.to_string()),
                ("lon", location.lon.to_string()),
                ("appid", api_key.to_string()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await
            .map_err(|source| UpstreamError::Request {
                provider: PROVIDER,
                source,
            })?;

        let status = response.status();
        tracing::debug!("OpenWeatherMap responded with {}", status);
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(UpstreamError::Status {
                provider: PROVIDER,
                status,
                body,
            });
        }

        let payload: OwmResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::payload(PROVIDER, e.to_string()))?;
        payload.into_report(location)
    }
}

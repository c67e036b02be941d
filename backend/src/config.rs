use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;

pub const DEFAULT_OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org";
pub const DEFAULT_SENTINEL_BASE_URL: &str = "https://services.sentinel-hub.com";
pub const DEFAULT_SENTINEL_TOKEN_URL: &str =
    "https://services.sentinel-hub.com/auth/realms/main/protocol/openid-connect/token";

/// MediDrop data backend: weather, satellite and terrain proxy for the dispatch client
#[derive(Parser, Debug, Clone)]
#[command(name = "medidrop-backend")]
pub struct ServiceConfig {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// OpenWeatherMap API key
    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    pub openweather_api_key: Option<String>,

    #[arg(long, env = "OPENWEATHER_BASE_URL", default_value = DEFAULT_OPENWEATHER_BASE_URL)]
    pub openweather_base_url: String,

    /// Sentinel Hub OAuth client id
    #[arg(long, env = "SENTINEL_CLIENT_ID")]
    pub sentinel_client_id: Option<String>,

    /// Sentinel Hub OAuth client secret
    #[arg(long, env = "SENTINEL_CLIENT_SECRET", hide_env_values = true)]
    pub sentinel_client_secret: Option<String>,

    #[arg(long, env = "SENTINEL_BASE_URL", default_value = DEFAULT_SENTINEL_BASE_URL)]
    pub sentinel_base_url: String,

    #[arg(long, env = "SENTINEL_TOKEN_URL", default_value = DEFAULT_SENTINEL_TOKEN_URL)]
    pub sentinel_token_url: String,

    /// Timeout applied to every upstream request, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// How many days back to search for cloud-free satellite scenes
    #[arg(long, env = "SATELLITE_LOOKBACK_DAYS", default_value_t = 16)]
    pub satellite_lookback_days: u32,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl ServiceConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Client id and secret, only when both are set and non-empty.
    pub fn sentinel_credentials(&self) -> Option<(String, String)> {
        match (&self.sentinel_client_id, &self.sentinel_client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some((id.clone(), secret.clone()))
            }
            _ => None,
        }
    }

    pub fn openweather_key(&self) -> Option<String> {
        self.openweather_api_key
            .clone()
            .filter(|key| !key.is_empty())
    }
}

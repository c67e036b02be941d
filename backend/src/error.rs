use axum::{http::StatusCode, Json};
use shared::ApiError;
use thiserror::Error;

/// Failure talking to one of the external data providers.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{0} credentials are not configured")]
    MissingCredentials(&'static str),
    #[error("request to {provider} failed: {source}")]
    Request {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} responded with {status}: {body}")]
    Status {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{provider} returned an unusable payload: {message}")]
    Payload {
        provider: &'static str,
        message: String,
    },
}

impl UpstreamError {
    pub fn payload(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Payload {
            provider,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("upstream provider unavailable: {0}")]
    UpstreamUnavailable(#[from] UpstreamError),
    #[error("failed to encode response: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::UpstreamUnavailable(UpstreamError::MissingCredentials(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServiceError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert a ServiceError into the JSON error response returned by every handler
pub fn api_error(err: ServiceError) -> (StatusCode, Json<ApiError>) {
    let status = err.status_code();
    if status.is_server_error() {
        tracing::warn!("request failed: {}", err);
    } else {
        tracing::debug!("rejected request: {}", err);
    }

    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_maps_to_bad_request() {
        let (status, Json(body)) = api_error(ServiceError::invalid("lat is not finite"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.message.contains("lat is not finite"));
    }

    #[test]
    fn missing_credentials_map_to_service_unavailable() {
        let err: ServiceError = UpstreamError::MissingCredentials("sentinel hub").into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn upstream_failures_map_to_bad_gateway() {
        let err: ServiceError = UpstreamError::Status {
            provider: "openweathermap",
            status: reqwest::StatusCode::UNAUTHORIZED,
            body: "invalid api key".into(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

        let err: ServiceError = UpstreamError::payload("sentinel hub", "not a tiff").into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.to_string().contains("not a tiff"));
    }
}

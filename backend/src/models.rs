use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

pub use shared::Coordinate;

/// Half-width in degrees of the box fetched around a point of interest.
pub const BBOX_MARGIN_DEG: f64 = 0.01;

pub const DEFAULT_SAMPLE_COUNT: usize = 20;
pub const MAX_SAMPLE_COUNT: usize = 1000;

/// Axis-aligned WGS84 box, `min < max` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    ) -> Result<Self, ServiceError> {
        let all_finite = [min_lon, min_lat, max_lon, max_lat]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ServiceError::invalid("bounding box must be finite"));
        }
        if min_lon >= max_lon || min_lat >= max_lat {
            return Err(ServiceError::invalid(format!(
                "bounding box [{min_lon}, {min_lat}, {max_lon}, {max_lat}] is empty or inverted"
            )));
        }
        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    /// Box of `center ± margin` degrees on both axes.
    pub fn around(center: Coordinate, margin_deg: f64) -> Self {
        Self {
            min_lon: center.lon - margin_deg,
            min_lat: center.lat - margin_deg,
            max_lon: center.lon + margin_deg,
            max_lat: center.lat + margin_deg,
        }
    }

    pub fn width_deg(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height_deg(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn center(&self) -> Coordinate {
        Coordinate {
            lat: (self.min_lat + self.max_lat) / 2.0,
            lon: (self.min_lon + self.max_lon) / 2.0,
        }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }
}

/// `?lat=..&lon=..` as used by the weather and satellite endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct PointQuery {
    pub lat: f64,
    pub lon: f64,
}

impl PointQuery {
    pub fn coordinate(&self) -> Result<Coordinate, ServiceError> {
        validate_coordinate("", self.lat, self.lon)
    }
}

/// `?base_lat=..&base_lon=..&lat=..&lon=..[&samples=..]`; `lat`/`lon` is the delivery point.
#[derive(Debug, Clone, Deserialize)]
pub struct TerrainQuery {
    pub base_lat: f64,
    pub base_lon: f64,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub samples: Option<usize>,
}

impl TerrainQuery {
    pub fn base(&self) -> Result<Coordinate, ServiceError> {
        validate_coordinate("base_", self.base_lat, self.base_lon)
    }

    pub fn delivery(&self) -> Result<Coordinate, ServiceError> {
        validate_coordinate("", self.lat, self.lon)
    }

    pub fn sample_count(&self) -> Result<usize, ServiceError> {
        match self.samples {
            None => Ok(DEFAULT_SAMPLE_COUNT),
            Some(0) => Err(ServiceError::invalid("samples must be at least 1")),
            Some(n) if n > MAX_SAMPLE_COUNT => Err(ServiceError::invalid(format!(
                "samples must be at most {MAX_SAMPLE_COUNT}"
            ))),
            Some(n) => Ok(n),
        }
    }
}

fn validate_coordinate(prefix: &str, lat: f64, lon: f64) -> Result<Coordinate, ServiceError> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err(ServiceError::invalid(format!(
            "{prefix}lat and {prefix}lon must be finite numbers"
        )));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ServiceError::invalid(format!(
            "{prefix}lat {lat} is outside [-90, 90]"
        )));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(ServiceError::invalid(format!(
            "{prefix}lon {lon} is outside [-180, 180]"
        )));
    }
    Ok(Coordinate { lat, lon })
}

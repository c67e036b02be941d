use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn interpolate(self, other: Self, t: f64) -> Self {
        Self {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Current conditions at a point, reshaped from the weather provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: Coordinate,
    /// ISO-8601 UTC, e.g. `2025-05-17T10:00:00Z`.
    pub timestamp: String,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub temperature: f64,
    /// Rain over the last hour in millimetres.
    pub precipitation: f64,
    pub visibility: Option<f64>,
    pub cloud_cover: f64,
    pub humidity: f64,
    pub storm_warning: bool,
}

/// GeoJSON `FeatureCollection` of altitude-tagged points along a flight path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainFeatureCollection {
    #[serde(rename = "type")]
    pub type_: String,
    pub features: Vec<TerrainFeature>,
}

impl TerrainFeatureCollection {
    pub fn new(features: Vec<TerrainFeature>) -> Self {
        Self {
            type_: "FeatureCollection".to_string(),
            features,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainFeature {
    #[serde(rename = "type")]
    pub type_: String,
    pub geometry: PointGeometry,
    pub properties: AltitudeProperties,
}

impl TerrainFeature {
    pub fn point(coord: Coordinate, altitude_m: Option<f64>) -> Self {
        Self {
            type_: "Feature".to_string(),
            geometry: PointGeometry::Point {
                coordinates: [coord.lon, coord.lat],
            },
            properties: AltitudeProperties { altitude_m },
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        let PointGeometry::Point { coordinates } = &self.geometry;
        Coordinate {
            lat: coordinates[1],
            lon: coordinates[0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PointGeometry {
    /// Coordinates as `[longitude, latitude]`.
    Point { coordinates: [f64; 2] },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltitudeProperties {
    /// Always serialized; `null` when the sample fell outside the raster.
    pub altitude_m: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

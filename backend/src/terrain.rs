//! Terrain profile along the straight line from the drone base to a delivery point.
//!
//! The elevation raster only covers a small box around the delivery point, so
//! samples near the base usually fall outside it and carry a null altitude.

use shared::{Coordinate, TerrainFeature, TerrainFeatureCollection};

use crate::error::ServiceError;
use crate::models::{BoundingBox, BBOX_MARGIN_DEG};
use crate::raster::{Raster, RasterProvider};

/// Ground resolution requested from the DEM provider, in metres per pixel.
pub const DEM_RESOLUTION_M: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSample {
    pub coordinate: Coordinate,
    pub altitude_m: Option<f64>,
}

/// Fetch the DEM around `delivery` and sample `count` points from `base` to it.
pub async fn sample_terrain_path(
    provider: &dyn RasterProvider,
    base: Coordinate,
    delivery: Coordinate,
    count: usize,
) -> Result<TerrainFeatureCollection, ServiceError> {
    validate(base, delivery, count)?;

    let bbox = BoundingBox::around(delivery, BBOX_MARGIN_DEG);
    tracing::debug!("requesting DEM raster for {:?}", bbox);
    let raster = provider
        .fetch_elevation_raster(bbox, DEM_RESOLUTION_M)
        .await?;
    tracing::debug!(
        "DEM raster {}x{} received for delivery ({}, {})",
        raster.width(),
        raster.height(),
        delivery.lat,
        delivery.lon
    );

    let samples = sample_raster(&raster, base, delivery, count)?;
    let covered = samples.iter().filter(|s| s.altitude_m.is_some()).count();
    tracing::info!(
        "terrain path sampled: {} points, {} inside DEM coverage",
        samples.len(),
        covered
    );

    Ok(to_feature_collection(&samples))
}

/// Sample `count` evenly spaced points of the segment against an already fetched raster.
pub fn sample_raster(
    raster: &Raster,
    base: Coordinate,
    delivery: Coordinate,
    count: usize,
) -> Result<Vec<PathSample>, ServiceError> {
    validate(base, delivery, count)?;

    let samples = interpolate_path(base, delivery, count)
        .into_iter()
        .map(|coordinate| {
            let altitude_m = pixel_index(
                coordinate,
                raster.bbox(),
                raster.width(),
                raster.height(),
            )
            .and_then(|(row, col)| raster.get(row, col));
            PathSample {
                coordinate,
                altitude_m,
            }
        })
        .collect();

    Ok(samples)
}

/// `count` points from `start` to `end` inclusive. A single point is `start`.
pub fn interpolate_path(start: Coordinate, end: Coordinate, count: usize) -> Vec<Coordinate> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let steps = (count - 1) as f64;
            (0..count)
                .map(|i| {
                    if i == count - 1 {
                        end
                    } else {
                        start.interpolate(end, i as f64 / steps)
                    }
                })
                .collect()
        }
    }
}

/// Map a coordinate to the `(row, col)` of the raster cell containing it, or
/// `None` when it falls outside the `width` x `height` grid.
pub fn pixel_index(
    coord: Coordinate,
    bbox: &BoundingBox,
    width: usize,
    height: usize,
) -> Option<(usize, usize)> {
    let x_rel = (coord.lon - bbox.min_lon) / bbox.width_deg();
    let y_rel = (bbox.max_lat - coord.lat) / bbox.height_deg();

    let col = (x_rel * width as f64).floor();
    let row = (y_rel * height as f64).floor();

    // Also rejects NaN.
    if !(row >= 0.0 && row < height as f64 && col >= 0.0 && col < width as f64) {
        return None;
    }
    Some((row as usize, col as usize))
}

pub fn to_feature_collection(samples: &[PathSample]) -> TerrainFeatureCollection {
    TerrainFeatureCollection::new(
        samples
            .iter()
            .map(|s| TerrainFeature::point(s.coordinate, s.altitude_m))
            .collect(),
    )
}

fn validate(base: Coordinate, delivery: Coordinate, count: usize) -> Result<(), ServiceError> {
    if !base.is_finite() || !delivery.is_finite() {
        return Err(ServiceError::invalid("coordinates must be finite"));
    }
    if count < 1 {
        return Err(ServiceError::invalid("sample count must be at least 1"));
    }
    Ok(())
}

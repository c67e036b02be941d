use async_trait::async_trait;
use bytes::Bytes;
use shared::Coordinate;

use crate::error::{ServiceError, UpstreamError};
use crate::models::{BoundingBox, BBOX_MARGIN_DEG};
use crate::raster::pixel_dimensions;

/// Ground resolution of the true-colour tile, in metres per pixel.
pub const SATELLITE_RESOLUTION_M: f64 = 10.0;

/// Source of rendered true-colour imagery.
#[async_trait]
pub trait SatelliteImagery: Send + Sync {
    /// PNG covering `bbox` at `width` x `height` pixels.
    async fn fetch_true_color(
        &self,
        bbox: BoundingBox,
        width: u32,
        height: u32,
    ) -> Result<Bytes, UpstreamError>;
}

/// PNG tile of the area around `point`.
pub async fn fetch_satellite_image(
    imagery: &dyn SatelliteImagery,
    point: Coordinate,
) -> Result<Bytes, ServiceError> {
    if !point.is_finite() {
        return Err(ServiceError::invalid("coordinates must be finite"));
    }
    let bbox = BoundingBox::around(point, BBOX_MARGIN_DEG);
    let (width, height) = pixel_dimensions(&bbox, SATELLITE_RESOLUTION_M);
    tracing::debug!("requesting {}x{} satellite tile for {:?}", width, height, bbox);

    let png = imagery.fetch_true_color(bbox, width, height).await?;
    tracing::info!("satellite tile received: {} bytes", png.len());
    Ok(png)
}

use std::io::Cursor;

use async_trait::async_trait;
use thiserror::Error;
use tiff::decoder::{Decoder, DecodingResult};

use crate::error::UpstreamError;
use crate::models::BoundingBox;

const METERS_PER_DEGREE_LAT: f64 = 111_000.0;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("raster grid has {expected} cells but {actual} values were provided")]
    UnexpectedCellCount { expected: usize, actual: usize },
    #[error("raster dimensions must be non-zero (got {width}x{height})")]
    EmptyGrid { width: usize, height: usize },
    #[error("failed to decode GeoTIFF: {0}")]
    Tiff(#[from] tiff::TiffError),
    #[error("GeoTIFF has {0} samples per pixel, expected a single band")]
    MultiBand(usize),
}

/// Elevation grid covering a bounding box. Row 0 is the northern edge.
#[derive(Debug, Clone)]
pub struct Raster {
    bbox: BoundingBox,
    width: usize,
    height: usize,
    values: Vec<f64>,
}

impl Raster {
    pub fn new(
        bbox: BoundingBox,
        width: usize,
        height: usize,
        values: Vec<f64>,
    ) -> Result<Self, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::EmptyGrid { width, height });
        }
        let expected = width * height;
        if values.len() != expected {
            return Err(RasterError::UnexpectedCellCount {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            bbox,
            width,
            height,
            values,
        })
    }

    /// Build a raster by evaluating `f(row, col)` for every cell.
    pub fn from_fn(
        bbox: BoundingBox,
        width: usize,
        height: usize,
        f: impl Fn(usize, usize) -> f64,
    ) -> Result<Self, RasterError> {
        let mut values = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                values.push(f(row, col));
            }
        }
        Self::new(bbox, width, height, values)
    }

    /// Decode a single-band GeoTIFF. Georeferencing tags are ignored: the
    /// image is assumed to cover exactly `bbox`, which is what the provider
    /// was asked to render.
    pub fn from_geotiff(bbox: BoundingBox, bytes: &[u8]) -> Result<Self, RasterError> {
        let mut decoder = Decoder::new(Cursor::new(bytes))?;
        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);

        let values: Vec<f64> = match decoder.read_image()? {
            DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
            DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
            DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::F64(v) => v,
        };

        let pixels = width * height;
        if pixels > 0 && values.len() != pixels && values.len() % pixels == 0 {
            return Err(RasterError::MultiBand(values.len() / pixels));
        }

        Self::new(bbox, width, height, values)
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Cell value, or `None` outside the grid or on a no-data (NaN) cell.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.height || col >= self.width {
            return None;
        }
        let value = self.values.get(row * self.width + col).copied()?;
        if value.is_nan() {
            None
        } else {
            Some(value)
        }
    }
}

/// Pixel dimensions `(width, height)` of `bbox` rendered at `resolution_m`
/// metres per pixel, using an equirectangular approximation at the box centre.
pub fn pixel_dimensions(bbox: &BoundingBox, resolution_m: f64) -> (u32, u32) {
    let center_lat = bbox.center().lat;
    let width_m = bbox.width_deg() * METERS_PER_DEGREE_LAT * center_lat.to_radians().cos();
    let height_m = bbox.height_deg() * METERS_PER_DEGREE_LAT;

    let width = (width_m.abs() / resolution_m).round().max(1.0);
    let height = (height_m / resolution_m).round().max(1.0);
    (width as u32, height as u32)
}

/// Source of elevation rasters. Implementations must be safe to call from
/// concurrent requests.
#[async_trait]
pub trait RasterProvider: Send + Sync {
    async fn fetch_elevation_raster(
        &self,
        bbox: BoundingBox,
        resolution_m: f64,
    ) -> Result<Raster, UpstreamError>;
}

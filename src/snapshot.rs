use std::io::Cursor;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// An immutable encoded raster: a PNG data URL covering the whole surface.
///
/// Cloning is cheap; the payload is shared and never mutated after creation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Snapshot {
    data_url: Arc<str>,
}

impl Snapshot {
    /// Encode a raster losslessly as PNG.
    pub fn from_raster(raster: &RgbaImage) -> Result<Self, SurfaceError> {
        let png = encode_png(raster)?;
        let mut data_url = String::with_capacity(PNG_DATA_URL_PREFIX.len() + png.len() * 4 / 3 + 4);
        data_url.push_str(PNG_DATA_URL_PREFIX);
        STANDARD.encode_string(&png, &mut data_url);
        Ok(Self { data_url: data_url.into() })
    }

    pub fn as_data_url(&self) -> &str {
        &self.data_url
    }

    /// The raw PNG bytes behind the data URL.
    pub fn png_bytes(&self) -> Result<Vec<u8>, SurfaceError> {
        let payload = self
            .data_url
            .strip_prefix(PNG_DATA_URL_PREFIX)
            .ok_or(SurfaceError::MalformedDataUrl)?;
        Ok(STANDARD.decode(payload)?)
    }

    /// Decode back into an RGBA raster.
    pub fn decode(&self) -> Result<RgbaImage, SurfaceError> {
        let png = self.png_bytes()?;
        let image = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .map_err(SurfaceError::Decode)?;
        Ok(image.to_rgba8())
    }
}

impl From<String> for Snapshot {
    fn from(data_url: String) -> Self {
        Self { data_url: data_url.into() }
    }
}

impl From<Snapshot> for String {
    fn from(snapshot: Snapshot) -> Self {
        snapshot.data_url.to_string()
    }
}

// Data URLs run to hundreds of kilobytes; keep Debug output readable.
impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("data_url_len", &self.data_url.len())
            .finish()
    }
}

pub(crate) fn encode_png(raster: &RgbaImage) -> Result<Vec<u8>, SurfaceError> {
    let mut png = Vec::new();
    raster
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(SurfaceError::Encode)?;
    Ok(png)
}

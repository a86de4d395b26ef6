use thiserror::Error;

/// Errors raised while encoding or decoding the raster surface
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Failed to encode surface: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Failed to decode snapshot: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Snapshot is not a PNG data URL")]
    MalformedDataUrl,

    #[error("Snapshot payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Errors reported by a key/value backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage quota exceeded writing {key} ({bytes} bytes)")]
    QuotaExceeded { key: String, bytes: usize },

    #[error("Storage is unavailable")]
    Unavailable,

    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that stop a save-to-server attempt
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Please enter a filename before saving")]
    EmptyFilename,

    #[error("Authentication token is required to save images")]
    MissingToken,

    #[error("An upload is already in progress")]
    Busy,

    #[error("Failed to encode image: {0}")]
    Encode(#[from] SurfaceError),

    #[error("Upload failed: PUT {put}; POST {post}")]
    Failed { put: String, post: String },
}

/// Errors loading the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

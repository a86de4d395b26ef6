#![warn(clippy::all, rust_2018_idioms)]

pub mod app;
pub mod brush;
pub mod color;
pub mod config;
pub mod context;
pub mod error;
pub mod history;
pub mod panels;
pub mod persistence;
pub mod renderer;
pub mod snapshot;
pub mod stroke;
pub mod surface;
pub mod upload;
pub mod util;

pub use app::CanvasDrawApp;
pub use brush::{BrushMode, BrushState};
pub use config::CanvasConfig;
pub use context::{DecodePurpose, DrawingContext};
pub use error::{ConfigError, StorageError, SurfaceError, UploadError};
pub use history::History;
pub use persistence::{FileStore, KeyValueStore, MemoryStore, PersistenceStore, Preferences};
pub use renderer::StrokeRenderer;
pub use snapshot::Snapshot;
pub use stroke::Stroke;
pub use surface::Surface;
#[cfg(not(target_arch = "wasm32"))]
pub use upload::HttpUploader;
pub use upload::{UploadJob, UploadReceipt, UploadSink, UploadSlot};

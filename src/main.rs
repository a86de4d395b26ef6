#![warn(clippy::all, rust_2018_idioms)]

use std::sync::Arc;

use canvas_draw::{CanvasConfig, CanvasDrawApp, FileStore, HttpUploader, UploadSink};

fn main() -> eframe::Result {
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).

    let config_path = CanvasConfig::path_from_env(std::env::args());
    let config = CanvasConfig::load_or_default(config_path.as_deref());

    let uploader: Option<Arc<dyn UploadSink>> =
        match HttpUploader::new(&config.upload_url, &config.auth_cookie) {
            Ok(uploader) => Some(Arc::new(uploader)),
            Err(err) => {
                log::error!("Uploads disabled, failed to build HTTP client: {err}");
                None
            }
        };

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.initial_width, config.initial_height + 80.0])
            .with_min_inner_size([320.0, 240.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Canvas Draw",
        native_options,
        Box::new(move |cc| {
            let backend = Box::new(FileStore::new(config.storage_dir.clone()));
            Ok(Box::new(CanvasDrawApp::new(cc, &config, backend, uploader)))
        }),
    )
}

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::CanvasConfig;
use crate::context::DrawingContext;
use crate::error::UploadError;
use crate::panels::{CanvasTexture, canvas_panel, status_bar, token_prompt, toolbar};
use crate::persistence::KeyValueStore;
use crate::upload::{UploadSink, download_filename, sanitize_filename};
use crate::util::time::timestamp_millis;

pub struct CanvasDrawApp {
    context: DrawingContext,
    uploader: Option<Arc<dyn UploadSink>>,
    download_dir: PathBuf,
    canvas_texture: CanvasTexture,
    filename: String,
    // Some while the token window is open
    token_input: Option<String>,
    status: Option<String>,
}

impl CanvasDrawApp {
    /// Called once before the first frame.
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: &CanvasConfig,
        backend: Box<dyn KeyValueStore>,
        uploader: Option<Arc<dyn UploadSink>>,
    ) -> Self {
        let mut context = DrawingContext::new(config, backend, cc.egui_ctx.pixels_per_point());
        context.restore();

        Self {
            context,
            uploader,
            download_dir: config.download_dir.clone(),
            canvas_texture: CanvasTexture::default(),
            filename: String::new(),
            token_input: None,
            status: None,
        }
    }

    pub fn context(&self) -> &DrawingContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut DrawingContext {
        &mut self.context
    }

    pub(crate) fn canvas_parts(&mut self) -> (&mut DrawingContext, &mut CanvasTexture) {
        (&mut self.context, &mut self.canvas_texture)
    }

    pub fn filename_mut(&mut self) -> &mut String {
        &mut self.filename
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    pub fn is_uploading(&self) -> bool {
        self.context.upload_slot().is_busy()
    }

    pub(crate) fn token_input_mut(&mut self) -> Option<&mut String> {
        self.token_input.as_mut()
    }

    pub(crate) fn cancel_token_prompt(&mut self) {
        self.token_input = None;
        self.set_status(UploadError::MissingToken.to_string());
    }

    pub fn undo(&mut self) {
        self.context.undo();
    }

    /// Save button: uses the stored token or opens the prompt for one.
    pub fn save(&mut self) {
        if let Err(err) = sanitize_filename(&self.filename) {
            self.set_status(err.to_string());
            return;
        }
        match self.context.resolve_token(|| None) {
            Ok(token) => self.start_upload(&token),
            Err(UploadError::MissingToken) => self.token_input = Some(String::new()),
            Err(err) => self.set_status(err.to_string()),
        }
    }

    pub(crate) fn submit_token(&mut self) {
        let Some(entered) = self.token_input.take() else {
            return;
        };
        match self.context.resolve_token(|| Some(entered)) {
            Ok(token) => self.start_upload(&token),
            Err(err) => self.set_status(err.to_string()),
        }
    }

    fn start_upload(&mut self, token: &str) {
        let Some(sink) = self.uploader.clone() else {
            self.set_status("No upload server configured");
            return;
        };
        let job = match self.context.prepare_upload(&self.filename, token) {
            Ok(job) => job,
            Err(err) => {
                self.set_status(err.to_string());
                return;
            }
        };
        self.set_status(format!("Uploading {}...", job.filename));
        let slot = self.context.upload_slot();
        std::thread::spawn(move || {
            slot.finish(job.run(sink.as_ref()));
        });
    }

    fn poll_upload(&mut self, ctx: &egui::Context) {
        let slot = self.context.upload_slot();
        if slot.is_busy() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
        match slot.take_finished() {
            Some(Ok(receipt)) => self.set_status(receipt.message()),
            Some(Err(err)) => self.set_status(err.to_string()),
            None => {}
        }
    }

    /// Writes the PNG into the download directory under a timestamped name.
    pub fn download(&mut self) {
        let name = download_filename(&self.filename, timestamp_millis());
        let path = self.download_dir.join(&name);
        let written = self
            .context
            .export_png()
            .map_err(|err| err.to_string())
            .and_then(|png| std::fs::write(&path, png).map_err(|err| err.to_string()));
        match written {
            Ok(()) => {
                log::info!("Downloaded drawing to {}", path.display());
                self.set_status(format!("Downloaded {name}"));
            }
            Err(err) => {
                log::error!("Failed to write {}: {err}", path.display());
                self.set_status(format!("Download failed: {err}"));
            }
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::COMMAND, egui::Key::Z)) {
            self.undo();
        }
    }
}

impl eframe::App for CanvasDrawApp {
    /// Called each time the UI needs repainting, which may be many times per second.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_shortcuts(ctx);
        self.poll_upload(ctx);

        toolbar(self, ctx);
        status_bar(self, ctx);
        canvas_panel(self, ctx);
        token_prompt(self, ctx);
    }
}

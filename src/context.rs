//! The explicit context every event handler works through.
//!
//! `DrawingContext` owns the stroke renderer (and through it the surface),
//! the undo history, the persistence store and the brush. It is built once
//! and handed to the UI; nothing here is global.
//!
//! Snapshot decodes (startup restore, resize, undo) are asynchronous: they are
//! spawned on a local executor and only land when [`DrawingContext::poll_decodes`]
//! runs. Starting a decode supersedes any decode still in flight, so results
//! that complete late are dropped instead of overwriting newer content.

use egui::{Color32, Pos2};
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use image::RgbaImage;

use crate::brush::{BrushMode, BrushState};
use crate::config::CanvasConfig;
use crate::error::{SurfaceError, UploadError};
use crate::history::History;
use crate::persistence::{KeyValueStore, PersistenceStore, Preferences, PreferencesPatch};
use crate::renderer::StrokeRenderer;
use crate::snapshot::{Snapshot, encode_png};
use crate::surface::{DecodeTicket, Surface};
use crate::upload::{UploadJob, UploadReceipt, UploadSink, UploadSlot, resolve_token, sanitize_filename};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePurpose {
    /// Stored drawing loaded at startup
    Restore,
    /// Previous content redrawn after a resize
    Resize,
    /// Snapshot popped from history
    Undo,
}

struct DecodeCompletion {
    ticket: DecodeTicket,
    purpose: DecodePurpose,
    result: Result<RgbaImage, SurfaceError>,
}

#[derive(Debug, Clone)]
struct PendingDecode {
    snapshot: Snapshot,
    purpose: DecodePurpose,
}

pub struct DrawingContext {
    renderer: StrokeRenderer,
    history: History,
    persistence: PersistenceStore,
    brush: BrushState,
    quick_colors: Vec<Color32>,
    auth_cookie: String,
    decoder: LocalPool,
    spawner: LocalSpawner,
    completions_tx: UnboundedSender<DecodeCompletion>,
    completions_rx: UnboundedReceiver<DecodeCompletion>,
    pending: Option<PendingDecode>,
    uploads: UploadSlot,
}

impl std::fmt::Debug for DrawingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawingContext")
            .field("renderer", &self.renderer)
            .field("history_len", &self.history.len())
            .field("persistence", &self.persistence)
            .field("brush", &self.brush)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl DrawingContext {
    pub fn new(config: &CanvasConfig, backend: Box<dyn KeyValueStore>, dpr: f32) -> Self {
        let defaults = config.default_preferences();
        let persistence = PersistenceStore::new(backend, config.storage_prefix.clone())
            .with_default_preferences(defaults.clone());
        let surface = Surface::new(config.initial_width, config.initial_height, dpr);
        let decoder = LocalPool::new();
        let spawner = decoder.spawner();
        let (completions_tx, completions_rx) = unbounded();

        let mut brush = BrushState::default();
        if let Some(first) = defaults.quick_colors.first() {
            brush.set_color(*first);
        }

        Self {
            renderer: StrokeRenderer::new(surface),
            history: History::new(config.history_limit()),
            persistence,
            brush,
            quick_colors: defaults.quick_colors,
            auth_cookie: config.auth_cookie.clone(),
            decoder,
            spawner,
            completions_tx,
            completions_rx,
            pending: None,
            uploads: UploadSlot::new(),
        }
    }

    /// Loads preferences, the undo stack and the last drawing from storage.
    /// The drawing appears once its decode has been polled.
    pub fn restore(&mut self) {
        let prefs = self.persistence.load_preferences();
        self.apply_preferences(&prefs);
        if !self.persistence.has_preferences() {
            log::info!("No stored preferences, saving defaults");
            self.persistence.save_preferences(&prefs);
        }

        self.history.restore(self.persistence.load_history());
        log::info!("Restored {} undo entries", self.history.len());

        if let Some(current) = self.persistence.load_current() {
            self.schedule_decode(current, DecodePurpose::Restore);
        }
    }

    fn apply_preferences(&mut self, prefs: &Preferences) {
        self.brush.set_pencil_size(prefs.pencil_size);
        self.brush.set_eraser_size(prefs.eraser_size);
        self.quick_colors = prefs.quick_colors.clone();
    }

    pub fn surface(&self) -> &Surface {
        self.renderer.surface()
    }

    pub fn brush(&self) -> &BrushState {
        &self.brush
    }

    pub fn quick_colors(&self) -> &[Color32] {
        &self.quick_colors
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn persistence(&self) -> &PersistenceStore {
        &self.persistence
    }

    pub fn is_drawing(&self) -> bool {
        self.renderer.is_drawing()
    }

    pub fn has_pending_decode(&self) -> bool {
        self.pending.is_some()
    }

    // --- pointer input -------------------------------------------------------

    pub fn pointer_down(&mut self, pos: Pos2) {
        // the pre-stroke snapshot must match what is on screen
        self.poll_decodes();
        if self.renderer.pointer_down(pos, &self.brush, &mut self.history) {
            self.persistence.save_history(&self.history.entries());
        }
    }

    pub fn pointer_move(&mut self, pos: Pos2) {
        self.renderer.pointer_move(pos);
    }

    pub fn pointer_up(&mut self) {
        self.renderer.pointer_up(&mut self.persistence);
    }

    pub fn pointer_leave(&mut self) {
        self.renderer.pointer_leave(&mut self.persistence);
    }

    // --- history ---------------------------------------------------------------

    /// Pops the newest snapshot and starts restoring it. False when there is
    /// nothing to undo or a stroke is in progress.
    pub fn undo(&mut self) -> bool {
        if self.renderer.is_drawing() {
            log::debug!("Undo ignored while a stroke is in progress");
            return false;
        }
        let Some(snapshot) = self.history.undo() else {
            log::debug!("Nothing to undo");
            return false;
        };
        self.persistence.save_history(&self.history.entries());
        self.schedule_decode(snapshot, DecodePurpose::Undo);
        true
    }

    /// Fills the surface white; undoable.
    pub fn clear(&mut self) {
        self.poll_decodes();
        if self.history.snapshot_before_change(self.renderer.surface()) {
            self.persistence.save_history(&self.history.entries());
        }
        self.renderer.surface_mut().clear();
        self.save_current();
    }

    fn save_current(&mut self) {
        match self.renderer.surface().encode() {
            Ok(snapshot) => self.persistence.save_current(&snapshot),
            Err(err) => log::error!("Failed to encode surface: {err}"),
        }
    }

    // --- surface size and decodes ----------------------------------------------

    pub fn resize(&mut self, css_width: f32, css_height: f32, dpr: f32) {
        let Some(previous) = self.renderer.surface_mut().resize(css_width, css_height, dpr) else {
            return;
        };
        // content that is still decoding is newer than what was on screen
        let (snapshot, purpose) = match self.pending.take() {
            Some(pending) => (pending.snapshot, pending.purpose),
            None => (previous, DecodePurpose::Resize),
        };
        self.schedule_decode(snapshot, purpose);
    }

    fn schedule_decode(&mut self, snapshot: Snapshot, purpose: DecodePurpose) {
        let ticket = self.renderer.surface_mut().begin_decode();
        self.pending = Some(PendingDecode {
            snapshot: snapshot.clone(),
            purpose,
        });
        let tx = self.completions_tx.clone();
        let spawned = self.spawner.spawn_local(async move {
            let result = snapshot.decode();
            // the receiver lives as long as the context
            let _ = tx.unbounded_send(DecodeCompletion { ticket, purpose, result });
        });
        if let Err(err) = spawned {
            log::error!("Failed to schedule {purpose:?} decode: {err}");
            self.pending = None;
        }
    }

    /// Runs pending decodes and applies the newest result. Returns true if
    /// the surface changed.
    pub fn poll_decodes(&mut self) -> bool {
        self.decoder.run_until_stalled();
        let mut changed = false;
        while let Ok(done) = self.completions_rx.try_recv() {
            if !self.renderer.surface().is_current(done.ticket) {
                log::debug!("Discarding superseded {:?} decode", done.purpose);
                continue;
            }
            self.pending = None;
            match done.result {
                Ok(decoded) => {
                    self.renderer.surface_mut().apply_decoded(done.ticket, decoded);
                    changed = true;
                    if done.purpose == DecodePurpose::Undo {
                        self.save_current();
                    }
                }
                Err(err) => {
                    log::warn!("{:?} decode failed, keeping current content: {err}", done.purpose);
                }
            }
        }
        changed
    }

    // --- brush -----------------------------------------------------------------

    pub fn set_color(&mut self, color: Color32) {
        self.brush.set_color(color);
    }

    pub fn set_mode(&mut self, mode: BrushMode) {
        self.brush.set_mode(mode);
    }

    pub fn toggle_eraser(&mut self) {
        self.brush.toggle_eraser();
    }

    /// Changes the size of the current mode and persists it.
    pub fn set_active_width(&mut self, size: u32) {
        self.brush.set_active_width(size);
        let patch = match self.brush.mode() {
            BrushMode::Draw => PreferencesPatch {
                pencil_size: Some(self.brush.pencil_size()),
                ..Default::default()
            },
            BrushMode::Erase => PreferencesPatch {
                eraser_size: Some(self.brush.eraser_size()),
                ..Default::default()
            },
        };
        self.persistence.update_preferences(&patch);
    }

    /// Picks a palette entry as the drawing color.
    pub fn select_quick_color(&mut self, index: usize) {
        if let Some(color) = self.quick_colors.get(index).copied() {
            self.brush.set_color(color);
            self.brush.set_mode(BrushMode::Draw);
        }
    }

    /// Replaces a palette entry, selects it and persists the palette.
    pub fn set_quick_color(&mut self, index: usize, color: Color32) {
        let Some(slot) = self.quick_colors.get_mut(index) else {
            log::warn!("No quick color slot {index}");
            return;
        };
        *slot = Color32::from_rgb(color.r(), color.g(), color.b());
        self.select_quick_color(index);
        self.persistence.update_preferences(&PreferencesPatch {
            quick_colors: Some(self.quick_colors.clone()),
            ..Default::default()
        });
    }

    // --- export and upload -------------------------------------------------------

    pub fn export_png(&self) -> Result<Vec<u8>, SurfaceError> {
        encode_png(self.renderer.surface().raster())
    }

    pub fn upload_slot(&self) -> UploadSlot {
        self.uploads.clone()
    }

    /// Stored token, or the answer to `prompt`, which is then stored.
    pub fn resolve_token(&mut self, prompt: impl FnOnce() -> Option<String>) -> Result<String, UploadError> {
        let stored = self.persistence.load_auth_token(&self.auth_cookie);
        let had_stored = stored.is_some();
        let token = resolve_token(stored, prompt)?;
        if !had_stored {
            let key = self.auth_cookie.clone();
            self.persistence.save_auth_token(&key, &token);
        }
        Ok(token)
    }

    /// Validates the request and claims the upload slot. Nothing is changed
    /// when validation fails.
    pub fn prepare_upload(&mut self, filename: &str, token: &str) -> Result<UploadJob, UploadError> {
        let filename = sanitize_filename(filename)?;
        let token = token.trim();
        if token.is_empty() {
            return Err(UploadError::MissingToken);
        }
        let png = self.export_png()?;
        self.uploads.try_begin()?;
        Ok(UploadJob {
            png,
            filename,
            token: token.to_owned(),
        })
    }

    /// Prepares and runs an upload on the calling thread.
    pub fn save_to_server(
        &mut self,
        filename: &str,
        token: &str,
        sink: &dyn UploadSink,
    ) -> Result<UploadReceipt, UploadError> {
        let job = self.prepare_upload(filename, token)?;
        self.uploads.finish(job.run(sink));
        self.uploads
            .take_finished()
            .unwrap_or(Err(UploadError::Busy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    fn context() -> (DrawingContext, MemoryStore) {
        let mut config = CanvasConfig::default();
        config.initial_width = 60.0;
        config.initial_height = 40.0;
        let store = MemoryStore::new();
        (DrawingContext::new(&config, Box::new(store.clone()), 1.0), store)
    }

    fn line(ctx: &mut DrawingContext, from: Pos2, to: Pos2) {
        ctx.pointer_down(from);
        ctx.pointer_move(to);
        ctx.pointer_up();
    }

    #[test]
    fn test_stroke_persists_history_and_current() {
        let (mut ctx, store) = context();
        line(&mut ctx, Pos2::new(5.0, 20.0), Pos2::new(50.0, 20.0));
        assert_eq!(ctx.history().len(), 1);
        assert!(store.contains("canvasDraw_history"));
        assert!(store.contains("canvasDraw_current"));
    }

    #[test]
    fn test_undo_waits_for_poll() {
        let (mut ctx, _) = context();
        line(&mut ctx, Pos2::new(5.0, 20.0), Pos2::new(50.0, 20.0));
        assert!(ctx.undo());
        assert!(ctx.has_pending_decode());
        assert_eq!(ctx.surface().sample(Pos2::new(30.0, 20.0)), Some(Color32::BLACK));

        assert!(ctx.poll_decodes());
        assert!(!ctx.has_pending_decode());
        assert_eq!(ctx.surface().sample(Pos2::new(30.0, 20.0)), Some(Color32::WHITE));
    }

    #[test]
    fn test_undo_is_ignored_mid_stroke() {
        let (mut ctx, _) = context();
        line(&mut ctx, Pos2::new(5.0, 10.0), Pos2::new(50.0, 10.0));
        ctx.pointer_down(Pos2::new(5.0, 30.0));
        ctx.pointer_move(Pos2::new(50.0, 30.0));

        assert!(!ctx.undo());
        assert!(!ctx.has_pending_decode());
        assert_eq!(ctx.history().len(), 2);
        ctx.pointer_up();
        assert_eq!(ctx.surface().sample(Pos2::new(30.0, 30.0)), Some(Color32::BLACK));
    }

    #[test]
    fn test_undo_on_empty_history_is_noop() {
        let (mut ctx, _) = context();
        assert!(!ctx.undo());
        assert!(!ctx.poll_decodes());
    }

    #[test]
    fn test_newer_decode_supersedes_older() {
        let (mut ctx, _) = context();
        line(&mut ctx, Pos2::new(5.0, 10.0), Pos2::new(50.0, 10.0));
        line(&mut ctx, Pos2::new(5.0, 30.0), Pos2::new(50.0, 30.0));

        // two undos before any decode completes: only the second may land
        assert!(ctx.undo());
        assert!(ctx.undo());
        assert!(ctx.poll_decodes());
        assert_eq!(ctx.surface().sample(Pos2::new(30.0, 10.0)), Some(Color32::WHITE));
        assert_eq!(ctx.surface().sample(Pos2::new(30.0, 30.0)), Some(Color32::WHITE));
    }

    #[test]
    fn test_clear_is_undoable() {
        let (mut ctx, _) = context();
        line(&mut ctx, Pos2::new(5.0, 20.0), Pos2::new(50.0, 20.0));
        ctx.clear();
        assert_eq!(ctx.surface().sample(Pos2::new(30.0, 20.0)), Some(Color32::WHITE));
        assert_eq!(ctx.history().len(), 2);

        ctx.undo();
        ctx.poll_decodes();
        assert_eq!(ctx.surface().sample(Pos2::new(30.0, 20.0)), Some(Color32::BLACK));
    }

    #[test]
    fn test_active_width_is_persisted_per_mode() {
        let (mut ctx, _) = context();
        ctx.set_active_width(12);
        ctx.toggle_eraser();
        ctx.set_active_width(40);

        let prefs = ctx.persistence().load_preferences();
        assert_eq!(prefs.pencil_size, 12);
        assert_eq!(prefs.eraser_size, 40);
    }

    #[test]
    fn test_set_quick_color_selects_and_persists() {
        let (mut ctx, _) = context();
        ctx.toggle_eraser();
        let teal = Color32::from_rgb(0, 128, 128);
        ctx.set_quick_color(1, teal);

        assert_eq!(ctx.brush().color(), teal);
        assert_eq!(ctx.brush().mode(), BrushMode::Draw);
        assert_eq!(ctx.persistence().load_preferences().quick_colors[1], teal);
    }

    #[test]
    fn test_restore_saves_defaults_when_absent() {
        let (mut ctx, store) = context();
        ctx.restore();
        assert!(store.contains("canvasDraw_settings"));
        assert!(!ctx.has_pending_decode());
    }

    #[test]
    fn test_prepare_upload_validates_before_claiming_slot() {
        let (mut ctx, _) = context();
        assert!(matches!(ctx.prepare_upload("  ", "tok"), Err(UploadError::EmptyFilename)));
        assert!(matches!(ctx.prepare_upload("a", " "), Err(UploadError::MissingToken)));
        assert!(!ctx.upload_slot().is_busy());

        let job = ctx.prepare_upload("My Sketch", "tok").unwrap();
        assert_eq!(job.filename, "my_sketch.png");
        assert!(ctx.upload_slot().is_busy());
        assert!(matches!(ctx.prepare_upload("again", "tok"), Err(UploadError::Busy)));
    }

    #[test]
    fn test_resolve_token_stores_prompted_value() {
        let (mut ctx, store) = context();
        assert_eq!(ctx.resolve_token(|| Some("typed".into())).unwrap(), "typed");
        assert_eq!(store.raw("canvasDraw_draw_auth").as_deref(), Some("typed"));
        assert_eq!(ctx.resolve_token(|| panic!("should not prompt")).unwrap(), "typed");
    }
}

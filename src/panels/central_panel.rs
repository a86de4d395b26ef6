use egui::{Color32, ColorImage, Pos2, Rect, TextureHandle, TextureId, TextureOptions};

use crate::app::CanvasDrawApp;
use crate::context::DrawingContext;
use crate::surface::Surface;

/// GPU copy of the surface raster, re-uploaded only when the surface
/// revision changes.
#[derive(Default)]
pub struct CanvasTexture {
    handle: Option<TextureHandle>,
    revision: Option<u64>,
}

impl CanvasTexture {
    pub fn texture_id(&mut self, ctx: &egui::Context, surface: &Surface) -> TextureId {
        let revision = surface.revision();
        let stale = self.revision != Some(revision);
        self.revision = Some(revision);
        let image = || {
            let raster = surface.raster();
            ColorImage::from_rgba_unmultiplied(
                [raster.width() as usize, raster.height() as usize],
                raster.as_raw(),
            )
        };
        if let Some(handle) = &mut self.handle {
            if stale {
                handle.set(image(), TextureOptions::LINEAR);
            }
            return handle.id();
        }
        let handle = ctx.load_texture("canvas", image(), TextureOptions::LINEAR);
        let id = handle.id();
        self.handle = Some(handle);
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PointerAction {
    Down(Pos2),
    Move(Pos2),
    Up,
    Leave,
}

#[derive(Debug, Clone, Copy, Default)]
struct PointerFrame {
    pressed: bool,
    down: bool,
    released: bool,
    hovered: bool,
    /// `None` once the pointer is outside the window
    pos: Option<Pos2>,
}

/// Maps one frame of pointer state to a renderer event, in canvas-local
/// coordinates.
fn pointer_action(frame: PointerFrame, rect: Rect, drawing: bool) -> Option<PointerAction> {
    let local = frame.pos.map(|p| Pos2::new(p.x - rect.min.x, p.y - rect.min.y));
    if !drawing {
        return match local {
            Some(local) if frame.pressed && frame.hovered => Some(PointerAction::Down(local)),
            _ => None,
        };
    }
    match frame.pos {
        None => Some(PointerAction::Leave),
        Some(p) if !rect.contains(p) => Some(PointerAction::Leave),
        Some(_) if frame.released || !frame.down => Some(PointerAction::Up),
        Some(_) => local.map(PointerAction::Move),
    }
}

fn handle_pointer(context: &mut DrawingContext, ctx: &egui::Context, response: &egui::Response, rect: Rect) {
    let frame = ctx.input(|i| PointerFrame {
        pressed: i.pointer.primary_pressed(),
        down: i.pointer.primary_down(),
        released: i.pointer.primary_released(),
        hovered: response.hovered(),
        pos: i.pointer.interact_pos(),
    });
    match pointer_action(frame, rect, context.is_drawing()) {
        Some(PointerAction::Down(pos)) => context.pointer_down(pos),
        Some(PointerAction::Move(pos)) => context.pointer_move(pos),
        Some(PointerAction::Up) => context.pointer_up(),
        Some(PointerAction::Leave) => context.pointer_leave(),
        None => {}
    }
}

pub fn central_panel(app: &mut CanvasDrawApp, ctx: &egui::Context) {
    egui::CentralPanel::default()
        .frame(egui::Frame::none().fill(Color32::from_gray(200)))
        .show(ctx, |ui| {
            let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::drag());
            let rect = response.rect;
            let (context, texture) = app.canvas_parts();

            context.resize(rect.width(), rect.height(), ctx.pixels_per_point());
            context.poll_decodes();
            handle_pointer(context, ctx, &response, rect);
            if context.has_pending_decode() {
                ctx.request_repaint();
            }

            let texture_id = texture.texture_id(ctx, context.surface());
            let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
            painter.image(texture_id, rect, uv, Color32::WHITE);
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> Rect {
        Rect::from_min_max(Pos2::new(10.0, 50.0), Pos2::new(110.0, 150.0))
    }

    #[test]
    fn test_press_inside_starts_stroke_in_local_coordinates() {
        let frame = PointerFrame {
            pressed: true,
            down: true,
            hovered: true,
            pos: Some(Pos2::new(30.0, 60.0)),
            ..Default::default()
        };
        assert_eq!(
            pointer_action(frame, canvas(), false),
            Some(PointerAction::Down(Pos2::new(20.0, 10.0)))
        );
    }

    #[test]
    fn test_drag_inside_moves() {
        let frame = PointerFrame {
            down: true,
            hovered: true,
            pos: Some(Pos2::new(60.0, 100.0)),
            ..Default::default()
        };
        assert_eq!(
            pointer_action(frame, canvas(), true),
            Some(PointerAction::Move(Pos2::new(50.0, 50.0)))
        );
    }

    #[test]
    fn test_pointer_gone_from_window_ends_stroke() {
        let frame = PointerFrame {
            down: true,
            pos: None,
            ..Default::default()
        };
        assert_eq!(pointer_action(frame, canvas(), true), Some(PointerAction::Leave));

        // re-entering with the button still held does not resume
        let reentry = PointerFrame {
            down: true,
            hovered: true,
            pos: Some(Pos2::new(60.0, 100.0)),
            ..Default::default()
        };
        assert_eq!(pointer_action(reentry, canvas(), false), None);
    }

    #[test]
    fn test_leaving_canvas_rect_ends_stroke() {
        let frame = PointerFrame {
            down: true,
            pos: Some(Pos2::new(200.0, 100.0)),
            ..Default::default()
        };
        assert_eq!(pointer_action(frame, canvas(), true), Some(PointerAction::Leave));
    }

    #[test]
    fn test_release_ends_stroke() {
        let frame = PointerFrame {
            released: true,
            hovered: true,
            pos: Some(Pos2::new(60.0, 100.0)),
            ..Default::default()
        };
        assert_eq!(pointer_action(frame, canvas(), true), Some(PointerAction::Up));
    }
}

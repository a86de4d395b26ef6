use egui::Pos2;

use crate::brush::BrushState;
use crate::history::History;
use crate::persistence::PersistenceStore;
use crate::stroke::Stroke;
use crate::surface::Surface;

#[derive(Debug, Default)]
enum RendererState {
    #[default]
    Idle,
    Drawing(Stroke),
}

/// Turns pointer input into pixels.
///
/// ```text
///   Idle --pointer_down--> Drawing --pointer_up / pointer_leave--> Idle
/// ```
///
/// Segments are painted as move events arrive. The renderer owns the surface
/// exclusively; history and persistence are passed in per call.
#[derive(Debug)]
pub struct StrokeRenderer {
    surface: Surface,
    state: RendererState,
}

impl StrokeRenderer {
    pub fn new(surface: Surface) -> Self {
        Self {
            surface,
            state: RendererState::Idle,
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, RendererState::Drawing(_))
    }

    /// Idle -> Drawing. The pre-stroke surface is pushed to history before
    /// any pixel changes. Ignored while already drawing.
    pub fn pointer_down(&mut self, pos: Pos2, brush: &BrushState, history: &mut History) -> bool {
        if self.is_drawing() {
            log::debug!("pointer_down while drawing ignored");
            return false;
        }
        history.snapshot_before_change(&self.surface);
        self.state = RendererState::Drawing(Stroke::begin(pos, brush));
        true
    }

    /// Paints a segment from the last point to `pos`. Dropped when idle.
    pub fn pointer_move(&mut self, pos: Pos2) {
        let RendererState::Drawing(stroke) = &mut self.state else {
            return;
        };
        let from = stroke.last_point();
        self.surface
            .stroke_segment(from, pos, stroke.width(), stroke.color());
        stroke.add_point(pos);
    }

    /// Drawing -> Idle, then persists the surface. Returns the finished
    /// stroke, or `None` if no stroke was active.
    pub fn pointer_up(&mut self, persistence: &mut PersistenceStore) -> Option<Stroke> {
        let RendererState::Drawing(stroke) = std::mem::take(&mut self.state) else {
            return None;
        };
        if stroke.is_dot() {
            let at = stroke.last_point();
            self.surface
                .stroke_segment(at, at, stroke.width(), stroke.color());
        }
        match self.surface.encode() {
            Ok(snapshot) => persistence.save_current(&snapshot),
            Err(err) => log::error!("Failed to encode surface after stroke: {err}"),
        }
        Some(stroke)
    }

    /// Leaving the surface ends the stroke exactly like a release.
    pub fn pointer_leave(&mut self, persistence: &mut PersistenceStore) -> Option<Stroke> {
        self.pointer_up(persistence)
    }
}

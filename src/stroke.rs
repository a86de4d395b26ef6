use egui::{Color32, Pos2};

use crate::brush::{BrushMode, BrushState};

// A stroke as it is being drawn. Segments are rasterized as points arrive,
// the point list is only kept as a record of the gesture.
#[derive(Debug, Clone)]
pub struct Stroke {
    points: Vec<Pos2>,
    color: Color32,
    width: f32,
    mode: BrushMode,
}

impl Stroke {
    /// Start a stroke at `start`, freezing the brush's color, width and mode.
    pub fn begin(start: Pos2, brush: &BrushState) -> Self {
        Self {
            points: vec![start],
            color: brush.active_color(),
            width: brush.active_width().max(1) as f32,
            mode: brush.mode(),
        }
    }

    pub fn add_point(&mut self, point: Pos2) {
        self.points.push(point);
    }

    pub fn last_point(&self) -> Pos2 {
        // `begin` always seeds one point
        self.points.last().copied().unwrap_or(Pos2::ZERO)
    }

    pub fn points(&self) -> &[Pos2] {
        &self.points
    }

    pub fn color(&self) -> Color32 {
        self.color
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn mode(&self) -> BrushMode {
        self.mode
    }

    /// True when no move events arrived after the press.
    pub fn is_dot(&self) -> bool {
        self.points.len() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::BACKGROUND;

    #[test]
    fn test_stroke_freezes_brush_state() {
        let mut brush = BrushState::new(Color32::RED, 8, 20);
        let mut stroke = Stroke::begin(Pos2::new(1.0, 2.0), &brush);

        brush.toggle_eraser();
        stroke.add_point(Pos2::new(3.0, 4.0));

        assert_eq!(stroke.color(), Color32::RED);
        assert_eq!(stroke.width(), 8.0);
        assert_eq!(stroke.mode(), BrushMode::Draw);
        assert_eq!(stroke.last_point(), Pos2::new(3.0, 4.0));
        assert!(!stroke.is_dot());
    }

    #[test]
    fn test_erase_stroke_uses_background() {
        let mut brush = BrushState::new(Color32::RED, 8, 30);
        brush.toggle_eraser();
        let stroke = Stroke::begin(Pos2::ZERO, &brush);
        assert_eq!(stroke.color(), BACKGROUND);
        assert_eq!(stroke.width(), 30.0);
        assert!(stroke.is_dot());
    }
}

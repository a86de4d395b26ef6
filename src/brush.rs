use egui::Color32;

use crate::color::BACKGROUND;

pub const PENCIL_SIZE_RANGE: std::ops::RangeInclusive<u32> = 1..=16;
pub const ERASER_SIZE_RANGE: std::ops::RangeInclusive<u32> = 5..=50;
pub const ERASER_SIZE_STEP: u32 = 5;

pub const DEFAULT_PENCIL_SIZE: u32 = 8;
pub const DEFAULT_ERASER_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrushMode {
    Draw,
    Erase,
}

/// Current color, sizes and mode. Mutated by the toolbar, read by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct BrushState {
    color: Color32,
    pencil_size: u32,
    eraser_size: u32,
    mode: BrushMode,
}

impl Default for BrushState {
    fn default() -> Self {
        Self {
            color: Color32::BLACK,
            pencil_size: DEFAULT_PENCIL_SIZE,
            eraser_size: DEFAULT_ERASER_SIZE,
            mode: BrushMode::Draw,
        }
    }
}

impl BrushState {
    pub fn new(color: Color32, pencil_size: u32, eraser_size: u32) -> Self {
        let mut brush = Self { color, ..Self::default() };
        brush.set_pencil_size(pencil_size);
        brush.set_eraser_size(eraser_size);
        brush
    }

    pub fn color(&self) -> Color32 {
        self.color
    }

    /// Sets the drawing color; alpha is forced opaque.
    pub fn set_color(&mut self, color: Color32) {
        self.color = Color32::from_rgb(color.r(), color.g(), color.b());
    }

    pub fn pencil_size(&self) -> u32 {
        self.pencil_size
    }

    pub fn set_pencil_size(&mut self, size: u32) {
        self.pencil_size = clamp_pencil_size(size);
    }

    pub fn eraser_size(&self) -> u32 {
        self.eraser_size
    }

    pub fn set_eraser_size(&mut self, size: u32) {
        self.eraser_size = clamp_eraser_size(size);
    }

    pub fn mode(&self) -> BrushMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: BrushMode) {
        self.mode = mode;
    }

    pub fn toggle_eraser(&mut self) {
        self.mode = match self.mode {
            BrushMode::Draw => BrushMode::Erase,
            BrushMode::Erase => BrushMode::Draw,
        };
    }

    /// Width of the next stroke: eraser size in erase mode, pencil size otherwise.
    pub fn active_width(&self) -> u32 {
        match self.mode {
            BrushMode::Draw => self.pencil_size,
            BrushMode::Erase => self.eraser_size,
        }
    }

    /// Color of the next stroke. Erasing paints the background.
    pub fn active_color(&self) -> Color32 {
        match self.mode {
            BrushMode::Draw => self.color,
            BrushMode::Erase => BACKGROUND,
        }
    }

    /// Sets whichever size the current mode uses.
    pub fn set_active_width(&mut self, size: u32) {
        match self.mode {
            BrushMode::Draw => self.set_pencil_size(size),
            BrushMode::Erase => self.set_eraser_size(size),
        }
    }
}

pub fn clamp_pencil_size(size: u32) -> u32 {
    size.clamp(*PENCIL_SIZE_RANGE.start(), *PENCIL_SIZE_RANGE.end())
}

/// Clamps into 5..=50 and snaps to the nearest multiple of 5.
pub fn clamp_eraser_size(size: u32) -> u32 {
    let clamped = size.clamp(*ERASER_SIZE_RANGE.start(), *ERASER_SIZE_RANGE.end());
    (clamped + ERASER_SIZE_STEP / 2) / ERASER_SIZE_STEP * ERASER_SIZE_STEP
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_width_follows_mode() {
        let mut brush = BrushState::default();
        assert_eq!(brush.active_width(), DEFAULT_PENCIL_SIZE);

        brush.toggle_eraser();
        assert_eq!(brush.mode(), BrushMode::Erase);
        assert_eq!(brush.active_width(), DEFAULT_ERASER_SIZE);
        assert_eq!(brush.active_color(), BACKGROUND);

        brush.toggle_eraser();
        assert_eq!(brush.active_width(), DEFAULT_PENCIL_SIZE);
    }

    #[test]
    fn test_out_of_range_sizes_are_clamped() {
        let mut brush = BrushState::default();
        brush.set_pencil_size(0);
        assert_eq!(brush.pencil_size(), 1);
        brush.set_pencil_size(99);
        assert_eq!(brush.pencil_size(), 16);

        brush.set_eraser_size(1);
        assert_eq!(brush.eraser_size(), 5);
        brush.set_eraser_size(500);
        assert_eq!(brush.eraser_size(), 50);
        brush.set_eraser_size(23);
        assert_eq!(brush.eraser_size(), 25);
        brush.set_eraser_size(22);
        assert_eq!(brush.eraser_size(), 20);
    }

    #[test]
    fn test_color_is_forced_opaque() {
        let mut brush = BrushState::default();
        brush.set_color(Color32::from_rgba_unmultiplied(10, 20, 30, 40));
        assert_eq!(brush.color().a(), 255);
    }

    #[test]
    fn test_set_active_width_targets_current_mode() {
        let mut brush = BrushState::default();
        brush.set_active_width(12);
        brush.set_mode(BrushMode::Erase);
        brush.set_active_width(35);
        assert_eq!(brush.pencil_size(), 12);
        assert_eq!(brush.eraser_size(), 35);
    }
}

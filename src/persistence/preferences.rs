use egui::Color32;
use serde_json::{Map, Value, json};

use crate::brush::{DEFAULT_ERASER_SIZE, DEFAULT_PENCIL_SIZE, clamp_eraser_size, clamp_pencil_size};
use crate::color::{parse_color, to_hex};

pub const MAX_QUICK_COLORS: usize = 8;

pub const DEFAULT_QUICK_COLORS: [Color32; 3] = [
    Color32::from_rgb(0x00, 0x00, 0x00),
    Color32::from_rgb(0x00, 0x00, 0xff),
    Color32::from_rgb(0xff, 0x00, 0x00),
];

const PENCIL_SIZE_KEY: &str = "pencilSize";
const ERASER_SIZE_KEY: &str = "eraserSize";
const QUICK_COLORS_KEY: &str = "quickColors";

/// User preferences stored as a JSON object:
/// `{"pencilSize": 8, "eraserSize": 20, "quickColors": ["#000000", ...]}`
#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    pub pencil_size: u32,
    pub eraser_size: u32,
    pub quick_colors: Vec<Color32>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            pencil_size: DEFAULT_PENCIL_SIZE,
            eraser_size: DEFAULT_ERASER_SIZE,
            quick_colors: DEFAULT_QUICK_COLORS.to_vec(),
        }
    }
}

/// A partial update; `None` fields leave the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferencesPatch {
    pub pencil_size: Option<u32>,
    pub eraser_size: Option<u32>,
    pub quick_colors: Option<Vec<Color32>>,
}

impl From<&Preferences> for PreferencesPatch {
    fn from(prefs: &Preferences) -> Self {
        Self {
            pencil_size: Some(prefs.pencil_size),
            eraser_size: Some(prefs.eraser_size),
            quick_colors: Some(prefs.quick_colors.clone()),
        }
    }
}

impl Preferences {
    pub fn with_quick_colors(quick_colors: Vec<Color32>) -> Self {
        let mut prefs = Self::default();
        if !quick_colors.is_empty() {
            prefs.quick_colors = quick_colors;
            prefs.quick_colors.truncate(MAX_QUICK_COLORS);
        }
        prefs
    }

    /// Reads whatever fields of `stored` parse, keeping `self` for the rest.
    pub fn merged_with(mut self, stored: &Value) -> Self {
        let Some(object) = stored.as_object() else {
            log::warn!("Stored preferences are not an object, using defaults");
            return self;
        };

        if let Some(value) = object.get(PENCIL_SIZE_KEY) {
            match stored_size(value) {
                Some(size) => self.pencil_size = clamp_pencil_size(size),
                None => log::warn!("Ignoring malformed {PENCIL_SIZE_KEY}: {value}"),
            }
        }
        if let Some(value) = object.get(ERASER_SIZE_KEY) {
            match stored_size(value) {
                Some(size) => self.eraser_size = clamp_eraser_size(size),
                None => log::warn!("Ignoring malformed {ERASER_SIZE_KEY}: {value}"),
            }
        }
        if let Some(value) = object.get(QUICK_COLORS_KEY) {
            match parse_quick_colors(value, &self.quick_colors) {
                Some(colors) => self.quick_colors = colors,
                None => log::warn!("Ignoring malformed {QUICK_COLORS_KEY}: {value}"),
            }
        }
        self
    }
}

impl PreferencesPatch {
    /// Writes the set fields into `object`, leaving every other field as is.
    pub fn apply_to(&self, object: &mut Map<String, Value>) {
        if let Some(size) = self.pencil_size {
            object.insert(PENCIL_SIZE_KEY.to_owned(), json!(clamp_pencil_size(size)));
        }
        if let Some(size) = self.eraser_size {
            object.insert(ERASER_SIZE_KEY.to_owned(), json!(clamp_eraser_size(size)));
        }
        if let Some(colors) = &self.quick_colors {
            let hex: Vec<String> = colors.iter().take(MAX_QUICK_COLORS).map(|c| to_hex(*c)).collect();
            object.insert(QUICK_COLORS_KEY.to_owned(), json!(hex));
        }
    }
}

// Finite numbers, rounded. The cast saturates, so negatives give 0.
fn stored_size(value: &Value) -> Option<u32> {
    let size = value.as_f64().filter(|v| v.is_finite())?;
    Some(size.round() as u32)
}

// Unparseable entries fall back to the color already in that slot.
fn parse_quick_colors(value: &Value, fallback: &[Color32]) -> Option<Vec<Color32>> {
    let entries = value.as_array()?;
    let colors = entries
        .iter()
        .take(MAX_QUICK_COLORS)
        .enumerate()
        .filter_map(|(i, entry)| {
            entry
                .as_str()
                .and_then(parse_color)
                .or_else(|| fallback.get(i).copied())
        })
        .collect::<Vec<_>>();
    if colors.is_empty() { None } else { Some(colors) }
}

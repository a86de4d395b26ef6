use std::path::{Path, PathBuf};

use egui::Color32;

use crate::color::{parse_color, to_hex};
use crate::error::ConfigError;
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::persistence::{MAX_QUICK_COLORS, Preferences};

pub const CONFIG_ENV_VAR: &str = "CANVAS_DRAW_CONFIG";

/// Runtime configuration. Every field has a default, so a config file only
/// needs the fields it wants to change.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CanvasConfig {
    /// Namespace for every persisted key; lets several canvases share storage
    pub storage_prefix: String,
    pub storage_dir: PathBuf,
    pub upload_url: String,
    /// Cookie name the auth token is sent under
    pub auth_cookie: String,
    pub download_dir: PathBuf,
    pub default_colors: Vec<String>,
    pub history_limit: usize,
    pub initial_width: f32,
    pub initial_height: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            storage_prefix: "canvasDraw".to_owned(),
            storage_dir: PathBuf::from("canvas_draw_data"),
            upload_url: "http://localhost:8080/drawings/".to_owned(),
            auth_cookie: "draw_auth".to_owned(),
            download_dir: PathBuf::from("."),
            default_colors: ["#000000", "#0000ff", "#ff0000"].map(String::from).to_vec(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            initial_width: 1024.0,
            initial_height: 640.0,
        }
    }
}

impl CanvasConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Loads `path` if given and present; otherwise, or on error, defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(err) => {
                log::error!("{err}; using default configuration");
                Self::default()
            }
        }
    }

    /// Path from the first CLI argument, else the environment variable.
    pub fn path_from_env(args: impl IntoIterator<Item = String>) -> Option<PathBuf> {
        args.into_iter()
            .nth(1)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    }

    /// The configured palette, skipping entries that do not parse.
    pub fn quick_colors(&self) -> Vec<Color32> {
        self.default_colors
            .iter()
            .filter_map(|c| {
                let parsed = parse_color(c);
                if parsed.is_none() {
                    log::warn!("Ignoring invalid default color {c:?}");
                }
                parsed
            })
            .take(MAX_QUICK_COLORS)
            .collect()
    }

    pub fn default_preferences(&self) -> Preferences {
        Preferences::with_quick_colors(self.quick_colors())
    }

    /// Configured undo depth, capped at the default of 20.
    pub fn history_limit(&self) -> usize {
        self.history_limit.clamp(1, DEFAULT_HISTORY_LIMIT)
    }

    /// Sets the palette from colors, normalizing to `#rrggbb`.
    pub fn set_default_colors(&mut self, colors: &[Color32]) {
        self.default_colors = colors.iter().map(|c| to_hex(*c)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CanvasConfig =
            serde_json::from_str(r#"{"storage_prefix": "second", "history_limit": 5}"#).unwrap();
        assert_eq!(config.storage_prefix, "second");
        assert_eq!(config.history_limit(), 5);
        assert_eq!(config.auth_cookie, "draw_auth");
        assert_eq!(config.quick_colors().len(), 3);
    }

    #[test]
    fn test_invalid_colors_are_skipped() {
        let mut config = CanvasConfig::default();
        config.default_colors = vec!["#ff0000".into(), "purple".into()];
        assert_eq!(config.quick_colors(), vec![Color32::from_rgb(255, 0, 0)]);
    }

    #[test]
    fn test_empty_palette_falls_back_to_default_preferences() {
        let mut config = CanvasConfig::default();
        config.set_default_colors(&[]);
        assert_eq!(config.default_preferences(), Preferences::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!("missing_{}.json", uuid::Uuid::new_v4()));
        assert_eq!(CanvasConfig::load_or_default(Some(&path)), CanvasConfig::default());
        assert!(matches!(CanvasConfig::load(&path), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("bad_{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(CanvasConfig::load(&path), Err(ConfigError::Parse(_))));
        assert_eq!(CanvasConfig::load_or_default(Some(&path)), CanvasConfig::default());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_history_limit_is_capped() {
        let config: CanvasConfig = serde_json::from_str(r#"{"history_limit": 50}"#).unwrap();
        assert_eq!(config.history_limit(), DEFAULT_HISTORY_LIMIT);

        let config: CanvasConfig = serde_json::from_str(r#"{"history_limit": 0}"#).unwrap();
        assert_eq!(config.history_limit(), 1);
    }

    #[test]
    fn test_path_from_args() {
        let args = ["canvas_draw".to_owned(), "custom.json".to_owned()];
        assert_eq!(CanvasConfig::path_from_env(args), Some(PathBuf::from("custom.json")));
    }
}

//! Durable copies of the drawing, its undo stack and the user's preferences.
//!
//! Every key is namespaced by a prefix so several canvases can share one
//! backend. Writes never fail towards the caller: a full or unavailable store
//! is logged and the write is dropped, the next write simply tries again.

mod preferences;
mod store;

pub use preferences::{DEFAULT_QUICK_COLORS, MAX_QUICK_COLORS, Preferences, PreferencesPatch};
pub use store::{FileStore, KeyValueStore, MemoryStore};

use serde_json::{Map, Value};

use crate::snapshot::Snapshot;

pub struct PersistenceStore {
    backend: Box<dyn KeyValueStore>,
    prefix: String,
    defaults: Preferences,
}

impl std::fmt::Debug for PersistenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl PersistenceStore {
    pub fn new(backend: Box<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            defaults: Preferences::default(),
        }
    }

    /// Preferences used for fields that are missing or broken in storage.
    pub fn with_default_preferences(mut self, defaults: Preferences) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }

    fn write(&mut self, name: &str, value: String) {
        let key = self.key(name);
        if let Err(err) = self.backend.set(&key, value) {
            log::error!("Failed to persist {key}: {err}");
        }
    }

    fn read(&self, name: &str) -> Option<String> {
        let key = self.key(name);
        match self.backend.get(&key) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("Failed to read {key}: {err}");
                None
            }
        }
    }

    pub fn save_current(&mut self, snapshot: &Snapshot) {
        self.write("current", snapshot.as_data_url().to_owned());
    }

    pub fn load_current(&self) -> Option<Snapshot> {
        self.read("current").map(Snapshot::from)
    }

    /// Serializes the whole stack; called on every push.
    pub fn save_history(&mut self, history: &[Snapshot]) {
        match serde_json::to_string(history) {
            Ok(json) => self.write("history", json),
            Err(err) => log::error!("Failed to serialize history: {err}"),
        }
    }

    /// Empty on absence or when the stored value does not parse.
    pub fn load_history(&self) -> Vec<Snapshot> {
        let Some(json) = self.read("history") else {
            return Vec::new();
        };
        serde_json::from_str(&json).unwrap_or_else(|err| {
            log::warn!("Discarding unreadable history: {err}");
            Vec::new()
        })
    }

    pub fn save_preferences(&mut self, prefs: &Preferences) {
        self.update_preferences(&PreferencesPatch::from(prefs));
    }

    /// Merges `patch` into the stored object, keeping fields it does not set.
    pub fn update_preferences(&mut self, patch: &PreferencesPatch) {
        let mut object = self
            .read("settings")
            .and_then(|json| serde_json::from_str::<Value>(&json).ok())
            .and_then(|value| match value {
                Value::Object(object) => Some(object),
                _ => None,
            })
            .unwrap_or_else(Map::new);
        patch.apply_to(&mut object);
        match serde_json::to_string(&Value::Object(object)) {
            Ok(json) => self.write("settings", json),
            Err(err) => log::error!("Failed to serialize preferences: {err}"),
        }
    }

    /// Stored preferences merged field by field over the defaults.
    pub fn load_preferences(&self) -> Preferences {
        let defaults = self.defaults.clone();
        let Some(json) = self.read("settings") else {
            return defaults;
        };
        match serde_json::from_str::<Value>(&json) {
            Ok(value) => defaults.merged_with(&value),
            Err(err) => {
                log::warn!("Stored preferences are not JSON, using defaults: {err}");
                defaults
            }
        }
    }

    /// Whether any preferences have been stored yet.
    pub fn has_preferences(&self) -> bool {
        self.read("settings").is_some()
    }

    pub fn save_auth_token(&mut self, name: &str, token: &str) {
        self.write(name, token.to_owned());
    }

    pub fn load_auth_token(&self, name: &str) -> Option<String> {
        self.read(name).filter(|token| !token.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::Color32;
    use serde_json::json;

    fn store() -> (PersistenceStore, MemoryStore) {
        let memory = MemoryStore::new();
        (PersistenceStore::new(Box::new(memory.clone()), "canvasDraw"), memory)
    }

    fn snap(tag: &str) -> Snapshot {
        Snapshot::from(format!("data:image/png;base64,{tag}"))
    }

    #[test]
    fn test_keys_are_namespaced() {
        let (mut persistence, memory) = store();
        persistence.save_current(&snap("AAAA"));
        assert_eq!(memory.raw("canvasDraw_current").as_deref(), Some("data:image/png;base64,AAAA"));

        let mut other = PersistenceStore::new(Box::new(memory.clone()), "second");
        assert_eq!(other.load_current(), None);
        other.save_current(&snap("BBBB"));
        assert_eq!(persistence.load_current(), Some(snap("AAAA")));
    }

    #[test]
    fn test_history_round_trip_and_corruption() {
        let (mut persistence, memory) = store();
        assert!(persistence.load_history().is_empty());

        persistence.save_history(&[snap("a"), snap("b")]);
        assert_eq!(persistence.load_history(), vec![snap("a"), snap("b")]);

        memory.insert_raw("canvasDraw_history", "{not json");
        assert!(persistence.load_history().is_empty());
    }

    #[test]
    fn test_preferences_merge_with_stored_fields() {
        let (mut persistence, memory) = store();
        memory.insert_raw(
            "canvasDraw_settings",
            r##"{"eraserSize":30,"quickColors":["#112233","#445566"]}"##,
        );

        persistence.update_preferences(&PreferencesPatch {
            pencil_size: Some(10),
            ..Default::default()
        });

        let prefs = persistence.load_preferences();
        assert_eq!(prefs.pencil_size, 10);
        assert_eq!(prefs.eraser_size, 30);
        assert_eq!(
            prefs.quick_colors,
            vec![Color32::from_rgb(0x11, 0x22, 0x33), Color32::from_rgb(0x44, 0x55, 0x66)]
        );
    }

    #[test]
    fn test_corrupt_preferences_fall_back_to_defaults() {
        let (persistence, memory) = store();
        memory.insert_raw("canvasDraw_settings", "}}}");
        assert_eq!(persistence.load_preferences(), Preferences::default());
    }

    #[test]
    fn test_configured_defaults_fill_missing_fields() {
        let memory = MemoryStore::new();
        let defaults = Preferences::with_quick_colors(vec![Color32::from_rgb(1, 2, 3)]);
        let persistence =
            PersistenceStore::new(Box::new(memory), "p").with_default_preferences(defaults.clone());
        assert_eq!(persistence.load_preferences(), defaults);
    }

    #[test]
    fn test_write_failures_are_swallowed() {
        let (mut persistence, memory) = store();
        memory.set_unavailable(true);
        persistence.save_current(&snap("x"));
        persistence.save_history(&[snap("x")]);
        persistence.save_preferences(&Preferences::default());
        assert_eq!(persistence.load_current(), None);
        assert_eq!(persistence.load_preferences(), Preferences::default());

        memory.set_unavailable(false);
        persistence.save_current(&snap("y"));
        assert_eq!(persistence.load_current(), Some(snap("y")));
    }

    #[test]
    fn test_save_preferences_writes_all_fields() {
        let (mut persistence, memory) = store();
        persistence.save_preferences(&Preferences::default());
        let stored: Value = serde_json::from_str(&memory.raw("canvasDraw_settings").unwrap()).unwrap();
        assert_eq!(stored["pencilSize"], json!(8));
        assert_eq!(stored["eraserSize"], json!(20));
        assert_eq!(stored["quickColors"], json!(["#000000", "#0000ff", "#ff0000"]));
    }

    #[test]
    fn test_auth_token_storage() {
        let (mut persistence, _) = store();
        assert_eq!(persistence.load_auth_token("draw_auth"), None);
        persistence.save_auth_token("draw_auth", "secret");
        assert_eq!(persistence.load_auth_token("draw_auth").as_deref(), Some("secret"));
    }
}

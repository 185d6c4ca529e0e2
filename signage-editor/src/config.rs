//! Editor settings. Every field has a default; YAML files and `SIGNAGE_EDITOR_*` environment
//! variables override them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{EditorError, EditorResult};

pub const DEFAULT_SERIALIZE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_TEXT_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_TEXT_SNAPSHOT_LIMIT: usize = 500;
pub const DEFAULT_EDITABLE_ATTRIBUTE: &str = "data-editable";
pub const DEFAULT_RUNTIME_SRC: &str = "/editor/runtime.js";
pub const DEFAULT_MIN_ZOOM_SCALE: f64 = 0.25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    /// Upper bound on one `serialize()` round trip.
    pub serialize_timeout_ms: u64,
    /// Quiet period before typed text is committed.
    pub text_debounce_ms: u64,
    /// Characters of `textContent` carried in a selection snapshot.
    pub text_snapshot_limit: usize,
    /// Attribute marking selectable elements.
    pub editable_attribute: String,
    /// `src` of the injected runtime script tag.
    pub runtime_src: String,
    /// Below this scale the canvas scrolls instead of shrinking further.
    pub min_zoom_scale: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            serialize_timeout_ms: DEFAULT_SERIALIZE_TIMEOUT_MS,
            text_debounce_ms: DEFAULT_TEXT_DEBOUNCE_MS,
            text_snapshot_limit: DEFAULT_TEXT_SNAPSHOT_LIMIT,
            editable_attribute: DEFAULT_EDITABLE_ATTRIBUTE.to_string(),
            runtime_src: DEFAULT_RUNTIME_SRC.to_string(),
            min_zoom_scale: DEFAULT_MIN_ZOOM_SCALE,
        }
    }
}

impl EditorConfig {
    pub fn from_yaml(text: &str) -> EditorResult<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `SIGNAGE_EDITOR_*` variables.
    pub fn from_env() -> EditorResult<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment, or a map in tests).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> EditorResult<Self> {
        fn parsed<T: std::str::FromStr>(key: &str, raw: String) -> EditorResult<T> {
            raw.trim()
                .parse()
                .map_err(|_| EditorError::Config(format!("{} has an invalid value '{}'", key, raw)))
        }

        if let Some(v) = lookup("SIGNAGE_EDITOR_SERIALIZE_TIMEOUT_MS") {
            self.serialize_timeout_ms = parsed("SIGNAGE_EDITOR_SERIALIZE_TIMEOUT_MS", v)?;
        }
        if let Some(v) = lookup("SIGNAGE_EDITOR_TEXT_DEBOUNCE_MS") {
            self.text_debounce_ms = parsed("SIGNAGE_EDITOR_TEXT_DEBOUNCE_MS", v)?;
        }
        if let Some(v) = lookup("SIGNAGE_EDITOR_TEXT_SNAPSHOT_LIMIT") {
            self.text_snapshot_limit = parsed("SIGNAGE_EDITOR_TEXT_SNAPSHOT_LIMIT", v)?;
        }
        if let Some(v) = lookup("SIGNAGE_EDITOR_EDITABLE_ATTRIBUTE") {
            self.editable_attribute = v.trim().to_ascii_lowercase();
        }
        if let Some(v) = lookup("SIGNAGE_EDITOR_RUNTIME_SRC") {
            self.runtime_src = v;
        }
        if let Some(v) = lookup("SIGNAGE_EDITOR_MIN_ZOOM_SCALE") {
            self.min_zoom_scale = parsed("SIGNAGE_EDITOR_MIN_ZOOM_SCALE", v)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> EditorResult<()> {
        if self.serialize_timeout_ms == 0 {
            return Err(EditorError::Config("serializeTimeoutMs must be positive".into()));
        }
        if self.editable_attribute.is_empty() {
            return Err(EditorError::Config("editableAttribute must not be empty".into()));
        }
        if !(self.min_zoom_scale > 0.0 && self.min_zoom_scale <= 1.0) {
            return Err(EditorError::Config(format!(
                "minZoomScale must be in (0, 1], got {}",
                self.min_zoom_scale
            )));
        }
        Ok(())
    }

    pub fn serialize_timeout(&self) -> Duration {
        Duration::from_millis(self.serialize_timeout_ms)
    }

    pub fn text_debounce(&self) -> Duration {
        Duration::from_millis(self.text_debounce_ms)
    }
}

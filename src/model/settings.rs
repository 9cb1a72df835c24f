//! Database-wide settings.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_SESSION_LENGTH_MS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub session_length_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            session_length_ms: DEFAULT_SESSION_LENGTH_MS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub settings: Settings,
    pub mask: Vec<String>,
}

impl SettingsUpdate {
    fn has(&self, field: &str) -> bool {
        self.mask.iter().any(|f| f.eq_ignore_ascii_case(field))
    }

    /// Applies the masked fields of this update onto `existing`.
    pub fn apply(&self, existing: &mut Settings) {
        if self.has("sessionlength") {
            existing.session_length_ms = self.settings.session_length_ms;
        }
    }
}

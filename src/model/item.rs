//! Credential items: logins, ids, cards, and notes.

use serde::{Deserialize, Serialize};

use super::{now_secs, Ruleset, RulesetMask};

/// A single credential entry. Which fields are meaningful depends on
/// `item_type` (see `config::item_kind`); fields that don't apply to a kind
/// are simply left at their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub item_type: String,
    pub title: String,
    pub archived: bool,

    // LOGIN fields
    pub email: String,
    pub username: String,
    pub password: String,
    pub prev_passwords: Vec<String>,
    pub websites: Vec<String>,
    pub two_factor_secret: Option<String>,
    pub ruleset: Ruleset,
    pub password_created: u64,

    pub notes: String,

    pub created: u64,
    pub updated: u64,
}

/// A masked, partial update request for an existing item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub item_id: String,
    pub item: Item,
    pub group_ids: Vec<String>,
    pub mask: Vec<String>,
    pub ruleset_mask: RulesetMask,
    pub include_group_ids: bool,
}

impl ItemUpdate {
    fn has(&self, field: &str) -> bool {
        self.mask.iter().any(|f| f.eq_ignore_ascii_case(field))
    }

    /// Applies this update's masked fields onto `existing`, mirroring the
    /// original's case-insensitive mask switch. Appends the old password to
    /// `prev_passwords` when the password field is touched.
    pub fn apply(&self, existing: &mut Item) {
        if self.has("title") {
            existing.title = self.item.title.clone();
        }
        if self.has("archived") {
            existing.archived = self.item.archived;
        }
        if self.has("email") {
            existing.email = self.item.email.clone();
        }
        if self.has("username") {
            existing.username = self.item.username.clone();
        }
        if self.has("password") {
            let old = std::mem::replace(&mut existing.password, self.item.password.clone());
            if !old.is_empty() {
                existing.prev_passwords.push(old);
            }
        }
        if self.has("websites") {
            existing.websites = self.item.websites.clone();
        }
        if self.has("twofactorsecret") {
            existing.two_factor_secret = self.item.two_factor_secret.clone();
        }
        if self.has("notes") {
            existing.notes = self.item.notes.clone();
        }
        existing
            .ruleset
            .apply_mask(&self.item.ruleset, &self.ruleset_mask);
    }
}

impl Item {
    /// Normalizes and timestamps the item in place, matching `set_item`'s
    /// behavior in the original: `item_type` is upper-cased and trimmed,
    /// `title` is trimmed, and for LOGIN items, website entries are
    /// deduped case-insensitively while preserving first-seen casing and
    /// order.
    ///
    /// `password_created` is refreshed on every update to a LOGIN item
    /// regardless of which fields were touched by the mask; this matches
    /// observed upstream behavior and is deliberately not "fixed" here
    /// (see DESIGN.md).
    pub fn normalize(&mut self, is_update: bool) {
        self.item_type = self.item_type.trim().to_uppercase();
        self.title = self.title.trim().to_string();

        let now = now_secs();
        if !is_update {
            self.created = now;
        }
        self.updated = now;

        if self.item_type == crate::config::item_kind::LOGIN {
            if is_update {
                self.password_created = now;
            }
            self.email = self.email.trim().to_string();
            if let Some(secret) = &self.two_factor_secret {
                self.two_factor_secret = Some(secret.trim().to_string());
            }
            self.notes = self.notes.trim().to_string();
            self.websites = dedupe_websites(&self.websites);
        }
    }
}

fn dedupe_websites(websites: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for site in websites {
        let trimmed = site.trim().to_string();
        let key = trimmed.to_uppercase();
        if seen.insert(key) {
            out.push(trimmed);
        }
    }
    out
}

//! Groups: named collections of item ids.

use serde::{Deserialize, Serialize};

use super::now_secs;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub items: Vec<String>,
    pub created: u64,
    pub updated: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupUpdate {
    pub group_id: String,
    pub group: Group,
    pub mask: Vec<String>,
}

impl GroupUpdate {
    fn has(&self, field: &str) -> bool {
        self.mask.iter().any(|f| f.eq_ignore_ascii_case(field))
    }

    pub fn apply(&self, existing: &mut Group) {
        if self.has("items") {
            existing.items = self.group.items.clone();
        }
        if self.has("name") {
            existing.name = self.group.name.clone();
        }
    }
}

impl Group {
    pub fn normalize(&mut self, is_update: bool) {
        let now = now_secs();
        if !is_update {
            self.created = now;
        }
        self.updated = now;
        self.name = self.name.trim().to_string();
    }
}

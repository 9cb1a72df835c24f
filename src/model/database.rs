//! The top-level database: the collection of items and groups plus
//! settings, and every mutating operation with its invariants.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{item_kind, RESERVED_GROUP_NAMES};
use crate::error::{ImcryptError, Result};
use crate::id::generate_item_or_group_id;

use super::{Group, GroupUpdate, Item, ItemUpdate, Ruleset, Settings, SettingsUpdate};

const KNOWN_ITEM_TYPES: &[&str] = &[
    item_kind::LOGIN,
    item_kind::ID,
    item_kind::CARD,
    item_kind::NOTE,
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Database {
    pub items: HashMap<String, Item>,
    pub groups: HashMap<String, Group>,
    pub settings: Settings,
}

impl Database {
    pub fn new() -> Self {
        Database::default()
    }

    pub fn update_settings(&mut self, update: &SettingsUpdate) {
        update.apply(&mut self.settings);
    }

    // -- Insertion ---------------------------------------------------------

    /// Validates, assigns an id, normalizes, and inserts each item. Returns
    /// the assigned ids in the same order as `items`.
    pub fn insert_items(&mut self, items: Vec<(Item, Vec<String>)>) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(items.len());
        for (mut item, group_ids) in items {
            self.validate_item(&item, &group_ids, true, false)?;
            let id = generate_item_or_group_id(&self.items, &self.groups)?;
            item.id = id.clone();
            self.set_item(id.clone(), item, group_ids, false);
            ids.push(id);
        }
        Ok(ids)
    }

    pub fn insert_groups(&mut self, groups: Vec<Group>) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(groups.len());
        for mut group in groups {
            self.validate_group(&group, true)?;
            let id = generate_item_or_group_id(&self.items, &self.groups)?;
            group.id = id.clone();
            self.set_group(id.clone(), group, false);
            ids.push(id);
        }
        Ok(ids)
    }

    // -- Masked updates ------------------------------------------------------

    pub fn update_items_by_id(&mut self, updates: Vec<ItemUpdate>) -> Result<()> {
        for update in updates {
            let mut item = self
                .items
                .get(&update.item_id)
                .cloned()
                .ok_or_else(|| ImcryptError::ItemNotFound(update.item_id.clone()))?;

            update.apply(&mut item);

            let group_ids = if update.include_group_ids {
                update.group_ids.clone()
            } else {
                self.groups
                    .values()
                    .filter(|g| g.items.contains(&update.item_id))
                    .map(|g| g.id.clone())
                    .collect()
            };

            let check_title = update.mask.iter().any(|f| f.eq_ignore_ascii_case("title"));
            let check_reuse = !item.ruleset.reuse
                && update.mask.iter().any(|f| f.eq_ignore_ascii_case("password"));

            self.validate_item(&item, &group_ids, check_title, check_reuse)?;
            self.validate_ruleset(&item.ruleset)?;

            self.set_item(update.item_id.clone(), item, group_ids, true);
        }
        Ok(())
    }

    pub fn update_groups_by_id(&mut self, updates: Vec<GroupUpdate>) -> Result<()> {
        for update in updates {
            let mut group = self
                .groups
                .get(&update.group_id)
                .cloned()
                .ok_or_else(|| ImcryptError::GroupNotFound(update.group_id.clone()))?;

            update.apply(&mut group);

            let check_name = update.mask.iter().any(|f| f.eq_ignore_ascii_case("name"));
            self.validate_group(&group, check_name)?;

            self.set_group(update.group_id.clone(), group, true);
        }
        Ok(())
    }

    // -- Deletion --------------------------------------------------------------

    /// Removes each id from every group's item list, then deletes the item.
    /// Missing ids are silently skipped.
    pub fn delete_items_by_id(&mut self, ids: &[String]) {
        for group in self.groups.values_mut() {
            group.items.retain(|i| !ids.contains(i));
        }
        for id in ids {
            self.items.remove(id);
        }
    }

    /// Deletes each group. Does not clean up item->group references left
    /// dangling elsewhere (preserved upstream behavior, see DESIGN.md).
    pub fn delete_groups_by_id(&mut self, ids: &[String]) {
        for id in ids {
            self.groups.remove(id);
        }
    }

    // -- Internal set helpers -----------------------------------------------

    fn set_item(&mut self, id: String, mut item: Item, group_ids: Vec<String>, update: bool) {
        if update {
            for group in self.groups.values_mut() {
                if !group_ids.contains(&group.id) && group.items.contains(&id) {
                    group.items.retain(|i| i != &id);
                }
            }
        }

        item.id = id.clone();
        item.normalize(update);

        for group_id in &group_ids {
            if let Some(group) = self.groups.get_mut(group_id) {
                if !group.items.contains(&id) {
                    group.items.push(id.clone());
                }
            }
        }

        debug!(item_id = %id, update, "setting item");
        self.items.insert(id, item);
    }

    fn set_group(&mut self, id: String, mut group: Group, update: bool) {
        group.id = id.clone();
        group.normalize(update);
        debug!(group_id = %id, update, "setting group");
        self.groups.insert(id, group);
    }

    // -- Validation -----------------------------------------------------------

    pub fn validate_item(
        &self,
        item: &Item,
        group_ids: &[String],
        check_title: bool,
        check_reuse: bool,
    ) -> Result<()> {
        let item_type = item.item_type.trim().to_uppercase();
        if !KNOWN_ITEM_TYPES.contains(&item_type.as_str()) {
            return Err(ImcryptError::ValidationFailed(format!(
                "unknown item type: {item_type}"
            )));
        }

        if item_type == item_kind::LOGIN {
            if item.password.is_empty() {
                return Err(ImcryptError::ValidationFailed(
                    "login items require a non-empty password".into(),
                ));
            }
            if check_reuse && item.prev_passwords.contains(&item.password) {
                return Err(ImcryptError::ValidationFailed(
                    "password reuse is not allowed by this item's ruleset".into(),
                ));
            }
        }

        let title = item.title.trim();
        if title.is_empty() {
            return Err(ImcryptError::ValidationFailed(
                "title must not be empty".into(),
            ));
        }

        if check_title {
            let upper = title.to_uppercase();
            let collides = self.items.values().any(|existing| {
                existing.id != item.id && existing.title.trim().to_uppercase() == upper
            });
            if collides {
                return Err(ImcryptError::DuplicateName(format!(
                    "an item titled '{title}' already exists"
                )));
            }
        }

        for group_id in group_ids {
            if !self.groups.contains_key(group_id) {
                return Err(ImcryptError::GroupNotFound(group_id.clone()));
            }
        }

        Ok(())
    }

    pub fn validate_group(&self, group: &Group, check_name: bool) -> Result<()> {
        let name = group.name.trim();
        if name.is_empty() {
            return Err(ImcryptError::ValidationFailed(
                "group name must not be empty".into(),
            ));
        }

        let upper = name.to_uppercase();
        if RESERVED_GROUP_NAMES.contains(&upper.as_str()) {
            return Err(ImcryptError::ValidationFailed(format!(
                "'{name}' is a reserved group name"
            )));
        }

        if check_name {
            let collides = self.groups.values().any(|existing| {
                existing.id != group.id && existing.name.trim().to_uppercase() == upper
            });
            if collides {
                return Err(ImcryptError::DuplicateName(format!(
                    "a group named '{name}' already exists"
                )));
            }
        }

        for item_id in &group.items {
            if !self.items.contains_key(item_id) {
                return Err(ImcryptError::ItemNotFound(item_id.clone()));
            }
        }

        Ok(())
    }

    pub fn validate_ruleset(&self, ruleset: &Ruleset) -> Result<()> {
        if ruleset.min_length < 1 {
            return Err(ImcryptError::ValidationFailed(
                "min_length must be at least 1".into(),
            ));
        }
        if ruleset.max_length < 1 {
            return Err(ImcryptError::ValidationFailed(
                "max_length must be at least 1".into(),
            ));
        }
        if ruleset.min_length > ruleset.max_length {
            return Err(ImcryptError::ValidationFailed(
                "min_length must not exceed max_length".into(),
            ));
        }
        if ruleset.password_ttl_increment < 1 {
            return Err(ImcryptError::ValidationFailed(
                "password_ttl_increment must be at least 1".into(),
            ));
        }
        if ruleset.password_ttl_unit > 2 {
            return Err(ImcryptError::ValidationFailed(
                "password_ttl_unit must be 0, 1, or 2".into(),
            ));
        }
        let deduped: std::collections::HashSet<char> = ruleset.charset.chars().collect();
        if deduped.is_empty() {
            return Err(ImcryptError::ValidationFailed(
                "charset must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login_item(title: &str, password: &str) -> Item {
        Item {
            item_type: item_kind::LOGIN.to_string(),
            title: title.to_string(),
            password: password.to_string(),
            ruleset: Ruleset::default(),
            ..Default::default()
        }
    }

    #[test]
    fn insert_and_group_linkage() {
        let mut db = Database::new();
        let group_ids = db.insert_groups(vec![Group {
            name: "Work".to_string(),
            ..Default::default()
        }]).unwrap();
        let item_ids = db
            .insert_items(vec![(login_item("Email", "hunter2"), group_ids.clone())])
            .unwrap();
        let group = &db.groups[&group_ids[0]];
        assert!(group.items.contains(&item_ids[0]));
    }

    #[test]
    fn duplicate_title_rejected() {
        let mut db = Database::new();
        db.insert_items(vec![(login_item("Email", "a"), vec![])])
            .unwrap();
        let result = db.insert_items(vec![(login_item("EMAIL", "b"), vec![])]);
        assert!(matches!(result, Err(ImcryptError::DuplicateName(_))));
    }

    #[test]
    fn delete_group_does_not_clean_item_references() {
        let mut db = Database::new();
        let group_ids = db.insert_groups(vec![Group {
            name: "Work".to_string(),
            ..Default::default()
        }]).unwrap();
        let item_ids = db
            .insert_items(vec![(login_item("Email", "a"), group_ids.clone())])
            .unwrap();
        db.delete_groups_by_id(&group_ids);
        // Item itself is untouched and still references the now-deleted group
        // only via the group's own (now gone) member list -- the item record
        // has no direct group_ids field, so nothing dangles on the item side,
        // matching upstream where only Group->Item membership exists.
        assert!(db.items.contains_key(&item_ids[0]));
        assert!(!db.groups.contains_key(&group_ids[0]));
    }

    #[test]
    fn update_password_appends_history_and_checks_reuse() {
        let mut db = Database::new();
        let mut ruleset = Ruleset::default();
        ruleset.reuse = false;
        let mut item = login_item("Email", "old-pass");
        item.ruleset = ruleset;
        let ids = db.insert_items(vec![(item, vec![])]).unwrap();

        let update = ItemUpdate {
            item_id: ids[0].clone(),
            item: Item {
                password: "new-pass".to_string(),
                ..Default::default()
            },
            mask: vec!["password".to_string()],
            include_group_ids: true,
            ..Default::default()
        };
        db.update_items_by_id(vec![update]).unwrap();
        assert_eq!(db.items[&ids[0]].password, "new-pass");
        assert_eq!(db.items[&ids[0]].prev_passwords, vec!["old-pass".to_string()]);

        let reuse_update = ItemUpdate {
            item_id: ids[0].clone(),
            item: Item {
                password: "old-pass".to_string(),
                ..Default::default()
            },
            mask: vec!["password".to_string()],
            include_group_ids: true,
            ..Default::default()
        };
        let result = db.update_items_by_id(vec![reuse_update]);
        assert!(result.is_err());
    }
}

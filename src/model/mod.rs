//! The credential database's data model: items, groups, rulesets, settings,
//! and the masked-update machinery that mutates them.

mod database;
mod group;
mod item;
mod ruleset;
mod settings;

pub use database::Database;
pub use group::{Group, GroupUpdate};
pub use item::{Item, ItemUpdate};
pub use ruleset::{IterationConstraint, Ruleset, RulesetMask};
pub use settings::{Settings, SettingsUpdate};

/// Current epoch time in seconds, used for `created`/`updated` timestamps.
pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

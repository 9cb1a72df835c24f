//! Password rulesets: the constraint language the generator and validator
//! both consume.

use serde::{Deserialize, Serialize};

/// A single "at least N of this charset" or "at most N of this charset"
/// constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationConstraint {
    pub iterations: usize,
    pub charset: String,
}

/// The password policy attached to a LOGIN item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ruleset {
    pub optional: bool,
    pub min_length: usize,
    pub max_length: usize,
    pub password_ttl_increment: u32,
    pub password_ttl_unit: u8,
    pub reuse: bool,
    pub charset: String,
    pub same_char_max: usize,
    pub at_most_constraints: Vec<IterationConstraint>,
    pub at_least_constraints: Vec<IterationConstraint>,
}

impl Default for Ruleset {
    fn default() -> Self {
        Ruleset {
            optional: true,
            min_length: 1,
            max_length: 64,
            password_ttl_increment: 1,
            password_ttl_unit: 0,
            reuse: false,
            charset: String::new(),
            same_char_max: 0,
            at_most_constraints: Vec::new(),
            at_least_constraints: Vec::new(),
        }
    }
}

/// Field mask for a masked ruleset update, applied the same way
/// `ItemUpdate`'s item mask is applied: case-insensitive field names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesetMask {
    pub fields: Vec<String>,
}

impl RulesetMask {
    pub fn has(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.eq_ignore_ascii_case(field))
    }
}

impl Ruleset {
    /// Applies the fields named in `mask` from `update` onto `self`.
    pub fn apply_mask(&mut self, update: &Ruleset, mask: &RulesetMask) {
        if mask.has("optional") {
            self.optional = update.optional;
        }
        if mask.has("minlength") {
            self.min_length = update.min_length;
        }
        if mask.has("maxlength") {
            self.max_length = update.max_length;
        }
        if mask.has("passwordttlincrement") {
            self.password_ttl_increment = update.password_ttl_increment;
        }
        if mask.has("passwordttlunit") {
            self.password_ttl_unit = update.password_ttl_unit;
        }
        if mask.has("reuse") {
            self.reuse = update.reuse;
        }
        if mask.has("charset") {
            self.charset = update.charset.clone();
        }
        if mask.has("samecharmax") {
            self.same_char_max = update.same_char_max;
        }
        if mask.has("atmostconstraints") {
            self.at_most_constraints = update.at_most_constraints.clone();
        }
        if mask.has("atleastconstraints") {
            self.at_least_constraints = update.at_least_constraints.clone();
        }
    }
}

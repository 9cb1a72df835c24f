//! Password validation against a ruleset, reporting which specific
//! constraints pass or fail rather than a single boolean.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::model::{IterationConstraint, Ruleset};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub min_length: bool,
    pub max_length: bool,
    pub same_char_max: bool,
    pub charset: bool,
    pub at_most_constraints: Vec<bool>,
    pub at_least_constraints: Vec<bool>,
    pub prev_passwords: bool,
}

/// Validates `password` against `ruleset`, returning a full report of which
/// individual constraints passed. If `ruleset.optional` is set, `is_valid`
/// is unconditionally `true` even though the individual fields still
/// reflect each constraint's actual pass/fail state.
pub fn validate_password(
    password: &str,
    ruleset: &Ruleset,
    prev_passwords: &[String],
) -> ValidationReport {
    let length = password.graphemes(true).count();

    let min_length = length >= ruleset.min_length;
    let max_length = length <= ruleset.max_length;
    let same_char_max = !violates_same_char_max(password, ruleset.same_char_max);
    let charset = !violates_allowed_characters(password, &ruleset.charset);
    let at_most_constraints = find_at_most_violators(password, &ruleset.at_most_constraints)
        .into_iter()
        .map(|violated| !violated)
        .collect::<Vec<bool>>();
    let at_least_constraints = find_at_least_violators(password, &ruleset.at_least_constraints)
        .into_iter()
        .map(|violated| !violated)
        .collect::<Vec<bool>>();
    let prev_ok = !prev_passwords.iter().any(|p| p == password);

    let mut report = ValidationReport {
        is_valid: min_length
            && max_length
            && same_char_max
            && charset
            && at_most_constraints.iter().all(|&p| p)
            && at_least_constraints.iter().all(|&p| p)
            && prev_ok,
        min_length,
        max_length,
        same_char_max,
        charset,
        at_most_constraints,
        at_least_constraints,
        prev_passwords: prev_ok,
    };

    if ruleset.optional {
        report.is_valid = true;
    }

    report
}

fn violates_same_char_max(password: &str, same_char_max: usize) -> bool {
    if same_char_max == 0 {
        return false;
    }
    let mut counts = std::collections::HashMap::new();
    for c in password.chars() {
        let count = counts.entry(c).or_insert(0usize);
        *count += 1;
        if *count > same_char_max {
            return true;
        }
    }
    false
}

fn violates_allowed_characters(password: &str, charset: &str) -> bool {
    let allowed: std::collections::HashSet<char> = charset.chars().collect();
    password.chars().any(|c| !allowed.contains(&c))
}

fn find_at_most_violators(password: &str, constraints: &[IterationConstraint]) -> Vec<bool> {
    constraints
        .iter()
        .map(|c| count_in_charset(password, &c.charset) > c.iterations)
        .collect()
}

fn find_at_least_violators(password: &str, constraints: &[IterationConstraint]) -> Vec<bool> {
    constraints
        .iter()
        .map(|c| count_in_charset(password, &c.charset) < c.iterations)
        .collect()
}

fn count_in_charset(password: &str, charset: &str) -> usize {
    let set: std::collections::HashSet<char> = charset.chars().collect();
    password.chars().filter(|c| set.contains(c)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_ruleset_is_always_valid() {
        let mut ruleset = Ruleset::default();
        ruleset.optional = true;
        ruleset.min_length = 20;
        let report = validate_password("short", &ruleset, &[]);
        assert!(report.is_valid);
        assert!(!report.min_length);
    }

    #[test]
    fn required_ruleset_enforces_min_length() {
        let mut ruleset = Ruleset::default();
        ruleset.optional = false;
        ruleset.min_length = 10;
        ruleset.charset = "abcdefghijklmnopqrstuvwxyz".to_string();
        let report = validate_password("short", &ruleset, &[]);
        assert!(!report.is_valid);
        assert!(!report.min_length);
    }

    #[test]
    fn at_least_constraint_checked() {
        let mut ruleset = Ruleset::default();
        ruleset.optional = false;
        ruleset.charset = "abc123".to_string();
        ruleset.at_least_constraints = vec![IterationConstraint {
            iterations: 2,
            charset: "123".to_string(),
        }];
        let report = validate_password("abc1", &ruleset, &[]);
        assert_eq!(report.at_least_constraints, vec![false]);
        assert!(!report.is_valid);
    }
}

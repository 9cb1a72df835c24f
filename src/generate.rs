//! Constraint-solving password generator.
//!
//! Builds one "stars and bars" block of minimum-satisfying character
//! combinations per at-least constraint, then recursively searches for a
//! combination of blocks that can be merged without violating the at-most
//! or same-char-max constraints, before greedily filling the remainder of
//! the password up to its target length.

use std::collections::HashMap;

use rand::seq::SliceRandom;

use crate::charset::CharMultiset;
use crate::error::{ImcryptError, Result};
use crate::model::{IterationConstraint, Ruleset};

struct ConstraintWithMap {
    iterations: usize,
    charset_map: HashMap<char, bool>,
}

/// Generates a password satisfying `ruleset`, avoiding any string already
/// present in `previous_passwords`.
pub fn generate(ruleset: &Ruleset, previous_passwords: &[String]) -> Result<String> {
    let mut allowed_charmap: HashMap<char, bool> = HashMap::new();
    for c in ruleset.charset.chars() {
        allowed_charmap.insert(c, true);
    }

    let at_most_maps: Vec<ConstraintWithMap> = ruleset
        .at_most_constraints
        .iter()
        .map(|c| ConstraintWithMap {
            iterations: c.iterations,
            charset_map: c.charset.chars().map(|ch| (ch, true)).collect(),
        })
        .collect();

    let mut blocks: Vec<Vec<CharMultiset>> = Vec::new();
    for constraint in &ruleset.at_least_constraints {
        let mut block = calculate_stars_and_bars(constraint, &allowed_charmap);
        block.shuffle(&mut rand::thread_rng());
        blocks.push(block);
    }

    if !blocks.is_empty() {
        blocks.shuffle(&mut rand::thread_rng());

        match recurse(
            0,
            &CharMultiset::default(),
            &blocks,
            ruleset,
            &at_most_maps,
            &allowed_charmap,
            previous_passwords,
        ) {
            Some(password) => Ok(password),
            None => Err(ImcryptError::ConstraintsConflict),
        }
    } else {
        attempt_generation(
            &CharMultiset::default(),
            &allowed_charmap,
            ruleset.same_char_max,
            ruleset.min_length,
            ruleset.max_length,
            &at_most_maps,
            previous_passwords,
        )
        .map_err(|_| ImcryptError::GenerationFailed)
    }
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    i: usize,
    buf: &CharMultiset,
    blocks: &[Vec<CharMultiset>],
    ruleset: &Ruleset,
    at_most_maps: &[ConstraintWithMap],
    allowed_charmap: &HashMap<char, bool>,
    previous_passwords: &[String],
) -> Option<String> {
    if i == blocks.len() {
        return attempt_generation(
            buf,
            allowed_charmap,
            ruleset.same_char_max,
            ruleset.min_length,
            ruleset.max_length,
            at_most_maps,
            previous_passwords,
        )
        .ok();
    }

    for candidate in &blocks[i] {
        if let Ok(merged) = merge_candidates(buf, candidate, ruleset, at_most_maps) {
            if let Some(result) = recurse(
                i + 1,
                &merged,
                blocks,
                ruleset,
                at_most_maps,
                allowed_charmap,
                previous_passwords,
            ) {
                return Some(result);
            }
        }
    }

    None
}

/// Finds all anagram-distinct combinations-with-repetition of length
/// `constraint.iterations` drawn from `constraint.charset`, subject to the
/// allowed-charmap.
///
/// Note: mirrors a quirk in the combination search this was ported from --
/// the inner loop aborts the whole recursive branch (rather than skipping
/// just the disallowed rune) the moment it meets a charset rune that isn't
/// in `accm`. When an at-least constraint's charset isn't a subset of the
/// ruleset's allowed charset, this can under-enumerate valid candidates.
/// Preserved deliberately -- see DESIGN.md.
fn calculate_stars_and_bars(
    constraint: &IterationConstraint,
    accm: &HashMap<char, bool>,
) -> Vec<CharMultiset> {
    let runes: Vec<char> = constraint.charset.chars().collect();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut buf: Vec<CharMultiset> = Vec::new();
    let mut cur: Vec<char> = Vec::with_capacity(constraint.iterations);

    fn rec(
        start: usize,
        depth: usize,
        iterations: usize,
        runes: &[char],
        accm: &HashMap<char, bool>,
        cur: &mut Vec<char>,
        seen: &mut std::collections::HashSet<String>,
        buf: &mut Vec<CharMultiset>,
    ) {
        if depth == iterations {
            let mut sorted = cur.clone();
            sorted.sort_unstable();
            let raw: String = sorted.into_iter().collect();
            if seen.insert(raw.clone()) {
                buf.push(CharMultiset::from_str(&raw));
            }
            return;
        }

        for i in start..runes.len() {
            if !accm.get(&runes[i]).copied().unwrap_or(false) {
                return;
            }

            cur.push(runes[i]);
            rec(i, depth + 1, iterations, runes, accm, cur, seen, buf);
            cur.pop();
        }
    }

    rec(
        0,
        0,
        constraint.iterations,
        &runes,
        accm,
        &mut cur,
        &mut seen,
        &mut buf,
    );

    buf
}

fn merge_candidates(
    a: &CharMultiset,
    b: &CharMultiset,
    ruleset: &Ruleset,
    at_most_maps: &[ConstraintWithMap],
) -> std::result::Result<CharMultiset, ()> {
    let merged = a.merge(b);

    if ruleset.same_char_max > 0 && merged.charmap.values().any(|&c| c > ruleset.same_char_max) {
        return Err(());
    }

    for amc in at_most_maps {
        let mut total = 0;
        for (rune, ok) in &amc.charset_map {
            if *ok {
                total += merged.charmap.get(rune).copied().unwrap_or(0);
                if total > amc.iterations {
                    return Err(());
                }
            }
        }
    }

    if merged.size() > ruleset.max_length {
        return Err(());
    }

    Ok(merged)
}

fn attempt_generation(
    base: &CharMultiset,
    allowed_charmap: &HashMap<char, bool>,
    same_char_max: usize,
    min_length: usize,
    max_length: usize,
    at_most_maps: &[ConstraintWithMap],
    previous_passwords: &[String],
) -> std::result::Result<String, ()> {
    let min_length = min_length.max(base.size());
    if min_length > max_length {
        return Err(());
    }

    'szloop: for sz in min_length..=max_length {
        let mut candidate = base.clone();
        let mut pool = get_char_pool(allowed_charmap, same_char_max, at_most_maps, &candidate);

        while candidate.size() < sz {
            if pool.is_empty() {
                continue 'szloop;
            }
            let picked = pick_one(&pool);
            *candidate.charmap.entry(picked).or_insert(0) += 1;
            pool = get_char_pool(allowed_charmap, same_char_max, at_most_maps, &candidate);
        }

        let s = candidate.build();
        let attempts = s.chars().count().min(5);
        let mut shuffled = s;
        for _ in 0..attempts {
            shuffled = shuffle_string(&shuffled);
            if !previous_passwords.iter().any(|p| p == &shuffled) {
                return Ok(shuffled);
            }
        }
        return Err(());
    }

    Err(())
}

fn get_char_pool(
    allowed_charmap: &HashMap<char, bool>,
    same_char_max: usize,
    at_most_maps: &[ConstraintWithMap],
    s: &CharMultiset,
) -> Vec<char> {
    let mut usage: Vec<usize> = vec![0; at_most_maps.len()];
    let mut at_budget: Vec<bool> = vec![false; at_most_maps.len()];

    for (i, amc) in at_most_maps.iter().enumerate() {
        let mut total = 0;
        for (rune, count) in &s.charmap {
            if amc.charset_map.get(rune).copied().unwrap_or(false) {
                total += count;
                if total >= amc.iterations {
                    at_budget[i] = true;
                    break;
                }
            }
        }
        usage[i] = total;
    }

    let mut pool = Vec::new();
    'mainloop: for &rune in allowed_charmap.keys() {
        if same_char_max > 0 && s.charmap.get(&rune).copied().unwrap_or(0) >= same_char_max {
            continue;
        }

        for (i, amc) in at_most_maps.iter().enumerate() {
            let in_set = amc.charset_map.get(&rune).copied().unwrap_or(false);
            if at_budget[i] || (in_set && usage[i] + 1 > amc.iterations) {
                continue 'mainloop;
            }
        }

        pool.push(rune);
    }

    pool
}

fn pick_one(pool: &[char]) -> char {
    *pool
        .choose(&mut rand::thread_rng())
        .expect("pool is non-empty at call site")
}

fn shuffle_string(s: &str) -> String {
    let mut chars: Vec<char> = s.chars().collect();
    chars.shuffle(&mut rand::thread_rng());
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_password_within_length_bounds() {
        let mut ruleset = Ruleset::default();
        ruleset.min_length = 8;
        ruleset.max_length = 12;
        ruleset.charset = "abcdefghijklmnopqrstuvwxyz0123456789".to_string();
        let password = generate(&ruleset, &[]).unwrap();
        let len = password.chars().count();
        assert!((8..=12).contains(&len));
    }

    #[test]
    fn generates_password_satisfying_at_least_constraint() {
        let mut ruleset = Ruleset::default();
        ruleset.min_length = 8;
        ruleset.max_length = 12;
        ruleset.charset = "abcdefghijklmnopqrstuvwxyz0123456789".to_string();
        ruleset.at_least_constraints = vec![IterationConstraint {
            iterations: 2,
            charset: "0123456789".to_string(),
        }];
        let password = generate(&ruleset, &[]).unwrap();
        let digit_count = password.chars().filter(|c| c.is_ascii_digit()).count();
        assert!(digit_count >= 2);
    }

    #[test]
    fn conflicting_constraints_fail_to_generate() {
        let mut ruleset = Ruleset::default();
        ruleset.min_length = 2;
        ruleset.max_length = 2;
        ruleset.charset = "ab".to_string();
        ruleset.at_least_constraints = vec![
            IterationConstraint {
                iterations: 2,
                charset: "a".to_string(),
            },
            IterationConstraint {
                iterations: 2,
                charset: "b".to_string(),
            },
        ];
        let result = generate(&ruleset, &[]);
        assert!(result.is_err());
    }
}

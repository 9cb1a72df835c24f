//! `CharMultiset`: a rune-to-count map used throughout the password
//! generator to represent "what characters, and how many of each, make up
//! this candidate string."
//!
//! `merge` is deliberately a per-char maximum, not a sum -- two candidate
//! blocks each requiring at least two 'a's merge to a requirement of two
//! 'a's, not four.

use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharMultiset {
    pub charmap: HashMap<char, usize>,
}

impl CharMultiset {
    pub fn from_str(s: &str) -> Self {
        let mut charmap = HashMap::new();
        for c in s.chars() {
            *charmap.entry(c).or_insert(0) += 1;
        }
        CharMultiset { charmap }
    }

    pub fn from_charmap(charmap: HashMap<char, usize>) -> Self {
        CharMultiset { charmap }
    }

    /// Rebuilds a string from this multiset. Order among distinct
    /// characters is unspecified beyond being stable for a given map.
    pub fn build(&self) -> String {
        let mut s = String::new();
        let mut chars: Vec<&char> = self.charmap.keys().collect();
        chars.sort();
        for c in chars {
            let count = self.charmap[c];
            for _ in 0..count {
                s.push(*c);
            }
        }
        s
    }

    /// Total character count.
    pub fn size(&self) -> usize {
        self.charmap.values().sum()
    }

    /// Merges `other` into a new multiset by taking, per character, the
    /// maximum of the two counts.
    pub fn merge(&self, other: &CharMultiset) -> CharMultiset {
        let mut merged = self.charmap.clone();
        for (c, count) in &other.charmap {
            let entry = merged.entry(*c).or_insert(0);
            if *count > *entry {
                *entry = *count;
            }
        }
        CharMultiset { charmap: merged }
    }
}

//! Id generation for items, groups, and storage envelopes.
//!
//! Items and groups share a 6-character alphanumeric id namespace and must
//! be generated with collision checks against both maps. The storage id uses
//! the library's default length instead.

use std::collections::HashMap;

use crate::config::ITEM_ID_LEN;
use crate::error::{ImcryptError, Result};
use crate::model::{Group, Item};

const ALPHABET: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
    'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z',
];

/// Number of attempts before giving up on a collision-free id.
const MAX_ATTEMPTS: usize = 1_000;

/// Generates a 6-character id that collides with neither `items` nor
/// `groups`.
pub fn generate_item_or_group_id(
    items: &HashMap<String, Item>,
    groups: &HashMap<String, Group>,
) -> Result<String> {
    for _ in 0..MAX_ATTEMPTS {
        let candidate = nanoid::nanoid!(ITEM_ID_LEN, &ALPHABET);
        if !items.contains_key(&candidate) && !groups.contains_key(&candidate) {
            return Ok(candidate);
        }
    }
    Err(ImcryptError::IdExhausted)
}

/// Generates a storage id at the library's default nanoid length.
pub fn generate_storage_id() -> String {
    nanoid::nanoid!()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_have_expected_length() {
        let items = HashMap::new();
        let groups = HashMap::new();
        let id = generate_item_or_group_id(&items, &groups).unwrap();
        assert_eq!(id.chars().count(), ITEM_ID_LEN);
    }

    #[test]
    fn avoids_existing_ids() {
        let mut items = HashMap::new();
        let groups = HashMap::new();
        // Force a collision scenario is impractical deterministically; this
        // just checks that an id already present in neither map is distinct
        // across repeated calls with reinsertion.
        for _ in 0..20 {
            let id = generate_item_or_group_id(&items, &groups).unwrap();
            assert!(!items.contains_key(&id));
            items.insert(id, Item::default());
        }
    }
}

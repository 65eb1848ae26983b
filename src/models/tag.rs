//! Tags are shared labels; a card can carry many and a tag can sit on cards in any deck.
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Trims a user-typed tag name. `None` when nothing is left.
pub fn normalize_name(name: &str) -> Option<&str> {
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}

/// Splits a comma-separated list such as `"verbs, food,,verbs"` into distinct names, in order.
pub fn split_names(raw: &str) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for name in raw.split(',').filter_map(normalize_name) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

//! Domain model for an expense category.

use serde::{Deserialize, Serialize};

/// A parent-managed expense category. An expense transaction may only use a
/// category whose `active_for` set contains the spending child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    /// Child ids this category is usable for.
    pub active_for: Vec<String>,
}

impl Category {
    pub fn generate_id(timestamp_millis: u64, ordinal: usize) -> String {
        format!("cat-{}-{}", timestamp_millis, ordinal)
    }

    pub fn is_active_for(&self, child_id: &str) -> bool {
        self.active_for.iter().any(|id| id == child_id)
    }
}

/// Categories seeded into every newly created family.
pub const DEFAULT_CATEGORY_NAMES: [&str; 5] = ["Toys", "Sweets", "Books", "Games", "Clothes"];

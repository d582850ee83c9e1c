//! # Operation Outcomes

use serde::{Deserialize, Serialize};

/// Result of a removal. Removing something absent is not an error, so
/// callers can retry cleanup loops safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Removal {
    /// The item existed and was removed.
    Removed,
    /// The item did not exist; nothing changed.
    NotFound,
}

impl Removal {
    /// `true` if something was removed.
    pub fn was_removed(self) -> bool {
        matches!(self, Self::Removed)
    }
}

impl From<bool> for Removal {
    fn from(removed: bool) -> Self {
        if removed {
            Self::Removed
        } else {
            Self::NotFound
        }
    }
}

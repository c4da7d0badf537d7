use serde::{Deserialize, Serialize};

/// Tuning for [`CanonicalTreeBuilder`](crate::CanonicalTreeBuilder).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeBuilderConfig {
    /// Buffered changes before they are folded into an intermediate tree.
    pub max_pending_changes: usize,
}

impl Default for TreeBuilderConfig {
    fn default() -> Self {
        Self {
            max_pending_changes: 1_000_000,
        }
    }
}

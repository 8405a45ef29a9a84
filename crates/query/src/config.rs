//! Statement layer configuration.

use serde::{Deserialize, Serialize};

/// Limits applied when compiling statements.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementConfig {
    /// Maximum number of parameter markers in one statement.
    pub max_parameters: usize,
    /// Maximum nesting of parentheses and NOT in a condition.
    pub max_nesting: usize,
}

impl Default for StatementConfig {
    fn default() -> Self {
        Self {
            max_parameters: 16,
            max_nesting: 32,
        }
    }
}

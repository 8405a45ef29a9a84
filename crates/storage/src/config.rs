//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Limits applied by the fact table engine.
///
/// Every field has a default, so a partial document deserializes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum nesting depth of transactions.
    pub max_transaction_depth: usize,
    /// Upper bound on rows returned by one select.
    pub max_result_rows: usize,
    /// Maximum number of columns in a table.
    pub max_columns: usize,
    /// Maximum number of comparisons in one condition.
    pub max_conditions: usize,
    /// Initial bucket hint for new row stores.
    pub initial_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_transaction_depth: 16,
            max_result_rows: 8192,
            max_columns: 64,
            max_conditions: 64,
            initial_capacity: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_transaction_depth, 16);
        assert_eq!(config.max_result_rows, 8192);
    }

    #[test]
    fn test_partial_json() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_result_rows": 10}"#).unwrap();
        assert_eq!(config.max_result_rows, 10);
        assert_eq!(config.max_columns, 64);
    }
}

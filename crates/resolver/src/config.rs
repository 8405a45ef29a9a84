//! Resolver configuration.

use serde::{Deserialize, Serialize};

/// Resolver limits and behaviour switches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum nesting of context frames while a script runs.
    pub max_frame_depth: usize,
    /// Target brought up to date by `Resolver::resolve_auto`; all targets when unset.
    pub auto_update_target: Option<String>,
    /// Retry failed targets on every pass instead of waiting for an input change.
    pub retry_failed: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_frame_depth: 64,
            auto_update_target: None,
            retry_failed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json() {
        let config: ResolverConfig = serde_json::from_str(r#"{"auto_update_target": "all"}"#).unwrap();
        assert_eq!(config.auto_update_target.as_deref(), Some("all"));
        assert_eq!(config.max_frame_depth, 64);
        assert!(!config.retry_failed);
    }
}

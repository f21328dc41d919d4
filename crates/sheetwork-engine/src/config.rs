//! Engine configuration

use serde::{Deserialize, Serialize};

/// Tunables for the copy engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum nesting depth followed before a chain is treated as corrupt
    pub max_depth: u32,
    /// Suffix appended to the name of a duplicated sheet or measure
    pub copy_name_suffix: String,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With depth cap
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// With copy-name suffix
    #[inline]
    #[must_use]
    pub fn with_copy_name_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.copy_name_suffix = suffix.into();
        self
    }

    /// Name given to a copy of `name`
    #[inline]
    #[must_use]
    pub fn copy_name(&self, name: &str) -> String {
        format!("{name}{}", self.copy_name_suffix)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            copy_name_suffix: " (copy)".to_string(),
        }
    }
}

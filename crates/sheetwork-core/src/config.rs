//! Workspace configuration
//!
//! Loaded from TOML; every section and key is optional.
//!
//! ```toml
//! default_project = "p1"
//!
//! [engine]
//! max_depth = 32
//! copy_name_suffix = " (copy)"
//!
//! [commit]
//! max_batch_writes = 500
//! ```

use serde::{Deserialize, Serialize};
use sheetwork_engine::EngineConfig;
use sheetwork_store::CommitConfig;
use std::path::Path;

/// Full configuration of a [`Workspace`](crate::Workspace)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Copy engine tunables
    pub engine: EngineConfig,
    /// Commit tunables
    pub commit: CommitConfig,
    /// Project used when a caller names none
    pub default_project: Option<String>,
}

impl WorkspaceConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown value types
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if it is malformed
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// With engine configuration
    #[inline]
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// With commit configuration
    #[inline]
    #[must_use]
    pub fn with_commit(mut self, commit: CommitConfig) -> Self {
        self.commit = commit;
        self
    }

    /// With default project
    #[inline]
    #[must_use]
    pub fn with_default_project(mut self, project: impl Into<String>) -> Self {
        self.default_project = Some(project.into());
        self
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// Malformed TOML
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn empty_text_gives_defaults() {
        assert_eq!(WorkspaceConfig::from_toml_str("").unwrap(), WorkspaceConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = WorkspaceConfig::from_toml_str(
            "default_project = \"p9\"\n[engine]\nmax_depth = 4\n[commit]\nmax_batch_writes = 20\n",
        )
        .unwrap();
        assert_eq!(config.default_project.as_deref(), Some("p9"));
        assert_eq!(config.engine.max_depth, 4);
        assert_eq!(config.engine.copy_name_suffix, " (copy)");
        assert_eq!(config.commit.max_batch_writes, 20);
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\ncopy_name_suffix = \" - dup\"").unwrap();
        let config = WorkspaceConfig::from_path(file.path()).unwrap();
        assert_eq!(config.engine.copy_name("Q1"), "Q1 - dup");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = WorkspaceConfig::from_path(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn wrong_type_is_parse_error() {
        let err = WorkspaceConfig::from_toml_str("[engine]\nmax_depth = \"deep\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

//! Analyzer configuration: strictness, warning, and validation toggles
//! loaded from a TOML file.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
  pub strict_mode: bool,
  pub allow_unsafe: bool,
  pub check_ownership: bool,
  pub validate_ffi: bool,
  pub enable_warnings: bool,
  pub test_mode: bool,
  pub max_errors: usize,
}

impl Default for AnalyzerConfig {
  fn default() -> Self {
    Self {
      strict_mode: false,
      allow_unsafe: true,
      check_ownership: true,
      validate_ffi: true,
      enable_warnings: true,
      test_mode: false,
      max_errors: 200,
    }
  }
}

impl AnalyzerConfig {
  /// Load from a TOML file at `path`, falling back to [`Default::default`]
  /// when the file does not exist. A malformed file is a hard error: the
  /// caller asked for this config explicitly.
  pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
    match std::fs::read_to_string(path) {
      Ok(contents) => toml::from_str(&contents).map_err(ConfigError::Parse),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
      Err(e) => Err(ConfigError::Io(e)),
    }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("reading analyzer config: {0}")]
  Io(#[source] std::io::Error),
  #[error("parsing analyzer config: {0}")]
  Parse(#[source] toml::de::Error),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_falls_back_to_default() {
    let cfg = AnalyzerConfig::load_or_default(Path::new("/nonexistent/path/to/langsem.toml")).unwrap();
    assert!(cfg.allow_unsafe);
    assert_eq!(cfg.max_errors, 200);
  }

  #[test]
  fn parses_partial_toml_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("langsem.toml");
    std::fs::write(&path, "strict_mode = true\nmax_errors = 50\n").unwrap();
    let cfg = AnalyzerConfig::load_or_default(&path).unwrap();
    assert!(cfg.strict_mode);
    assert_eq!(cfg.max_errors, 50);
    assert!(cfg.allow_unsafe, "unspecified fields should keep their default");
  }
}

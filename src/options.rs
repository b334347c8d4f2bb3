/// Parser configuration
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("Failed to read options file at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse parser options: {source}")]
    Parse {
        #[from]
        source: serde_json::Error,
    },
}

/// Which definition a label resolves to when it is defined more than once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateLabelPolicy {
    #[default]
    FirstWins,
    LastWins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParseOptions {
    /// Recognize `===` / `---` underlines as setext headings. Default: `true`.
    pub setext_headings: bool,
    /// Resolution of repeated reference labels. Default: first definition wins.
    pub duplicate_labels: DuplicateLabelPolicy,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            setext_headings: true,
            duplicate_labels: DuplicateLabelPolicy::default(),
        }
    }
}

impl ParseOptions {
    pub fn from_json(text: &str) -> Result<Self, OptionsError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, OptionsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| OptionsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_fields_take_defaults() {
        assert_eq!(ParseOptions::from_json("{}").unwrap(), ParseOptions::default());
    }

    #[test]
    fn test_fields_are_snake_case() {
        let options =
            ParseOptions::from_json(r#"{"setext_headings": false, "duplicate_labels": "last_wins"}"#)
                .unwrap();
        assert!(!options.setext_headings);
        assert_eq!(options.duplicate_labels, DuplicateLabelPolicy::LastWins);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = ParseOptions::from_json(r#"{"tables": true}"#).unwrap_err();
        assert!(matches!(err, OptionsError::Parse { .. }));
        assert!(err.to_string().starts_with("Failed to parse parser options"));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = ParseOptions::load_from_path("/nonexistent/leafmark.json").unwrap_err();
        assert!(matches!(err, OptionsError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/leafmark.json"));
    }
}

//! Error type shared by every operation of the feature engine.

use thiserror::Error;

/// Whole-operation failures.
///
/// Per-item problems (an unknown segment, a pair of taxa without a shared
/// concept, a short wordlist record) never surface here; they degrade to a
/// default value where they occur.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Feature table is not available: line {line}: {message}")]
    Table { line: usize, message: String },
    #[error("No rows available for {operation}.")]
    NoRows { operation: &'static str },
    #[error("Missing wordlist.")]
    MissingWordlist,
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("tree construction failed: {0}")]
    Tree(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FeatureError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn table(line: usize, message: impl Into<String>) -> Self {
        Self::Table {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn tree(err: impl std::fmt::Display) -> Self {
        Self::Tree(err.to_string())
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, FeatureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rows_message() {
        let err = FeatureError::NoRows {
            operation: "distances",
        };
        assert_eq!(err.to_string(), "No rows available for distances.");
    }

    #[test]
    fn test_unknown_action_message() {
        let err = FeatureError::UnknownAction("frobnicate".to_string());
        assert_eq!(err.to_string(), "Unknown action: frobnicate");
    }
}

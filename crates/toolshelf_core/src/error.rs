//! Core error types for TOOLSHELF.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Which kind of record an id or error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    /// A category in the registry document
    Category,
    /// A tool in a category document
    Tool,
}

impl RecordKind {
    /// Lowercase label used in logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category => write!(f, "Category"),
            Self::Tool => write!(f, "Tool"),
        }
    }
}

/// Core error type
///
/// Raised before any I/O happens: everything here is a caller error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Identifier is empty or not a safe path segment
    #[error("Invalid {kind} id {value:?}: {reason}")]
    InvalidId {
        /// Record the id was meant for
        kind: RecordKind,
        /// Rejected input
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// A required field is missing or blank
    #[error("Invalid {field}: {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidId {
            kind: RecordKind::Category,
            value: "../etc".to_string(),
            reason: "must not start with '.'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid Category id \"../etc\": must not start with '.'"
        );

        let err = CoreError::InvalidField {
            field: "name",
            reason: "must not be blank".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid name: must not be blank");
    }

    #[test]
    fn test_record_kind_labels() {
        assert_eq!(RecordKind::Category.as_str(), "category");
        assert_eq!(RecordKind::Tool.to_string(), "Tool");
    }
}

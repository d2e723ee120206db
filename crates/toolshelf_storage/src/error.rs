//! Errors returned by hierarchy operations.

use crate::document::StoreError;
use toolshelf_core::{CategoryEntry, CategoryId, CoreError, RecordKind, Tool};

/// Hierarchy result type
pub type HierarchyResult<T> = Result<T, HierarchyError>;

/// Which multi-step operation was interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Registry updated, category directory/document not created
    AddCategory,
    /// Category document updated, tool directory/page not created
    AddTool,
    /// Category document updated, tool directory not removed
    DeleteTool,
    /// Registry updated, category directory not removed
    DeleteCategory,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddCategory => write!(f, "add category"),
            Self::AddTool => write!(f, "add tool"),
            Self::DeleteTool => write!(f, "delete tool"),
            Self::DeleteCategory => write!(f, "delete category"),
        }
    }
}

/// Record whose metadata and directory disagree after a partial failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Orphan {
    /// A category record (registry entry, or the removed entry for deletes)
    Category(CategoryEntry),
    /// A tool record in a category document
    Tool {
        /// Owning category
        category: CategoryId,
        /// The tool record
        tool: Tool,
    },
}

impl std::fmt::Display for Orphan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Category(entry) => write!(f, "category {}", entry.id),
            Self::Tool { category, tool } => write!(f, "tool {}/{}", category, tool.id),
        }
    }
}

/// Error taxonomy exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Unsafe or empty id
    InvalidId,
    /// Other invalid caller input (blank name)
    InvalidField,
    /// Record already present
    AlreadyExists,
    /// Record absent
    NotFound,
    /// Persisted document is corrupt
    ParseError,
    /// Environment fault
    IoError,
    /// Metadata and filesystem disagree
    PartialFailure,
    /// Lock wait exceeded the configured bound
    Timeout,
    /// Operation never ran
    Cancelled,
}

impl FailureKind {
    /// Whether the caller can fix this by changing the request (4xx-like)
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidId | Self::InvalidField | Self::AlreadyExists | Self::NotFound
        )
    }
}

/// Hierarchy error
#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    /// Caller input rejected before any I/O
    #[error(transparent)]
    Invalid(#[from] CoreError),

    /// Record already present
    #[error("{kind} already exists: {id}")]
    AlreadyExists {
        /// Record kind
        kind: RecordKind,
        /// Record id
        id: String,
    },

    /// Record absent
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind
        kind: RecordKind,
        /// Record id
        id: String,
    },

    /// Metadata step succeeded, filesystem step failed
    #[error("Partial failure during {operation} of {orphan}: {source}")]
    PartialFailure {
        /// Interrupted operation
        operation: Operation,
        /// Record needing reconciliation
        orphan: Box<Orphan>,
        /// The failed filesystem step
        source: StoreError,
    },

    /// Document store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Blocking task was dropped before it ran
    #[error("Operation cancelled")]
    Cancelled,
}

impl HierarchyError {
    pub(crate) fn not_found(kind: RecordKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn already_exists(kind: RecordKind, id: impl ToString) -> Self {
        Self::AlreadyExists {
            kind,
            id: id.to_string(),
        }
    }

    /// Classify into the caller-facing taxonomy
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Invalid(CoreError::InvalidId { .. }) => FailureKind::InvalidId,
            Self::Invalid(CoreError::InvalidField { .. }) => FailureKind::InvalidField,
            Self::AlreadyExists { .. } => FailureKind::AlreadyExists,
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::PartialFailure { .. } => FailureKind::PartialFailure,
            Self::Store(StoreError::Parse { .. }) => FailureKind::ParseError,
            Self::Store(StoreError::LockTimeout { .. }) => FailureKind::Timeout,
            // A document that vanished under a write path is an environment fault.
            Self::Store(StoreError::NotFound { .. } | StoreError::Io { .. } | StoreError::Encode { .. }) => {
                FailureKind::IoError
            }
            Self::Cancelled => FailureKind::Cancelled,
        }
    }

    /// The record needing reconciliation, for partial failures
    #[must_use]
    pub fn orphan(&self) -> Option<&Orphan> {
        match self {
            Self::PartialFailure { orphan, .. } => Some(&**orphan),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_kind_mapping() {
        let invalid: HierarchyError = CoreError::InvalidId {
            kind: RecordKind::Tool,
            value: "a/b".to_string(),
            reason: "character '/' is not allowed".to_string(),
        }
        .into();
        assert_eq!(invalid.kind(), FailureKind::InvalidId);
        assert!(invalid.kind().is_caller_error());

        let missing = HierarchyError::not_found(RecordKind::Category, "math");
        assert_eq!(missing.kind(), FailureKind::NotFound);
        assert_eq!(missing.to_string(), "Category not found: math");

        let timeout: HierarchyError = StoreError::LockTimeout {
            path: PathBuf::from("/srv/tools/config.json"),
            waited: Duration::from_millis(5),
        }
        .into();
        assert_eq!(timeout.kind(), FailureKind::Timeout);
        assert!(!timeout.kind().is_caller_error());
    }

    #[test]
    fn test_partial_failure_carries_orphan() {
        let entry = CategoryEntry::new(CategoryId::parse("math").unwrap(), "Math", "Abacus");
        let err = HierarchyError::PartialFailure {
            operation: Operation::AddCategory,
            orphan: Box::new(Orphan::Category(entry.clone())),
            source: StoreError::io(
                &PathBuf::from("/srv/tools/categories/math"),
                std::io::Error::other("disk full"),
            ),
        };
        assert_eq!(err.kind(), FailureKind::PartialFailure);
        assert_eq!(err.orphan(), Some(&Orphan::Category(entry)));
        assert!(err.to_string().contains("add category of category math"));
    }
}

//! Identifiers for TOOLSHELF records.
//!
//! Category and tool ids double as directory names on disk, so both are
//! restricted to a conservative path-segment alphabet. An id that exists as a
//! value of these types has already been validated; deserialization goes
//! through the same check.

use crate::error::{CoreError, CoreResult, RecordKind};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Maximum id length in bytes
pub const MAX_ID_LEN: usize = 64;

/// Check that `value` is usable as a single directory name.
///
/// Allowed: ASCII letters, digits, `-`, `_` and `.`, not starting with `.`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidId`] describing the first violated rule.
pub fn validate_segment(kind: RecordKind, value: &str) -> CoreResult<()> {
    let reject = |reason: &str| CoreError::InvalidId {
        kind,
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if value.is_empty() {
        return Err(reject("must not be empty"));
    }
    if value.len() > MAX_ID_LEN {
        return Err(reject(&format!("must be at most {MAX_ID_LEN} bytes")));
    }
    if value.starts_with('.') {
        return Err(reject("must not start with '.'"));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(reject(&format!("character {bad:?} is not allowed")));
    }
    Ok(())
}

macro_rules! segment_id {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap an id
            ///
            /// # Errors
            ///
            /// Returns error if the value is not a safe path segment
            pub fn parse(value: &str) -> CoreResult<Self> {
                validate_segment($kind, value)?;
                Ok(Self(value.to_string()))
            }

            /// Get as string slice
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                validate_segment($kind, &value)?;
                Ok(Self(value))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

segment_id!(
    /// Category identifier - unique within the registry, names the category directory
    CategoryId,
    RecordKind::Category
);

segment_id!(
    /// Tool identifier - unique within one category document, names the tool directory
    ToolId,
    RecordKind::Tool
);

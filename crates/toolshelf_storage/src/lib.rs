//! TOOLSHELF Storage
//!
//! Category/tool hierarchy kept as JSON documents mirrored by a directory
//! tree. Documents are replaced atomically and mutated under per-document
//! locks; multi-step operations report partial failures explicitly.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audit;
pub mod config;
pub mod document;
pub mod error;
pub mod hierarchy;
pub mod layout;
pub mod lock;
pub mod service;

pub use audit::{AuditReport, ToolLocation, UnreadableDocument};
pub use config::StoreConfig;
pub use document::{ConfigStore, DocumentLock, StoreError};
pub use error::{FailureKind, HierarchyError, HierarchyResult, Operation, Orphan};
pub use hierarchy::HierarchyManager;
pub use layout::{AssetKind, AssetScope, Layout};
pub use service::AsyncHierarchy;

//! Consistency audit between metadata and the directory tree.
//!
//! Read-only. The report is a snapshot taken without locks, so an audit that
//! runs concurrently with mutations may report transient differences.

use crate::document::StoreError;
use crate::error::HierarchyResult;
use crate::hierarchy::HierarchyManager;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use toolshelf_core::{CategoryDocument, CategoryId};
use tracing::{debug, info};

/// A tool named by its category and id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ToolLocation {
    /// Category directory name
    pub category: String,
    /// Tool directory name
    pub tool: String,
}

impl ToolLocation {
    fn new(category: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            tool: tool.into(),
        }
    }
}

/// Category document that exists but cannot be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreadableDocument {
    /// Owning category
    pub category: CategoryId,
    /// Read or parse failure
    pub error: String,
}

/// Differences between metadata and the filesystem
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// Registered categories with no directory
    pub missing_category_dirs: Vec<CategoryId>,
    /// Registered categories with a directory but no document
    pub missing_category_documents: Vec<CategoryId>,
    /// Category documents that fail to read or parse
    pub unreadable_category_documents: Vec<UnreadableDocument>,
    /// Category directories with no registry entry
    pub orphan_category_dirs: Vec<String>,
    /// Recorded tools with no directory
    pub missing_tool_dirs: Vec<ToolLocation>,
    /// Recorded tools whose directory lacks an entry page
    pub missing_entry_pages: Vec<ToolLocation>,
    /// Tool directories with no record
    pub orphan_tool_dirs: Vec<ToolLocation>,
    /// Category ids registered more than once
    pub duplicate_categories: Vec<CategoryId>,
    /// Tool ids recorded more than once in one document
    pub duplicate_tools: Vec<ToolLocation>,
}

impl AuditReport {
    /// No differences found
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.issue_count() == 0
    }

    /// Total number of findings
    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.missing_category_dirs.len()
            + self.missing_category_documents.len()
            + self.unreadable_category_documents.len()
            + self.orphan_category_dirs.len()
            + self.missing_tool_dirs.len()
            + self.missing_entry_pages.len()
            + self.orphan_tool_dirs.len()
            + self.duplicate_categories.len()
            + self.duplicate_tools.len()
    }
}

// Visible subdirectory names; a missing parent lists as empty.
fn subdirectories(dir: &Path) -> Result<BTreeSet<String>, StoreError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(source) => return Err(StoreError::io(dir, source)),
    };

    let mut names = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|source| StoreError::io(dir, source))?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if entry.path().is_dir() {
            names.insert(name);
        }
    }
    Ok(names)
}

impl HierarchyManager {
    /// Compare every record against the directory tree.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the registry is corrupt, or `IoError` if a
    /// directory cannot be listed
    pub fn audit(&self) -> HierarchyResult<AuditReport> {
        let layout = self.layout();
        let registry = self.registry_document()?;
        let mut report = AuditReport::default();

        let mut registered = BTreeSet::new();
        for entry in &registry.categories {
            if !registered.insert(entry.id.as_str().to_string()) {
                report.duplicate_categories.push(entry.id.clone());
                continue;
            }

            let category_dir = layout.category_dir(&entry.id);
            if !category_dir.is_dir() {
                report.missing_category_dirs.push(entry.id.clone());
                continue;
            }

            let document = match self
                .store()
                .read::<CategoryDocument>(&layout.category_document(&entry.id))
            {
                Ok(document) => document,
                Err(StoreError::NotFound { .. }) => {
                    report.missing_category_documents.push(entry.id.clone());
                    continue;
                }
                Err(err) => {
                    report.unreadable_category_documents.push(UnreadableDocument {
                        category: entry.id.clone(),
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            let mut recorded = BTreeSet::new();
            for tool in &document.tools {
                let location = ToolLocation::new(entry.id.as_str(), tool.id.as_str());
                if !recorded.insert(tool.id.as_str().to_string()) {
                    report.duplicate_tools.push(location);
                    continue;
                }
                let tool_dir = layout.tool_dir(&entry.id, &tool.id);
                if !tool_dir.is_dir() {
                    report.missing_tool_dirs.push(location);
                } else if !layout.entry_page(&entry.id, &tool.id).is_file() {
                    report.missing_entry_pages.push(location);
                }
            }

            for name in subdirectories(&layout.category_tools_dir(&entry.id))? {
                if !recorded.contains(&name) {
                    report
                        .orphan_tool_dirs
                        .push(ToolLocation::new(entry.id.as_str(), name));
                }
            }
        }

        for name in subdirectories(&layout.categories_dir())? {
            if !registered.contains(&name) {
                report.orphan_category_dirs.push(name);
            }
        }

        if report.is_consistent() {
            debug!(categories = registered.len(), "audit clean");
        } else {
            info!(issues = report.issue_count(), "audit found inconsistencies");
        }
        Ok(report)
    }
}

//! On-disk layout of the managed tree.
//!
//! ```text
//! root/tools/config.json                               registry document
//! root/tools/categories/{category}/config.json         category document
//! root/tools/categories/{category}/tools/{tool}/index.html
//! ```
//!
//! Every path is built from validated ids, never from caller-supplied paths.

use std::path::{Path, PathBuf};
use toolshelf_core::{CategoryId, ToolId};

/// Directory holding the registry and every category
pub const TOOLS_DIR: &str = "tools";
/// Directory holding one subdirectory per category
pub const CATEGORIES_DIR: &str = "categories";
/// File name of both the registry and category documents
pub const DOCUMENT_FILE: &str = "config.json";
/// File name of a tool's entry page
pub const ENTRY_PAGE_FILE: &str = "index.html";
/// Private state directory under the root
pub const STATE_DIR: &str = ".toolshelf";
/// Lock files, below [`STATE_DIR`]
pub const LOCKS_DIR: &str = "locks";

/// Kind of static asset directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// First-party sources (`src/`)
    Src,
    /// Third-party files (`vendor/`)
    Vendor,
}

impl AssetKind {
    /// Directory name
    #[must_use]
    pub const fn dir_name(&self) -> &'static str {
        match self {
            Self::Src => "src",
            Self::Vendor => "vendor",
        }
    }
}

/// Level at which an asset directory lives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetScope {
    /// Application root
    Root,
    /// The `tools/` directory
    Tools,
    /// One category directory
    Category(CategoryId),
    /// One tool directory
    Tool(CategoryId, ToolId),
}

/// Path computations for one root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Create a layout under `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Application root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `root/tools`
    #[must_use]
    pub fn tools_dir(&self) -> PathBuf {
        self.root.join(TOOLS_DIR)
    }

    /// `root/tools/config.json`
    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.tools_dir().join(DOCUMENT_FILE)
    }

    /// `root/tools/categories`
    #[must_use]
    pub fn categories_dir(&self) -> PathBuf {
        self.tools_dir().join(CATEGORIES_DIR)
    }

    /// Directory of one category
    #[must_use]
    pub fn category_dir(&self, category: &CategoryId) -> PathBuf {
        self.categories_dir().join(category.as_str())
    }

    /// Document of one category
    #[must_use]
    pub fn category_document(&self, category: &CategoryId) -> PathBuf {
        self.category_dir(category).join(DOCUMENT_FILE)
    }

    /// `tools/` directory inside a category
    #[must_use]
    pub fn category_tools_dir(&self, category: &CategoryId) -> PathBuf {
        self.category_dir(category).join(TOOLS_DIR)
    }

    /// Directory of one tool
    #[must_use]
    pub fn tool_dir(&self, category: &CategoryId, tool: &ToolId) -> PathBuf {
        self.category_tools_dir(category).join(tool.as_str())
    }

    /// Entry page of one tool
    #[must_use]
    pub fn entry_page(&self, category: &CategoryId, tool: &ToolId) -> PathBuf {
        self.tool_dir(category, tool).join(ENTRY_PAGE_FILE)
    }

    /// Cross-process lock directory.
    ///
    /// Holds one lock file per document ever locked. Files are never removed,
    /// including after a category is deleted, because another process may
    /// still hold or be waiting on one.
    #[must_use]
    pub fn locks_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR).join(LOCKS_DIR)
    }

    /// Asset directory for a scope
    #[must_use]
    pub fn asset_dir(&self, scope: &AssetScope, kind: AssetKind) -> PathBuf {
        let base = match scope {
            AssetScope::Root => self.root.clone(),
            AssetScope::Tools => self.tools_dir(),
            AssetScope::Category(category) => self.category_dir(category),
            AssetScope::Tool(category, tool) => self.tool_dir(category, tool),
        };
        base.join(kind.dir_name())
    }
}

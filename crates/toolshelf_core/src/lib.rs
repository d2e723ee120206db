//! TOOLSHELF Core Types
//!
//! Pure types and logic with no I/O: validated ids, the category/tool
//! records, the registry and category document shapes, and the default
//! entry page.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod id;
pub mod model;
pub mod page;

// Re-exports
pub use error::{CoreError, CoreResult, RecordKind};
pub use id::{CategoryId, MAX_ID_LEN, ToolId, validate_segment};
pub use model::{
    Category, CategoryDocument, CategoryEntry, DEFAULT_CATEGORY_ICON, DEFAULT_TOOL_ICON,
    NewCategory, NewTool, RegistryDocument, Tool, category_path, tool_path,
};
pub use page::{escape_html, render_entry_page};

//! Category and tool records, and the two document shapes they live in.
//!
//! `path` fields are derived from ids. They are written out so the persisted
//! JSON keeps its familiar shape, but a persisted `path` is never trusted on
//! the way back in: decoding recomputes it.

use crate::error::{CoreError, CoreResult};
use crate::id::{CategoryId, ToolId};
use serde::{Deserialize, Serialize};

/// Icon used when a category is created without one
pub const DEFAULT_CATEGORY_ICON: &str = "DocumentAdd";

/// Icon used when a tool is created without one
pub const DEFAULT_TOOL_ICON: &str = "Aim";

/// Canonical URL path of a category page
#[must_use]
pub fn category_path(id: &CategoryId) -> String {
    format!("/tools/categories/{id}")
}

/// Canonical entry page path of a tool, relative to its category
#[must_use]
pub fn tool_path(id: &ToolId) -> String {
    format!("./tools/{id}/index.html")
}

fn non_blank(field: &'static str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::InvalidField {
            field,
            reason: "must not be blank".to_string(),
        });
    }
    Ok(())
}

fn icon_or(icon: Option<String>, default: &str) -> String {
    match icon {
        Some(icon) if !icon.trim().is_empty() => icon,
        _ => default.to_string(),
    }
}

/// Category metadata as stored in the registry document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CategoryRecord")]
pub struct CategoryEntry {
    /// Category id
    pub id: CategoryId,
    /// Display name
    pub name: String,
    /// Icon identifier
    pub icon: String,
    path: String,
}

impl CategoryEntry {
    /// Create an entry, deriving its path
    #[must_use]
    pub fn new(id: CategoryId, name: impl Into<String>, icon: impl Into<String>) -> Self {
        let path = category_path(&id);
        Self {
            id,
            name: name.into(),
            icon: icon.into(),
            path,
        }
    }

    /// Canonical category path
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Deserialize)]
struct CategoryRecord {
    id: String,
    name: String,
    #[serde(default)]
    icon: Option<String>,
}

impl TryFrom<CategoryRecord> for CategoryEntry {
    type Error = CoreError;

    fn try_from(record: CategoryRecord) -> Result<Self, Self::Error> {
        let id = CategoryId::try_from(record.id)?;
        Ok(Self::new(
            id,
            record.name,
            icon_or(record.icon, DEFAULT_CATEGORY_ICON),
        ))
    }
}

/// Tool metadata as stored in a category document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ToolRecord")]
pub struct Tool {
    /// Tool id
    pub id: ToolId,
    /// Display name
    pub name: String,
    /// Free text
    pub description: String,
    /// Icon identifier
    pub icon: String,
    path: String,
}

impl Tool {
    /// Create a tool record, deriving its path
    #[must_use]
    pub fn new(
        id: ToolId,
        name: impl Into<String>,
        description: impl Into<String>,
        icon: impl Into<String>,
    ) -> Self {
        let path = tool_path(&id);
        Self {
            id,
            name: name.into(),
            description: description.into(),
            icon: icon.into(),
            path,
        }
    }

    /// Entry page path relative to the category
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Deserialize)]
struct ToolRecord {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: Option<String>,
}

impl TryFrom<ToolRecord> for Tool {
    type Error = CoreError;

    fn try_from(record: ToolRecord) -> Result<Self, Self::Error> {
        let id = ToolId::try_from(record.id)?;
        Ok(Self::new(
            id,
            record.name,
            record.description,
            icon_or(record.icon, DEFAULT_TOOL_ICON),
        ))
    }
}

/// Read view of a category: registry metadata joined with its tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    /// Registry metadata
    #[serde(flatten)]
    pub entry: CategoryEntry,
    /// Tools from the category document, in document order
    pub tools: Vec<Tool>,
}

impl Category {
    /// Join an entry with its tools
    #[must_use]
    pub fn new(entry: CategoryEntry, tools: Vec<Tool>) -> Self {
        Self { entry, tools }
    }

    /// Category id
    #[must_use]
    pub fn id(&self) -> &CategoryId {
        &self.entry.id
    }
}

/// Top-level registry document: `{ "categories": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDocument {
    /// Categories in insertion order
    #[serde(default)]
    pub categories: Vec<CategoryEntry>,
}

impl RegistryDocument {
    /// Find a category entry by id
    #[must_use]
    pub fn find(&self, id: &CategoryId) -> Option<&CategoryEntry> {
        self.categories.iter().find(|c| &c.id == id)
    }

    /// Check whether a category id is present
    #[must_use]
    pub fn contains(&self, id: &CategoryId) -> bool {
        self.find(id).is_some()
    }

    /// Remove every entry with this id, returning the first removed
    pub fn remove(&mut self, id: &CategoryId) -> Option<CategoryEntry> {
        let index = self.categories.iter().position(|c| &c.id == id)?;
        let removed = self.categories.remove(index);
        self.categories.retain(|c| &c.id != id);
        Some(removed)
    }
}

/// Per-category document: `{ "tools": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDocument {
    /// Tools in insertion order
    #[serde(default)]
    pub tools: Vec<Tool>,
}

impl CategoryDocument {
    /// Find a tool by id
    #[must_use]
    pub fn find(&self, id: &ToolId) -> Option<&Tool> {
        self.tools.iter().find(|t| &t.id == id)
    }

    /// Check whether a tool id is present
    #[must_use]
    pub fn contains(&self, id: &ToolId) -> bool {
        self.find(id).is_some()
    }

    /// Remove every tool with this id, returning the first removed
    pub fn remove(&mut self, id: &ToolId) -> Option<Tool> {
        let index = self.tools.iter().position(|t| &t.id == id)?;
        let removed = self.tools.remove(index);
        self.tools.retain(|t| &t.id != id);
        Some(removed)
    }
}

/// Request to create a category
///
/// Carries plain caller input; nothing here is trusted until [`NewCategory::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    /// Requested id
    pub id: String,
    /// Display name
    pub name: String,
    /// Icon, defaulted when absent or blank
    pub icon: Option<String>,
}

impl NewCategory {
    /// Create a request
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: None,
        }
    }

    /// Set the icon
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Validate into a registry entry
    ///
    /// # Errors
    ///
    /// Returns error if the id is unsafe or the name is blank
    pub fn validate(&self) -> CoreResult<CategoryEntry> {
        let id = CategoryId::parse(&self.id)?;
        non_blank("name", &self.name)?;
        Ok(CategoryEntry::new(
            id,
            self.name.clone(),
            icon_or(self.icon.clone(), DEFAULT_CATEGORY_ICON),
        ))
    }
}

/// Request to create a tool inside a category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTool {
    /// Requested id
    pub id: String,
    /// Display name
    pub name: String,
    /// Description, empty when absent
    pub description: Option<String>,
    /// Icon, defaulted when absent or blank
    pub icon: Option<String>,
}

impl NewTool {
    /// Create a request
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            icon: None,
        }
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the icon
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Validate into a tool record
    ///
    /// # Errors
    ///
    /// Returns error if the id is unsafe or the name is blank
    pub fn validate(&self) -> CoreResult<Tool> {
        let id = ToolId::parse(&self.id)?;
        non_blank("name", &self.name)?;
        Ok(Tool::new(
            id,
            self.name.clone(),
            self.description.clone().unwrap_or_default(),
            icon_or(self.icon.clone(), DEFAULT_TOOL_ICON),
        ))
    }
}

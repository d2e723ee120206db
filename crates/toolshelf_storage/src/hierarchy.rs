//! Category/tool hierarchy over the registry and category documents.
//!
//! Each mutation pairs a metadata change with a directory change. Metadata is
//! written first; if the directory step then fails the operation reports
//! [`HierarchyError::PartialFailure`] naming the record to reconcile, instead
//! of claiming success or pretending nothing happened.
//!
//! Locking: the registry document lock is always taken before a category
//! document lock. Operations on different categories never contend.

use crate::config::StoreConfig;
use crate::document::{ConfigStore, StoreError};
use crate::error::{HierarchyError, HierarchyResult, Operation, Orphan};
use crate::layout::{AssetKind, AssetScope, Layout};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use toolshelf_core::{
    Category, CategoryDocument, CategoryEntry, CategoryId, NewCategory, NewTool, RecordKind,
    RegistryDocument, Tool, ToolId, render_entry_page,
};
use tracing::{info, warn};

fn create_dir_all(path: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(path).map_err(|source| StoreError::io(path, source))
}

fn remove_tree(path: &Path) -> Result<(), StoreError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StoreError::io(path, source)),
    }
}

/// Owner of the managed directory tree and every document in it
#[derive(Debug)]
pub struct HierarchyManager {
    store: ConfigStore,
    layout: Layout,
}

impl HierarchyManager {
    /// Create a manager from its parts
    #[must_use]
    pub fn new(store: ConfigStore, layout: Layout) -> Self {
        Self { store, layout }
    }

    /// Create a manager from configuration
    #[must_use]
    pub fn open(config: &StoreConfig) -> Self {
        let layout = Layout::new(config.root.clone());
        let store = ConfigStore::from_config(config, &layout);
        Self::new(store, layout)
    }

    /// Path layout
    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Underlying document store
    #[must_use]
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Create the tree skeleton and an empty registry if none exists.
    ///
    /// Idempotent; an existing registry is left untouched.
    ///
    /// # Errors
    ///
    /// Returns error if directories cannot be created, or the existing
    /// registry is corrupt
    pub fn initialize(&self) -> HierarchyResult<()> {
        create_dir_all(&self.layout.categories_dir())?;
        let registry_path = self.layout.registry_path();
        let _registry = self.store.lock(&registry_path)?;
        match self.store.read::<RegistryDocument>(&registry_path) {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound { .. }) => {
                self.store.write(&registry_path, &RegistryDocument::default())?;
                info!(path = %registry_path.display(), "registry created");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Registry document as stored; a missing registry reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the registry is corrupt
    pub fn registry_document(&self) -> HierarchyResult<RegistryDocument> {
        Ok(self.store.read_or_default(&self.layout.registry_path())?)
    }

    /// Category document as stored; a missing document reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `InvalidId` for an unsafe id and `ParseError` if the document
    /// is corrupt
    pub fn category_document(&self, category: &str) -> HierarchyResult<CategoryDocument> {
        let category = CategoryId::parse(category)?;
        Ok(self
            .store
            .read_or_default(&self.layout.category_document(&category))?)
    }

    fn entry(&self, category: &CategoryId) -> HierarchyResult<CategoryEntry> {
        self.registry_document()?
            .find(category)
            .cloned()
            .ok_or_else(|| HierarchyError::not_found(RecordKind::Category, category))
    }

    // Read path: a missing or corrupt category document degrades to no tools.
    fn tools_or_empty(&self, category: &CategoryId) -> Vec<Tool> {
        match self
            .store
            .read::<CategoryDocument>(&self.layout.category_document(category))
        {
            Ok(document) => document.tools,
            Err(err) => {
                warn!(category = %category, error = %err, "category document unreadable, listing without tools");
                Vec::new()
            }
        }
    }

    /// All categories in registry order, each with its tools.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the registry itself is corrupt; per-category
    /// document failures only empty that category's tool list
    pub fn list_categories(&self) -> HierarchyResult<Vec<Category>> {
        let registry = self.registry_document()?;
        Ok(registry
            .categories
            .into_iter()
            .map(|entry| {
                let tools = self.tools_or_empty(&entry.id);
                Category::new(entry, tools)
            })
            .collect())
    }

    /// One category with its tools.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the category is not in the registry
    pub fn get_category(&self, category: &str) -> HierarchyResult<Category> {
        let category = CategoryId::parse(category)?;
        let entry = self.entry(&category)?;
        let tools = self.tools_or_empty(&category);
        Ok(Category::new(entry, tools))
    }

    /// Tools of one category in document order.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the category is not in the registry
    pub fn list_tools(&self, category: &str) -> HierarchyResult<Vec<Tool>> {
        let category = CategoryId::parse(category)?;
        self.entry(&category)?;
        Ok(self.tools_or_empty(&category))
    }

    /// Register a category and create its directory and empty document.
    ///
    /// A directory left behind by an earlier failed delete is reused; its
    /// stale tool directories are removed so they cannot outlive the fresh
    /// empty document.
    ///
    /// # Errors
    ///
    /// `InvalidId`/`InvalidField` for bad input, `AlreadyExists` if the id is
    /// registered, `PartialFailure` if the registry was updated but the
    /// directory or document could not be created
    pub fn add_category(&self, request: &NewCategory) -> HierarchyResult<CategoryEntry> {
        let entry = request.validate()?;
        let registry_path = self.layout.registry_path();
        let document_path = self.layout.category_document(&entry.id);

        let _registry = self.store.lock(&registry_path)?;
        let mut registry: RegistryDocument = self.store.read_or_default(&registry_path)?;
        if registry.contains(&entry.id) {
            return Err(HierarchyError::already_exists(RecordKind::Category, &entry.id));
        }

        let _document = self.store.lock(&document_path)?;
        create_dir_all(&self.layout.categories_dir())?;
        registry.categories.push(entry.clone());
        self.store.write(&registry_path, &registry)?;

        let category_dir = self.layout.category_dir(&entry.id);
        if category_dir.exists() {
            warn!(category = %entry.id, path = %category_dir.display(), "clearing leftover category directory");
        }
        let created = create_dir_all(&category_dir)
            .and_then(|()| remove_tree(&self.layout.category_tools_dir(&entry.id)))
            .and_then(|()| self.store.write(&document_path, &CategoryDocument::default()));
        if let Err(source) = created {
            warn!(category = %entry.id, error = %source, "category registered but its directory is incomplete");
            return Err(HierarchyError::PartialFailure {
                operation: Operation::AddCategory,
                orphan: Box::new(Orphan::Category(entry)),
                source,
            });
        }

        info!(category = %entry.id, name = %entry.name, "category added");
        Ok(entry)
    }

    /// Add a tool to a category, creating its directory and entry page.
    ///
    /// # Errors
    ///
    /// `InvalidId`/`InvalidField` for bad input, `NotFound` if the category
    /// does not exist, `AlreadyExists` if the tool id is in the category
    /// document, `PartialFailure` if the document was updated but the tool
    /// directory or page could not be created
    pub fn add_tool(&self, category: &str, request: &NewTool) -> HierarchyResult<Tool> {
        let category = CategoryId::parse(category)?;
        let tool = request.validate()?;
        self.entry(&category)?;

        let document_path = self.layout.category_document(&category);
        let _document = self.store.lock(&document_path)?;
        let mut document: CategoryDocument = match self.store.read(&document_path) {
            Err(StoreError::NotFound { .. }) => {
                return Err(HierarchyError::not_found(RecordKind::Category, &category));
            }
            other => other?,
        };
        if document.contains(&tool.id) {
            return Err(HierarchyError::already_exists(RecordKind::Tool, &tool.id));
        }

        document.tools.push(tool.clone());
        self.store.write(&document_path, &document)?;

        let created = create_dir_all(&self.layout.tool_dir(&category, &tool.id)).and_then(|()| {
            self.store.write_bytes(
                &self.layout.entry_page(&category, &tool.id),
                render_entry_page(&tool).as_bytes(),
            )
        });
        if let Err(source) = created {
            warn!(category = %category, tool = %tool.id, error = %source, "tool recorded but its directory is incomplete");
            return Err(HierarchyError::PartialFailure {
                operation: Operation::AddTool,
                orphan: Box::new(Orphan::Tool { category, tool }),
                source,
            });
        }

        info!(category = %category, tool = %tool.id, name = %tool.name, "tool added");
        Ok(tool)
    }

    /// Remove a tool record, then its directory tree.
    ///
    /// # Errors
    ///
    /// `NotFound` if the category is not registered, or its document or the
    /// tool is absent, `PartialFailure` if the record was removed but the
    /// directory was not
    pub fn delete_tool(&self, category: &str, tool: &str) -> HierarchyResult<Tool> {
        let category = CategoryId::parse(category)?;
        let tool = ToolId::parse(tool)?;
        self.entry(&category)?;

        let document_path = self.layout.category_document(&category);
        let _document = self.store.lock(&document_path)?;
        let mut document: CategoryDocument = match self.store.read(&document_path) {
            Err(StoreError::NotFound { .. }) => {
                return Err(HierarchyError::not_found(RecordKind::Category, &category));
            }
            other => other?,
        };
        let removed = document
            .remove(&tool)
            .ok_or_else(|| HierarchyError::not_found(RecordKind::Tool, &tool))?;
        self.store.write(&document_path, &document)?;

        if let Err(source) = remove_tree(&self.layout.tool_dir(&category, &tool)) {
            warn!(category = %category, tool = %tool, error = %source, "tool removed but its directory remains");
            return Err(HierarchyError::PartialFailure {
                operation: Operation::DeleteTool,
                orphan: Box::new(Orphan::Tool {
                    category,
                    tool: removed,
                }),
                source,
            });
        }

        info!(category = %category, tool = %tool, "tool deleted");
        Ok(removed)
    }

    /// Remove a category from the registry, then its whole directory tree.
    ///
    /// Holds the category document lock while removing, so it serializes
    /// with tool operations on the same category.
    ///
    /// # Errors
    ///
    /// `NotFound` if the category is not registered, `PartialFailure` if the
    /// entry was removed but the directory was not
    pub fn delete_category(&self, category: &str) -> HierarchyResult<CategoryEntry> {
        let category = CategoryId::parse(category)?;
        let registry_path = self.layout.registry_path();

        let _registry = self.store.lock(&registry_path)?;
        let mut registry: RegistryDocument = self.store.read_or_default(&registry_path)?;
        let removed = registry
            .remove(&category)
            .ok_or_else(|| HierarchyError::not_found(RecordKind::Category, &category))?;

        let _document = self.store.lock(&self.layout.category_document(&category))?;
        self.store.write(&registry_path, &registry)?;

        if let Err(source) = remove_tree(&self.layout.category_dir(&category)) {
            warn!(category = %category, error = %source, "category unregistered but its directory remains");
            return Err(HierarchyError::PartialFailure {
                operation: Operation::DeleteCategory,
                orphan: Box::new(Orphan::Category(removed)),
                source,
            });
        }

        info!(category = %category, "category deleted");
        Ok(removed)
    }

    /// Entry page of an existing tool.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the category, the tool, or the page is absent
    pub fn entry_page(&self, category: &str, tool: &str) -> HierarchyResult<PathBuf> {
        let category = CategoryId::parse(category)?;
        let tool = ToolId::parse(tool)?;
        self.require_tool(&category, &tool)?;
        let page = self.layout.entry_page(&category, &tool);
        if !page.is_file() {
            return Err(HierarchyError::not_found(RecordKind::Tool, &tool));
        }
        Ok(page)
    }

    /// Asset directory for a scope whose records exist.
    ///
    /// The directory itself may not exist; assets are optional.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the scope names an absent category or tool
    pub fn asset_dir(&self, scope: &AssetScope, kind: AssetKind) -> HierarchyResult<PathBuf> {
        match scope {
            AssetScope::Root | AssetScope::Tools => {}
            AssetScope::Category(category) => {
                self.entry(category)?;
            }
            AssetScope::Tool(category, tool) => self.require_tool(category, tool)?,
        }
        Ok(self.layout.asset_dir(scope, kind))
    }

    fn require_tool(&self, category: &CategoryId, tool: &ToolId) -> HierarchyResult<()> {
        self.entry(category)?;
        let document: CategoryDocument = match self.store.read(&self.layout.category_document(category)) {
            Err(StoreError::NotFound { .. }) => {
                return Err(HierarchyError::not_found(RecordKind::Category, category));
            }
            other => other?,
        };
        if !document.contains(tool) {
            return Err(HierarchyError::not_found(RecordKind::Tool, tool));
        }
        Ok(())
    }

    /// Overwrite the registry with an empty document.
    ///
    /// Explicit recovery for a corrupt registry; category directories are
    /// left in place and show up in [`HierarchyManager::audit`] as orphans.
    ///
    /// # Errors
    ///
    /// Returns error if the registry cannot be written
    pub fn reset_registry(&self) -> HierarchyResult<()> {
        create_dir_all(&self.layout.tools_dir())?;
        let registry_path = self.layout.registry_path();
        self.store.with_lock(&registry_path, || {
            self.store.write(&registry_path, &RegistryDocument::default())
        })?;
        warn!(path = %registry_path.display(), "registry reset to empty");
        Ok(())
    }

    /// Overwrite a registered category's document with an empty one.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the category is not registered, or an I/O error
    pub fn reset_category_document(&self, category: &str) -> HierarchyResult<()> {
        let category = CategoryId::parse(category)?;
        self.entry(&category)?;
        create_dir_all(&self.layout.category_dir(&category))?;
        let document_path = self.layout.category_document(&category);
        self.store.with_lock(&document_path, || {
            self.store.write(&document_path, &CategoryDocument::default())
        })?;
        warn!(category = %category, "category document reset to empty");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn manager() -> (TempDir, HierarchyManager) {
        let dir = tempfile::tempdir().unwrap();
        let manager = HierarchyManager::open(&StoreConfig::with_root(dir.path()));
        manager.initialize().unwrap();
        (dir, manager)
    }

    fn math(manager: &HierarchyManager) -> CategoryEntry {
        manager
            .add_category(&NewCategory::new("math", "Math Tools").with_icon("Abacus"))
            .unwrap()
    }

    #[test]
    fn test_scenario_add_and_delete() {
        let (_dir, manager) = manager();
        let layout = manager.layout().clone();
        assert!(manager.list_categories().unwrap().is_empty());

        let entry = math(&manager);
        assert_eq!(entry.path(), "/tools/categories/math");
        let registry = manager.registry_document().unwrap();
        assert_eq!(registry.categories, vec![entry.clone()]);
        let math_id = entry.id.clone();
        assert_eq!(
            manager.store().read::<CategoryDocument>(&layout.category_document(&math_id)).unwrap(),
            CategoryDocument::default()
        );

        let tool = manager
            .add_tool("math", &NewTool::new("calc", "Calculator").with_description("").with_icon("Aim"))
            .unwrap();
        assert_eq!(tool.path(), "./tools/calc/index.html");
        let tools = manager.list_tools("math").unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "Calculator");
        assert!(layout.entry_page(&math_id, &tool.id).is_file());

        let before = manager.category_document("math").unwrap();
        let again = manager.add_tool("math", &NewTool::new("calc", "Calculator"));
        assert_eq!(again.unwrap_err().kind(), FailureKind::AlreadyExists);
        assert_eq!(manager.category_document("math").unwrap(), before);

        manager.delete_tool("math", "calc").unwrap();
        assert!(manager.list_tools("math").unwrap().is_empty());
        assert!(!layout.tool_dir(&math_id, &tool.id).exists());

        manager.delete_category("math").unwrap();
        assert!(manager.registry_document().unwrap().categories.is_empty());
        assert!(!layout.category_dir(&math_id).exists());

        let missing = manager.delete_category("math").unwrap_err();
        assert_eq!(missing.kind(), FailureKind::NotFound);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let (_dir, manager) = manager();
        math(&manager);
        manager.initialize().unwrap();
        assert_eq!(manager.list_categories().unwrap().len(), 1);
    }

    #[test]
    fn test_add_category_without_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let manager = HierarchyManager::open(&StoreConfig::with_root(dir.path()));
        math(&manager);
        assert!(manager.layout().registry_path().is_file());
    }

    #[test]
    fn test_duplicate_category_leaves_registry_unchanged() {
        let (_dir, manager) = manager();
        math(&manager);
        let before = std::fs::read(manager.layout().registry_path()).unwrap();

        let err = manager
            .add_category(&NewCategory::new("math", "Other"))
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::AlreadyExists);
        assert_eq!(std::fs::read(manager.layout().registry_path()).unwrap(), before);
    }

    #[test]
    fn test_invalid_input_rejected_before_io() {
        let (_dir, manager) = manager();
        for id in ["", "..", "a/b", "../../etc"] {
            let err = manager.add_category(&NewCategory::new(id, "X")).unwrap_err();
            assert_eq!(err.kind(), FailureKind::InvalidId, "{id:?}");
        }
        let err = manager.add_category(&NewCategory::new("ok", " ")).unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidField);
        assert!(manager.registry_document().unwrap().categories.is_empty());
    }

    #[test]
    fn test_add_tool_requires_category() {
        let (_dir, manager) = manager();
        let err = manager.add_tool("ghost", &NewTool::new("calc", "Calculator")).unwrap_err();
        assert!(matches!(
            err,
            HierarchyError::NotFound { kind: RecordKind::Category, .. }
        ));
        assert!(!manager.layout().categories_dir().join("ghost").exists());
    }

    #[test]
    fn test_list_tools_unknown_category() {
        let (_dir, manager) = manager();
        assert_eq!(manager.list_tools("ghost").unwrap_err().kind(), FailureKind::NotFound);
        assert_eq!(manager.get_category("ghost").unwrap_err().kind(), FailureKind::NotFound);
    }

    #[test]
    fn test_tool_ids_scoped_per_category() {
        let (_dir, manager) = manager();
        math(&manager);
        manager.add_category(&NewCategory::new("physics", "Physics")).unwrap();
        manager.add_tool("math", &NewTool::new("calc", "Calculator")).unwrap();
        manager.add_tool("physics", &NewTool::new("calc", "Calculator")).unwrap();

        let categories = manager.list_categories().unwrap();
        assert_eq!(categories.len(), 2);
        assert!(categories.iter().all(|c| c.tools.len() == 1));
    }

    #[test]
    fn test_listing_degrades_per_category() {
        let (_dir, manager) = manager();
        math(&manager);
        manager.add_category(&NewCategory::new("physics", "Physics")).unwrap();
        manager.add_tool("physics", &NewTool::new("lens", "Lens")).unwrap();

        let math_id = CategoryId::parse("math").unwrap();
        std::fs::write(manager.layout().category_document(&math_id), "not json").unwrap();

        let categories = manager.list_categories().unwrap();
        assert_eq!(categories[0].id().as_str(), "math");
        assert!(categories[0].tools.is_empty());
        assert_eq!(categories[1].tools.len(), 1);

        // Write paths surface the corruption.
        let err = manager.add_tool("math", &NewTool::new("calc", "Calculator")).unwrap_err();
        assert_eq!(err.kind(), FailureKind::ParseError);
        assert_eq!(manager.category_document("math").unwrap_err().kind(), FailureKind::ParseError);

        manager.reset_category_document("math").unwrap();
        manager.add_tool("math", &NewTool::new("calc", "Calculator")).unwrap();
    }

    #[test]
    fn test_corrupt_registry_surfaces_and_resets() {
        let (_dir, manager) = manager();
        math(&manager);
        std::fs::write(manager.layout().registry_path(), "{ \"categories\": [").unwrap();

        assert_eq!(manager.list_categories().unwrap_err().kind(), FailureKind::ParseError);
        let err = manager.add_category(&NewCategory::new("art", "Art")).unwrap_err();
        assert_eq!(err.kind(), FailureKind::ParseError);

        manager.reset_registry().unwrap();
        assert!(manager.list_categories().unwrap().is_empty());
    }

    #[test]
    fn test_delete_tool_is_exact() {
        let (_dir, manager) = manager();
        math(&manager);
        for id in ["a", "b", "c"] {
            manager.add_tool("math", &NewTool::new(id, id.to_uppercase())).unwrap();
        }
        let math_id = CategoryId::parse("math").unwrap();
        let page_b = manager.layout().entry_page(&math_id, &ToolId::parse("b").unwrap());
        let page_c = manager.layout().entry_page(&math_id, &ToolId::parse("c").unwrap());
        let c_before = std::fs::read(&page_c).unwrap();

        manager.delete_tool("math", "b").unwrap();

        let ids: Vec<_> = manager
            .list_tools("math")
            .unwrap()
            .into_iter()
            .map(|t| t.id.to_string())
            .collect();
        assert_eq!(ids, ["a", "c"]);
        assert!(!page_b.exists());
        assert_eq!(std::fs::read(&page_c).unwrap(), c_before);

        let err = manager.delete_tool("math", "b").unwrap_err();
        assert!(matches!(err, HierarchyError::NotFound { kind: RecordKind::Tool, .. }));
    }

    #[test]
    fn test_add_category_partial_failure() {
        let (_dir, manager) = manager();
        // A file where the category directory should go.
        std::fs::write(manager.layout().categories_dir().join("math"), "blocker").unwrap();

        let err = manager.add_category(&NewCategory::new("math", "Math Tools")).unwrap_err();
        assert_eq!(err.kind(), FailureKind::PartialFailure);
        match err.orphan() {
            Some(Orphan::Category(entry)) => assert_eq!(entry.id.as_str(), "math"),
            other => panic!("unexpected orphan: {other:?}"),
        }
        // The registry entry stays, and is visible to the operator.
        assert!(manager.registry_document().unwrap().contains(&CategoryId::parse("math").unwrap()));
        assert!(!manager.audit().unwrap().is_consistent());
    }

    #[test]
    fn test_add_tool_partial_failure() {
        let (_dir, manager) = manager();
        let entry = math(&manager);
        let tools_dir = manager.layout().category_tools_dir(&entry.id);
        std::fs::create_dir_all(&tools_dir).unwrap();
        std::fs::write(tools_dir.join("calc"), "blocker").unwrap();

        let err = manager.add_tool("math", &NewTool::new("calc", "Calculator")).unwrap_err();
        assert!(matches!(
            err,
            HierarchyError::PartialFailure { operation: Operation::AddTool, .. }
        ));
        assert_eq!(manager.list_tools("math").unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_delete_category_partial_failure() {
        let (_dir, manager) = manager();
        let entry = math(&manager);
        let category_dir = manager.layout().category_dir(&entry.id);
        std::fs::remove_dir_all(&category_dir).unwrap();
        std::fs::write(&category_dir, "not a directory").unwrap();

        let err = manager.delete_category("math").unwrap_err();
        assert!(matches!(
            err,
            HierarchyError::PartialFailure { operation: Operation::DeleteCategory, .. }
        ));
        assert!(manager.registry_document().unwrap().categories.is_empty());
    }

    #[test]
    fn test_delete_tolerates_missing_directory() {
        let (_dir, manager) = manager();
        let entry = math(&manager);
        let tool = manager.add_tool("math", &NewTool::new("calc", "Calculator")).unwrap();
        std::fs::remove_dir_all(manager.layout().tool_dir(&entry.id, &tool.id)).unwrap();

        manager.delete_tool("math", "calc").unwrap();
        assert!(manager.audit().unwrap().is_consistent());
    }

    #[test]
    fn test_readd_category_clears_leftover_tools() {
        let (_dir, manager) = manager();
        let entry = math(&manager);
        manager.add_tool("math", &NewTool::new("calc", "Calculator")).unwrap();
        let stale_tool = manager.layout().tool_dir(&entry.id, &ToolId::parse("calc").unwrap());

        // Registry entry gone, directory left behind.
        let mut registry = manager.registry_document().unwrap();
        registry.remove(&entry.id);
        manager.store().write(&manager.layout().registry_path(), &registry).unwrap();
        assert!(stale_tool.is_dir());

        math(&manager);
        assert!(!stale_tool.exists());
        assert!(manager.list_tools("math").unwrap().is_empty());
        assert!(manager.audit().unwrap().is_consistent());
    }

    #[test]
    fn test_delete_tool_requires_registered_category() {
        let (_dir, manager) = manager();
        let entry = math(&manager);
        manager.add_tool("math", &NewTool::new("calc", "Calculator")).unwrap();
        let tool_dir = manager.layout().tool_dir(&entry.id, &ToolId::parse("calc").unwrap());

        let mut registry = manager.registry_document().unwrap();
        registry.remove(&entry.id);
        manager.store().write(&manager.layout().registry_path(), &registry).unwrap();

        let err = manager.delete_tool("math", "calc").unwrap_err();
        assert!(matches!(
            err,
            HierarchyError::NotFound { kind: RecordKind::Category, .. }
        ));
        assert!(tool_dir.is_dir());
        assert_eq!(manager.category_document("math").unwrap().tools.len(), 1);
    }

    #[test]
    fn test_lock_files_outlive_deleted_category() {
        let (_dir, manager) = manager();
        let entry = math(&manager);
        let document = manager.layout().category_document(&entry.id);
        let lock_file = crate::lock::lock_file_path(
            &manager.layout().locks_dir(),
            &crate::lock::canonical_key(&document),
        );
        assert!(lock_file.is_file());

        manager.delete_category("math").unwrap();
        assert!(lock_file.is_file());
        assert!(manager.audit().unwrap().is_consistent());
    }

    #[test]
    fn test_entry_page_and_asset_dirs() {
        let (_dir, manager) = manager();
        let entry = math(&manager);
        let tool = manager.add_tool("math", &NewTool::new("calc", "Calculator")).unwrap();

        let page = manager.entry_page("math", "calc").unwrap();
        assert!(std::fs::read_to_string(page).unwrap().contains("<h1>Calculator</h1>"));
        assert_eq!(manager.entry_page("math", "nope").unwrap_err().kind(), FailureKind::NotFound);

        let dir = manager
            .asset_dir(&AssetScope::Tool(entry.id.clone(), tool.id.clone()), AssetKind::Src)
            .unwrap();
        assert!(dir.ends_with("tools/categories/math/tools/calc/src"));

        let ghost = AssetScope::Category(CategoryId::parse("ghost").unwrap());
        assert_eq!(
            manager.asset_dir(&ghost, AssetKind::Vendor).unwrap_err().kind(),
            FailureKind::NotFound
        );
        assert!(manager.asset_dir(&AssetScope::Root, AssetKind::Vendor).is_ok());
    }

    #[test]
    fn test_persisted_format_matches_existing_trees() {
        let (_dir, manager) = manager();
        let layout = manager.layout().clone();
        let raw = r#"{
  "categories": [
    {
      "id": "test_category",
      "name": "测试分类",
      "icon": "DocumentAdd",
      "path": "/tools/categories/test_category"
    }
  ]
}"#;
        std::fs::write(layout.registry_path(), raw).unwrap();
        let id = CategoryId::parse("test_category").unwrap();
        std::fs::create_dir_all(layout.category_dir(&id)).unwrap();
        std::fs::write(layout.category_document(&id), r#"{ "tools": [] }"#).unwrap();

        manager
            .add_tool(
                "test_category",
                &NewTool::new("test_tool", "测试工具").with_description("这是一个测试工具"),
            )
            .unwrap();
        let text = std::fs::read_to_string(layout.category_document(&id)).unwrap();
        assert!(text.contains("\"path\": \"./tools/test_tool/index.html\""));
        assert!(text.contains("测试工具"));

        manager.delete_category("test_category").unwrap();
        assert_eq!(std::fs::read_to_string(layout.registry_path()).unwrap(), "{\n  \"categories\": []\n}");
    }

    fn concurrent_add_tools(n: usize) {
        let (_dir, manager) = manager();
        math(&manager);

        std::thread::scope(|scope| {
            for i in 0..n {
                let manager = &manager;
                scope.spawn(move || {
                    manager
                        .add_tool("math", &NewTool::new(format!("tool-{i}"), format!("Tool {i}")))
                        .unwrap();
                });
            }
        });

        let ids: BTreeSet<String> = manager
            .list_tools("math")
            .unwrap()
            .into_iter()
            .map(|t| t.id.to_string())
            .collect();
        assert_eq!(ids.len(), n);
        assert!((0..n).all(|i| ids.contains(&format!("tool-{i}"))));
        assert!(manager.audit().unwrap().is_consistent());
    }

    #[test]
    fn test_concurrent_add_tool_2() {
        concurrent_add_tools(2);
    }

    #[test]
    fn test_concurrent_add_tool_10() {
        concurrent_add_tools(10);
    }

    #[test]
    fn test_concurrent_add_tool_50() {
        concurrent_add_tools(50);
    }

    #[test]
    fn test_concurrent_duplicate_category_single_winner() {
        let (_dir, manager) = manager();
        let shared = &manager;
        let outcomes: Vec<HierarchyResult<CategoryEntry>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(move || shared.add_category(&NewCategory::new("math", "Math"))))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind() == FailureKind::AlreadyExists));
        assert_eq!(manager.registry_document().unwrap().categories.len(), 1);
    }

    #[test]
    fn test_concurrent_tool_ops_and_category_delete_stay_consistent() {
        let (_dir, manager) = manager();
        math(&manager);

        std::thread::scope(|scope| {
            for i in 0..8 {
                let manager = &manager;
                scope.spawn(move || {
                    let _ = manager.add_tool("math", &NewTool::new(format!("t{i}"), "T"));
                });
            }
            scope.spawn(|| {
                let _ = manager.delete_category("math");
            });
        });

        assert!(manager.audit().unwrap().is_consistent());
    }

    #[derive(Debug, Clone)]
    enum Op {
        AddCategory(u8),
        DeleteCategory(u8),
        AddTool(u8, u8),
        DeleteTool(u8, u8),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4).prop_map(Op::AddCategory),
            (0u8..4).prop_map(Op::DeleteCategory),
            (0u8..4, 0u8..4).prop_map(|(c, t)| Op::AddTool(c, t)),
            (0u8..4, 0u8..4).prop_map(|(c, t)| Op::DeleteTool(c, t)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_add_category_unique(ids in proptest::collection::vec(0u8..6, 1..20)) {
            let (_dir, manager) = manager();
            let mut seen = BTreeSet::new();
            for id in ids {
                let id = format!("c{id}");
                let before = manager.registry_document().unwrap();
                let result = manager.add_category(&NewCategory::new(id.clone(), "C"));
                if seen.insert(id) {
                    prop_assert!(result.is_ok());
                } else {
                    prop_assert_eq!(result.unwrap_err().kind(), FailureKind::AlreadyExists);
                    prop_assert_eq!(manager.registry_document().unwrap(), before);
                }
            }
            let registry = manager.registry_document().unwrap();
            prop_assert_eq!(registry.categories.len(), seen.len());
        }

        #[test]
        fn prop_operations_preserve_invariants(ops in proptest::collection::vec(arb_op(), 1..30)) {
            let (_dir, manager) = manager();
            for op in ops {
                let result = match op {
                    Op::AddCategory(c) => manager.add_category(&NewCategory::new(format!("c{c}"), "C")).map(|_| ()),
                    Op::DeleteCategory(c) => manager.delete_category(&format!("c{c}")).map(|_| ()),
                    Op::AddTool(c, t) => manager
                        .add_tool(&format!("c{c}"), &NewTool::new(format!("t{t}"), "T"))
                        .map(|_| ()),
                    Op::DeleteTool(c, t) => manager.delete_tool(&format!("c{c}"), &format!("t{t}")).map(|_| ()),
                };
                if let Err(err) = result {
                    prop_assert!(err.kind().is_caller_error(), "unexpected failure: {err}");
                }
                let report = manager.audit().unwrap();
                prop_assert!(report.is_consistent(), "{report:?}");
            }
        }
    }
}

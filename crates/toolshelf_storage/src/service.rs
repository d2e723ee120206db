//! Async facade over [`HierarchyManager`].
//!
//! Every operation runs on tokio's blocking pool; the manager's locks are
//! plain thread locks and must not be held across an await point.

use crate::audit::AuditReport;
use crate::error::{HierarchyError, HierarchyResult};
use crate::hierarchy::HierarchyManager;
use std::sync::Arc;
use toolshelf_core::{Category, CategoryEntry, NewCategory, NewTool, Tool};

/// Cloneable async handle to a shared [`HierarchyManager`]
#[derive(Debug, Clone)]
pub struct AsyncHierarchy {
    inner: Arc<HierarchyManager>,
}

impl AsyncHierarchy {
    /// Wrap a manager
    #[must_use]
    pub fn new(manager: HierarchyManager) -> Self {
        Self {
            inner: Arc::new(manager),
        }
    }

    /// Borrow the blocking manager
    #[must_use]
    pub fn manager(&self) -> &HierarchyManager {
        &self.inner
    }

    async fn run<T, F>(&self, f: F) -> HierarchyResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&HierarchyManager) -> HierarchyResult<T> + Send + 'static,
    {
        let manager = Arc::clone(&self.inner);
        match tokio::task::spawn_blocking(move || f(&manager)).await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Err(HierarchyError::Cancelled),
        }
    }

    /// See [`HierarchyManager::initialize`].
    ///
    /// # Errors
    ///
    /// Same as the blocking call, plus `Cancelled` if the runtime shuts down
    pub async fn initialize(&self) -> HierarchyResult<()> {
        self.run(HierarchyManager::initialize).await
    }

    /// See [`HierarchyManager::list_categories`].
    ///
    /// # Errors
    ///
    /// Same as the blocking call, plus `Cancelled`
    pub async fn list_categories(&self) -> HierarchyResult<Vec<Category>> {
        self.run(HierarchyManager::list_categories).await
    }

    /// See [`HierarchyManager::get_category`].
    ///
    /// # Errors
    ///
    /// Same as the blocking call, plus `Cancelled`
    pub async fn get_category(&self, category: impl Into<String>) -> HierarchyResult<Category> {
        let category = category.into();
        self.run(move |m| m.get_category(&category)).await
    }

    /// See [`HierarchyManager::list_tools`].
    ///
    /// # Errors
    ///
    /// Same as the blocking call, plus `Cancelled`
    pub async fn list_tools(&self, category: impl Into<String>) -> HierarchyResult<Vec<Tool>> {
        let category = category.into();
        self.run(move |m| m.list_tools(&category)).await
    }

    /// See [`HierarchyManager::add_category`].
    ///
    /// # Errors
    ///
    /// Same as the blocking call, plus `Cancelled`
    pub async fn add_category(&self, request: NewCategory) -> HierarchyResult<CategoryEntry> {
        self.run(move |m| m.add_category(&request)).await
    }

    /// See [`HierarchyManager::add_tool`].
    ///
    /// # Errors
    ///
    /// Same as the blocking call, plus `Cancelled`
    pub async fn add_tool(&self, category: impl Into<String>, request: NewTool) -> HierarchyResult<Tool> {
        let category = category.into();
        self.run(move |m| m.add_tool(&category, &request)).await
    }

    /// See [`HierarchyManager::delete_tool`].
    ///
    /// # Errors
    ///
    /// Same as the blocking call, plus `Cancelled`
    pub async fn delete_tool(
        &self,
        category: impl Into<String>,
        tool: impl Into<String>,
    ) -> HierarchyResult<Tool> {
        let (category, tool) = (category.into(), tool.into());
        self.run(move |m| m.delete_tool(&category, &tool)).await
    }

    /// See [`HierarchyManager::delete_category`].
    ///
    /// # Errors
    ///
    /// Same as the blocking call, plus `Cancelled`
    pub async fn delete_category(&self, category: impl Into<String>) -> HierarchyResult<CategoryEntry> {
        let category = category.into();
        self.run(move |m| m.delete_category(&category)).await
    }

    /// See [`HierarchyManager::audit`].
    ///
    /// # Errors
    ///
    /// Same as the blocking call, plus `Cancelled`
    pub async fn audit(&self) -> HierarchyResult<AuditReport> {
        self.run(HierarchyManager::audit).await
    }
}

impl From<HierarchyManager> for AsyncHierarchy {
    fn from(manager: HierarchyManager) -> Self {
        Self::new(manager)
    }
}

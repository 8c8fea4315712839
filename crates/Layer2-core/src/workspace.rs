//! Workspace - 세션에 표시할 view / menu UID 선택
//!
//! Persisted as `workspaces/<name>.json`:
//!
//! ```json
//! { "views": { "tiles": [], "table": [], "custom": [] }, "menuitems": [] }
//! ```

use crate::plugin::{Plugin, PluginManager};
use crate::software::{SoftwareHandler, ViewKind};
use qavm_foundation::uid::is_key_valid;
use qavm_foundation::{Error, JsonStore, Result, Uid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

const WORKSPACE_DIR: &str = "workspaces";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceViews {
    #[serde(default)]
    pub tiles: Vec<String>,
    #[serde(default)]
    pub table: Vec<String>,
    #[serde(default)]
    pub custom: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(skip)]
    name: String,
    #[serde(default)]
    views: WorkspaceViews,
    #[serde(default)]
    menuitems: Vec<String>,
}

impl Workspace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Every view and menu item of every loaded handler
    pub fn from_manager(name: impl Into<String>, manager: &PluginManager) -> Self {
        let mut workspace = Self::new(name);
        for handler in manager.software_handlers() {
            for kind in ViewKind::ALL {
                workspace.views_mut(kind).extend(handler.view_uids(kind));
            }
            workspace.menuitems.extend(handler.menu_item_uids());
        }
        workspace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn views(&self, kind: ViewKind) -> &[String] {
        match kind {
            ViewKind::Tiles => &self.views.tiles,
            ViewKind::Table => &self.views.table,
            ViewKind::Custom => &self.views.custom,
        }
    }

    fn views_mut(&mut self, kind: ViewKind) -> &mut Vec<String> {
        match kind {
            ViewKind::Tiles => &mut self.views.tiles,
            ViewKind::Table => &mut self.views.table,
            ViewKind::Custom => &mut self.views.custom,
        }
    }

    pub fn menu_items(&self) -> &[String] {
        &self.menuitems
    }

    pub fn with_view(mut self, kind: ViewKind, uid: impl Into<String>) -> Self {
        self.views_mut(kind).push(uid.into());
        self
    }

    pub fn with_menu_item(mut self, uid: impl Into<String>) -> Self {
        self.menuitems.push(uid.into());
        self
    }

    /// True only when all four lists are empty
    pub fn is_empty(&self) -> bool {
        self.views.tiles.is_empty()
            && self.views.table.is_empty()
            && self.views.custom.is_empty()
            && self.menuitems.is_empty()
    }

    /// tiles, table, custom, menu items - in that order
    pub fn uids(&self) -> impl Iterator<Item = &str> {
        self.views
            .tiles
            .iter()
            .chain(&self.views.table)
            .chain(&self.views.custom)
            .chain(&self.menuitems)
            .map(String::as_str)
    }

    /// Handlers referenced by this workspace (first-seen order, no duplicates)
    /// and the UIDs that do not resolve. Stale UIDs never fail.
    pub fn get_involved_software_handlers(
        &self,
        manager: &PluginManager,
    ) -> (Vec<Arc<SoftwareHandler>>, BTreeSet<String>) {
        let mut handlers = Vec::new();
        let mut seen = BTreeSet::new();
        let mut unresolved = BTreeSet::new();

        for uid in self.uids() {
            match resolve(manager, uid) {
                Some(handler) => {
                    if seen.insert(handler.uid()) {
                        handlers.push(handler);
                    }
                }
                None => {
                    debug!(workspace = %self.name, uid, "Unresolved workspace UID");
                    unresolved.insert(uid.to_string());
                }
            }
        }
        (handlers, unresolved)
    }

    /// Plugins owning the involved handlers
    pub fn get_involved_plugins(&self, manager: &PluginManager) -> Vec<Arc<Plugin>> {
        let (handlers, _) = self.get_involved_software_handlers(manager);
        let mut seen = BTreeSet::new();
        handlers
            .iter()
            .filter(|h| seen.insert(h.plugin_id().to_string()))
            .filter_map(|h| manager.get_plugin(h.plugin_id()))
            .collect()
    }
}

/// A UID resolves when its handler is loaded and, if it carries a data path,
/// that path names one of the handler's views or menu items.
fn resolve(manager: &PluginManager, uid: &str) -> Option<Arc<SoftwareHandler>> {
    let parsed = Uid::parse(uid).ok()?;
    let handler = manager.get_software_handler(uid)?;
    match &parsed.data_path {
        Some(path) if !handler.has_data_path(path) => None,
        _ => Some(handler),
    }
}

// ============================================================================
// WorkspaceStore
// ============================================================================

/// `workspaces/<name>.json` under a [`JsonStore`]
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    store: JsonStore,
}

impl WorkspaceStore {
    pub fn new(store: JsonStore) -> Self {
        Self { store }
    }

    fn file_name(name: &str) -> Result<String> {
        if !is_key_valid(name) {
            return Err(Error::Validation(format!("invalid workspace name {name:?}")));
        }
        Ok(format!("{WORKSPACE_DIR}/{name}.json"))
    }

    pub fn load(&self, name: &str) -> Result<Workspace> {
        let file = Self::file_name(name)?;
        let mut workspace: Workspace = self
            .store
            .load_optional(&file)?
            .ok_or_else(|| Error::NotFound(format!("workspace {name}")))?;
        workspace.name = name.to_string();
        Ok(workspace)
    }

    pub fn save(&self, workspace: &Workspace) -> Result<()> {
        let file = Self::file_name(&workspace.name)?;
        self.store.save(&file, workspace)
    }

    /// NotFound when no such workspace was saved
    pub fn remove(&self, name: &str) -> Result<()> {
        let file = Self::file_name(name)?;
        if !self.store.exists(&file) {
            return Err(Error::NotFound(format!("workspace {name}")));
        }
        self.store.remove(&file)
    }

    pub fn list(&self) -> Vec<String> {
        self.store.list(WORKSPACE_DIR)
    }
}

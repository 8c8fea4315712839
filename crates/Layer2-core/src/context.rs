//! Discovery Context - 호스트에 명시적으로 전달되는 통합 컨텍스트
//!
//! Holds the configuration, the plugin manager, the descriptor side-table and
//! the scanner. There are no process-wide registries; the host owns this
//! value and passes it where needed.
//!
//! ```ignore
//! let ctx = DiscoveryContext::new(QavmConfig::load()?, JsonStore::global()?)?;
//! let report = ctx.bootstrap();
//! let found = ctx.scan_all(&CancellationToken::new())?;
//! ```

use crate::descriptor::Descriptor;
use crate::plugin::{LoadReport, PluginManager};
use crate::qualifier::expand_home;
use crate::scanner::DescriptorScanner;
use crate::workspace::{Workspace, WorkspaceStore};
use qavm_foundation::{DescriptorDataStore, Error, JsonStore, QavmConfig, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Descriptors of one handler keyed by descriptor type
pub type HandlerScan = BTreeMap<String, Vec<Descriptor>>;

const DEFAULT_WORKSPACE: &str = "default";

#[derive(Debug)]
pub struct DiscoveryContext {
    config: QavmConfig,
    manager: PluginManager,
    descriptor_data: DescriptorDataStore,
    workspaces: WorkspaceStore,
    scanner: DescriptorScanner,
}

impl DiscoveryContext {
    /// `store` holds the descriptor side-table and the workspaces
    pub fn new(config: QavmConfig, store: JsonStore) -> Result<Self> {
        let manager = PluginManager::new().trust_user_plugins(config.trust_user_plugins);
        Self::with_manager(config, store, manager)
    }

    pub fn with_manager(config: QavmConfig, store: JsonStore, manager: PluginManager) -> Result<Self> {
        let descriptor_data = DescriptorDataStore::open(store.clone())?;
        let scanner = DescriptorScanner::new(config.max_depth);
        Ok(Self {
            config,
            manager,
            descriptor_data,
            workspaces: WorkspaceStore::new(store),
            scanner,
        })
    }

    pub fn config(&self) -> &QavmConfig {
        &self.config
    }

    pub fn manager(&self) -> &PluginManager {
        &self.manager
    }

    pub fn descriptor_data(&self) -> &DescriptorDataStore {
        &self.descriptor_data
    }

    pub fn workspaces(&self) -> &WorkspaceStore {
        &self.workspaces
    }

    pub fn scanner(&self) -> &DescriptorScanner {
        &self.scanner
    }

    /// Load the built-in folder (verified) and every user folder
    pub fn bootstrap(&self) -> LoadReport {
        let mut report = LoadReport::default();
        if let Some(dir) = &self.config.builtin_plugin_dir {
            report.merge(self.manager.load_builtin_folder(dir));
        }
        for dir in &self.config.user_plugin_dirs {
            report.merge(self.manager.load_user_folder(dir));
        }
        info!(
            plugins = self.manager.plugins().len(),
            pending = report.pending.len(),
            rejected = report.rejected.len(),
            "Bootstrap finished"
        );
        report
    }

    /// Configured search roots with `~` expanded
    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.config
            .search_paths
            .iter()
            .map(|p| expand_home(&p.to_string_lossy()))
            .collect()
    }

    /// Scan for one handler (`plugin#software`)
    pub fn scan_software(&self, software_uid: &str, cancel: &CancellationToken) -> Result<HandlerScan> {
        let handler = self
            .manager
            .get_software_handler(software_uid)
            .ok_or_else(|| Error::NotFound(format!("software handler {software_uid}")))?;
        self.scanner.scan_handler(&handler, &self.search_paths(), cancel)
    }

    /// Scan for every loaded handler, keyed by software UID
    pub fn scan_all(&self, cancel: &CancellationToken) -> Result<BTreeMap<String, HandlerScan>> {
        let roots = self.search_paths();
        let mut results = BTreeMap::new();
        for handler in self.manager.software_handlers() {
            let found = self.scanner.scan_handler(&handler, &roots, cancel)?;
            results.insert(handler.uid(), found);
        }
        Ok(results)
    }

    /// Configured workspace, or every loaded view when none is configured or
    /// the configured one does not exist
    pub fn active_workspace(&self) -> Result<Workspace> {
        let Some(name) = &self.config.workspace else {
            return Ok(Workspace::from_manager(DEFAULT_WORKSPACE, &self.manager));
        };
        match self.workspaces.load(name) {
            Ok(workspace) => Ok(workspace),
            Err(Error::NotFound(_)) => {
                warn!(workspace = %name, "Workspace not found, using all views");
                Ok(Workspace::from_manager(name.clone(), &self.manager))
            }
            Err(e) => Err(e),
        }
    }
}

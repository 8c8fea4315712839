//! Plugin Manager - 플러그인 라이프사이클 관리
//!
//! - 내장 플러그인: 서명 검증 (rayon 병렬) 후 로드
//! - 사용자 플러그인: 로드 후 승인 대기 (설정으로 자동 승인 가능)
//! - 네이티브 플러그인: PluginModule 로 직접 등록
//!
//! Failures never escape: each rejected unit lands in the [`LoadReport`] and
//! the log.

use super::loader::{LoadReport, LoadStage, PluginLoader, PluginTrust, Rejection};
use super::registry::PluginRegistry;
use super::signature::SignatureVerifier;
use super::{Plugin, PluginModule, PluginOrigin};
use crate::software::SoftwareHandler;
use qavm_foundation::{Result, Uid};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// 플러그인 매니저 - 전체 플러그인 시스템 관리
#[derive(Debug)]
pub struct PluginManager {
    registry: PluginRegistry,
    verifier: SignatureVerifier,
    trust_user_plugins: bool,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    /// Verifies built-in plugins against the compiled-in key
    pub fn new() -> Self {
        Self::with_verifier(SignatureVerifier::builtin())
    }

    pub fn with_verifier(verifier: SignatureVerifier) -> Self {
        Self {
            registry: PluginRegistry::new(),
            verifier,
            trust_user_plugins: false,
        }
    }

    /// 사용자 플러그인 자동 승인
    pub fn trust_user_plugins(mut self, trust: bool) -> Self {
        self.trust_user_plugins = trust;
        self
    }

    // ========================================================================
    // 플러그인 로드
    // ========================================================================

    /// Verify and build every plugin directory under `folder` in parallel,
    /// then register the results in sorted order.
    pub fn load_builtin_folder(&self, folder: &Path) -> LoadReport {
        let candidates = PluginLoader::candidates(folder);
        info!(folder = %folder.display(), candidates = candidates.len(), "Loading built-in plugins");

        let built: Vec<_> = candidates
            .par_iter()
            .map(|dir| (dir, self.build_builtin(dir)))
            .collect();

        let mut report = LoadReport::default();
        for (dir, result) in built {
            match result {
                Ok(plugin) => self.admit(dir, plugin, &mut report),
                Err(rejection) => report.reject(rejection),
            }
        }
        info!(
            loaded = report.loaded.len(),
            rejected = report.rejected.len(),
            "Built-in plugins done"
        );
        report
    }

    /// Load every plugin directory under `folder` as a user plugin
    pub fn load_user_folder(&self, folder: &Path) -> LoadReport {
        let candidates = PluginLoader::candidates(folder);
        info!(folder = %folder.display(), candidates = candidates.len(), "Loading user plugins");

        let mut report = LoadReport::default();
        for dir in &candidates {
            self.load_into(dir, PluginOrigin::User, &mut report);
        }
        info!(
            loaded = report.loaded.len(),
            pending = report.pending.len(),
            rejected = report.rejected.len(),
            "User plugins done"
        );
        report
    }

    /// Load a single plugin directory. Built-in origin goes through the same
    /// signature check as [`PluginManager::load_builtin_folder`].
    pub fn load_plugin(&self, dir: &Path, origin: PluginOrigin) -> LoadReport {
        let mut report = LoadReport::default();
        self.load_into(dir, origin, &mut report);
        report
    }

    fn load_into(&self, dir: &Path, origin: PluginOrigin, report: &mut LoadReport) {
        let built = match origin {
            PluginOrigin::Builtin => self.build_builtin(dir),
            PluginOrigin::User => PluginLoader::load_from_path(dir, origin),
            // 네이티브는 폴더가 아니라 PluginModule 로만 등록
            PluginOrigin::Native => Err(Rejection::new(
                dir,
                LoadStage::Rejected,
                "native plugins register through PluginModule, not a folder",
            )),
        };
        match built {
            Ok(plugin) => self.admit(dir, plugin, report),
            Err(rejection) => report.reject(rejection),
        }
    }

    /// Snapshot + verify, then build from the verified bytes only
    fn build_builtin(&self, dir: &Path) -> std::result::Result<Plugin, Rejection> {
        let snapshot = self
            .verifier
            .read_verified(dir)
            .map_err(|e| Rejection::new(dir, LoadStage::Rejected, e.to_string()))?;
        debug!(path = %dir.display(), files = snapshot.len(), "Signature verified");
        PluginLoader::load_from_snapshot(dir, &snapshot, PluginOrigin::Builtin)
    }

    fn admit(&self, dir: &Path, plugin: Plugin, report: &mut LoadReport) {
        match PluginTrust::classify(plugin, self.trust_user_plugins) {
            PluginTrust::Trusted(plugin) => {
                let id = plugin.id().to_string();
                match self.registry.register(plugin) {
                    Ok(_) => report.loaded.push(id),
                    Err(e) => report.reject(Rejection::new(dir, LoadStage::Registered, e.to_string())),
                }
            }
            PluginTrust::Untrusted(pending) => {
                let id = pending.id().to_string();
                match self.registry.add_pending(pending) {
                    Ok(()) => report.pending.push(id),
                    Err(e) => report.reject(Rejection::new(dir, LoadStage::Registered, e.to_string())),
                }
            }
        }
    }

    /// 네이티브 플러그인 등록
    pub fn register_module(&self, module: &dyn PluginModule) -> Result<Arc<Plugin>> {
        let plugin = Plugin::from_module(module)?;
        self.registry.register(plugin)
    }

    /// 승인 대기 플러그인 승인
    pub fn approve_pending(&self, id: &str) -> Result<Arc<Plugin>> {
        self.registry.approve(id)
    }

    // ========================================================================
    // 접근자
    // ========================================================================

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn get_plugin(&self, id: &str) -> Option<Arc<Plugin>> {
        self.registry.get(id)
    }

    /// Handler for a `plugin#software` or `plugin#software#dataPath` UID
    pub fn get_software_handler(&self, uid: &str) -> Option<Arc<SoftwareHandler>> {
        let uid = Uid::parse(uid).ok()?;
        self.registry
            .get(&uid.plugin_id)?
            .software_handler(&uid.software_id)
            .cloned()
    }

    pub fn plugins(&self) -> Vec<Arc<Plugin>> {
        self.registry.list()
    }

    pub fn pending_plugins(&self) -> Vec<String> {
        self.registry.pending_ids()
    }

    /// All handlers of all trusted plugins, by plugin id then software id
    pub fn software_handlers(&self) -> Vec<Arc<SoftwareHandler>> {
        self.registry
            .list()
            .iter()
            .flat_map(|plugin| plugin.software_handlers().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// 플러그인 요약 정보
    pub fn summary(&self) -> PluginSummary {
        PluginSummary {
            plugins: self.registry.len(),
            pending: self.registry.pending_len(),
            software_handlers: self.software_handlers().len(),
        }
    }
}

/// 플러그인 시스템 요약
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginSummary {
    pub plugins: usize,
    pub pending: usize,
    pub software_handlers: usize,
}

//! Plugin Registry - 플러그인 저장소
//!
//! Trusted plugins and pending (untrusted) candidates share one lock, so an id
//! is never present in both maps.

use super::loader::PendingPlugin;
use super::Plugin;
use parking_lot::RwLock;
use qavm_foundation::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default)]
struct Index {
    plugins: BTreeMap<String, Arc<Plugin>>,
    pending: BTreeMap<String, PendingPlugin>,
}

impl Index {
    fn contains(&self, id: &str) -> bool {
        self.plugins.contains_key(id) || self.pending.contains_key(id)
    }
}

/// 플러그인 레지스트리
#[derive(Debug, Default)]
pub struct PluginRegistry {
    index: RwLock<Index>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 플러그인 등록 (중복 id 거부)
    pub fn register(&self, plugin: Plugin) -> Result<Arc<Plugin>> {
        let mut index = self.index.write();
        if index.contains(plugin.id()) {
            return Err(Error::DuplicateId(format!("plugin {}", plugin.id())));
        }
        let id = plugin.id().to_string();
        let plugin = Arc::new(plugin);
        index.plugins.insert(id.clone(), Arc::clone(&plugin));
        info!("Registered plugin: {} (v{}, {})", id, plugin.version(), plugin.origin());
        Ok(plugin)
    }

    /// 승인 대기 등록 (중복 id 거부)
    pub fn add_pending(&self, pending: PendingPlugin) -> Result<()> {
        let mut index = self.index.write();
        if index.contains(pending.id()) {
            return Err(Error::DuplicateId(format!("plugin {}", pending.id())));
        }
        info!("Plugin {} awaits approval", pending.id());
        index.pending.insert(pending.id().to_string(), pending);
        Ok(())
    }

    /// 대기 중인 플러그인을 신뢰 목록으로 이동
    pub fn approve(&self, id: &str) -> Result<Arc<Plugin>> {
        let mut index = self.index.write();
        let pending = index
            .pending
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("pending plugin {id}")))?;
        let plugin = Arc::new(pending.into_plugin());
        index.plugins.insert(id.to_string(), Arc::clone(&plugin));
        info!("Approved plugin: {}", id);
        Ok(plugin)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Plugin>> {
        self.index.read().plugins.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.read().contains(id)
    }

    /// 로드된 플러그인 (id 순)
    pub fn list(&self) -> Vec<Arc<Plugin>> {
        self.index.read().plugins.values().cloned().collect()
    }

    /// 승인 대기 id 목록
    pub fn pending_ids(&self) -> Vec<String> {
        self.index.read().pending.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_len(&self) -> usize {
        self.index.read().pending.len()
    }
}

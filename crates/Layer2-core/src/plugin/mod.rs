//! # Plugin System
//!
//! QAVM 플러그인 시스템
//!
//! ## 개요
//!
//! 플러그인은 소프트웨어 종류별 [`SoftwareHandler`] 묶음을 제공합니다:
//! - 매니페스트 플러그인: `name/name.toml` 데이터 패키지
//! - 네이티브 플러그인: [`PluginModule`] 을 구현한 in-process 모듈
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PluginManager                           │
//! │  ┌──────────────────┐   ┌────────────────────────────────┐ │
//! │  │ SignatureVerifier│──▶│ PluginLoader (name/name.toml)  │ │
//! │  │ (built-in only)  │   │ Discovered→Loaded→Validated    │ │
//! │  └──────────────────┘   └──────────────┬─────────────────┘ │
//! │                                        ▼                    │
//! │  ┌───────────────────────────────────────────────────────┐ │
//! │  │ PluginRegistry: trusted plugins + pending (untrusted) │ │
//! │  └───────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod loader;
mod manager;
mod manifest;
mod registry;
mod signature;

pub use loader::{LoadReport, LoadStage, PendingPlugin, PluginLoader, PluginTrust, Rejection};
pub use manager::{PluginManager, PluginSummary};
pub use manifest::{ManifestFile, PluginMetadata, PluginVersion};
pub use registry::PluginRegistry;
pub use signature::{
    folder_digest, signature_path, FolderSnapshot, PluginSigner, SignatureVerifier, SIGNATURE_EXTENSION,
};

use crate::software::{SoftwareHandler, SoftwareRegistration};
use qavm_foundation::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ============================================================================
// PluginOrigin
// ============================================================================

/// 플러그인 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginOrigin {
    /// Shipped with the host, signature verified
    Builtin,
    /// User plugin folder, trusted only after approval
    User,
    /// Compiled into the host
    Native,
}

impl std::fmt::Display for PluginOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginOrigin::Builtin => write!(f, "builtin"),
            PluginOrigin::User => write!(f, "user"),
            PluginOrigin::Native => write!(f, "native"),
        }
    }
}

// ============================================================================
// PluginModule - 네이티브 플러그인
// ============================================================================

/// In-process plugin. Registers through the same typed records as manifest
/// plugins.
pub trait PluginModule: Send + Sync {
    fn metadata(&self) -> Result<PluginMetadata>;

    fn register(&self) -> Vec<SoftwareRegistration>;
}

// ============================================================================
// Plugin
// ============================================================================

/// Loaded plugin: metadata + validated handlers
#[derive(Debug)]
pub struct Plugin {
    metadata: PluginMetadata,
    origin: PluginOrigin,
    path: Option<PathBuf>,
    handlers: BTreeMap<String, Arc<SoftwareHandler>>,
}

impl Plugin {
    /// Builds every handler; the first invalid or duplicate one fails the
    /// whole plugin.
    pub fn new(
        metadata: PluginMetadata,
        origin: PluginOrigin,
        path: Option<PathBuf>,
        registrations: Vec<SoftwareRegistration>,
    ) -> Result<Self> {
        let mut handlers = BTreeMap::new();
        for reg in registrations {
            let handler = SoftwareHandler::from_registration(&metadata.id, reg)?;
            let id = handler.id().to_string();
            if handlers.insert(id.clone(), Arc::new(handler)).is_some() {
                return Err(Error::DuplicateId(format!(
                    "{}: software handler {:?}",
                    metadata.id, id
                )));
            }
        }
        Ok(Self {
            metadata,
            origin,
            path,
            handlers,
        })
    }

    pub fn from_module(module: &dyn PluginModule) -> Result<Self> {
        Self::new(module.metadata()?, PluginOrigin::Native, None, module.register())
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn version(&self) -> PluginVersion {
        self.metadata.version
    }

    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    pub fn origin(&self) -> PluginOrigin {
        self.origin
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn software_handlers(&self) -> impl Iterator<Item = &Arc<SoftwareHandler>> {
        self.handlers.values()
    }

    pub fn software_handler(&self, id: &str) -> Option<&Arc<SoftwareHandler>> {
        self.handlers.get(id)
    }
}

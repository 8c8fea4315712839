//! qavm-core: Plugin & Software Discovery Engine
//!
//! Layer2 - 플러그인 로드와 설치본 탐색
//!
//! # 주요 모듈
//!
//! - `qualifier`: 식별 설정 + Qualifier (설치본 판별)
//! - `descriptor`: 식별된 설치본 레코드
//! - `software`: SoftwareHandler (플러그인 등록 단위)
//! - `plugin`: 로더, 서명 검증, PluginManager
//! - `scanner`: 깊이 제한 BFS 스캐너
//! - `workspace`: view / menu UID 선택
//! - `context`: 호스트용 통합 컨텍스트
//!
//! # 사용 예시
//!
//! ```ignore
//! use qavm_core::{DiscoveryContext, CancellationToken};
//! use qavm_foundation::{JsonStore, QavmConfig};
//!
//! let ctx = DiscoveryContext::new(QavmConfig::load()?, JsonStore::global()?)?;
//! ctx.bootstrap();
//!
//! let token = CancellationToken::new();
//! for (software, by_type) in ctx.scan_all(&token)? {
//!     println!("{software}: {} types", by_type.len());
//! }
//! ```

pub mod context;
pub mod descriptor;
pub mod plugin;
pub mod qualifier;
pub mod scanner;
pub mod software;
pub mod workspace;

// Re-exports: Context
pub use context::{DiscoveryContext, HandlerScan};

// Re-exports: Qualifier
pub use qualifier::{
    Contents, ContentRuleSpec, DeclarativeQualifier, FileContentSpec, FileContents, PathRule,
    Qualifier, QualifierIdentificationConfig,
};

// Re-exports: Descriptor
pub use descriptor::{
    descriptor_uid, Descriptor, DescriptorBuilder, DescriptorFactory, GenericDescriptor, LinkType,
    VersionedDescriptor,
};

// Re-exports: Software
pub use software::{
    DescriptorRegistration, MenuItem, NamedViewBuilder, SettingEntry, SoftwareHandler,
    SoftwareRegistration, SoftwareSettings, ViewBuilder, ViewKind,
};

// Re-exports: Plugin
pub use plugin::{
    folder_digest, FolderSnapshot, LoadReport, LoadStage, PendingPlugin, Plugin, PluginLoader, PluginManager,
    PluginMetadata, PluginModule, PluginOrigin, PluginSigner, PluginSummary, PluginTrust,
    PluginVersion, Rejection, SignatureVerifier,
};

// Re-exports: Scanner / Workspace
pub use scanner::DescriptorScanner;
pub use workspace::{Workspace, WorkspaceStore};

pub use tokio_util::sync::CancellationToken;

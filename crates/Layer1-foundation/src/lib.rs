//! # qavm-foundation
//!
//! Foundation layer for QAVM:
//! - Uid: 식별자 문법 (`plugin#software#dataPath`)
//! - Error: 에러 분류 (설정 / IO / 신뢰 / 계약)
//! - Config: 통합 설정 (QavmConfig)
//! - Storage: JsonStore (범용), DescriptorDataStore (태그/노트)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  qavm-cli (host)                                         │
//! │                     │                                   │
//! │                     ▼                                   │
//! │  qavm-core: PluginManager → SoftwareHandler → Scanner   │
//! │                     │                                   │
//! │                     ▼                                   │
//! │  qavm-foundation: uid · config · storage · error        │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod storage;
pub mod uid;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{QavmConfig, QavmConfigLayer, DEFAULT_MAX_DEPTH, QAVM_CONFIG_FILE};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{DescriptorData, DescriptorDataStore, JsonStore, DESCRIPTOR_DATA_FILE};

// ============================================================================
// Uid (식별자)
// ============================================================================
pub use uid::Uid;

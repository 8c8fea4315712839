//! Error types for QAVM
//!
//! 모든 에러를 중앙에서 관리

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// QAVM 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // UID / 등록 관련
    // ========================================================================
    #[error("Invalid UID: {0}")]
    InvalidUid(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A plugin registered something of the wrong kind (e.g. a table builder
    /// under the tiles map). Always a plugin-author bug.
    #[error("Contract violation in {owner}: {message}")]
    Contract { owner: String, message: String },

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    // ========================================================================
    // Plugin 관련
    // ========================================================================
    #[error("Plugin error at {path}: {message}")]
    Plugin { path: PathBuf, message: String },

    #[error("Signature verification failed for {path}: {message}")]
    Signature { path: PathBuf, message: String },

    // ========================================================================
    // 실행 관련
    // ========================================================================
    #[error("Cancelled")]
    Cancelled,

    #[error("Not found: {0}")]
    NotFound(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Contract 에러 생성 헬퍼
    pub fn contract(owner: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Contract {
            owner: owner.into(),
            message: message.into(),
        }
    }

    /// Plugin 에러 생성 헬퍼
    pub fn plugin(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Plugin {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Signature 에러 생성 헬퍼
    pub fn signature(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Signature {
            path: path.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_path() {
        let err = Error::plugin("/plugins/foo", "missing entry file");
        assert_eq!(
            err.to_string(),
            "Plugin error at /plugins/foo: missing entry file"
        );
    }
}

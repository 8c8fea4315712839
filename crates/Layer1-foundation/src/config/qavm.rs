//! Qavm Config - 통합 설정
//!
//! 발견 엔진이 외부(설정 UI)로부터 받는 값들: 검색 경로, 플러그인 폴더,
//! 스캔 깊이, 신뢰 정책

use crate::storage::JsonStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 설정 파일명
pub const QAVM_CONFIG_FILE: &str = "config.json";

/// Default depth bound for the descriptor scanner
pub const DEFAULT_MAX_DEPTH: usize = 3;

// ============================================================================
// Qavm Config (통합)
// ============================================================================

/// QAVM 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QavmConfig {
    /// 버전 (마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,

    /// 스캔할 루트 경로들
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,

    /// 서명 검증 대상 내장 플러그인 폴더
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builtin_plugin_dir: Option<PathBuf>,

    /// 사용자 플러그인 폴더들
    #[serde(default)]
    pub user_plugin_dirs: Vec<PathBuf>,

    /// 스캔 최대 깊이
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// 서명 없는 사용자 플러그인 자동 승인 (명시적 opt-in)
    #[serde(default)]
    pub trust_user_plugins: bool,

    /// 활성 워크스페이스 이름
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
}

fn default_version() -> u32 {
    1
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for QavmConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            search_paths: Vec::new(),
            builtin_plugin_dir: None,
            user_plugin_dirs: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            trust_user_plugins: false,
            workspace: None,
        }
    }
}

/// 설정 파일 한 겹 - 적힌 값만 덮어쓴다
///
/// Scalar fields are optional so a layer that omits them keeps the value
/// from the layer below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QavmConfigLayer {
    pub version: Option<u32>,
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,
    pub builtin_plugin_dir: Option<PathBuf>,
    #[serde(default)]
    pub user_plugin_dirs: Vec<PathBuf>,
    pub max_depth: Option<usize>,
    pub trust_user_plugins: Option<bool>,
    pub workspace: Option<String>,
}

impl From<QavmConfig> for QavmConfigLayer {
    fn from(config: QavmConfig) -> Self {
        Self {
            version: Some(config.version),
            search_paths: config.search_paths,
            builtin_plugin_dir: config.builtin_plugin_dir,
            user_plugin_dirs: config.user_plugin_dirs,
            max_depth: Some(config.max_depth),
            trust_user_plugins: Some(config.trust_user_plugins),
            workspace: config.workspace,
        }
    }
}

impl QavmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    pub fn load() -> Result<Self> {
        let stores: Vec<JsonStore> = [JsonStore::global(), JsonStore::current_project()]
            .into_iter()
            .filter_map(|store| store.ok())
            .collect();
        Self::load_layered(&stores)
    }

    /// 저장소 순서대로 병합 (뒤쪽이 우선)
    pub fn load_layered(stores: &[JsonStore]) -> Result<Self> {
        let mut config = Self::new();
        for store in stores {
            if let Some(layer) = store.load_optional::<QavmConfigLayer>(QAVM_CONFIG_FILE)? {
                config.merge(layer);
            }
        }
        Ok(config)
    }

    /// 특정 저장소에서 로드 (없으면 기본값)
    pub fn load_from(store: &JsonStore) -> Result<Self> {
        Self::load_layered(std::slice::from_ref(store))
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 다른 설정과 병합 (other에 적힌 값이 우선, 경로 목록은 누적)
    pub fn merge(&mut self, other: impl Into<QavmConfigLayer>) {
        let other = other.into();
        for path in other.search_paths {
            if !self.search_paths.contains(&path) {
                self.search_paths.push(path);
            }
        }
        for dir in other.user_plugin_dirs {
            if !self.user_plugin_dirs.contains(&dir) {
                self.user_plugin_dirs.push(dir);
            }
        }
        if let Some(version) = other.version {
            self.version = version;
        }
        if other.builtin_plugin_dir.is_some() {
            self.builtin_plugin_dir = other.builtin_plugin_dir;
        }
        if other.workspace.is_some() {
            self.workspace = other.workspace;
        }
        if let Some(depth) = other.max_depth {
            self.max_depth = depth;
        }
        if let Some(trust) = other.trust_user_plugins {
            self.trust_user_plugins = trust;
        }
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    pub fn builtin_plugin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.builtin_plugin_dir = Some(dir.into());
        self
    }

    pub fn user_plugin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_plugin_dirs.push(dir.into());
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn trust_user_plugins(mut self, trust: bool) -> Self {
        self.trust_user_plugins = trust;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_partial_json() {
        let config: QavmConfig =
            serde_json::from_str(r#"{ "searchPaths": ["/opt/apps"] }"#).unwrap();
        assert_eq!(config.search_paths, vec![PathBuf::from("/opt/apps")]);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!config.trust_user_plugins);
    }

    #[test]
    fn test_merge_accumulates_paths() {
        let mut base = QavmConfig::new().search_path("/a").max_depth(2);
        let other = QavmConfig::new()
            .search_path("/a")
            .search_path("/b")
            .builtin_plugin_dir("/builtin")
            .max_depth(5);

        base.merge(other);

        assert_eq!(base.search_paths, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(base.builtin_plugin_dir, Some(PathBuf::from("/builtin")));
        assert_eq!(base.max_depth, 5);
    }

    #[test]
    fn test_partial_layer_keeps_lower_values() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("global");
        let project = temp.path().join("project");
        std::fs::create_dir_all(&global).unwrap();
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(
            global.join(QAVM_CONFIG_FILE),
            r#"{ "maxDepth": 6, "trustUserPlugins": true, "searchPaths": ["/g"] }"#,
        )
        .unwrap();
        std::fs::write(project.join(QAVM_CONFIG_FILE), r#"{ "searchPaths": ["/p"] }"#).unwrap();

        let config =
            QavmConfig::load_layered(&[JsonStore::new(&global), JsonStore::new(&project)]).unwrap();
        assert_eq!(config.max_depth, 6);
        assert!(config.trust_user_plugins);
        assert_eq!(config.search_paths, vec![PathBuf::from("/g"), PathBuf::from("/p")]);

        // explicit values still win
        std::fs::write(project.join(QAVM_CONFIG_FILE), r#"{ "maxDepth": 1, "trustUserPlugins": false }"#)
            .unwrap();
        let config =
            QavmConfig::load_layered(&[JsonStore::new(&global), JsonStore::new(&project)]).unwrap();
        assert_eq!(config.max_depth, 1);
        assert!(!config.trust_user_plugins);
    }

    #[test]
    fn test_save_and_load_from_store() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::new(temp.path());

        let config = QavmConfig::new().search_path("/apps").trust_user_plugins(true);
        store.save(QAVM_CONFIG_FILE, &config).unwrap();

        let loaded = QavmConfig::load_from(&store).unwrap();
        assert_eq!(loaded.search_paths, vec![PathBuf::from("/apps")]);
        assert!(loaded.trust_user_plugins);
    }
}

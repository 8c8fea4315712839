//! Config - 통합 설정 관리
//!
//! - `qavm.rs` - QavmConfig 통합 설정 (검색 경로, 플러그인 폴더, 스캔 깊이)

mod qavm;

pub use qavm::{QavmConfig, QavmConfigLayer, DEFAULT_MAX_DEPTH, QAVM_CONFIG_FILE};

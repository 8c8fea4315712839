//! Storage module for QAVM
//!
//! - `json`: JSON - 범용 파일 저장/로드
//! - `descriptor_data`: Descriptor 태그/노트 사이드 테이블

mod descriptor_data;
mod json;

// JSON Storage (범용)
pub use json::JsonStore;

// Descriptor side-table (UID -> tags/notes)
pub use descriptor_data::{DescriptorData, DescriptorDataStore, DESCRIPTOR_DATA_FILE};

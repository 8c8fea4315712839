//! Descriptor Data - Descriptor UID 별 태그/노트 사이드 테이블
//!
//! Descriptors are immutable once scanned; anything the user attaches to one
//! (tags, notes) lives here, keyed by the descriptor UID.

use super::JsonStore;
use crate::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// 사이드 테이블 파일명
pub const DESCRIPTOR_DATA_FILE: &str = "descriptor-data.json";

/// Descriptor 하나에 붙은 사용자 데이터
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorData {
    #[serde(default)]
    pub tags: Vec<String>,

    /// Short note shown next to the descriptor
    #[serde(default)]
    pub note_visible: String,

    #[serde(default)]
    pub note: String,
}

impl DescriptorData {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.note_visible.is_empty() && self.note.is_empty()
    }
}

/// Mutex-guarded map `uid -> DescriptorData`, persisted through a [`JsonStore`]
#[derive(Debug)]
pub struct DescriptorDataStore {
    store: JsonStore,
    entries: Mutex<BTreeMap<String, DescriptorData>>,
}

impl DescriptorDataStore {
    /// 저장소에서 로드 (파일이 없으면 빈 테이블)
    pub fn open(store: JsonStore) -> Result<Self> {
        let entries = store
            .load_optional::<BTreeMap<String, DescriptorData>>(DESCRIPTOR_DATA_FILE)?
            .unwrap_or_default();
        debug!("Loaded descriptor data for {} descriptors", entries.len());
        Ok(Self {
            store,
            entries: Mutex::new(entries),
        })
    }

    /// 파일 없이 메모리에서만 사용
    pub fn in_memory(store: JsonStore) -> Self {
        Self {
            store,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, uid: &str) -> DescriptorData {
        self.entries.lock().get(uid).cloned().unwrap_or_default()
    }

    /// 태그 추가 (중복 무시). 새로 추가되면 true
    pub fn add_tag(&self, uid: &str, tag: &str) -> bool {
        let mut entries = self.entries.lock();
        let data = entries.entry(uid.to_string()).or_default();
        if data.tags.iter().any(|t| t == tag) {
            return false;
        }
        data.tags.push(tag.to_string());
        true
    }

    /// 태그 제거. 제거되면 true
    pub fn remove_tag(&self, uid: &str, tag: &str) -> bool {
        let mut entries = self.entries.lock();
        let Some(data) = entries.get_mut(uid) else {
            return false;
        };
        let before = data.tags.len();
        data.tags.retain(|t| t != tag);
        let removed = data.tags.len() != before;
        if data.is_empty() {
            entries.remove(uid);
        }
        removed
    }

    pub fn set_note(&self, uid: &str, note_visible: impl Into<String>, note: impl Into<String>) {
        let mut entries = self.entries.lock();
        let data = entries.entry(uid.to_string()).or_default();
        data.note_visible = note_visible.into();
        data.note = note.into();
        if data.is_empty() {
            entries.remove(uid);
        }
    }

    /// 특정 태그가 붙은 UID 목록
    pub fn uids_with_tag(&self, tag: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, data)| data.tags.iter().any(|t| t == tag))
            .map(|(uid, _)| uid.clone())
            .collect()
    }

    /// 사용 중인 모든 태그
    pub fn all_tags(&self) -> BTreeSet<String> {
        self.entries
            .lock()
            .values()
            .flat_map(|data| data.tags.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// 파일로 저장
    pub fn save(&self) -> Result<()> {
        let snapshot = self.entries.lock().clone();
        self.store.save(DESCRIPTOR_DATA_FILE, &snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_persisted_shape() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::new(temp.path());
        let data = DescriptorDataStore::open(store.clone()).unwrap();

        data.add_tag("abc", "lts");
        data.set_note("abc", "prod", "used by the farm");
        data.save().unwrap();

        let raw: serde_json::Value = store.load(DESCRIPTOR_DATA_FILE).unwrap();
        assert_eq!(raw["abc"]["tags"][0], "lts");
        assert_eq!(raw["abc"]["noteVisible"], "prod");
        assert_eq!(raw["abc"]["note"], "used by the farm");

        let reopened = DescriptorDataStore::open(store).unwrap();
        assert_eq!(reopened.get("abc").tags, vec!["lts".to_string()]);
    }

    #[test]
    fn test_tags() {
        let temp = TempDir::new().unwrap();
        let data = DescriptorDataStore::in_memory(JsonStore::new(temp.path()));

        assert!(data.add_tag("a", "x"));
        assert!(!data.add_tag("a", "x"));
        assert!(data.add_tag("b", "x"));
        assert!(data.add_tag("b", "y"));

        assert_eq!(data.uids_with_tag("x"), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(data.all_tags().len(), 2);

        assert!(data.remove_tag("a", "x"));
        assert!(!data.remove_tag("a", "x"));
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_unknown_uid_is_empty() {
        let temp = TempDir::new().unwrap();
        let data = DescriptorDataStore::in_memory(JsonStore::new(temp.path()));
        assert!(data.get("nope").is_empty());
    }
}

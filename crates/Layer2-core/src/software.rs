//! Software Handler - 플러그인이 소프트웨어 종류 하나에 대해 등록하는 묶음
//!
//! Plugins describe a handler with a [`SoftwareRegistration`] record; the
//! record is validated exactly once by [`SoftwareHandler::from_registration`].

use crate::descriptor::DescriptorFactory;
use crate::qualifier::Qualifier;
use qavm_foundation::uid::{self, is_key_valid, is_software_id_valid};
use qavm_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::sync::Arc;

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Tiles,
    Table,
    Custom,
}

impl ViewKind {
    pub const ALL: [ViewKind; 3] = [ViewKind::Tiles, ViewKind::Table, ViewKind::Custom];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::Tiles => "tiles",
            ViewKind::Table => "table",
            ViewKind::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl std::fmt::Display for ViewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle on a presentation-layer builder. The engine only checks its kind;
/// rendering belongs to the host.
pub trait ViewBuilder: Send + Sync + Debug {
    fn kind(&self) -> ViewKind;
    fn name(&self) -> &str;
}

/// Builder known only by name (manifest plugins)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedViewBuilder {
    kind: ViewKind,
    name: String,
}

impl NamedViewBuilder {
    pub fn new(kind: ViewKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl ViewBuilder for NamedViewBuilder {
    fn kind(&self) -> ViewKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Settings / Menu items
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingEntry {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub default: serde_json::Value,
}

/// Settings schema of a handler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoftwareSettings {
    #[serde(default)]
    pub entries: Vec<SettingEntry>,
}

impl SoftwareSettings {
    pub fn get(&self, key: &str) -> Option<&SettingEntry> {
        self.entries.iter().find(|e| e.key == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MenuItem {
    pub key: String,
    pub label: String,
}

// ============================================================================
// Registration record
// ============================================================================

/// Qualifier + descriptor factory for one descriptor type key
#[derive(Debug, Clone)]
pub struct DescriptorRegistration {
    pub qualifier: Arc<dyn Qualifier>,
    pub factory: Arc<dyn DescriptorFactory>,
}

impl DescriptorRegistration {
    pub fn new(qualifier: Arc<dyn Qualifier>, factory: Arc<dyn DescriptorFactory>) -> Self {
        Self { qualifier, factory }
    }
}

/// Unvalidated registration record. Keeps insertion order and duplicates so
/// that validation can report them.
#[derive(Debug, Clone, Default)]
pub struct SoftwareRegistration {
    pub id: String,
    pub name: String,
    pub descriptors: Vec<(String, DescriptorRegistration)>,
    pub views: Vec<(ViewKind, String, Arc<dyn ViewBuilder>)>,
    pub settings: Option<SoftwareSettings>,
    pub menu_items: Vec<MenuItem>,
}

impl SoftwareRegistration {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn descriptor(
        mut self,
        key: impl Into<String>,
        qualifier: Arc<dyn Qualifier>,
        factory: Arc<dyn DescriptorFactory>,
    ) -> Self {
        self.descriptors
            .push((key.into(), DescriptorRegistration::new(qualifier, factory)));
        self
    }

    pub fn view(mut self, kind: ViewKind, key: impl Into<String>, builder: Arc<dyn ViewBuilder>) -> Self {
        self.views.push((kind, key.into(), builder));
        self
    }

    pub fn settings(mut self, settings: SoftwareSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn menu_item(mut self, key: impl Into<String>, label: impl Into<String>) -> Self {
        self.menu_items.push(MenuItem {
            key: key.into(),
            label: label.into(),
        });
        self
    }
}

// ============================================================================
// SoftwareHandler
// ============================================================================

/// Validated, immutable handler
#[derive(Debug)]
pub struct SoftwareHandler {
    plugin_id: String,
    id: String,
    name: String,
    descriptors: BTreeMap<String, DescriptorRegistration>,
    views: BTreeMap<ViewKind, BTreeMap<String, Arc<dyn ViewBuilder>>>,
    settings: Option<SoftwareSettings>,
    menu_items: Vec<MenuItem>,
}

impl SoftwareHandler {
    pub fn from_registration(plugin_id: &str, reg: SoftwareRegistration) -> Result<Self> {
        if !is_software_id_valid(&reg.id) {
            return Err(Error::InvalidUid(format!("software id {:?}", reg.id)));
        }
        let owner = uid::make_plugin_software_id(plugin_id, &reg.id)?;

        if reg.name.trim().is_empty() {
            return Err(Error::Validation(format!("{owner}: missing name")));
        }
        if reg.descriptors.is_empty() {
            return Err(Error::Validation(format!("{owner}: no descriptors registered")));
        }

        // Descriptors
        let mut descriptors = BTreeMap::new();
        for (key, registration) in reg.descriptors {
            check_key(&owner, "descriptor", &key)?;
            registration
                .factory
                .check_config(registration.qualifier.identification_config())
                .map_err(|e| match e {
                    Error::Contract { message, .. } => Error::contract(&owner, message),
                    other => other,
                })?;
            if descriptors.insert(key.clone(), registration).is_some() {
                return Err(Error::DuplicateId(format!("{owner}: descriptor type {key:?}")));
            }
        }

        // Views - 키는 핸들러 전체에서 유일
        let mut views: BTreeMap<ViewKind, BTreeMap<String, Arc<dyn ViewBuilder>>> = BTreeMap::new();
        let mut view_keys = BTreeSet::new();
        for (kind, key, builder) in reg.views {
            check_key(&owner, "view", &key)?;
            if builder.kind() != kind {
                return Err(Error::contract(
                    &owner,
                    format!(
                        "view {key:?} registered under {kind} but builder {:?} builds {}",
                        builder.name(),
                        builder.kind()
                    ),
                ));
            }
            if !view_keys.insert(key.clone()) {
                return Err(Error::DuplicateId(format!("{owner}: view type {key:?}")));
            }
            views.entry(kind).or_default().insert(key, builder);
        }

        if let Some(settings) = &reg.settings {
            let mut keys = BTreeSet::new();
            for entry in &settings.entries {
                if entry.key.is_empty() || !keys.insert(entry.key.as_str()) {
                    return Err(Error::Validation(format!(
                        "{owner}: empty or duplicate setting key {:?}",
                        entry.key
                    )));
                }
            }
        }

        let mut menu_keys = BTreeSet::new();
        for item in &reg.menu_items {
            check_key(&owner, "menu item", &item.key)?;
            if !menu_keys.insert(item.key.as_str()) {
                return Err(Error::DuplicateId(format!("{owner}: menu item {:?}", item.key)));
            }
        }

        Ok(Self {
            plugin_id: plugin_id.to_string(),
            id: reg.id,
            name: reg.name,
            descriptors,
            views,
            settings: reg.settings,
            menu_items: reg.menu_items,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `plugin#software`
    pub fn uid(&self) -> String {
        format!("{}{}{}", self.plugin_id, uid::UID_SEPARATOR, self.id)
    }

    pub fn descriptors(&self) -> &BTreeMap<String, DescriptorRegistration> {
        &self.descriptors
    }

    pub fn descriptor(&self, key: &str) -> Option<&DescriptorRegistration> {
        self.descriptors.get(key)
    }

    pub fn views(&self, kind: ViewKind) -> impl Iterator<Item = (&str, &Arc<dyn ViewBuilder>)> {
        self.views
            .get(&kind)
            .into_iter()
            .flat_map(|m| m.iter().map(|(k, b)| (k.as_str(), b)))
    }

    pub fn view(&self, kind: ViewKind, key: &str) -> Option<&Arc<dyn ViewBuilder>> {
        self.views.get(&kind)?.get(key)
    }

    pub fn settings(&self) -> Option<&SoftwareSettings> {
        self.settings.as_ref()
    }

    pub fn menu_items(&self) -> &[MenuItem] {
        &self.menu_items
    }

    /// Full UIDs of this handler's views of one kind
    pub fn view_uids(&self, kind: ViewKind) -> Vec<String> {
        self.views(kind)
            .map(|(key, _)| self.data_uid(&uid::view_data_path(kind.as_str(), key)))
            .collect()
    }

    pub fn menu_item_uids(&self) -> Vec<String> {
        self.menu_items
            .iter()
            .map(|item| self.data_uid(&uid::menu_data_path(&item.key)))
            .collect()
    }

    /// Does `data_path` name one of this handler's views or menu items?
    pub fn has_data_path(&self, data_path: &str) -> bool {
        let parts: Vec<&str> = data_path.split('/').collect();
        match parts.as_slice() {
            ["view", kind, key] => ViewKind::parse(kind)
                .map_or(false, |kind| self.view(kind, key).is_some()),
            ["menu", key] => self.menu_items.iter().any(|m| m.key == *key),
            _ => false,
        }
    }

    fn data_uid(&self, data_path: &str) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.plugin_id,
            self.id,
            data_path,
            sep = uid::UID_SEPARATOR
        )
    }
}

fn check_key(owner: &str, what: &str, key: &str) -> Result<()> {
    if is_key_valid(key) {
        Ok(())
    } else {
        Err(Error::Validation(format!("{owner}: invalid {what} key {key:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{GenericDescriptor, VersionedDescriptor};
    use crate::qualifier::{DeclarativeQualifier, QualifierIdentificationConfig};

    fn qualifier() -> Arc<dyn Qualifier> {
        Arc::new(DeclarativeQualifier::new(QualifierIdentificationConfig::new()))
    }

    fn tiles(name: &str) -> Arc<dyn ViewBuilder> {
        Arc::new(NamedViewBuilder::new(ViewKind::Tiles, name))
    }

    fn base() -> SoftwareRegistration {
        SoftwareRegistration::new("blender", "Blender")
            .descriptor("install", qualifier(), Arc::new(GenericDescriptor))
    }

    #[test]
    fn test_valid_registration() {
        let reg = base()
            .view(ViewKind::Tiles, "grid", tiles("grid"))
            .view(ViewKind::Table, "list", Arc::new(NamedViewBuilder::new(ViewKind::Table, "list")))
            .menu_item("open", "Open folder");

        let handler = SoftwareHandler::from_registration("org.blender", reg).unwrap();
        assert_eq!(handler.uid(), "org.blender#blender");
        assert_eq!(handler.view_uids(ViewKind::Tiles), vec!["org.blender#blender#view/tiles/grid"]);
        assert_eq!(handler.menu_item_uids(), vec!["org.blender#blender#menu/open"]);
        assert!(handler.has_data_path("view/table/list"));
        assert!(!handler.has_data_path("view/tiles/list"));
        assert!(handler.has_data_path("menu/open"));
        assert!(!handler.has_data_path("settings"));
    }

    #[test]
    fn test_kind_mismatch_is_contract_error() {
        let reg = base().view(ViewKind::Table, "grid", tiles("grid"));
        let err = SoftwareHandler::from_registration("org.blender", reg).unwrap_err();
        assert!(matches!(err, Error::Contract { ref owner, .. } if owner == "org.blender#blender"));
    }

    #[test]
    fn test_duplicate_keys() {
        let reg = base().descriptor("install", qualifier(), Arc::new(GenericDescriptor));
        assert!(matches!(
            SoftwareHandler::from_registration("org.blender", reg),
            Err(Error::DuplicateId(_))
        ));

        let reg = base()
            .view(ViewKind::Tiles, "main", tiles("a"))
            .view(ViewKind::Custom, "main", Arc::new(NamedViewBuilder::new(ViewKind::Custom, "b")));
        assert!(matches!(
            SoftwareHandler::from_registration("org.blender", reg),
            Err(Error::DuplicateId(_))
        ));

        let reg = base().menu_item("open", "Open").menu_item("open", "Open again");
        assert!(matches!(
            SoftwareHandler::from_registration("org.blender", reg),
            Err(Error::DuplicateId(_))
        ));
    }

    #[test]
    fn test_missing_fields_and_bad_ids() {
        let reg = SoftwareRegistration::new("blender", "")
            .descriptor("install", qualifier(), Arc::new(GenericDescriptor));
        assert!(matches!(
            SoftwareHandler::from_registration("org.blender", reg),
            Err(Error::Validation(_))
        ));

        let reg = SoftwareRegistration::new("blender", "Blender");
        assert!(matches!(
            SoftwareHandler::from_registration("org.blender", reg),
            Err(Error::Validation(_))
        ));

        let reg = SoftwareRegistration::new("bl..ender", "Blender")
            .descriptor("install", qualifier(), Arc::new(GenericDescriptor));
        assert!(matches!(
            SoftwareHandler::from_registration("org.blender", reg),
            Err(Error::InvalidUid(_))
        ));

        let reg = SoftwareRegistration::new("blender", "Blender")
            .descriptor("in/stall", qualifier(), Arc::new(GenericDescriptor));
        assert!(SoftwareHandler::from_registration("org.blender", reg).is_err());
    }

    #[test]
    fn test_descriptor_reading_unrequested_file() {
        let factory = VersionedDescriptor::new("VERSION", r"(\d+)").unwrap();
        let reg = SoftwareRegistration::new("blender", "Blender")
            .descriptor("install", qualifier(), Arc::new(factory));
        let err = SoftwareHandler::from_registration("org.blender", reg).unwrap_err();
        assert!(matches!(err, Error::Contract { ref owner, .. } if owner == "org.blender#blender"));
    }

    #[test]
    fn test_duplicate_setting_keys() {
        let entry = SettingEntry {
            key: "exe".into(),
            label: "Executable".into(),
            default: serde_json::Value::Null,
        };
        let reg = base().settings(SoftwareSettings {
            entries: vec![entry.clone(), entry],
        });
        assert!(SoftwareHandler::from_registration("org.blender", reg).is_err());
    }
}

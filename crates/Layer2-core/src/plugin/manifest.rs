//! Plugin Manifest - 플러그인 메타데이터 및 `name/name.toml` 파일 구조
//!
//! ```toml
//! id = "org.blender"
//! version = "1.4.0"
//! name = "Blender"
//!
//! [[software]]
//! id = "blender"
//! name = "Blender"
//!
//! [software.descriptors.install.qualifier.identification]
//! required_files = ["blender", ["VERSION", "version.txt"]]
//! file_contents = [{ path = "VERSION", limit = 256 }]
//!
//! [software.descriptors.install.descriptor]
//! kind = "versioned"
//! file = "VERSION"
//! pattern = '(\d+\.\d+\.\d+)'
//!
//! [software.views.tiles]
//! grid = "BlenderTiles"
//! ```

use crate::descriptor::{DescriptorFactory, GenericDescriptor, VersionedDescriptor};
use crate::qualifier::{ContentRuleSpec, DeclarativeQualifier, Qualifier, QualifierIdentificationConfig};
use crate::software::{
    MenuItem, NamedViewBuilder, SettingEntry, SoftwareRegistration, SoftwareSettings, ViewBuilder,
    ViewKind,
};
use qavm_foundation::uid::is_plugin_id_valid;
use qavm_foundation::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

// ============================================================================
// PluginVersion
// ============================================================================

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,4})$").expect("valid regex"))
}

/// 플러그인 버전 (`D{1,3}.D{1,3}.D{1,4}`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PluginVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PluginVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// 버전 문자열 파싱 (예: "1.2.3")
    pub fn parse(s: &str) -> Option<Self> {
        let caps = version_re().captures(s)?;
        Some(Self {
            major: caps[1].parse().ok()?,
            minor: caps[2].parse().ok()?,
            patch: caps[3].parse().ok()?,
        })
    }
}

impl std::fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl TryFrom<String> for PluginVersion {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s).ok_or_else(|| Error::Validation(format!("invalid plugin version {s:?}")))
    }
}

impl From<PluginVersion> for String {
    fn from(v: PluginVersion) -> Self {
        v.to_string()
    }
}

// ============================================================================
// PluginMetadata
// ============================================================================

/// Mandatory `id` + `version`, optional descriptive fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginMetadata {
    pub id: String,
    pub version: PluginVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl PluginMetadata {
    /// Validates the id against the plugin-id grammar
    pub fn new(id: impl Into<String>, version: PluginVersion) -> Result<Self> {
        let id = id.into();
        if !is_plugin_id_valid(&id) {
            return Err(Error::InvalidUid(format!("plugin id {id:?}")));
        }
        Ok(Self {
            id,
            version,
            variant: None,
            name: None,
            developer: None,
            website: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn with_developer(mut self, developer: impl Into<String>) -> Self {
        self.developer = Some(developer.into());
        self
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    /// Name if set, id otherwise
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

// ============================================================================
// ManifestFile - name.toml 파일 구조
// ============================================================================

/// Raw manifest. Parsing checks shape only; [`ManifestFile::metadata`]
/// validates metadata and [`ManifestFile::registrations`] builds the typed
/// registration records.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestFile {
    pub id: Option<String>,
    pub version: Option<String>,
    pub variant: Option<String>,
    pub name: Option<String>,
    pub developer: Option<String>,
    pub website: Option<String>,

    #[serde(default)]
    pub software: Vec<SoftwareEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SoftwareEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub descriptors: BTreeMap<String, DescriptorEntry>,
    #[serde(default)]
    pub views: ViewsEntry,
    pub settings: Option<Vec<SettingEntry>>,
    #[serde(default)]
    pub menuitems: Vec<MenuItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescriptorEntry {
    #[serde(default)]
    pub qualifier: QualifierEntry,
    #[serde(default)]
    pub descriptor: DescriptorKindEntry,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualifierEntry {
    #[serde(default)]
    pub identification: QualifierIdentificationConfig,
    #[serde(default)]
    pub rules: Vec<ContentRuleSpec>,
    #[serde(default)]
    pub search_paths: Vec<String>,
}

/// Closed set of descriptor kinds available to manifest plugins
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", deny_unknown_fields)]
pub enum DescriptorKindEntry {
    #[default]
    Generic,
    Versioned { file: String, pattern: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewsEntry {
    #[serde(default)]
    pub tiles: BTreeMap<String, ViewEntry>,
    #[serde(default)]
    pub table: BTreeMap<String, ViewEntry>,
    #[serde(default)]
    pub custom: BTreeMap<String, ViewEntry>,
}

/// `key = "Builder"` or `key = { builder = "Builder", kind = "table" }`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ViewEntry {
    Name(String),
    Builder { builder: String, kind: ViewKind },
}

impl ManifestFile {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn metadata(&self) -> Result<PluginMetadata> {
        let id = self
            .id
            .as_deref()
            .ok_or_else(|| Error::Validation("missing plugin id".into()))?;
        let version = self
            .version
            .as_deref()
            .ok_or_else(|| Error::Validation(format!("{id}: missing plugin version")))?;
        let version = PluginVersion::parse(version)
            .ok_or_else(|| Error::Validation(format!("{id}: invalid version {version:?}")))?;

        let mut metadata = PluginMetadata::new(id, version)?;
        metadata.variant = self.variant.clone();
        metadata.name = self.name.clone();
        metadata.developer = self.developer.clone();
        metadata.website = self.website.clone();
        Ok(metadata)
    }

    /// Typed registration records, one per `[[software]]`
    pub fn registrations(&self) -> Result<Vec<SoftwareRegistration>> {
        self.software.iter().map(SoftwareEntry::to_registration).collect()
    }
}

impl SoftwareEntry {
    fn to_registration(&self) -> Result<SoftwareRegistration> {
        let mut reg = SoftwareRegistration::new(&self.id, &self.name);

        for (key, entry) in &self.descriptors {
            let qualifier = entry.qualifier.build()?;
            let factory = entry.descriptor.build()?;
            reg = reg.descriptor(key, qualifier, factory);
        }

        let views = [
            (ViewKind::Tiles, &self.views.tiles),
            (ViewKind::Table, &self.views.table),
            (ViewKind::Custom, &self.views.custom),
        ];
        for (kind, entries) in views {
            for (key, view) in entries {
                let builder: Arc<dyn ViewBuilder> = match view {
                    ViewEntry::Name(name) => Arc::new(NamedViewBuilder::new(kind, name)),
                    ViewEntry::Builder { builder, kind } => Arc::new(NamedViewBuilder::new(*kind, builder)),
                };
                reg = reg.view(kind, key, builder);
            }
        }

        if let Some(entries) = &self.settings {
            reg = reg.settings(SoftwareSettings {
                entries: entries.clone(),
            });
        }
        reg.menu_items = self.menuitems.clone();
        Ok(reg)
    }
}

impl QualifierEntry {
    fn build(&self) -> Result<Arc<dyn Qualifier>> {
        let mut qualifier = DeclarativeQualifier::new(self.identification.clone())
            .with_rules(self.rules.iter().cloned())?;
        for path in &self.search_paths {
            qualifier = qualifier.with_search_path(path);
        }
        Ok(Arc::new(qualifier))
    }
}

impl DescriptorKindEntry {
    fn build(&self) -> Result<Arc<dyn DescriptorFactory>> {
        Ok(match self {
            DescriptorKindEntry::Generic => Arc::new(GenericDescriptor),
            DescriptorKindEntry::Versioned { file, pattern } => {
                Arc::new(VersionedDescriptor::new(file.clone(), pattern)?)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::SoftwareHandler;

    const MANIFEST: &str = r#"
id = "org.blender"
version = "1.4.0"
name = "Blender"
developer = "QAVM"

[[software]]
id = "blender"
name = "Blender"

[software.descriptors.install.qualifier]
search_paths = ["/opt"]

[software.descriptors.install.qualifier.identification]
required_files = ["blender", ["VERSION", "version.txt"]]
file_contents = [{ path = "VERSION", limit = 256 }]

[software.descriptors.install.descriptor]
kind = "versioned"
file = "VERSION"
pattern = '(\d+\.\d+\.\d+)'

[software.views.tiles]
grid = "BlenderTiles"

[software.views.table]
list = { builder = "BlenderTable", kind = "table" }

[[software.settings]]
key = "exe"
label = "Executable"
default = "blender"

[[software.menuitems]]
key = "open"
label = "Open folder"
"#;

    #[test]
    fn test_version_parse() {
        assert_eq!(PluginVersion::parse("1.2.3"), Some(PluginVersion::new(1, 2, 3)));
        assert_eq!(PluginVersion::parse("999.999.9999").map(|v| v.patch), Some(9999));
        assert!(PluginVersion::parse("1000.0.0").is_none());
        assert!(PluginVersion::parse("1.2").is_none());
        assert!(PluginVersion::parse("1.2.3-beta").is_none());
        assert!(PluginVersion::parse("v1.2.3").is_none());
        assert_eq!(PluginVersion::new(0, 10, 2).to_string(), "0.10.2");
    }

    #[test]
    fn test_full_manifest() {
        let manifest = ManifestFile::parse(MANIFEST).unwrap();
        let metadata = manifest.metadata().unwrap();
        assert_eq!(metadata.id, "org.blender");
        assert_eq!(metadata.version, PluginVersion::new(1, 4, 0));
        assert_eq!(metadata.developer.as_deref(), Some("QAVM"));

        let regs = manifest.registrations().unwrap();
        assert_eq!(regs.len(), 1);
        let handler = SoftwareHandler::from_registration(&metadata.id, regs.into_iter().next().unwrap()).unwrap();
        assert_eq!(handler.uid(), "org.blender#blender");
        assert_eq!(handler.view_uids(ViewKind::Table), vec!["org.blender#blender#view/table/list"]);
        assert_eq!(handler.settings().and_then(|s| s.get("exe")).map(|e| e.label.as_str()), Some("Executable"));
        assert_eq!(handler.menu_items().len(), 1);
        let install = handler.descriptor("install").unwrap();
        assert_eq!(install.factory.kind(), "versioned");
    }

    #[test]
    fn test_missing_metadata() {
        let no_version = ManifestFile::parse(r#"id = "a.b""#).unwrap();
        assert!(matches!(no_version.metadata(), Err(Error::Validation(_))));

        let bad_version = ManifestFile::parse("id = \"a.b\"\nversion = \"1.0\"").unwrap();
        assert!(bad_version.metadata().is_err());

        let bad_id = ManifestFile::parse("id = \"a..b\"\nversion = \"1.0.0\"").unwrap();
        assert!(matches!(bad_id.metadata(), Err(Error::InvalidUid(_))));
    }

    #[test]
    fn test_unknown_keys_and_kinds_rejected() {
        assert!(ManifestFile::parse("id = \"a.b\"\nversion = \"1.0.0\"\nmain = \"x.py\"").is_err());

        let unknown_kind = r#"
id = "a.b"
version = "1.0.0"
[[software]]
id = "x"
name = "X"
[software.descriptors.install.descriptor]
kind = "scripted"
"#;
        assert!(ManifestFile::parse(unknown_kind).is_err());
    }

    #[test]
    fn test_view_kind_mismatch_reaches_registration() {
        let manifest = r#"
id = "a.b"
version = "1.0.0"
[[software]]
id = "x"
name = "X"
[software.descriptors.install]
[software.views.tiles]
grid = { builder = "XTable", kind = "table" }
"#;
        let manifest = ManifestFile::parse(manifest).unwrap();
        let reg = manifest.registrations().unwrap().remove(0);
        assert!(matches!(
            SoftwareHandler::from_registration("a.b", reg),
            Err(Error::Contract { .. })
        ));
    }
}

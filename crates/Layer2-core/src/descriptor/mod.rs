//! Descriptor - 식별된 설치본 하나의 레코드
//!
//! The scanner creates a [`DescriptorBuilder`] for every identified directory,
//! hands it to the handler's [`DescriptorFactory`], and freezes the result into
//! an immutable [`Descriptor`].

use crate::qualifier::{FileContents, QualifierIdentificationConfig};
use chrono::{DateTime, Utc};
use qavm_foundation::{Error, Result};
use regex::Regex;
use ring::digest;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

// ============================================================================
// LinkType
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Plain,
    Symlink,
    Junction,
}

impl LinkType {
    /// Classify `path` without following it
    pub fn detect(path: &Path) -> Self {
        let Ok(meta) = std::fs::symlink_metadata(path) else {
            return LinkType::Plain;
        };
        if is_junction(&meta) {
            LinkType::Junction
        } else if meta.file_type().is_symlink() {
            LinkType::Symlink
        } else {
            LinkType::Plain
        }
    }

    pub fn is_link(&self) -> bool {
        !matches!(self, LinkType::Plain)
    }
}

impl std::fmt::Display for LinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkType::Plain => write!(f, "plain"),
            LinkType::Symlink => write!(f, "symlink"),
            LinkType::Junction => write!(f, "junction"),
        }
    }
}

#[cfg(windows)]
fn is_junction(meta: &std::fs::Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x400;
    const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x10;
    let attrs = meta.file_attributes();
    // std reports directory symlinks as symlinks; remaining directory reparse
    // points are mount points (junctions)
    attrs & FILE_ATTRIBUTE_REPARSE_POINT != 0
        && attrs & FILE_ATTRIBUTE_DIRECTORY != 0
        && !meta.file_type().is_symlink()
}

#[cfg(not(windows))]
fn is_junction(_meta: &std::fs::Metadata) -> bool {
    false
}

// ============================================================================
// Descriptor
// ============================================================================

/// Hex SHA-256 of the canonical absolute path (falls back to the absolute path
/// when canonicalization fails).
pub fn descriptor_uid(path: &Path) -> String {
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| absolute(path));
    let hash = digest::digest(&digest::SHA256, canonical.to_string_lossy().as_bytes());
    hex::encode(hash.as_ref())
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Immutable record for one identified installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    uid: String,
    path: PathBuf,
    link_type: LinkType,
    software_uid: String,
    type_key: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    fields: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified: Option<DateTime<Utc>>,
}

impl Descriptor {
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    /// `plugin#software` of the owning handler
    pub fn software_uid(&self) -> &str {
        &self.software_uid
    }

    pub fn type_key(&self) -> &str {
        &self.type_key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }
}

// ============================================================================
// DescriptorBuilder
// ============================================================================

/// Mutable staging area handed to a [`DescriptorFactory`]
#[derive(Debug)]
pub struct DescriptorBuilder {
    inner: Descriptor,
}

impl DescriptorBuilder {
    /// Gathers uid, link type and modification time from the filesystem.
    /// The display name defaults to the directory name.
    pub fn new(path: &Path, software_uid: &str, type_key: &str) -> Self {
        let path = absolute(path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Self {
            inner: Descriptor {
                uid: descriptor_uid(&path),
                link_type: LinkType::detect(&path),
                path,
                software_uid: software_uid.to_string(),
                type_key: type_key.to_string(),
                name,
                version: None,
                fields: BTreeMap::new(),
                modified,
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn uid(&self) -> &str {
        &self.inner.uid
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.inner.name = name.into();
        self
    }

    pub fn set_version(&mut self, version: impl Into<String>) -> &mut Self {
        self.inner.version = Some(version.into());
        self
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.inner.fields.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Descriptor {
        self.inner
    }
}

// ============================================================================
// DescriptorFactory
// ============================================================================

/// Fills kind-specific fields of a descriptor
pub trait DescriptorFactory: Send + Sync + Debug {
    /// Kind name (`generic`, `versioned`, or a native plugin's own)
    fn kind(&self) -> &str;

    /// Text file this factory reads; registration checks that the qualifier
    /// requests it.
    fn required_text_file(&self) -> Option<&str> {
        None
    }

    fn populate(&self, builder: &mut DescriptorBuilder, contents: &FileContents) -> Result<()>;

    /// Registration-time check against the paired qualifier's config
    fn check_config(&self, config: &QualifierIdentificationConfig) -> Result<()> {
        let Some(file) = self.required_text_file() else {
            return Ok(());
        };
        let requested = config
            .file_contents()
            .iter()
            .any(|fc| fc.path == file && !fc.binary);
        if requested {
            Ok(())
        } else {
            Err(Error::contract(
                self.kind(),
                format!("descriptor reads {file:?} but the qualifier does not request it as text"),
            ))
        }
    }
}

/// Name = directory name, nothing else
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericDescriptor;

impl DescriptorFactory for GenericDescriptor {
    fn kind(&self) -> &str {
        "generic"
    }

    fn populate(&self, _builder: &mut DescriptorBuilder, _contents: &FileContents) -> Result<()> {
        Ok(())
    }
}

/// Captures the version (and optionally the display name) from one text file.
///
/// Group `version` (or the first group) becomes the version, group `name`
/// becomes the display name, other named groups land in `fields`.
#[derive(Debug, Clone)]
pub struct VersionedDescriptor {
    file: String,
    pattern: Regex,
}

impl VersionedDescriptor {
    pub fn new(file: impl Into<String>, pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)?;
        if pattern.captures_len() < 2 {
            return Err(Error::Validation(format!(
                "version pattern {:?} has no capture group",
                pattern.as_str()
            )));
        }
        Ok(Self {
            file: file.into(),
            pattern,
        })
    }
}

impl DescriptorFactory for VersionedDescriptor {
    fn kind(&self) -> &str {
        "versioned"
    }

    fn required_text_file(&self) -> Option<&str> {
        Some(&self.file)
    }

    fn populate(&self, builder: &mut DescriptorBuilder, contents: &FileContents) -> Result<()> {
        let Some(caps) = contents.text(&self.file).and_then(|t| self.pattern.captures(t)) else {
            return Ok(());
        };

        let version = caps.name("version").or_else(|| caps.get(1));
        if let Some(version) = version {
            builder.set_version(version.as_str().trim());
        }
        for group in self.pattern.capture_names().flatten() {
            let Some(value) = caps.name(group) else {
                continue;
            };
            match group {
                "version" => {}
                "name" => {
                    builder.set_name(value.as_str().trim());
                }
                other => {
                    builder.set_field(other, value.as_str().trim());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qualifier::{Contents, FileContentSpec};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_uid_is_stable_sha256_hex() {
        let temp = TempDir::new().unwrap();
        let a = descriptor_uid(temp.path());
        let b = descriptor_uid(&temp.path().join("."));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, b);
    }

    #[test]
    fn test_builder_defaults() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("Blender 4.1");
        fs::create_dir(&dir).unwrap();

        let descriptor = DescriptorBuilder::new(&dir, "org.blender#blender", "install").build();
        assert_eq!(descriptor.name(), "Blender 4.1");
        assert_eq!(descriptor.link_type(), LinkType::Plain);
        assert_eq!(descriptor.software_uid(), "org.blender#blender");
        assert_eq!(descriptor.type_key(), "install");
        assert!(descriptor.version().is_none());
        assert!(descriptor.modified().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_detected() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("real");
        let link = temp.path().join("link");
        fs::create_dir(&target).unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert_eq!(LinkType::detect(&target), LinkType::Plain);
        assert_eq!(LinkType::detect(&link), LinkType::Symlink);
    }

    #[test]
    fn test_versioned_descriptor() {
        let factory =
            VersionedDescriptor::new("VERSION", r"(?P<name>\w+) (?P<version>[\d.]+)(?: \((?P<channel>\w+)\))?")
                .unwrap();

        let temp = TempDir::new().unwrap();
        let mut builder = DescriptorBuilder::new(temp.path(), "a.b#c", "install");
        let mut contents = FileContents::new();
        contents.insert("VERSION", Some(Contents::Text("Houdini 20.0.547 (lts)".into())));

        factory.populate(&mut builder, &contents).unwrap();
        let descriptor = builder.build();
        assert_eq!(descriptor.name(), "Houdini");
        assert_eq!(descriptor.version(), Some("20.0.547"));
        assert_eq!(descriptor.field("channel"), Some("lts"));
    }

    #[test]
    fn test_versioned_descriptor_missing_file_keeps_defaults() {
        let factory = VersionedDescriptor::new("VERSION", r"([\d.]+)").unwrap();
        let temp = TempDir::new().unwrap();
        let mut builder = DescriptorBuilder::new(temp.path(), "a.b#c", "install");
        let mut contents = FileContents::new();
        contents.insert("VERSION", None);

        factory.populate(&mut builder, &contents).unwrap();
        assert!(builder.build().version().is_none());
    }

    #[test]
    fn test_versioned_requires_group_and_requested_file() {
        assert!(VersionedDescriptor::new("VERSION", r"\d+").is_err());

        let factory = VersionedDescriptor::new("VERSION", r"(\d+)").unwrap();
        let without = QualifierIdentificationConfig::new();
        assert!(matches!(
            factory.check_config(&without),
            Err(Error::Contract { .. })
        ));

        let with = QualifierIdentificationConfig::builder()
            .file_content(FileContentSpec::text("VERSION"))
            .build()
            .unwrap();
        assert!(factory.check_config(&with).is_ok());
    }
}

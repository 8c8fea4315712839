//! Qualifier Identification Config - 선언적 파일/디렉토리 매칭 규칙
//!
//! A config answers "could this directory be an installation?" from the
//! presence/absence of a handful of relative paths, and lists which files the
//! qualifier wants to read before making the final call.

use qavm_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path};
use tracing::trace;

// ============================================================================
// PathRule - 단일 경로 또는 OR 그룹
// ============================================================================

/// A required entry: one relative path, or a list of alternatives of which at
/// least one must exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathRule {
    Single(String),
    AnyOf(Vec<String>),
}

impl PathRule {
    fn paths(&self) -> &[String] {
        match self {
            PathRule::Single(path) => std::slice::from_ref(path),
            PathRule::AnyOf(paths) => paths,
        }
    }

    fn is_satisfied(&self, dir: &Path, exists: fn(&Path) -> bool) -> bool {
        self.paths().iter().any(|p| exists(&dir.join(p)))
    }
}

impl From<&str> for PathRule {
    fn from(path: &str) -> Self {
        PathRule::Single(path.to_string())
    }
}

impl<const N: usize> From<[&str; N]> for PathRule {
    fn from(paths: [&str; N]) -> Self {
        PathRule::AnyOf(paths.iter().map(|p| p.to_string()).collect())
    }
}

// ============================================================================
// FileContentSpec / Contents
// ============================================================================

/// Which file to read for the qualifier, and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileContentSpec {
    pub path: String,

    #[serde(default)]
    pub binary: bool,

    /// 최대 읽기 바이트 수
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl FileContentSpec {
    pub fn text(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            binary: false,
            limit: None,
        }
    }

    pub fn binary(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            binary: true,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Contents of one requested file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contents {
    Text(String),
    Binary(Vec<u8>),
}

/// Result of [`QualifierIdentificationConfig::read_contents`]: every requested
/// path maps to `Some(contents)` or `None` when it could not be read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileContents {
    entries: BTreeMap<String, Option<Contents>>,
}

impl FileContents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, contents: Option<Contents>) {
        self.entries.insert(path.into(), contents);
    }

    pub fn get(&self, path: &str) -> Option<&Contents> {
        self.entries.get(path).and_then(|c| c.as_ref())
    }

    /// Text contents, `None` if missing or read as binary
    pub fn text(&self, path: &str) -> Option<&str> {
        match self.get(path)? {
            Contents::Text(text) => Some(text),
            Contents::Binary(_) => None,
        }
    }

    /// Raw bytes regardless of how the file was read
    pub fn bytes(&self, path: &str) -> Option<&[u8]> {
        match self.get(path)? {
            Contents::Text(text) => Some(text.as_bytes()),
            Contents::Binary(bytes) => Some(bytes),
        }
    }

    /// Requested paths, including those that could not be read
    pub fn requested(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// QualifierIdentificationConfig
// ============================================================================

/// Immutable matching rules. An empty config matches every directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawIdentificationConfig", into = "RawIdentificationConfig")]
pub struct QualifierIdentificationConfig {
    required_files: Vec<PathRule>,
    required_dirs: Vec<PathRule>,
    negative_files: Vec<String>,
    negative_dirs: Vec<String>,
    file_contents: Vec<FileContentSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct RawIdentificationConfig {
    required_files: Vec<PathRule>,
    required_dirs: Vec<PathRule>,
    negative_files: Vec<String>,
    negative_dirs: Vec<String>,
    file_contents: Vec<FileContentSpec>,
}

impl TryFrom<RawIdentificationConfig> for QualifierIdentificationConfig {
    type Error = Error;

    fn try_from(raw: RawIdentificationConfig) -> Result<Self> {
        let config = Self {
            required_files: raw.required_files,
            required_dirs: raw.required_dirs,
            negative_files: raw.negative_files,
            negative_dirs: raw.negative_dirs,
            file_contents: raw.file_contents,
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<QualifierIdentificationConfig> for RawIdentificationConfig {
    fn from(config: QualifierIdentificationConfig) -> Self {
        Self {
            required_files: config.required_files,
            required_dirs: config.required_dirs,
            negative_files: config.negative_files,
            negative_dirs: config.negative_dirs,
            file_contents: config.file_contents,
        }
    }
}

impl QualifierIdentificationConfig {
    /// Permissive config (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> IdentificationConfigBuilder {
        IdentificationConfigBuilder::default()
    }

    /// Parse and validate from a JSON value
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::Config(format!("identification config: {e}")))
    }

    pub fn required_files(&self) -> &[PathRule] {
        &self.required_files
    }

    pub fn required_dirs(&self) -> &[PathRule] {
        &self.required_dirs
    }

    pub fn negative_files(&self) -> &[String] {
        &self.negative_files
    }

    pub fn negative_dirs(&self) -> &[String] {
        &self.negative_dirs
    }

    pub fn file_contents(&self) -> &[FileContentSpec] {
        &self.file_contents
    }

    pub fn is_empty(&self) -> bool {
        self.required_files.is_empty()
            && self.required_dirs.is_empty()
            && self.negative_files.is_empty()
            && self.negative_dirs.is_empty()
            && self.file_contents.is_empty()
    }

    fn validate(&self) -> Result<()> {
        let rules = self.required_files.iter().chain(self.required_dirs.iter());
        for rule in rules {
            if let PathRule::AnyOf(paths) = rule {
                if paths.is_empty() {
                    return Err(Error::Config("empty alternative group in required paths".into()));
                }
            }
            for path in rule.paths() {
                check_relative(path)?;
            }
        }
        for path in self.negative_files.iter().chain(self.negative_dirs.iter()) {
            check_relative(path)?;
        }
        for spec in &self.file_contents {
            check_relative(&spec.path)?;
        }
        Ok(())
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Required entries must exist, negative entries must not. Stops at the
    /// first failing rule.
    pub fn matches(&self, dir: &Path) -> bool {
        self.required_files.iter().all(|rule| rule.is_satisfied(dir, is_file))
            && self.required_dirs.iter().all(|rule| rule.is_satisfied(dir, is_dir))
            && !self.negative_files.iter().any(|p| dir.join(p).is_file())
            && !self.negative_dirs.iter().any(|p| dir.join(p).is_dir())
    }

    /// Best-effort read of every requested file. Unreadable files become `None`.
    pub fn read_contents(&self, dir: &Path) -> FileContents {
        let mut contents = FileContents::new();
        for spec in &self.file_contents {
            let read = read_limited(&dir.join(&spec.path), spec.limit);
            let value = match read {
                Ok(bytes) if spec.binary => Some(Contents::Binary(bytes)),
                Ok(bytes) => Some(Contents::Text(String::from_utf8_lossy(&bytes).into_owned())),
                Err(e) => {
                    trace!("Skipping unreadable {:?} in {:?}: {}", spec.path, dir, e);
                    None
                }
            };
            contents.insert(spec.path.clone(), value);
        }
        contents
    }
}

fn is_file(path: &Path) -> bool {
    path.is_file()
}

fn is_dir(path: &Path) -> bool {
    path.is_dir()
}

fn check_relative(path: &str) -> Result<()> {
    let p = Path::new(path);
    let escapes = p
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if path.is_empty() || escapes {
        return Err(Error::Config(format!(
            "identification path must be relative and stay inside the directory: {path:?}"
        )));
    }
    Ok(())
}

fn read_limited(path: &Path, limit: Option<usize>) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut buf = Vec::new();
    match limit {
        Some(limit) => {
            file.take(limit as u64).read_to_end(&mut buf)?;
        }
        None => {
            let mut file = file;
            file.read_to_end(&mut buf)?;
        }
    }
    Ok(buf)
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`QualifierIdentificationConfig`]; `build` validates.
#[derive(Debug, Default)]
pub struct IdentificationConfigBuilder {
    raw: RawIdentificationConfig,
}

impl IdentificationConfigBuilder {
    pub fn required_file(mut self, rule: impl Into<PathRule>) -> Self {
        self.raw.required_files.push(rule.into());
        self
    }

    pub fn required_dir(mut self, rule: impl Into<PathRule>) -> Self {
        self.raw.required_dirs.push(rule.into());
        self
    }

    pub fn negative_file(mut self, path: impl Into<String>) -> Self {
        self.raw.negative_files.push(path.into());
        self
    }

    pub fn negative_dir(mut self, path: impl Into<String>) -> Self {
        self.raw.negative_dirs.push(path.into());
        self
    }

    pub fn file_content(mut self, spec: FileContentSpec) -> Self {
        self.raw.file_contents.push(spec);
        self
    }

    pub fn build(self) -> Result<QualifierIdentificationConfig> {
        QualifierIdentificationConfig::try_from(self.raw)
    }
}

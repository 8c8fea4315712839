//! Plugin Loader - `name/name.toml` 패키지 로드
//!
//! 단계: Discovered → Loaded (파싱) → Validated (메타데이터) → Registered
//! (핸들러 생성). 실패하면 해당 플러그인만 Rejected.

use super::manifest::{ManifestFile, PluginMetadata};
use super::signature::FolderSnapshot;
use super::{Plugin, PluginOrigin};
use qavm_foundation::Error;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ============================================================================
// LoadStage / Rejection / LoadReport
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadStage {
    Discovered,
    Loaded,
    Validated,
    Registered,
    Rejected,
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LoadStage::Discovered => "discovered",
            LoadStage::Loaded => "loaded",
            LoadStage::Validated => "validated",
            LoadStage::Registered => "registered",
            LoadStage::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Why a candidate did not make it. `stage` is the step that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub path: PathBuf,
    pub stage: LoadStage,
    pub reason: String,
}

impl Rejection {
    pub fn new(path: impl Into<PathBuf>, stage: LoadStage, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            stage,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.path.display(), self.stage, self.reason)
    }
}

/// Outcome of loading one plugin folder
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub pending: Vec<String>,
    pub rejected: Vec<Rejection>,
}

impl LoadReport {
    pub fn merge(&mut self, other: LoadReport) {
        self.loaded.extend(other.loaded);
        self.pending.extend(other.pending);
        self.rejected.extend(other.rejected);
    }

    pub fn reject(&mut self, rejection: Rejection) {
        warn!(
            path = %rejection.path.display(),
            stage = %rejection.stage,
            "Plugin rejected: {}",
            rejection.reason
        );
        self.rejected.push(rejection);
    }
}

// ============================================================================
// PluginTrust
// ============================================================================

/// Fully built plugin that is not yet in the index
#[derive(Debug)]
pub struct PendingPlugin {
    plugin: Plugin,
}

impl PendingPlugin {
    pub fn id(&self) -> &str {
        self.plugin.id()
    }

    pub fn metadata(&self) -> &PluginMetadata {
        self.plugin.metadata()
    }

    pub fn path(&self) -> Option<&Path> {
        self.plugin.path()
    }

    pub(crate) fn into_plugin(self) -> Plugin {
        self.plugin
    }
}

#[derive(Debug)]
pub enum PluginTrust {
    Trusted(Plugin),
    Untrusted(PendingPlugin),
}

impl PluginTrust {
    /// Built-in (already verified) and native plugins are trusted; user plugins
    /// only when `trust_user_plugins` is set.
    pub fn classify(plugin: Plugin, trust_user_plugins: bool) -> Self {
        match plugin.origin() {
            PluginOrigin::Builtin | PluginOrigin::Native => PluginTrust::Trusted(plugin),
            PluginOrigin::User if trust_user_plugins => PluginTrust::Trusted(plugin),
            PluginOrigin::User => PluginTrust::Untrusted(PendingPlugin { plugin }),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            PluginTrust::Trusted(plugin) => plugin.id(),
            PluginTrust::Untrusted(pending) => pending.id(),
        }
    }

    pub fn is_trusted(&self) -> bool {
        matches!(self, PluginTrust::Trusted(_))
    }
}

// ============================================================================
// PluginLoader
// ============================================================================

pub struct PluginLoader;

impl PluginLoader {
    /// `<dir>/<dirName>.toml`
    pub fn entry_file(dir: &Path) -> Option<PathBuf> {
        let name = dir.file_name()?.to_string_lossy().to_string();
        Some(dir.join(format!("{name}.toml")))
    }

    /// Sorted plugin directories directly under `folder`
    pub fn candidates(folder: &Path) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(folder) else {
            debug!(folder = %folder.display(), "Plugin folder not readable");
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();
        dirs
    }

    pub fn load_from_path(dir: &Path, origin: PluginOrigin) -> Result<Plugin, Rejection> {
        // Discovered
        let entry = Self::entry_file(dir)
            .filter(|entry| entry.is_file())
            .ok_or_else(|| Self::missing_entry(dir))?;

        // Loaded
        let content = std::fs::read_to_string(&entry)
            .map_err(|e| Rejection::new(dir, LoadStage::Loaded, e.to_string()))?;
        Self::build(dir, &content, origin)
    }

    /// Build from an already verified snapshot of `dir`; the folder is not
    /// read again.
    pub fn load_from_snapshot(
        dir: &Path,
        snapshot: &FolderSnapshot,
        origin: PluginOrigin,
    ) -> Result<Plugin, Rejection> {
        // Discovered
        let name = dir
            .file_name()
            .map(|n| format!("{}.toml", n.to_string_lossy()))
            .ok_or_else(|| Self::missing_entry(dir))?;
        let bytes = snapshot.file(&name).ok_or_else(|| Self::missing_entry(dir))?;

        // Loaded
        let content = std::str::from_utf8(bytes)
            .map_err(|e| Rejection::new(dir, LoadStage::Loaded, e.to_string()))?;
        Self::build(dir, content, origin)
    }

    fn missing_entry(dir: &Path) -> Rejection {
        let err = Error::plugin(dir, "missing entry file <name>/<name>.toml");
        Rejection::new(dir, LoadStage::Discovered, err.to_string())
    }

    fn build(dir: &Path, content: &str, origin: PluginOrigin) -> Result<Plugin, Rejection> {
        let manifest = ManifestFile::parse(content)
            .map_err(|e| Rejection::new(dir, LoadStage::Loaded, e.to_string()))?;
        debug!(path = %dir.display(), "Plugin manifest parsed");

        // Validated
        let metadata = manifest
            .metadata()
            .map_err(|e| Rejection::new(dir, LoadStage::Validated, e.to_string()))?;

        // Registered
        let plugin = manifest
            .registrations()
            .and_then(|regs| Plugin::new(metadata, origin, Some(dir.to_path_buf()), regs))
            .map_err(|e| Rejection::new(dir, LoadStage::Registered, e.to_string()))?;

        debug!(
            id = plugin.id(),
            version = %plugin.version(),
            handlers = plugin.software_handlers().count(),
            "Plugin built"
        );
        Ok(plugin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_plugin(root: &Path, dir: &str, manifest: &str) -> PathBuf {
        let path = root.join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join(format!("{dir}.toml")), manifest).unwrap();
        path
    }

    const GOOD: &str = r#"
id = "org.sample"
version = "1.0.0"

[[software]]
id = "tool"
name = "Tool"

[software.descriptors.install.qualifier.identification]
required_files = ["tool.bin"]
"#;

    #[test]
    fn test_load_good_plugin() {
        let temp = TempDir::new().unwrap();
        let dir = write_plugin(temp.path(), "sample", GOOD);
        let plugin = PluginLoader::load_from_path(&dir, PluginOrigin::User).unwrap();
        assert_eq!(plugin.id(), "org.sample");
        assert_eq!(plugin.path(), Some(dir.as_path()));
        assert!(plugin.software_handler("tool").is_some());
    }

    #[test]
    fn test_rejection_stages() {
        let temp = TempDir::new().unwrap();

        let no_entry = temp.path().join("empty");
        fs::create_dir(&no_entry).unwrap();
        fs::write(no_entry.join("other.toml"), GOOD).unwrap();
        let r = PluginLoader::load_from_path(&no_entry, PluginOrigin::User).unwrap_err();
        assert_eq!(r.stage, LoadStage::Discovered);
        assert!(r.reason.contains("missing entry file"));

        let bad_toml = write_plugin(temp.path(), "broken", "id = ");
        let r = PluginLoader::load_from_path(&bad_toml, PluginOrigin::User).unwrap_err();
        assert_eq!(r.stage, LoadStage::Loaded);

        let bad_version = write_plugin(temp.path(), "badver", "id = \"a.b\"\nversion = \"1\"");
        let r = PluginLoader::load_from_path(&bad_version, PluginOrigin::User).unwrap_err();
        assert_eq!(r.stage, LoadStage::Validated);

        let dup = format!("{GOOD}\n[[software]]\nid = \"tool\"\nname = \"Again\"\n[software.descriptors.install]\n");
        let dup = write_plugin(temp.path(), "dup", &dup);
        let r = PluginLoader::load_from_path(&dup, PluginOrigin::User).unwrap_err();
        assert_eq!(r.stage, LoadStage::Registered);
        assert!(r.reason.contains("Duplicate"));
    }

    #[test]
    fn test_load_from_snapshot_ignores_later_edits() {
        let temp = TempDir::new().unwrap();
        let dir = write_plugin(temp.path(), "sample", GOOD);
        let snapshot = FolderSnapshot::read(&dir).unwrap();
        fs::write(dir.join("sample.toml"), GOOD.replace("org.sample", "org.swapped")).unwrap();

        let plugin = PluginLoader::load_from_snapshot(&dir, &snapshot, PluginOrigin::Builtin).unwrap();
        assert_eq!(plugin.id(), "org.sample");

        let empty = temp.path().join("empty");
        fs::create_dir(&empty).unwrap();
        let snapshot = FolderSnapshot::read(&empty).unwrap();
        let r = PluginLoader::load_from_snapshot(&empty, &snapshot, PluginOrigin::Builtin).unwrap_err();
        assert_eq!(r.stage, LoadStage::Discovered);
    }

    #[test]
    fn test_trust_classification() {
        let temp = TempDir::new().unwrap();
        let dir = write_plugin(temp.path(), "sample", GOOD);

        let user = PluginLoader::load_from_path(&dir, PluginOrigin::User).unwrap();
        assert!(!PluginTrust::classify(user, false).is_trusted());

        let user = PluginLoader::load_from_path(&dir, PluginOrigin::User).unwrap();
        assert!(PluginTrust::classify(user, true).is_trusted());

        let builtin = PluginLoader::load_from_path(&dir, PluginOrigin::Builtin).unwrap();
        let trust = PluginTrust::classify(builtin, false);
        assert!(trust.is_trusted());
        assert_eq!(trust.id(), "org.sample");
    }

    #[test]
    fn test_candidates_sorted_dirs_only() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "zeta", GOOD);
        write_plugin(temp.path(), "alpha", GOOD);
        fs::write(temp.path().join("alpha.sig"), b"").unwrap();

        let names: Vec<_> = PluginLoader::candidates(temp.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(PluginLoader::candidates(&temp.path().join("missing")).is_empty());
    }
}

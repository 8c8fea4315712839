//! Qualifier - "이 디렉토리가 설치본인가?"
//!
//! A qualifier owns an immutable [`QualifierIdentificationConfig`] (cheap
//! filesystem pre-filter) and makes the final decision from the pre-read
//! [`FileContents`].

mod config;

pub use config::{
    Contents, FileContentSpec, FileContents, IdentificationConfigBuilder, PathRule,
    QualifierIdentificationConfig,
};

use qavm_foundation::{Error, Result};
use regex::Regex;
use serde::Deserialize;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

// ============================================================================
// Qualifier trait
// ============================================================================

pub trait Qualifier: Send + Sync + Debug {
    fn identification_config(&self) -> &QualifierIdentificationConfig;

    /// Rewrite or extend the search roots before a scan
    fn process_search_paths(&self, paths: Vec<PathBuf>) -> Vec<PathBuf> {
        paths
    }

    /// Called only for directories that already matched the config
    fn identify(&self, dir: &Path, contents: &FileContents) -> bool;
}

// ============================================================================
// DeclarativeQualifier
// ============================================================================

/// One content rule: the text of `file` must match `pattern`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentRuleSpec {
    pub file: String,
    pub pattern: String,
}

#[derive(Debug, Clone)]
struct ContentRule {
    file: String,
    pattern: Regex,
}

/// Qualifier built from data: a config, regex content rules (all must match)
/// and extra search roots.
#[derive(Debug, Clone)]
pub struct DeclarativeQualifier {
    config: QualifierIdentificationConfig,
    rules: Vec<ContentRule>,
    extra_search_paths: Vec<PathBuf>,
}

impl DeclarativeQualifier {
    pub fn new(config: QualifierIdentificationConfig) -> Self {
        Self {
            config,
            rules: Vec::new(),
            extra_search_paths: Vec::new(),
        }
    }

    /// Add a content rule. The file must be requested as text in the config.
    pub fn with_rule(mut self, spec: ContentRuleSpec) -> Result<Self> {
        let requested_as_text = self
            .config
            .file_contents()
            .iter()
            .any(|fc| fc.path == spec.file && !fc.binary);
        if !requested_as_text {
            return Err(Error::contract(
                "qualifier",
                format!("content rule reads {:?} which is not requested as a text file", spec.file),
            ));
        }
        let pattern = Regex::new(&spec.pattern)?;
        self.rules.push(ContentRule {
            file: spec.file,
            pattern,
        });
        Ok(self)
    }

    pub fn with_rules(self, specs: impl IntoIterator<Item = ContentRuleSpec>) -> Result<Self> {
        specs.into_iter().try_fold(self, |q, spec| q.with_rule(spec))
    }

    /// `~` / `~/...` expand to the home directory
    pub fn with_search_path(mut self, path: impl AsRef<str>) -> Self {
        self.extra_search_paths.push(expand_home(path.as_ref()));
        self
    }

    pub fn extra_search_paths(&self) -> &[PathBuf] {
        &self.extra_search_paths
    }
}

impl Qualifier for DeclarativeQualifier {
    fn identification_config(&self) -> &QualifierIdentificationConfig {
        &self.config
    }

    fn process_search_paths(&self, mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
        for extra in &self.extra_search_paths {
            if !paths.contains(extra) {
                paths.push(extra.clone());
            }
        }
        paths
    }

    fn identify(&self, _dir: &Path, contents: &FileContents) -> bool {
        self.rules.iter().all(|rule| {
            contents
                .text(&rule.file)
                .map_or(false, |text| rule.pattern.is_match(text))
        })
    }
}

pub(crate) fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some("") => Some(""),
        Some(rest) if rest.starts_with('/') || rest.starts_with('\\') => Some(&rest[1..]),
        _ => None,
    };
    match (rest, dirs::home_dir()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

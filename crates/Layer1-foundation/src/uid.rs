//! UID Grammar - 플러그인/소프트웨어/데이터 경로 식별자
//!
//! A UID has one of three shapes:
//!
//! ```text
//! pluginId
//! pluginId#softwareId
//! pluginId#softwareId#dataPath
//! ```
//!
//! `pluginId` and `softwareId` are dot-separated segments
//! (`in.wi1k.tools.qavm`), `dataPath` is slash-separated (`view/tiles/1`).
//! Every check is a single anchored regex, so validity is purely syntactic.

use crate::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Separator between the UID parts
pub const UID_SEPARATOR: char = '#';

const SEGMENT: &str = r"[A-Za-z0-9_\-]+";

// ============================================================================
// Patterns
// ============================================================================

fn domain_pattern() -> String {
    format!(r"{SEGMENT}(?:\.{SEGMENT})*")
}

fn path_pattern() -> String {
    format!(r"{SEGMENT}(?:/{SEGMENT})*")
}

fn compile(pattern: String) -> Regex {
    // Patterns are built from constants above; a failure here is a bug in this file.
    Regex::new(&pattern).unwrap_or_else(|e| panic!("invalid built-in uid pattern: {e}"))
}

fn domain_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(format!("^{}$", domain_pattern())))
}

fn path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(format!("^{}$", path_pattern())))
}

fn plugin_software_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(format!("^({0})#({0})$", domain_pattern())))
}

fn software_data_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(format!("^({})#({})$", domain_pattern(), path_pattern())))
}

fn full_uid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        compile(format!(
            "^({0})#({0})#({1})$",
            domain_pattern(),
            path_pattern()
        ))
    })
}

// ============================================================================
// Predicates
// ============================================================================

pub fn is_plugin_id_valid(s: &str) -> bool {
    domain_re().is_match(s)
}

pub fn is_software_id_valid(s: &str) -> bool {
    domain_re().is_match(s)
}

pub fn is_data_path_valid(s: &str) -> bool {
    path_re().is_match(s)
}

/// `plugin#software` or `plugin#software#dataPath`
pub fn is_uid_valid(s: &str) -> bool {
    full_uid_re().is_match(s) || plugin_software_re().is_match(s)
}

pub fn is_plugin_software_id_valid(s: &str) -> bool {
    plugin_software_re().is_match(s)
}

pub fn is_software_data_path_valid(s: &str) -> bool {
    software_data_path_re().is_match(s)
}

// ============================================================================
// Extractors
// ============================================================================
//
// Each extractor tries the full 3-part shape first, then the 2-part shapes,
// then the bare segment. `None` means no recognized shape matched.

fn capture(re: &Regex, s: &str, group: usize) -> Option<String> {
    re.captures(s)
        .and_then(|caps| caps.get(group))
        .map(|m| m.as_str().to_string())
}

pub fn fetch_plugin_id(s: &str) -> Option<String> {
    capture(full_uid_re(), s, 1)
        .or_else(|| capture(plugin_software_re(), s, 1))
        .or_else(|| is_plugin_id_valid(s).then(|| s.to_string()))
}

pub fn fetch_software_id(s: &str) -> Option<String> {
    capture(full_uid_re(), s, 2)
        .or_else(|| capture(plugin_software_re(), s, 2))
        .or_else(|| capture(software_data_path_re(), s, 1))
        .or_else(|| is_software_id_valid(s).then(|| s.to_string()))
}

pub fn fetch_data_path(s: &str) -> Option<String> {
    capture(full_uid_re(), s, 3)
        .or_else(|| capture(software_data_path_re(), s, 2))
        .or_else(|| is_data_path_valid(s).then(|| s.to_string()))
}

pub fn fetch_plugin_software_id(s: &str) -> Option<String> {
    if let Some(caps) = full_uid_re().captures(s) {
        return Some(format!("{}#{}", &caps[1], &caps[2]));
    }
    is_plugin_software_id_valid(s).then(|| s.to_string())
}

pub fn fetch_software_data_path(s: &str) -> Option<String> {
    if let Some(caps) = full_uid_re().captures(s) {
        return Some(format!("{}#{}", &caps[2], &caps[3]));
    }
    is_software_data_path_valid(s).then(|| s.to_string())
}

// ============================================================================
// Builders
// ============================================================================

/// `plugin#software`, validated
pub fn make_plugin_software_id(plugin_id: &str, software_id: &str) -> Result<String> {
    let uid = format!("{plugin_id}{UID_SEPARATOR}{software_id}");
    if !is_plugin_software_id_valid(&uid) {
        return Err(Error::InvalidUid(uid));
    }
    Ok(uid)
}

/// `plugin#software#dataPath`, validated
pub fn make_uid(plugin_id: &str, software_id: &str, data_path: &str) -> Result<String> {
    let uid = format!("{plugin_id}{UID_SEPARATOR}{software_id}{UID_SEPARATOR}{data_path}");
    if !full_uid_re().is_match(&uid) {
        return Err(Error::InvalidUid(uid));
    }
    Ok(uid)
}

/// Canonical data path of a registered view: `view/<kind>/<key>`
pub fn view_data_path(kind: &str, key: &str) -> String {
    format!("view/{kind}/{key}")
}

/// Canonical data path of a registered menu item: `menu/<key>`
pub fn menu_data_path(key: &str) -> String {
    format!("menu/{key}")
}

/// Key usable as a single data-path segment (descriptor, view and menu keys)
pub fn is_key_valid(key: &str) -> bool {
    is_data_path_valid(key) && !key.contains('/')
}

// ============================================================================
// Uid - 파싱된 형태
// ============================================================================

/// Fully parsed UID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid {
    pub plugin_id: String,
    pub software_id: String,
    pub data_path: Option<String>,
}

impl Uid {
    /// Parse a 2- or 3-part UID
    pub fn parse(s: &str) -> Result<Self> {
        if let Some(caps) = full_uid_re().captures(s) {
            return Ok(Self {
                plugin_id: caps[1].to_string(),
                software_id: caps[2].to_string(),
                data_path: Some(caps[3].to_string()),
            });
        }
        if let Some(caps) = plugin_software_re().captures(s) {
            return Ok(Self {
                plugin_id: caps[1].to_string(),
                software_id: caps[2].to_string(),
                data_path: None,
            });
        }
        Err(Error::InvalidUid(s.to_string()))
    }

    /// `plugin#software` part
    pub fn plugin_software_id(&self) -> String {
        format!("{}{}{}", self.plugin_id, UID_SEPARATOR, self.software_id)
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data_path {
            Some(path) => write!(
                f,
                "{}{}{}{}{}",
                self.plugin_id, UID_SEPARATOR, self.software_id, UID_SEPARATOR, path
            ),
            None => write!(f, "{}{}{}", self.plugin_id, UID_SEPARATOR, self.software_id),
        }
    }
}

impl std::str::FromStr for Uid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

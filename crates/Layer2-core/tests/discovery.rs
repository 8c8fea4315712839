//! 탐색 통합 테스트 - 매니페스트 플러그인 → 스캔 → 워크스페이스
//!
//! `cargo test -p qavm-core --test discovery`

use qavm_core::{
    CancellationToken, DiscoveryContext, LinkType, PluginManager, ViewKind, Workspace,
};
use qavm_foundation::{Error, JsonStore, QavmConfig};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const BLENDER: &str = include_str!("fixtures/blender.toml");

fn install_blender(root: &Path, rel: &str, version: &str) {
    let dir = root.join(rel);
    fs::create_dir_all(dir.join("datafiles")).unwrap();
    fs::write(dir.join("blender"), b"").unwrap();
    fs::write(dir.join("VERSION"), version).unwrap();
}

struct Env {
    temp: TempDir,
    ctx: DiscoveryContext,
}

fn env(max_depth: usize) -> Env {
    let temp = TempDir::new().unwrap();
    let plugins = temp.path().join("plugins");
    fs::create_dir_all(plugins.join("blender")).unwrap();
    fs::write(plugins.join("blender/blender.toml"), BLENDER).unwrap();

    let config = QavmConfig::new()
        .search_path(temp.path().join("apps"))
        .user_plugin_dir(&plugins)
        .trust_user_plugins(true)
        .max_depth(max_depth);
    let ctx = DiscoveryContext::new(config, JsonStore::new(temp.path().join("state"))).unwrap();
    ctx.bootstrap();
    Env { temp, ctx }
}

fn apps(env: &Env) -> std::path::PathBuf {
    env.temp.path().join("apps")
}

fn scan_names(env: &Env) -> Vec<(String, Option<String>)> {
    let found = env
        .ctx
        .scan_software("org.blender#blender", &CancellationToken::new())
        .unwrap();
    found["install"]
        .iter()
        .map(|d| (d.name().to_string(), d.version().map(str::to_string)))
        .collect()
}

#[test]
fn identifies_installs_with_versions() {
    let env = env(3);
    install_blender(&apps(&env), "blender-4.1", "4.1.1\n");
    install_blender(&apps(&env), "studio/blender-3.6", "3.6.9");

    assert_eq!(
        scan_names(&env),
        vec![
            ("blender-4.1".to_string(), Some("4.1.1".to_string())),
            ("blender-3.6".to_string(), Some("3.6.9".to_string())),
        ]
    );
}

#[test]
fn or_group_and_negative_rules() {
    let env = env(2);
    // blender.exe satisfies the OR-group
    install_blender(&apps(&env), "win", "4.0.0");
    fs::remove_file(apps(&env).join("win/blender")).unwrap();
    fs::write(apps(&env).join("win/blender.exe"), b"").unwrap();

    // neither alternative
    install_blender(&apps(&env), "neither", "4.0.0");
    fs::remove_file(apps(&env).join("neither/blender")).unwrap();

    // disqualified by negative file
    install_blender(&apps(&env), "uninstalling", "4.0.0");
    fs::write(apps(&env).join("uninstalling/uninstall.lock"), b"").unwrap();

    // content rule fails
    install_blender(&apps(&env), "nightly", "nightly-build");

    let names: Vec<_> = scan_names(&env).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["win"]);
}

#[test]
fn max_depth_one_never_reaches_grandchildren() {
    let env = env(1);
    install_blender(&apps(&env), "child", "1.0");
    install_blender(&apps(&env), "group/grandchild", "2.0");

    let names: Vec<_> = scan_names(&env).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["child"]);
}

#[test]
fn repeated_scans_are_identical() {
    let env = env(3);
    for (rel, version) in [("c", "3.0"), ("a", "1.0"), ("nested/b", "2.0"), ("nested/a", "2.1")] {
        install_blender(&apps(&env), rel, version);
    }
    let token = CancellationToken::new();
    let first = env.ctx.scan_all(&token).unwrap();
    let second = env.ctx.scan_all(&token).unwrap();

    let uids = |scan: &std::collections::BTreeMap<String, qavm_core::HandlerScan>| -> Vec<String> {
        scan["org.blender#blender"]["install"]
            .iter()
            .map(|d| d.uid().to_string())
            .collect()
    };
    assert_eq!(uids(&first), uids(&second));
    assert_eq!(uids(&first).len(), 4);

    let names: Vec<_> = first["org.blender#blender"]["install"]
        .iter()
        .map(|d| d.name().to_string())
        .collect();
    assert_eq!(names, vec!["a", "c", "a", "b"]);
    assert!(first["org.blender#blender"]["install"]
        .iter()
        .all(|d| d.link_type() == LinkType::Plain));
}

#[test]
fn cancelled_scan_returns_cancelled() {
    let env = env(3);
    install_blender(&apps(&env), "a", "1.0");
    let token = CancellationToken::new();
    token.cancel();
    assert!(matches!(env.ctx.scan_all(&token), Err(Error::Cancelled)));
}

#[test]
fn workspace_resolution() {
    let env = env(3);
    let manager = env.ctx.manager();

    let stale = Workspace::new("stale").with_view(ViewKind::Tiles, "x#y#z");
    let (handlers, unresolved) = stale.get_involved_software_handlers(manager);
    assert!(handlers.is_empty());
    assert_eq!(unresolved, BTreeSet::from(["x#y#z".to_string()]));

    let mixed = Workspace::new("mixed")
        .with_view(ViewKind::Tiles, "org.blender#blender#view/tiles/grid")
        .with_view(ViewKind::Table, "org.blender#blender#view/table/list")
        .with_menu_item("org.blender#blender#menu/open-folder")
        .with_menu_item("x#y#z");
    let (handlers, unresolved) = mixed.get_involved_software_handlers(manager);
    assert_eq!(handlers.len(), 1);
    assert_eq!(handlers[0].uid(), "org.blender#blender");
    assert_eq!(unresolved.len(), 1);

    // same workspace against an empty manager: nothing resolves, nothing fails
    let (handlers, unresolved) = mixed.get_involved_software_handlers(&PluginManager::new());
    assert!(handlers.is_empty());
    assert_eq!(unresolved.len(), 4);
}

#[test]
fn workspace_and_descriptor_data_persist() {
    let env = env(3);
    install_blender(&apps(&env), "blender-4.1", "4.1.1");

    let workspace = Workspace::from_manager("main", env.ctx.manager());
    env.ctx.workspaces().save(&workspace).unwrap();
    assert_eq!(env.ctx.workspaces().load("main").unwrap(), workspace);

    let found = env
        .ctx
        .scan_software("org.blender#blender", &CancellationToken::new())
        .unwrap();
    let uid = found["install"][0].uid().to_string();
    env.ctx.descriptor_data().add_tag(&uid, "lts");
    env.ctx.descriptor_data().save().unwrap();

    let store = JsonStore::new(env.temp.path().join("state"));
    let reopened = qavm_foundation::DescriptorDataStore::open(store).unwrap();
    assert_eq!(reopened.get(&uid).tags, vec!["lts".to_string()]);
}

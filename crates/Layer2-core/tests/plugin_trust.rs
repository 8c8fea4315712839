//! 내장 플러그인 서명 / 신뢰 통합 테스트
//!
//! `cargo test -p qavm-core --test plugin_trust`

use qavm_core::{LoadStage, PluginManager, PluginOrigin, PluginSigner, SignatureVerifier};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SIGNING_KEY: &[u8] = include_bytes!("fixtures/signing_key.pk8");
const PUBLIC_KEY: &[u8] = include_bytes!("fixtures/signing_key.pub.der");
const BLENDER: &str = include_str!("fixtures/blender.toml");

fn write_plugin(root: &Path, dir: &str, manifest: &str) -> PathBuf {
    let path = root.join(dir);
    fs::create_dir_all(&path).unwrap();
    fs::write(path.join(format!("{dir}.toml")), manifest).unwrap();
    path
}

fn minimal(id: &str) -> String {
    format!(
        "id = \"{id}\"\nversion = \"0.1.0\"\n\n[[software]]\nid = \"app\"\nname = \"App\"\n\n[software.descriptors.install]\n"
    )
}

fn manager() -> PluginManager {
    PluginManager::with_verifier(SignatureVerifier::new(PUBLIC_KEY.to_vec()))
}

#[test]
fn signed_builtin_plugins_load() {
    let temp = TempDir::new().unwrap();
    let signer = PluginSigner::from_pkcs8(SIGNING_KEY).unwrap();
    for dir in ["blender", "other"] {
        let manifest = if dir == "blender" { BLENDER.to_string() } else { minimal("org.other") };
        let folder = write_plugin(temp.path(), dir, &manifest);
        signer.sign_folder(&folder).unwrap();
    }

    let manager = manager();
    let report = manager.load_builtin_folder(temp.path());
    assert_eq!(report.loaded, vec!["org.blender".to_string(), "org.other".to_string()]);
    assert!(report.rejected.is_empty());

    let blender = manager.get_plugin("org.blender").unwrap();
    assert_eq!(blender.origin(), PluginOrigin::Builtin);
    assert_eq!(blender.metadata().website.as_deref(), Some("https://www.blender.org"));
    assert!(manager.get_software_handler("org.blender#blender").is_some());
}

#[test]
fn deleted_signature_excludes_only_that_plugin() {
    let temp = TempDir::new().unwrap();
    let signer = PluginSigner::from_pkcs8(SIGNING_KEY).unwrap();
    let a = write_plugin(temp.path(), "a", &minimal("org.a"));
    let b = write_plugin(temp.path(), "b", &minimal("org.b"));
    signer.sign_folder(&a).unwrap();
    let b_sig = signer.sign_folder(&b).unwrap();
    fs::remove_file(b_sig).unwrap();

    let manager = manager();
    let report = manager.load_builtin_folder(temp.path());
    assert_eq!(report.loaded, vec!["org.a".to_string()]);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].path, b);
    assert_eq!(report.rejected[0].stage, LoadStage::Rejected);
    assert!(manager.get_plugin("org.b").is_none());
}

#[test]
fn modified_plugin_after_signing_is_excluded() {
    let temp = TempDir::new().unwrap();
    let folder = write_plugin(temp.path(), "a", &minimal("org.a"));
    PluginSigner::from_pkcs8(SIGNING_KEY)
        .unwrap()
        .sign_folder(&folder)
        .unwrap();
    fs::write(folder.join("a.toml"), minimal("org.evil")).unwrap();

    let manager = manager();
    let report = manager.load_builtin_folder(temp.path());
    assert!(report.loaded.is_empty());
    assert!(manager.plugins().is_empty());
}

#[test]
fn unsigned_folder_loaded_directly_as_builtin_is_rejected() {
    let temp = TempDir::new().unwrap();
    let folder = write_plugin(temp.path(), "evil", &minimal("org.evil"));

    let manager = manager();
    let report = manager.load_plugin(&folder, PluginOrigin::Builtin);
    assert!(report.loaded.is_empty());
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].stage, LoadStage::Rejected);
    assert!(manager.get_plugin("org.evil").is_none());

    // the compiled-in key rejects it as well
    let report = PluginManager::new().load_plugin(&folder, PluginOrigin::Builtin);
    assert!(report.loaded.is_empty());
}

#[test]
fn duplicate_plugin_id_keeps_first() {
    let temp = TempDir::new().unwrap();
    let signer = PluginSigner::from_pkcs8(SIGNING_KEY).unwrap();
    for dir in ["first", "second"] {
        let folder = write_plugin(temp.path(), dir, &minimal("org.same"));
        signer.sign_folder(&folder).unwrap();
    }

    let manager = manager();
    let report = manager.load_builtin_folder(temp.path());
    assert_eq!(report.loaded, vec!["org.same".to_string()]);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].path, temp.path().join("second"));
    assert_eq!(manager.plugins().len(), 1);
    assert_eq!(
        manager.get_plugin("org.same").unwrap().path(),
        Some(temp.path().join("first").as_path())
    );
}

#[test]
fn user_plugin_conflicting_with_builtin_is_rejected() {
    let builtin = TempDir::new().unwrap();
    let user = TempDir::new().unwrap();
    let folder = write_plugin(builtin.path(), "core", &minimal("org.core"));
    PluginSigner::from_pkcs8(SIGNING_KEY)
        .unwrap()
        .sign_folder(&folder)
        .unwrap();
    write_plugin(user.path(), "core", &minimal("org.core"));
    write_plugin(user.path(), "extra", &minimal("org.extra"));

    let manager = manager();
    manager.load_builtin_folder(builtin.path());
    let report = manager.load_user_folder(user.path());

    assert_eq!(report.pending, vec!["org.extra".to_string()]);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(manager.get_plugin("org.core").unwrap().origin(), PluginOrigin::Builtin);

    let approved = manager.approve_pending("org.extra").unwrap();
    assert_eq!(approved.origin(), PluginOrigin::User);
    assert_eq!(manager.summary().plugins, 2);
}

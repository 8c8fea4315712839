//! Signature - 내장 플러그인 폴더 서명 검증
//!
//! Folder digest: SHA-256 over every regular file in the folder, sorted by
//! `/`-separated relative path; each file contributes its relative path then
//! its bytes. The detached signature `<folder>.sig` next to the folder is an
//! RSA-PSS/SHA-256 signature over that digest.

use qavm_foundation::{Error, Result};
use ring::digest::{Context, Digest, SHA256};
use ring::rand::SystemRandom;
use ring::signature::{self, RsaKeyPair, UnparsedPublicKey};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub const SIGNATURE_EXTENSION: &str = "sig";

/// Public key (PKCS#1 RSAPublicKey, DER) trusted for built-in plugins
const BUILTIN_PUBLIC_KEY: &[u8] = include_bytes!("../../keys/builtin_plugins.der");

/// `<parent>/<folderName>.sig`
pub fn signature_path(folder: &Path) -> PathBuf {
    let name = folder
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let parent = folder.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{name}.{SIGNATURE_EXTENSION}"))
}

// ============================================================================
// FolderSnapshot
// ============================================================================

/// Every regular file of a plugin folder read once into memory, keyed by
/// `/`-separated relative path. Verification and loading both work from the
/// same snapshot so the bytes that were hashed are the bytes that get parsed.
#[derive(Debug, Clone, Default)]
pub struct FolderSnapshot {
    files: Vec<(String, Vec<u8>)>,
}

impl FolderSnapshot {
    pub fn read(folder: &Path) -> Result<Self> {
        let mut files = Vec::new();
        for entry in WalkDir::new(folder).follow_links(false) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(folder)
                .map_err(|e| Error::Internal(e.to_string()))?;
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let bytes = std::fs::read(entry.path())?;
            files.push((rel, bytes));
        }
        files.sort();
        Ok(Self { files })
    }

    /// Contents of `rel` (`/`-separated) as captured
    pub fn file(&self, rel: &str) -> Option<&[u8]> {
        self.files
            .binary_search_by(|(name, _)| name.as_str().cmp(rel))
            .ok()
            .map(|i| self.files[i].1.as_slice())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn digest(&self) -> Digest {
        let mut ctx = Context::new(&SHA256);
        for (rel, bytes) in &self.files {
            ctx.update(rel.as_bytes());
            ctx.update(bytes);
        }
        ctx.finish()
    }
}

/// Deterministic SHA-256 of a folder's regular files
pub fn folder_digest(folder: &Path) -> Result<Digest> {
    let snapshot = FolderSnapshot::read(folder)?;
    debug!(folder = %folder.display(), files = snapshot.len(), "Computed folder digest");
    Ok(snapshot.digest())
}

// ============================================================================
// SignatureVerifier
// ============================================================================

#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    public_key: Vec<u8>,
}

impl SignatureVerifier {
    /// Verifier for the key compiled into the host
    pub fn builtin() -> Self {
        Self::new(BUILTIN_PUBLIC_KEY.to_vec())
    }

    /// `public_key`: PKCS#1 RSAPublicKey, DER
    pub fn new(public_key: Vec<u8>) -> Self {
        Self { public_key }
    }

    pub fn verify(&self, message: &[u8], sig: &[u8]) -> bool {
        UnparsedPublicKey::new(&signature::RSA_PSS_2048_8192_SHA256, &self.public_key)
            .verify(message, sig)
            .is_ok()
    }

    /// Missing `.sig`, unreadable folder, malformed key and mismatch all fail
    pub fn verify_folder(&self, folder: &Path) -> Result<()> {
        self.read_verified(folder).map(|_| ())
    }

    /// Snapshot `folder` and check it against `<folder>.sig`. On success the
    /// returned snapshot holds exactly the verified bytes.
    pub fn read_verified(&self, folder: &Path) -> Result<FolderSnapshot> {
        let sig_path = signature_path(folder);
        let sig = std::fs::read(&sig_path).map_err(|e| {
            Error::signature(folder, format!("cannot read {}: {}", sig_path.display(), e))
        })?;
        let snapshot = FolderSnapshot::read(folder)
            .map_err(|e| Error::signature(folder, format!("cannot hash folder: {e}")))?;

        if self.verify(snapshot.digest().as_ref(), &sig) {
            Ok(snapshot)
        } else {
            Err(Error::signature(folder, "signature does not match folder contents"))
        }
    }
}

// ============================================================================
// PluginSigner
// ============================================================================

pub struct PluginSigner {
    key_pair: RsaKeyPair,
    rng: SystemRandom,
}

impl PluginSigner {
    /// `pkcs8`: PKCS#8 private key, DER
    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Self> {
        let key_pair = RsaKeyPair::from_pkcs8(pkcs8)
            .map_err(|e| Error::Config(format!("invalid signing key: {e}")))?;
        Ok(Self {
            key_pair,
            rng: SystemRandom::new(),
        })
    }

    /// Matching public key (PKCS#1 RSAPublicKey, DER)
    pub fn public_key(&self) -> Vec<u8> {
        self.key_pair.public().as_ref().to_vec()
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let mut sig = vec![0u8; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(&signature::RSA_PSS_SHA256, &self.rng, message, &mut sig)
            .map_err(|_| Error::Internal("RSA signing failed".into()))?;
        Ok(sig)
    }

    /// Sign `folder` and write `<folder>.sig`; returns the signature path
    pub fn sign_folder(&self, folder: &Path) -> Result<PathBuf> {
        let digest = folder_digest(folder)?;
        let sig = self.sign(digest.as_ref())?;
        let path = signature_path(folder);
        std::fs::write(&path, sig)?;
        Ok(path)
    }
}

impl std::fmt::Debug for PluginSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginSigner").finish_non_exhaustive()
    }
}

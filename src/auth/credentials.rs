//! Credential store (key/value persistence for the auth session)
//!
//! The secure store keeps values encrypted with AES-256-GCM in
//! ~/.config/framez/credentials.enc, with a key derived from machine-specific
//! identifiers. When it cannot be used, values live in memory only and are
//! lost when the process exits.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use anyhow::{Context, Result, anyhow};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::paths;

const NONCE_SIZE: usize = 12;

/// Key/value persistence used by the session manager
pub trait CredentialStore: Send + Sync + 'static {
    /// Read a value
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    /// Write a value
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    /// Delete a value
    fn remove_item(&self, key: &str) -> Result<()>;
}

// ==================== Memory ====================

/// Volatile in-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.remove(key);
        Ok(())
    }
}

// ==================== Encrypted file ====================

/// Encrypted on-disk store
#[derive(Debug, Clone)]
pub struct EncryptedFileStore {
    path: PathBuf,
}

impl EncryptedFileStore {
    /// Store backed by a specific file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(paths::credentials_path()?))
    }

    /// File backing this store
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all items from the encrypted file
    fn load(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let encrypted = fs::read(&self.path).context("Failed to read credentials file")?;

        if encrypted.len() < NONCE_SIZE {
            return Ok(HashMap::new());
        }

        let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher()?
            .decrypt(nonce, ciphertext)
            .map_err(|_| anyhow!("Failed to decrypt credentials"))?;

        let json = String::from_utf8(plaintext).context("Invalid UTF-8 in credentials")?;
        let items: HashMap<String, String> = serde_json::from_str(&json)?;

        Ok(items)
    }

    /// Save all items to the encrypted file
    fn save(&self, items: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create credentials directory")?;
        }

        let json = serde_json::to_string(items)?;

        let mut rng = rand::rng();
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rng.fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher()?
            .encrypt(nonce, json.as_bytes())
            .map_err(|_| anyhow!("Failed to encrypt credentials"))?;

        let mut output = nonce_bytes.to_vec();
        output.extend(ciphertext);

        fs::write(&self.path, output).context("Failed to write credentials file")?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms)?;
        }

        Ok(())
    }
}

impl CredentialStore for EncryptedFileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.load().unwrap_or_default();
        items.insert(key.to_string(), value.to_string());
        self.save(&items)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.load().unwrap_or_default();
        if items.remove(key).is_some() || self.path.exists() {
            self.save(&items)?;
        }
        Ok(())
    }
}

fn cipher() -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(&derive_key()).map_err(|_| anyhow!("Invalid key length"))
}

/// Get machine ID for key derivation (cross-platform)
fn get_machine_id() -> String {
    // Linux: /etc/machine-id or /var/lib/dbus/machine-id
    #[cfg(target_os = "linux")]
    {
        for path in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
            if let Ok(id) = fs::read_to_string(path) {
                return id.trim().to_string();
            }
        }
    }

    // macOS: IOPlatformUUID via ioreg
    #[cfg(target_os = "macos")]
    {
        if let Ok(output) = std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
        {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if let Some(uuid) = stdout
                .lines()
                .find(|line| line.contains("IOPlatformUUID"))
                .and_then(|line| line.split('"').nth(3))
            {
                return uuid.to_string();
            }
        }
    }

    // Fallback: home directory path
    dirs::home_dir()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "framez-fallback-key".to_string())
}

/// Derive encryption key from machine-specific data
fn derive_key() -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(get_machine_id().as_bytes());
    if let Some(home) = dirs::home_dir() {
        hasher.update(home.to_string_lossy().as_bytes());
    }
    hasher.update(b"framez-session-store-v1");
    hasher.finalize().into()
}

// ==================== Hybrid ====================

/// Secure store when available, memory otherwise.
///
/// Writes go to both so a later secure-store failure still finds the value
/// for the rest of the process lifetime.
#[derive(Debug, Default)]
pub struct HybridStore {
    secure: Option<EncryptedFileStore>,
    memory: MemoryStore,
}

impl HybridStore {
    /// Use the default encrypted file, or memory only if it cannot be located
    pub fn open() -> Self {
        match EncryptedFileStore::open_default() {
            Ok(store) => Self::with_secure(store),
            Err(e) => {
                tracing::warn!("Secure storage not available, using memory storage: {}", e);
                Self::memory_only()
            }
        }
    }

    /// Hybrid store over a given secure store
    pub fn with_secure(secure: EncryptedFileStore) -> Self {
        Self {
            secure: Some(secure),
            memory: MemoryStore::new(),
        }
    }

    /// Memory-only store
    pub fn memory_only() -> Self {
        Self::default()
    }

    /// Whether values survive a restart
    pub const fn is_persistent(&self) -> bool {
        self.secure.is_some()
    }
}

impl CredentialStore for HybridStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        if let Some(secure) = &self.secure {
            match secure.get_item(key) {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Secure storage read failed, using memory storage: {}", e);
                }
            }
        }
        self.memory.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        if let Some(secure) = &self.secure
            && let Err(e) = secure.set_item(key, value)
        {
            tracing::warn!("Secure storage write failed, using memory storage: {}", e);
        }
        self.memory.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        if let Some(secure) = &self.secure
            && let Err(e) = secure.remove_item(key)
        {
            tracing::warn!("Secure storage delete failed: {}", e);
        }
        self.memory.remove_item(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_crud() {
        let store = MemoryStore::new();
        assert_eq!(store.get_item("k").unwrap(), None);
        store.set_item("k", "v").unwrap();
        assert_eq!(store.get_item("k").unwrap().as_deref(), Some("v"));
        store.remove_item("k").unwrap();
        assert_eq!(store.get_item("k").unwrap(), None);
    }

    #[test]
    fn test_encrypted_store_round_trip_is_not_plaintext() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.enc");
        let store = EncryptedFileStore::new(&path);

        store.set_item("framez.auth.token", "{\"secret\":true}").unwrap();

        let raw = fs::read(&path).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("secret"));

        let reopened = EncryptedFileStore::new(&path);
        assert_eq!(
            reopened.get_item("framez.auth.token").unwrap().as_deref(),
            Some("{\"secret\":true}")
        );

        reopened.remove_item("framez.auth.token").unwrap();
        assert_eq!(store.get_item("framez.auth.token").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.enc");
        fs::write(&path, vec![7u8; 64]).unwrap();

        assert!(EncryptedFileStore::new(&path).get_item("k").is_err());
    }

    #[test]
    fn test_hybrid_falls_back_to_memory_when_secure_unwritable() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        // Parent is a regular file, so every write fails
        let store = HybridStore::with_secure(EncryptedFileStore::new(blocker.join("credentials.enc")));

        store.set_item("k", "v").unwrap();
        assert_eq!(store.get_item("k").unwrap().as_deref(), Some("v"));
        store.remove_item("k").unwrap();
        assert_eq!(store.get_item("k").unwrap(), None);
    }

    #[test]
    fn test_hybrid_persists_through_secure_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.enc");

        HybridStore::with_secure(EncryptedFileStore::new(&path))
            .set_item("k", "v")
            .unwrap();

        let fresh = HybridStore::with_secure(EncryptedFileStore::new(&path));
        assert!(fresh.is_persistent());
        assert_eq!(fresh.get_item("k").unwrap().as_deref(), Some("v"));
        assert!(!HybridStore::memory_only().is_persistent());
    }
}

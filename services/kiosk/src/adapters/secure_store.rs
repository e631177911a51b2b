//! services/kiosk/src/adapters/secure_store.rs
//!
//! This module contains the secure credential store used on devices that have
//! a provisioned key. The passport is sealed with AES-256-GCM and written to a
//! single file as `nonce || ciphertext`.

use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use async_trait::async_trait;
use sitepass_core::domain::WorkerPassport;
use sitepass_core::ports::{CredentialStore, PortError, PortResult};

use super::record;

const NONCE_LEN: usize = 12;

/// A credential store that implements the `CredentialStore` port over an encrypted file.
#[derive(Clone)]
pub struct EncryptedFileStore {
    path: PathBuf,
    cipher: Aes256Gcm,
}

impl EncryptedFileStore {
    pub fn new(path: impl Into<PathBuf>, key: &[u8; 32]) -> Self {
        Self {
            path: path.into(),
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seal(&self, plaintext: &[u8]) -> PortResult<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| PortError::Unexpected("Failed to encrypt the passport".to_string()))?;
        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, sealed: &[u8]) -> PortResult<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return Err(PortError::Unexpected("Passport file is truncated".to_string()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| {
                PortError::Unexpected("Passport file could not be decrypted".to_string())
            })
    }
}

#[async_trait]
impl CredentialStore for EncryptedFileStore {
    async fn load(&self) -> PortResult<Option<WorkerPassport>> {
        let sealed = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PortError::Unexpected(e.to_string())),
        };
        let plaintext = self.open(&sealed)?;
        let json = String::from_utf8(plaintext)
            .map_err(|e| PortError::Unexpected(format!("Stored passport is corrupt: {}", e)))?;
        record::decode(&json).map(Some)
    }

    async fn save(&self, passport: &WorkerPassport) -> PortResult<()> {
        let sealed = self.seal(record::encode(passport)?.as_bytes())?;
        // Write beside the target and rename, so a crash never leaves half a file.
        let staging = self.path.with_extension("tmp");
        tokio::fs::write(&staging, &sealed)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn clear(&self) -> PortResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sitepass_core::domain::PassportDraft;

    fn passport() -> WorkerPassport {
        PassportDraft {
            name: "Jordan Rivera".into(),
            osha_number: "12-345678".into(),
            phone: Some("555-0199".into()),
            ..PassportDraft::default()
        }
        .into_passport("p-42".to_string())
    }

    #[tokio::test]
    async fn sealed_file_survives_a_new_store_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passport.enc");

        EncryptedFileStore::new(&path, &[1u8; 32])
            .save(&passport())
            .await
            .unwrap();

        let on_disk = std::fs::read(&path).unwrap();
        assert!(!String::from_utf8_lossy(&on_disk).contains("555-0199"));

        let reopened = EncryptedFileStore::new(&path, &[1u8; 32]);
        assert_eq!(reopened.load().await.unwrap(), Some(passport()));
    }

    #[tokio::test]
    async fn missing_file_is_no_passport_and_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFileStore::new(dir.path().join("absent.enc"), &[1u8; 32]);

        assert_eq!(store.load().await.unwrap(), None);
        store.clear().await.unwrap();

        store.save(&passport()).await.unwrap();
        store.clear().await.unwrap();
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn wrong_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passport.enc");
        EncryptedFileStore::new(&path, &[1u8; 32])
            .save(&passport())
            .await
            .unwrap();

        let other = EncryptedFileStore::new(&path, &[2u8; 32]);
        assert_matches!(other.load().await, Err(PortError::Unexpected(_)));
    }
}

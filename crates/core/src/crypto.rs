//! Symmetric authenticated encryption for secrets at rest (Settings'
//! `apiKey`/`provisioningKey` fields), keyed by a machine-local secret.

use aes_gcm::aead::{Aead, KeyInit, OsRng, rand_core::RngCore};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::path::{Path, PathBuf};

/// Recognizable prefix so `is_encrypted` can distinguish ciphertext from
/// legacy plaintext carried over from before encryption was introduced.
const ENVELOPE_PREFIX: &str = "orpv1:";
const NONCE_LEN: usize = 12;

/// Encrypts and decrypts secrets with a single process-stable AES-256-GCM
/// key. The key is generated once and persisted outside the Settings
/// document; subsequent runs load it from the same path.
pub struct CryptoEnvelope {
    cipher: Aes256Gcm,
}

impl CryptoEnvelope {
    /// Loads the machine-local key from `key_path`, generating and
    /// persisting a new random one if the file does not exist.
    pub fn load_or_init(key_path: &Path) -> anyhow::Result<Self> {
        let key_bytes = if key_path.exists() {
            let raw = std::fs::read(key_path)?;
            BASE64
                .decode(raw)
                .map_err(|e| anyhow::anyhow!("malformed key file at {}: {e}", key_path.display()))?
        } else {
            let mut key = [0u8; 32];
            OsRng.fill_bytes(&mut key);
            if let Some(parent) = key_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            atomic_write(key_path, BASE64.encode(key).as_bytes())?;
            key.to_vec()
        };

        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Encrypts a UTF-8 plaintext, returning an envelope-prefixed,
    /// base64-encoded ciphertext. Never fails for valid UTF-8 input.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .expect("AES-GCM encryption of valid input cannot fail");

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);

        format!("{ENVELOPE_PREFIX}{}", BASE64.encode(payload))
    }

    /// Decrypts an envelope produced by `encrypt`. Returns an empty string
    /// on any integrity or format failure; callers log at warn.
    pub fn decrypt(&self, blob: &str) -> String {
        let Some(encoded) = blob.strip_prefix(ENVELOPE_PREFIX) else {
            return String::new();
        };
        let Ok(payload) = BASE64.decode(encoded) else {
            tracing::warn!("crypto envelope: malformed base64 payload");
            return String::new();
        };
        if payload.len() < NONCE_LEN {
            tracing::warn!("crypto envelope: payload shorter than nonce");
            return String::new();
        }
        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        match self.cipher.decrypt(nonce, ciphertext) {
            Ok(plaintext) => String::from_utf8(plaintext).unwrap_or_else(|_| {
                tracing::warn!("crypto envelope: decrypted payload is not valid UTF-8");
                String::new()
            }),
            Err(_) => {
                tracing::warn!("crypto envelope: integrity check failed");
                String::new()
            }
        }
    }

    /// Format probe: true if `blob` carries the envelope prefix. Callers
    /// gracefully accept legacy plaintext (for which this returns false)
    /// for one migration cycle.
    pub fn is_encrypted(blob: &str) -> bool {
        blob.starts_with(ENVELOPE_PREFIX)
    }

    /// Default location for the machine-local key, alongside the host
    /// config directory.
    pub fn default_key_path(config_dir: &Path) -> PathBuf {
        config_dir.join("crypto.key")
    }
}

fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn envelope() -> CryptoEnvelope {
        let dir = tempdir().unwrap();
        let path = CryptoEnvelope::default_key_path(dir.path());
        // Keep the tempdir alive for the lifetime of the test by leaking it;
        // tests are short-lived processes so this is harmless.
        std::mem::forget(dir);
        CryptoEnvelope::load_or_init(&path).unwrap()
    }

    #[test]
    fn round_trip_preserves_plaintext() {
        let env = envelope();
        for sample in ["", "sk-or-v1-abc123", "unicode: héllo wörld 🎉"] {
            let ct = env.encrypt(sample);
            assert_eq!(env.decrypt(&ct), sample);
        }
    }

    #[test]
    fn is_encrypted_distinguishes_ciphertext_from_plaintext() {
        let env = envelope();
        let ct = env.encrypt("secret");
        assert!(CryptoEnvelope::is_encrypted(&ct));
        assert!(!CryptoEnvelope::is_encrypted("plain-legacy-value"));
        assert!(!CryptoEnvelope::is_encrypted(""));
    }

    #[test]
    fn decrypt_rejects_tampered_ciphertext() {
        let env = envelope();
        let mut ct = env.encrypt("secret").into_bytes();
        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        let tampered = String::from_utf8(ct).unwrap();
        assert_eq!(env.decrypt(&tampered), "");
    }

    #[test]
    fn decrypt_rejects_malformed_envelope() {
        let env = envelope();
        assert_eq!(env.decrypt("not-an-envelope"), "");
        assert_eq!(env.decrypt("orpv1:not-base64!!"), "");
    }

    #[test]
    fn key_persists_across_reloads() {
        let dir = tempdir().unwrap();
        let path = CryptoEnvelope::default_key_path(dir.path());
        let first = CryptoEnvelope::load_or_init(&path).unwrap();
        let ct = first.encrypt("persisted secret");

        let second = CryptoEnvelope::load_or_init(&path).unwrap();
        assert_eq!(second.decrypt(&ct), "persisted secret");
    }
}

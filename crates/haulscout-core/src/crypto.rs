//! Encryption of stored marketplace credentials.
//!
//! Blobs have the form `salt:iv:authTag:ciphertext`, every segment hex
//! encoded. The AES-256-GCM key is derived from the process secret with
//! PBKDF2-HMAC-SHA256 over the per-blob salt, so two encryptions of the same
//! plaintext never share a salt, IV or ciphertext.

use crate::{HaulError, Result};
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce, Tag};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use std::fmt;

/// AES-256-GCM with a 16-byte IV, matching the stored blob layout.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

pub const ENCRYPTION_KEY_VAR: &str = "ENCRYPTION_KEY";
pub const PBKDF2_ITERATIONS: u32 = 100_000;

const SALT_LEN: usize = 64;
const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

fn derive_key(secret: &[u8], salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(secret, salt, PBKDF2_ITERATIONS, &mut key);
    key
}

fn cipher_for(secret: &str, salt: &[u8]) -> Result<Aes256Gcm16> {
    let key = derive_key(secret.as_bytes(), salt);
    Aes256Gcm16::new_from_slice(&key).map_err(|e| HaulError::Encryption(e.to_string()))
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>> {
    hex::decode(segment).map_err(|e| HaulError::Decryption(format!("invalid {} segment: {}", name, e)))
}

pub fn encrypt(plaintext: &str, secret: &str) -> Result<String> {
    if secret.is_empty() {
        return Err(HaulError::MissingEncryptionKey);
    }

    let mut rng = rand::thread_rng();
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut iv);

    let cipher = cipher_for(secret, &salt)?;
    let mut buffer = plaintext.as_bytes().to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::<U16>::from_slice(&iv), b"", &mut buffer)
        .map_err(|_| HaulError::Encryption("AES-GCM encryption failed".to_string()))?;

    Ok(format!(
        "{}:{}:{}:{}",
        hex::encode(salt),
        hex::encode(iv),
        hex::encode(tag),
        hex::encode(buffer)
    ))
}

pub fn decrypt(blob: &str, secret: &str) -> Result<String> {
    if secret.is_empty() {
        return Err(HaulError::MissingEncryptionKey);
    }

    let parts: Vec<&str> = blob.split(':').collect();
    if parts.len() != 4 {
        return Err(HaulError::Decryption(format!(
            "expected 4 colon-delimited segments, found {}",
            parts.len()
        )));
    }

    let salt = decode_segment(parts[0], "salt")?;
    let iv = decode_segment(parts[1], "iv")?;
    let tag = decode_segment(parts[2], "auth tag")?;
    let mut buffer = decode_segment(parts[3], "ciphertext")?;

    if salt.is_empty() {
        return Err(HaulError::Decryption("empty salt".to_string()));
    }
    if iv.len() != IV_LEN {
        return Err(HaulError::Decryption(format!("iv must be {} bytes", IV_LEN)));
    }
    if tag.len() != TAG_LEN {
        return Err(HaulError::Decryption(format!("auth tag must be {} bytes", TAG_LEN)));
    }

    let cipher = cipher_for(secret, &salt)?;
    cipher
        .decrypt_in_place_detached(
            Nonce::<U16>::from_slice(&iv),
            b"",
            &mut buffer,
            Tag::from_slice(&tag),
        )
        .map_err(|_| HaulError::Decryption("authentication tag mismatch".to_string()))?;

    String::from_utf8(buffer).map_err(|e| HaulError::Decryption(e.to_string()))
}

/// Holds the process secret used to seal and open credential blobs.
#[derive(Clone)]
pub struct Cipher {
    secret: String,
}

impl Cipher {
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(HaulError::MissingEncryptionKey);
        }
        Ok(Self { secret })
    }

    /// Reads `ENCRYPTION_KEY`. Call this where credentials are needed, not at startup.
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var(ENCRYPTION_KEY_VAR).map_err(|_| HaulError::MissingEncryptionKey)?;
        Self::new(secret)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        encrypt(plaintext, &self.secret)
    }

    pub fn decrypt(&self, blob: &str) -> Result<String> {
        decrypt(blob, &self.secret)
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher").field("secret", &"<redacted>").finish()
    }
}

//! Decryption of stored env records.
//!
//! Records are AES-256-GCM ciphertexts with the 12-byte nonce prepended,
//! base64-encoded as a whole. The key is process-wide configuration.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("env record is not valid base64: {0}")]
    Encoding(String),

    #[error("env record is too short to contain a nonce")]
    TooShort,

    #[error("env record failed authenticated decryption")]
    Decrypt,

    #[error("decrypted env record is not utf8")]
    Utf8,
}

/// Decrypts one stored `env_content` value back to plaintext.
pub fn decrypt_env_content(
    ciphertext_b64: &str,
    key: &[u8; KEY_LEN],
) -> Result<String, CryptoError> {
    let raw = STANDARD
        .decode(ciphertext_b64.trim())
        .map_err(|e| CryptoError::Encoding(e.to_string()))?;

    if raw.len() <= NONCE_LEN {
        return Err(CryptoError::TooShort);
    }

    let (nonce_bytes, cipher_bytes) = raw.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Decrypt)?;
    let plain = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), cipher_bytes)
        .map_err(|_| CryptoError::Decrypt)?;

    String::from_utf8(plain).map_err(|_| CryptoError::Utf8)
}

/// Test-only counterpart of [`decrypt_env_content`]; the control plane
/// performs encryption in production.
#[cfg(test)]
pub(crate) fn encrypt_env_content(
    plaintext: &str,
    key: &[u8; KEY_LEN],
    nonce: [u8; NONCE_LEN],
) -> String {
    let cipher = Aes256Gcm::new_from_slice(key).expect("valid key");
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .expect("encrypt");
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    STANDARD.encode(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_content() {
        let key = [42u8; KEY_LEN];
        let plaintext = "NEXT_PUBLIC_API=https://a\nDATABASE_URL=postgres://db\n";
        let encrypted = encrypt_env_content(plaintext, &key, [7u8; NONCE_LEN]);
        let decrypted = decrypt_env_content(&encrypted, &key).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn wrong_key_is_rejected() {
        let encrypted = encrypt_env_content("SECRET=1", &[1u8; KEY_LEN], [0u8; NONCE_LEN]);
        let err = decrypt_env_content(&encrypted, &[2u8; KEY_LEN]).unwrap_err();
        assert!(matches!(err, CryptoError::Decrypt));
    }

    #[test]
    fn garbage_inputs_are_rejected() {
        let key = [0u8; KEY_LEN];
        assert!(matches!(
            decrypt_env_content("!!!", &key),
            Err(CryptoError::Encoding(_))
        ));
        assert!(matches!(
            decrypt_env_content("AAAA", &key),
            Err(CryptoError::TooShort)
        ));
    }
}

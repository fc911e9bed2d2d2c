use chacha20poly1305::{
    aead::{Aead, Generate},
    KeyInit, XChaCha20Poly1305, XNonce,
};

use crate::error::VaultError;

/// Authenticated encryption for wallet files at rest.
///
/// Format: a random 24-byte nonce in plaintext, followed by the
/// XChaCha20Poly1305 ciphertext of the value.
pub struct Cipher {
    cipher: XChaCha20Poly1305,
}

impl Cipher {
    pub const NONCE_SIZE: usize = 24;

    pub fn new(key: &[u8]) -> Result<Self, VaultError> {
        Ok(Self {
            cipher: XChaCha20Poly1305::new_from_slice(key).map_err(|_| VaultError::Cipher)?,
        })
    }

    // encrypt value and prepend the plaintext nonce
    // a nonce is generated randomly at each call
    pub fn encrypt_value(&self, value: &[u8]) -> Result<Vec<u8>, VaultError> {
        let nonce = XNonce::generate();

        self.encrypt_value_with_nonce(value, &nonce.into())
    }

    // encrypt value under an explicit nonce, prepending it to the output
    pub fn encrypt_value_with_nonce(
        &self,
        value: &[u8],
        nonce: &[u8; Self::NONCE_SIZE],
    ) -> Result<Vec<u8>, VaultError> {
        let data = self
            .cipher
            .encrypt(nonce.into(), value)
            .map_err(|_| VaultError::Encrypt)?;

        let mut encrypted = Vec::with_capacity(Self::NONCE_SIZE + data.len());
        encrypted.extend_from_slice(nonce);
        encrypted.extend_from_slice(&data);

        Ok(encrypted)
    }

    // decrypt a value in the format produced above
    pub fn decrypt_value(&self, encrypted: &[u8]) -> Result<Vec<u8>, VaultError> {
        // nonce is 24 bytes and is mandatory in the encrypted slice
        if encrypted.len() <= Self::NONCE_SIZE {
            return Err(VaultError::InvalidEncryptedValue);
        }

        let nonce = XNonce::try_from(&encrypted[0..Self::NONCE_SIZE])
            .map_err(|_| VaultError::NonceGeneration)?;

        self.cipher
            .decrypt(&nonce, &encrypted[Self::NONCE_SIZE..])
            .map_err(|_| VaultError::Decrypt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> Cipher {
        Cipher::new(&[42u8; 32]).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let c = cipher();
        let encrypted = c.encrypt_value(b"secret keypair bytes").unwrap();
        assert_eq!(c.decrypt_value(&encrypted).unwrap(), b"secret keypair bytes");
    }

    #[test]
    fn test_nonce_is_unique_per_call() {
        let c = cipher();
        let a = c.encrypt_value(b"same").unwrap();
        let b = c.encrypt_value(b"same").unwrap();
        assert_ne!(a, b);
        assert_ne!(&a[..Cipher::NONCE_SIZE], &b[..Cipher::NONCE_SIZE]);
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = cipher().encrypt_value(b"secret").unwrap();
        let other = Cipher::new(&[43u8; 32]).unwrap();
        assert!(matches!(
            other.decrypt_value(&encrypted),
            Err(VaultError::Decrypt)
        ));
    }

    #[test]
    fn test_truncated_input_rejected() {
        let c = cipher();
        assert!(matches!(
            c.decrypt_value(&[0u8; 10]),
            Err(VaultError::InvalidEncryptedValue)
        ));
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(matches!(Cipher::new(&[1u8; 16]), Err(VaultError::Cipher)));
    }
}

use std::fmt;

use ed25519_dalek::{Signer, SigningKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

use super::pubkey::{Pubkey, PUBKEY_SIZE};

/// Size of the serialized keypair: 32-byte secret followed by the
/// 32-byte public key. This layout is shared with the seed-wallet JSON
/// files and the encrypted vault files.
pub const KEYPAIR_SIZE: usize = SECRET_KEY_LENGTH + PUBKEY_SIZE;

/// Size of an Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeypairError {
    #[error("Invalid keypair length: expected {KEYPAIR_SIZE}, got {0}")]
    InvalidLength(usize),

    #[error("Public key does not match the secret key")]
    PublicKeyMismatch,
}

/// Ed25519 signing keypair for a wallet.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair using a cryptographically secure RNG.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    pub fn from_secret_bytes(bytes: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// Parse the 64-byte secret-then-public layout, rejecting a pair whose
    /// halves do not belong together.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeypairError> {
        if bytes.len() != KEYPAIR_SIZE {
            return Err(KeypairError::InvalidLength(bytes.len()));
        }
        let mut secret = [0u8; SECRET_KEY_LENGTH];
        secret.copy_from_slice(&bytes[..SECRET_KEY_LENGTH]);
        let keypair = Self::from_secret_bytes(&secret);
        secret.zeroize();
        if keypair.pubkey().as_bytes() != &bytes[SECRET_KEY_LENGTH..] {
            return Err(KeypairError::PublicKeyMismatch);
        }
        Ok(keypair)
    }

    pub fn to_bytes(&self) -> [u8; KEYPAIR_SIZE] {
        let mut bytes = [0u8; KEYPAIR_SIZE];
        bytes[..SECRET_KEY_LENGTH].copy_from_slice(&self.signing_key.to_bytes());
        bytes[SECRET_KEY_LENGTH..].copy_from_slice(&self.signing_key.verifying_key().to_bytes());
        bytes
    }

    pub fn pubkey(&self) -> Pubkey {
        Pubkey::new(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature::new(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &self.pubkey())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Ed25519 signature, rendered as base58 like transaction signatures on the wire.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
    pub const fn new(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    /// The all-zero signature used as a placeholder in unsigned transactions.
    pub const fn zero() -> Self {
        Self([0; SIGNATURE_SIZE])
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_string()[..16])
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = bs58::decode(&s)
            .into_vec()
            .map_err(serde::de::Error::custom)?;
        let bytes: [u8; SIGNATURE_SIZE] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("invalid signature length"))?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_bytes_roundtrip() {
        let kp = Keypair::generate();
        let bytes = kp.to_bytes();
        let restored = Keypair::from_bytes(&bytes).unwrap();
        assert_eq!(kp.pubkey(), restored.pubkey());
    }

    #[test]
    fn test_from_bytes_rejects_mismatched_halves() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        let mut bytes = a.to_bytes();
        bytes[SECRET_KEY_LENGTH..].copy_from_slice(b.pubkey().as_bytes());
        assert!(matches!(
            Keypair::from_bytes(&bytes),
            Err(KeypairError::PublicKeyMismatch)
        ));
    }

    #[test]
    fn test_from_bytes_rejects_bad_length() {
        assert!(matches!(
            Keypair::from_bytes(&[0u8; 32]),
            Err(KeypairError::InvalidLength(32))
        ));
    }

    #[test]
    fn test_sign_is_deterministic() {
        let kp = Keypair::generate();
        let sig1 = kp.sign(b"message");
        let sig2 = kp.sign(b"message");
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let kp = Keypair::generate();
        let debug = format!("{:?}", kp);
        assert!(debug.contains("[REDACTED]"));
    }
}

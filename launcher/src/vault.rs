use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::debug;
use zeroize::Zeroize;

use launcher_common::crypto::Keypair;

use crate::cipher::Cipher;
use crate::error::{ConfigError, LauncherError, VaultError};

/// Environment variable carrying the vault passphrase.
pub const WALLET_PASS_ENV: &str = "LAUNCHER_WALLET_PASS";

pub const KEY_SIZE: usize = 32;

/// File extension of encrypted sub-wallet keys.
pub const WALLET_FILE_EXT: &str = "enc";

// Compatibility contract with existing deployments: the AEAD key is the
// UTF-8 passphrase right-padded with zeroes and truncated to 32 bytes.
// This is deliberately NOT a KDF; upgrading it would orphan every vault
// already on disk.
fn derive_key(passphrase: &str) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    let bytes = passphrase.as_bytes();
    let len = bytes.len().min(KEY_SIZE);
    key[..len].copy_from_slice(&bytes[..len]);
    key
}

/// Encrypted at-rest storage for generated sub-wallet keypairs, one
/// `<wallet_id>.enc` file per wallet.
pub struct WalletVault {
    cipher: Cipher,
}

impl WalletVault {
    pub fn new(passphrase: &str) -> Result<Self, VaultError> {
        let mut key = derive_key(passphrase);
        let cipher = Cipher::new(&key);
        key.zeroize();
        Ok(Self { cipher: cipher? })
    }

    /// Build a vault from `LAUNCHER_WALLET_PASS`. A missing or empty
    /// passphrase is a configuration error, not a vault error.
    pub fn from_env() -> Result<Self, LauncherError> {
        let passphrase = std::env::var(WALLET_PASS_ENV)
            .ok()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ConfigError::missing(WALLET_PASS_ENV))?;
        Ok(Self::new(&passphrase)?)
    }

    /// Encrypt and persist a keypair, returning the file path.
    pub fn save(&self, dir: &Path, wallet_id: &str, keypair: &Keypair) -> Result<PathBuf, VaultError> {
        fs::create_dir_all(dir)?;
        let mut plaintext = keypair.to_bytes();
        let encrypted = self.cipher.encrypt_value(&plaintext);
        plaintext.zeroize();
        let path = dir.join(format!("{}.{}", wallet_id, WALLET_FILE_EXT));
        fs::write(&path, encrypted?)?;
        debug!("saved encrypted wallet {} to {}", wallet_id, path.display());
        Ok(path)
    }

    /// Decrypt a keypair previously written by [`WalletVault::save`].
    pub fn load(&self, path: &Path) -> Result<Keypair, VaultError> {
        let encrypted = fs::read(path)?;
        let mut plaintext = self.cipher.decrypt_value(&encrypted)?;
        let keypair = Keypair::from_bytes(&plaintext);
        plaintext.zeroize();
        Ok(keypair?)
    }
}

/// Fresh random keypairs for each id, insertion-ordered like the plan.
pub fn generate_subwallets(ids: &[String]) -> IndexMap<String, Keypair> {
    ids.iter()
        .map(|id| (id.clone(), Keypair::generate()))
        .collect()
}

/// Load the seed wallet from its JSON file: an array of 64 integers
/// holding the secret key followed by the public key.
pub fn load_seed_keypair(path: &Path) -> Result<Keypair, VaultError> {
    let malformed = |reason: &str| VaultError::MalformedSeedFile {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };

    let contents = fs::read(path)?;
    let values: Vec<u8> = serde_json::from_slice(&contents)
        .map_err(|e| malformed(&e.to_string()))?;
    if values.len() != launcher_common::crypto::KEYPAIR_SIZE {
        return Err(malformed(&format!(
            "expected 64 integers, got {}",
            values.len()
        )));
    }
    Ok(Keypair::from_bytes(&values)?)
}

use curve25519_dalek::edwards::CompressedEdwardsY;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::pubkey::{Pubkey, PUBKEY_SIZE};

/// Maximum number of seeds accepted by the derivation, bump excluded.
pub const MAX_SEEDS: usize = 16;

/// Maximum length of a single seed in bytes.
pub const MAX_SEED_LEN: usize = 32;

/// Domain separator appended when hashing program-derived addresses.
const PDA_MARKER: &[u8; 21] = b"ProgramDerivedAddress";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PdaError {
    #[error("Too many seeds: {0} (max {MAX_SEEDS})")]
    TooManySeeds(usize),

    #[error("Seed {index} too long: {len} bytes (max {MAX_SEED_LEN})")]
    SeedTooLong { index: usize, len: usize },

    #[error("Derived address is on the curve")]
    OnCurve,

    #[error("No viable bump seed found")]
    NoViableBump,
}

/// Whether the 32 bytes decompress to a valid Edwards point. Addresses on
/// the curve have private keys and therefore cannot be program-derived.
pub fn is_on_curve(bytes: &[u8; PUBKEY_SIZE]) -> bool {
    CompressedEdwardsY(*bytes).decompress().is_some()
}

/// Derive the address for `seeds` under `program_id`, failing if the
/// result lands on the curve.
pub fn create_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<Pubkey, PdaError> {
    if seeds.len() > MAX_SEEDS {
        return Err(PdaError::TooManySeeds(seeds.len()));
    }
    for (index, seed) in seeds.iter().enumerate() {
        if seed.len() > MAX_SEED_LEN {
            return Err(PdaError::SeedTooLong {
                index,
                len: seed.len(),
            });
        }
    }

    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(program_id.as_bytes());
    hasher.update(PDA_MARKER);
    let digest: [u8; PUBKEY_SIZE] = hasher.finalize().into();

    if is_on_curve(&digest) {
        return Err(PdaError::OnCurve);
    }
    Ok(Pubkey::new(digest))
}

/// Find the canonical program-derived address for `seeds`: the highest bump
/// in 255..=0 whose derivation lands off the curve, returned with that bump.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), PdaError> {
    for bump in (0..=255u8).rev() {
        let bump_seed = [bump];
        let mut with_bump: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 1);
        with_bump.extend_from_slice(seeds);
        with_bump.push(&bump_seed);
        match create_program_address(&with_bump, program_id) {
            Ok(pubkey) => return Ok((pubkey, bump)),
            Err(PdaError::OnCurve) => {}
            Err(e) => return Err(e),
        }
    }
    Err(PdaError::NoViableBump)
}

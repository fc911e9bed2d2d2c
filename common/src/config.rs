use lazy_static::lazy_static;

use crate::crypto::Pubkey;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Size in bytes of an SPL mint account.
pub const MINT_ACCOUNT_SIZE: u64 = 82;

/// Rent-exempt balance for a mint account. The RPC facade has no rent
/// query, so the standard value for the fixed 82-byte layout is used.
pub const MINT_ACCOUNT_RENT_LAMPORTS: u64 = 1_461_600;

// Well-known program addresses. These are stable across clusters.
pub const SYSTEM_PROGRAM: &str = "11111111111111111111111111111111";
pub const TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const ASSOCIATED_TOKEN_PROGRAM: &str = "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL";
pub const COMPUTE_BUDGET_PROGRAM: &str = "ComputeBudget111111111111111111111111111111";
pub const SYSVAR_RENT: &str = "SysvarRent111111111111111111111111111111111";

lazy_static! {
    pub static ref SYSTEM_PROGRAM_ID: Pubkey = SYSTEM_PROGRAM.parse().unwrap();
    pub static ref TOKEN_PROGRAM_ID: Pubkey = TOKEN_PROGRAM.parse().unwrap();
    pub static ref ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
        ASSOCIATED_TOKEN_PROGRAM.parse().unwrap();
    pub static ref COMPUTE_BUDGET_PROGRAM_ID: Pubkey = COMPUTE_BUDGET_PROGRAM.parse().unwrap();
    pub static ref SYSVAR_RENT_ID: Pubkey = SYSVAR_RENT.parse().unwrap();
}

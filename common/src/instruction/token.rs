use crate::config::{
    ASSOCIATED_TOKEN_PROGRAM_ID, SYSTEM_PROGRAM_ID, SYSVAR_RENT_ID, TOKEN_PROGRAM_ID,
};
use crate::crypto::{find_program_address, PdaError, Pubkey};
use crate::serializer::Writer;

use super::{AccountMeta, Instruction};

// SPL token program instruction tags (u8)
const INITIALIZE_MINT: u8 = 0;
const MINT_TO: u8 = 7;

/// Initialize `mint` with the given decimals and authorities. A `None`
/// freeze authority is encoded as `COption::None`.
pub fn initialize_mint(
    mint: &Pubkey,
    decimals: u8,
    mint_authority: &Pubkey,
    freeze_authority: Option<&Pubkey>,
) -> Instruction {
    let mut writer = Writer::with_capacity(67);
    writer.write_u8(INITIALIZE_MINT);
    writer.write_u8(decimals);
    writer.write_pubkey(mint_authority);
    match freeze_authority {
        Some(authority) => {
            writer.write_u8(1);
            writer.write_pubkey(authority);
        }
        None => {
            writer.write_u8(0);
            writer.write_bytes(&[0u8; 32]);
        }
    }

    Instruction::new(
        *TOKEN_PROGRAM_ID,
        vec![
            AccountMeta::writable(*mint, false),
            AccountMeta::readonly(*SYSVAR_RENT_ID, false),
        ],
        writer.into_bytes(),
    )
}

/// Mint `amount` tokens to `destination`; `authority` must sign.
pub fn mint_to(
    mint: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: u64,
) -> Instruction {
    let mut writer = Writer::with_capacity(9);
    writer.write_u8(MINT_TO);
    writer.write_u64(amount);

    Instruction::new(
        *TOKEN_PROGRAM_ID,
        vec![
            AccountMeta::writable(*mint, false),
            AccountMeta::writable(*destination, false),
            AccountMeta::readonly(*authority, true),
        ],
        writer.into_bytes(),
    )
}

/// Canonical associated token account for `owner` and `mint`.
pub fn derive_associated_token_address(
    owner: &Pubkey,
    mint: &Pubkey,
) -> Result<Pubkey, PdaError> {
    let (address, _bump) = find_program_address(
        &[
            owner.as_bytes(),
            TOKEN_PROGRAM_ID.as_bytes(),
            mint.as_bytes(),
        ],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )?;
    Ok(address)
}

/// Create the associated token account for `owner`/`mint`, funded by `payer`.
pub fn create_associated_token_account(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Result<Instruction, PdaError> {
    let ata = derive_associated_token_address(owner, mint)?;
    Ok(Instruction::new(
        *ASSOCIATED_TOKEN_PROGRAM_ID,
        vec![
            AccountMeta::writable(*payer, true),
            AccountMeta::writable(ata, false),
            AccountMeta::readonly(*owner, false),
            AccountMeta::readonly(*mint, false),
            AccountMeta::readonly(*SYSTEM_PROGRAM_ID, false),
            AccountMeta::readonly(*TOKEN_PROGRAM_ID, false),
        ],
        vec![],
    ))
}

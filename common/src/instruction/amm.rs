use serde::{Deserialize, Serialize};

use crate::crypto::{find_program_address, PdaError, Pubkey};
use crate::serializer::Writer;

use super::{AccountMeta, Instruction};

// AMM program instruction tags (u8)
const INITIALIZE2: u8 = 0x00;
const SWAP_EXACT_IN: u8 = 0x01;

/// The full derived account set for one pool, keyed by the base/quote
/// mint pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAccounts {
    pub pool: Pubkey,
    pub authority: Pubkey,
    pub lp_mint: Pubkey,
    pub vault_base: Pubkey,
    pub vault_quote: Pubkey,
    pub open_orders: Pubkey,
    pub target_orders: Pubkey,
    pub amm_config: Pubkey,
}

/// Derive every pool account. The pool address is keyed by the mint pair;
/// the satellite accounts are keyed by the derived pool address.
pub fn derive_pool_accounts(
    base_mint: &Pubkey,
    quote_mint: &Pubkey,
    amm_program: &Pubkey,
) -> Result<PoolAccounts, PdaError> {
    let (pool, _) = find_program_address(
        &[b"amm", base_mint.as_bytes(), quote_mint.as_bytes()],
        amm_program,
    )?;

    let satellite = |tag: &[u8]| -> Result<Pubkey, PdaError> {
        let (address, _) = find_program_address(&[tag, pool.as_bytes()], amm_program)?;
        Ok(address)
    };

    Ok(PoolAccounts {
        pool,
        authority: satellite(b"authority")?,
        lp_mint: satellite(b"lp_mint")?,
        vault_base: satellite(b"vault_base")?,
        vault_quote: satellite(b"vault_quote")?,
        open_orders: satellite(b"open_orders")?,
        target_orders: satellite(b"target_orders")?,
        amm_config: find_program_address(&[b"amm_config"], amm_program)?.0,
    })
}

/// Build the pool `initialize2` instruction seeding `tokens_to_lp` tokens.
pub fn build_initialize2(
    amm_program: &Pubkey,
    accounts: &PoolAccounts,
    base_mint: &Pubkey,
    quote_mint: &Pubkey,
    lp_creator: &Pubkey,
    tokens_to_lp: u64,
) -> Instruction {
    let mut writer = Writer::with_capacity(9);
    writer.write_u8(INITIALIZE2);
    writer.write_u64(tokens_to_lp);

    Instruction::new(
        *amm_program,
        vec![
            AccountMeta::writable(accounts.pool, false),
            AccountMeta::readonly(accounts.authority, false),
            AccountMeta::writable(accounts.lp_mint, false),
            AccountMeta::writable(accounts.vault_base, false),
            AccountMeta::writable(accounts.vault_quote, false),
            AccountMeta::readonly(*base_mint, false),
            AccountMeta::readonly(*quote_mint, false),
            AccountMeta::writable(accounts.open_orders, false),
            AccountMeta::writable(accounts.target_orders, false),
            AccountMeta::readonly(accounts.amm_config, false),
            AccountMeta::writable(*lp_creator, true),
        ],
        writer.into_bytes(),
    )
}

/// Build an exact-in SOL→base swap for `user`.
pub fn build_swap_exact_in(
    amm_program: &Pubkey,
    accounts: &PoolAccounts,
    user: &Pubkey,
    in_lamports: u64,
    min_out: u64,
    slippage_bps: u16,
) -> Instruction {
    let mut writer = Writer::with_capacity(19);
    writer.write_u8(SWAP_EXACT_IN);
    writer.write_u64(in_lamports);
    writer.write_u64(min_out);
    writer.write_u16(slippage_bps);

    Instruction::new(
        *amm_program,
        vec![
            AccountMeta::writable(accounts.pool, false),
            AccountMeta::readonly(accounts.authority, false),
            AccountMeta::writable(accounts.open_orders, false),
            AccountMeta::writable(accounts.target_orders, false),
            AccountMeta::writable(accounts.vault_base, false),
            AccountMeta::writable(accounts.vault_quote, false),
            AccountMeta::writable(*user, true),
        ],
        writer.into_bytes(),
    )
}

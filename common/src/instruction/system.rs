use crate::config::SYSTEM_PROGRAM_ID;
use crate::crypto::Pubkey;
use crate::serializer::Writer;

use super::{AccountMeta, Instruction};

// System program instruction tags (u32 LE)
const CREATE_ACCOUNT: u32 = 0;
const TRANSFER: u32 = 2;

/// Transfer `lamports` from `from` to `to`.
pub fn transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> Instruction {
    let mut writer = Writer::with_capacity(12);
    writer.write_u32(TRANSFER);
    writer.write_u64(lamports);

    Instruction::new(
        *SYSTEM_PROGRAM_ID,
        vec![
            AccountMeta::writable(*from, true),
            AccountMeta::writable(*to, false),
        ],
        writer.into_bytes(),
    )
}

/// Create `new_account` with `space` bytes owned by `owner`, funded by `from`.
pub fn create_account(
    from: &Pubkey,
    new_account: &Pubkey,
    lamports: u64,
    space: u64,
    owner: &Pubkey,
) -> Instruction {
    let mut writer = Writer::with_capacity(52);
    writer.write_u32(CREATE_ACCOUNT);
    writer.write_u64(lamports);
    writer.write_u64(space);
    writer.write_pubkey(owner);

    Instruction::new(
        *SYSTEM_PROGRAM_ID,
        vec![
            AccountMeta::writable(*from, true),
            AccountMeta::writable(*new_account, true),
        ],
        writer.into_bytes(),
    )
}

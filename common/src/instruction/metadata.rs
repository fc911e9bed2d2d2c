use crate::config::{SYSTEM_PROGRAM_ID, SYSVAR_RENT_ID, TOKEN_PROGRAM_ID};
use crate::crypto::{find_program_address, PdaError, Pubkey};
use crate::serializer::Writer;

use super::{AccountMeta, EncodeError, Instruction};

// On-chain limits enforced by the token-metadata program
pub const MAX_NAME_LENGTH: usize = 32;
pub const MAX_SYMBOL_LENGTH: usize = 10;
pub const MAX_URI_LENGTH: usize = 200;

/// Discriminator for `CreateMetadataAccountV3`.
const CREATE_METADATA_ACCOUNT_V3: u8 = 0x21;

/// Derive the metadata PDA for `mint` under `metadata_program`.
pub fn find_metadata_pda(
    mint: &Pubkey,
    metadata_program: &Pubkey,
) -> Result<(Pubkey, u8), PdaError> {
    find_program_address(
        &[b"metadata", metadata_program.as_bytes(), mint.as_bytes()],
        metadata_program,
    )
}

// Truncate to at most `max` bytes without splitting a code point.
fn truncate_str(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Encode the `CreateMetadataAccountV3` payload. Creators, collection and
/// uses are `Option::None`; `collection_details` is `None`. Inputs must
/// already be within the program limits.
pub fn encode_create_metadata_v3(
    name: &str,
    symbol: &str,
    uri: &str,
    seller_fee_bps: u16,
    is_mutable: bool,
) -> Vec<u8> {
    let mut writer = Writer::with_capacity(20 + name.len() + symbol.len() + uri.len());
    writer.write_u8(CREATE_METADATA_ACCOUNT_V3);
    writer.write_str(name);
    writer.write_str(symbol);
    writer.write_str(uri);
    writer.write_u16(seller_fee_bps);
    writer.write_u8(0); // creators: Option::None
    writer.write_u8(0); // collection: Option::None
    writer.write_u8(0); // uses: Option::None
    writer.write_u8(if is_mutable { 1 } else { 0 });
    writer.write_u8(0); // collection_details: Option::None
    writer.into_bytes()
}

pub struct CreateMetadataV3<'a> {
    pub metadata_program: Pubkey,
    pub mint: Pubkey,
    pub mint_authority: Pubkey,
    pub payer: Pubkey,
    pub update_authority: Pubkey,
    pub name: &'a str,
    pub symbol: &'a str,
    pub uri: &'a str,
    pub seller_fee_bps: u16,
    pub is_mutable: bool,
    /// When set, over-limit fields are truncated at a char boundary
    /// instead of failing the encode.
    pub truncate: bool,
}

/// Build the `CreateMetadataAccountV3` instruction for a mint.
pub fn build_create_metadata_v3(args: CreateMetadataV3<'_>) -> Result<Instruction, EncodeError> {
    let (name, symbol, uri) = if args.truncate {
        (
            truncate_str(args.name, MAX_NAME_LENGTH),
            truncate_str(args.symbol, MAX_SYMBOL_LENGTH),
            truncate_str(args.uri, MAX_URI_LENGTH),
        )
    } else {
        for (field, value, max) in [
            ("name", args.name, MAX_NAME_LENGTH),
            ("symbol", args.symbol, MAX_SYMBOL_LENGTH),
            ("uri", args.uri, MAX_URI_LENGTH),
        ] {
            if value.len() > max {
                return Err(EncodeError::FieldTooLong {
                    field,
                    len: value.len(),
                    max,
                });
            }
        }
        (args.name, args.symbol, args.uri)
    };

    let (metadata_pda, _bump) = find_metadata_pda(&args.mint, &args.metadata_program)?;
    let data = encode_create_metadata_v3(name, symbol, uri, args.seller_fee_bps, args.is_mutable);

    Ok(Instruction::new(
        args.metadata_program,
        vec![
            AccountMeta::writable(metadata_pda, false),
            AccountMeta::readonly(args.mint, false),
            AccountMeta::readonly(args.mint_authority, true),
            AccountMeta::writable(args.payer, true),
            AccountMeta::readonly(args.update_authority, false),
            AccountMeta::readonly(*SYSTEM_PROGRAM_ID, false),
            AccountMeta::readonly(*SYSVAR_RENT_ID, false),
            AccountMeta::readonly(*TOKEN_PROGRAM_ID, false),
        ],
        data,
    ))
}

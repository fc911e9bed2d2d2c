use log::info;

use launcher_common::crypto::Pubkey;
use launcher_common::instruction::compute_budget::compute_budget_instructions;
use launcher_common::instruction::metadata::{build_create_metadata_v3, CreateMetadataV3};
use launcher_common::plan::PlanError;

use crate::error::{ConfigError, LauncherError};
use crate::state::MetadataArtifact;
use crate::step::{send_or_simulate, Step, StepContext, TxOutcome};

/// Attach token metadata to the mint via `CreateMetadataAccountV3`.
/// Over-limit name/symbol/uri fields are truncated at char boundaries,
/// matching what the on-chain program would accept.
pub async fn run(ctx: &StepContext<'_>, mint: &Pubkey) -> Result<MetadataArtifact, LauncherError> {
    let lp_wallet = ctx
        .plan
        .lp_creator()
        .ok_or(LauncherError::PlanInvalid(PlanError::LpCreator))?;
    let lp_keypair = ctx
        .wallets
        .get(&lp_wallet.wallet_id)
        .ok_or_else(|| ConfigError::missing(format!("wallet keypair {}", lp_wallet.wallet_id)))?;
    let lp_pub = lp_keypair.pubkey();

    // the plan may name an explicit update authority; default to the
    // LP creator that owns the mint authority
    let update_authority = match ctx.plan.token.authorities.get("update_authority") {
        Some(address) => address
            .parse()
            .map_err(|e| ConfigError::invalid("token.authorities.update_authority", e))?,
        None => lp_pub,
    };

    let token = &ctx.plan.token;
    let instruction = build_create_metadata_v3(CreateMetadataV3 {
        metadata_program: ctx.config.program_ids.metaplex_token_metadata,
        mint: *mint,
        mint_authority: lp_pub,
        payer: ctx.seed.pubkey(),
        update_authority,
        name: &token.name,
        symbol: &token.symbol,
        uri: token.metadata_uri(),
        seller_fee_bps: 0,
        is_mutable: true,
        truncate: true,
    })?;

    let mut instructions = compute_budget_instructions(ctx.run.cu_limit, ctx.run.cu_price_micro);
    instructions.push(instruction);

    let outcome = send_or_simulate(
        ctx,
        Step::Metadata,
        &instructions,
        ctx.seed,
        &[ctx.seed, lp_keypair],
    )
    .await?;

    Ok(match outcome {
        TxOutcome::Sent { sig } => {
            info!("metadata created for mint {}: {}", mint, sig);
            MetadataArtifact::Sent { tx_sig: sig }
        }
        TxOutcome::Simulated { logs, .. } => MetadataArtifact::Simulated {
            simulated: true,
            logs,
        },
    })
}

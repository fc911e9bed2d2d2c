use log::info;

use launcher_common::config::{MINT_ACCOUNT_RENT_LAMPORTS, MINT_ACCOUNT_SIZE, TOKEN_PROGRAM_ID};
use launcher_common::crypto::Keypair;
use launcher_common::instruction::{compute_budget::compute_budget_instructions, system, token};
use launcher_common::plan::PlanError;

use crate::error::{ConfigError, LauncherError};
use crate::state::MintArtifact;
use crate::step::{send_or_simulate, Step, StepContext};

/// Create the SPL mint, the LP creator's associated token account, and
/// mint the full supply into it, all in one atomic transaction.
///
/// Mint authority is the LP creator; the freeze authority is never set.
pub async fn run(ctx: &StepContext<'_>) -> Result<MintArtifact, LauncherError> {
    let lp_wallet = ctx
        .plan
        .lp_creator()
        .ok_or(LauncherError::PlanInvalid(PlanError::LpCreator))?;
    let lp_keypair = ctx
        .wallets
        .get(&lp_wallet.wallet_id)
        .ok_or_else(|| ConfigError::missing(format!("wallet keypair {}", lp_wallet.wallet_id)))?;
    let lp_pub = lp_keypair.pubkey();

    let mint_keypair = Keypair::generate();
    let mint = mint_keypair.pubkey();
    let ata = token::derive_associated_token_address(&lp_pub, &mint)?;
    let total_mint = ctx.plan.token.total_mint;

    let mut instructions = compute_budget_instructions(ctx.run.cu_limit, ctx.run.cu_price_micro);
    instructions.push(system::create_account(
        &ctx.seed.pubkey(),
        &mint,
        MINT_ACCOUNT_RENT_LAMPORTS,
        MINT_ACCOUNT_SIZE,
        &TOKEN_PROGRAM_ID,
    ));
    instructions.push(token::initialize_mint(
        &mint,
        ctx.plan.token.decimals,
        &lp_pub,
        None,
    ));
    instructions.push(token::create_associated_token_account(
        &ctx.seed.pubkey(),
        &lp_pub,
        &mint,
    )?);
    instructions.push(token::mint_to(&mint, &ata, &lp_pub, total_mint));

    let outcome = send_or_simulate(
        ctx,
        Step::Mint,
        &instructions,
        ctx.seed,
        &[ctx.seed, &mint_keypair, lp_keypair],
    )
    .await?;

    info!(
        "minted {} tokens to {} under mint {}{}",
        total_mint,
        ata,
        mint,
        if outcome.is_simulated() { " (simulated)" } else { "" }
    );

    Ok(MintArtifact {
        mint: mint.to_string(),
        lp_creator_ata: ata.to_string(),
        minted_tokens: total_mint,
        simulated: outcome.is_simulated(),
    })
}

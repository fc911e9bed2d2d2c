use log::info;

use launcher_common::crypto::Pubkey;
use launcher_common::instruction::amm::{build_initialize2, derive_pool_accounts, PoolAccounts};
use launcher_common::instruction::compute_budget::compute_budget_instructions;
use launcher_common::plan::PlanError;

use crate::error::{ConfigError, LauncherError};
use crate::state::LpInitArtifact;
use crate::step::{send_or_simulate, Step, StepContext};

/// Resolve the AMM program and quote mint the plan targets, and derive
/// the full pool account set for `mint`.
pub fn pool_accounts_for(
    ctx: &StepContext<'_>,
    mint: &Pubkey,
) -> Result<(Pubkey, PoolAccounts), LauncherError> {
    let amm_program: Pubkey = ctx
        .plan
        .dex
        .program_id
        .parse()
        .map_err(|e| ConfigError::invalid("dex.program_id", e))?;
    let quote_mint: Pubkey = ctx
        .plan
        .dex
        .quote_mint
        .parse()
        .map_err(|e| ConfigError::invalid("dex.quote_mint", e))?;
    let accounts = derive_pool_accounts(mint, &quote_mint, &amm_program)?;
    Ok((amm_program, accounts))
}

/// Initialize the AMM pool, seeding it with the plan's `lp_tokens`. The
/// LP creator pays and signs.
pub async fn run(ctx: &StepContext<'_>, mint: &Pubkey) -> Result<LpInitArtifact, LauncherError> {
    let lp_wallet = ctx
        .plan
        .lp_creator()
        .ok_or(LauncherError::PlanInvalid(PlanError::LpCreator))?;
    let lp_keypair = ctx
        .wallets
        .get(&lp_wallet.wallet_id)
        .ok_or_else(|| ConfigError::missing(format!("wallet keypair {}", lp_wallet.wallet_id)))?;

    let (amm_program, accounts) = pool_accounts_for(ctx, mint)?;
    let quote_mint: Pubkey = ctx
        .plan
        .dex
        .quote_mint
        .parse()
        .map_err(|e| ConfigError::invalid("dex.quote_mint", e))?;
    let tokens_to_lp = ctx.plan.token.lp_tokens;

    let mut instructions = compute_budget_instructions(ctx.run.cu_limit, ctx.run.cu_price_micro);
    instructions.push(build_initialize2(
        &amm_program,
        &accounts,
        mint,
        &quote_mint,
        &lp_keypair.pubkey(),
        tokens_to_lp,
    ));

    let outcome =
        send_or_simulate(ctx, Step::LpInit, &instructions, lp_keypair, &[lp_keypair]).await?;

    info!(
        "pool {} initialized with {} tokens{}",
        accounts.pool,
        tokens_to_lp,
        if outcome.is_simulated() { " (simulated)" } else { "" }
    );

    Ok(LpInitArtifact {
        pool: accounts.pool.to_string(),
        vault_base: accounts.vault_base.to_string(),
        vault_quote: accounts.vault_quote.to_string(),
        lp_mint: accounts.lp_mint.to_string(),
        tokens_to_lp,
        tx_sig: outcome.sig().map(str::to_string),
        simulated: outcome.is_simulated(),
    })
}

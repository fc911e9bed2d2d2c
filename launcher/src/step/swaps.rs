use log::{info, warn};

use launcher_common::crypto::Pubkey;
use launcher_common::instruction::amm::build_swap_exact_in;
use launcher_common::instruction::compute_budget::compute_budget_instructions;
use launcher_common::units::sol_to_lamports;

use crate::error::{ConfigError, LauncherError};
use crate::state::{
    BuysArtifact, State, SwapEntry, REASON_ALREADY_SWAPPED, REASON_MAX_BUYS_REACHED,
};
use crate::step::{send_or_simulate, Step, StepContext};

use super::pool_init::pool_accounts_for;

/// Emit the scheduled buys in plan order, one transaction per wallet.
///
/// `order` numbers are monotonic and contiguous over qualifying wallets,
/// including skipped ones. Completion is persisted per wallet through
/// `buys_done` before the next transaction is built, so a crash never
/// produces a duplicate buy.
pub async fn run(
    ctx: &StepContext<'_>,
    state: &mut State,
    mint: &Pubkey,
) -> Result<BuysArtifact, LauncherError> {
    let (amm_program, accounts) = pool_accounts_for(ctx, mint)?;

    let mut swaps: Vec<SwapEntry> = Vec::new();
    let mut order: u32 = 0;
    let mut sent: usize = 0;
    let mut capped = false;

    for wallet_id in &ctx.plan.schedule {
        let Some(wallet) = ctx.plan.wallet(wallet_id) else {
            continue;
        };
        let Some(action) = &wallet.action else {
            continue;
        };
        if !action.is_swap_buy() {
            continue;
        }
        order += 1;

        if state.artifacts().buy_done(wallet_id) {
            swaps.push(SwapEntry::skipped(order, wallet_id, REASON_ALREADY_SWAPPED));
            continue;
        }

        // once the cap trips, remaining qualifying wallets keep their
        // order numbers but no further transactions are built
        if capped || ctx.run.max_buys.map(|max| sent >= max).unwrap_or(false) {
            if !capped {
                warn!("max_buys reached after {} swaps", sent);
                capped = true;
            }
            swaps.push(SwapEntry::skipped(order, wallet_id, REASON_MAX_BUYS_REACHED));
            continue;
        }

        if ctx.cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }

        let keypair = ctx
            .wallets
            .get(wallet_id)
            .ok_or_else(|| ConfigError::missing(format!("wallet keypair {}", wallet_id)))?;

        let in_lamports = sol_to_lamports(action.effective_base_sol);
        let mut instructions =
            compute_budget_instructions(ctx.run.cu_limit, ctx.run.cu_price_micro);
        instructions.push(build_swap_exact_in(
            &amm_program,
            &accounts,
            &keypair.pubkey(),
            in_lamports,
            action.min_out_tokens,
            action.slippage_bps,
        ));

        let outcome = send_or_simulate(ctx, Step::Buys, &instructions, keypair, &[keypair]).await?;
        sent += 1;
        info!(
            "swap {} for wallet {} ({} lamports in){}",
            order,
            wallet_id,
            in_lamports,
            if outcome.is_simulated() { " (simulated)" } else { "" }
        );

        swaps.push(SwapEntry {
            order,
            wallet_id: wallet_id.clone(),
            skipped: false,
            reason: None,
            in_lamports: Some(in_lamports),
            min_out_tokens: Some(action.min_out_tokens),
            slippage_bps: Some(action.slippage_bps),
            sig: outcome.sig().map(str::to_string),
            simulated: outcome.is_simulated(),
        });

        // durable before the next wallet: this is the crash-safety line
        state.mark_buy_done(wallet_id)?;
    }

    Ok(BuysArtifact { swaps })
}

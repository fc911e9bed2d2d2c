use log::{debug, info};

use launcher_common::instruction::{compute_budget::compute_budget_instructions, system};

use crate::error::{ConfigError, LauncherError};
use crate::state::{FundingArtifact, FundingEntry, REASON_ALREADY_FUNDED};
use crate::step::{send_or_simulate, Step, StepContext};

/// Top every non-seed wallet up to its planned `total_lamports`. Wallets
/// already at or above target are skipped, which makes the step safe to
/// re-run after a partial failure.
pub async fn run(ctx: &StepContext<'_>) -> Result<FundingArtifact, LauncherError> {
    let mut funded = Vec::new();

    for wallet in ctx.plan.wallets.iter().filter(|w| !w.is_seed()) {
        if ctx.cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }

        let keypair = ctx.wallets.get(&wallet.wallet_id).ok_or_else(|| {
            ConfigError::missing(format!("wallet keypair {}", wallet.wallet_id))
        })?;
        let target = wallet.funding.total_lamports;

        let balance = ctx
            .rpc
            .get_balance(&keypair.pubkey())
            .await
            .map_err(|e| LauncherError::RpcFailed {
                op: "get_balance",
                step: Step::Funding.name().to_string(),
                source: e,
            })?;

        if balance >= target {
            debug!(
                "wallet {} already funded ({} >= {})",
                wallet.wallet_id, balance, target
            );
            funded.push(FundingEntry::Skipped {
                wallet_id: wallet.wallet_id.clone(),
                skipped: true,
                reason: REASON_ALREADY_FUNDED.to_string(),
            });
            continue;
        }

        let lamports = target - balance;
        let mut instructions =
            compute_budget_instructions(ctx.run.cu_limit, ctx.run.cu_price_micro);
        instructions.push(system::transfer(
            &ctx.seed.pubkey(),
            &keypair.pubkey(),
            lamports,
        ));

        let outcome =
            send_or_simulate(ctx, Step::Funding, &instructions, ctx.seed, &[ctx.seed]).await?;
        info!(
            "funded wallet {} with {} lamports{}",
            wallet.wallet_id,
            lamports,
            if outcome.is_simulated() { " (simulated)" } else { "" }
        );
        funded.push(FundingEntry::Sent {
            wallet_id: wallet.wallet_id.clone(),
            lamports,
            sig: outcome.sig().map(str::to_string),
            simulated: outcome.is_simulated(),
        });
    }

    Ok(FundingArtifact {
        funded,
        seed_wallet: ctx
            .plan
            .seed_wallet()
            .map(|w| w.wallet_id.clone())
            .unwrap_or_default(),
    })
}

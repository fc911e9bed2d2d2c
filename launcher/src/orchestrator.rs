use indexmap::IndexMap;
use log::{info, warn};
use serde_json::{json, Value};

use launcher_common::crypto::{Keypair, Pubkey};
use launcher_common::instruction::metadata::find_metadata_pda;
use launcher_common::plan::Plan;

use crate::config::{LauncherConfig, RunConfig};
use crate::error::{ConfigError, LauncherError};
use crate::rpc::{CancelToken, RetryPolicy, RpcClient};
use crate::state::{
    Artifacts, State, StepReceipt, WalletArtifact, REASON_METADATA_EXISTS, REASON_MINT_EXISTS,
    REASON_POOL_EXISTS,
};
use crate::step::{funding, metadata, mint, pool_init, swaps, Step, StepContext};
use crate::telemetry::Telemetry;
use crate::vault::{generate_subwallets, load_seed_keypair, WalletVault};

/// Execute the plan against the state directory: prepare the wallet map,
/// then walk the fixed step order through the selection, resume and
/// precondition gates.
pub async fn execute(
    plan: &Plan,
    run: &RunConfig,
    config: &LauncherConfig,
    rpc: &dyn RpcClient,
    vault: &WalletVault,
    cancel: &CancelToken,
) -> Result<(), LauncherError> {
    let mut state = State::open(&run.out_dir)?;
    let telemetry = Telemetry::open(&run.out_dir)?;

    // plans are validated at load; re-assert as the pre-execution hook
    plan.validate()?;

    let seed = prepare_seed_keypair(run)?;
    let wallets = prepare_wallets(plan, &mut state, vault)?;

    let retry = RetryPolicy::default();
    let ctx = StepContext {
        rpc,
        plan,
        run,
        config,
        wallets: &wallets,
        seed: &seed,
        retry: &retry,
        cancel,
    };

    for step in Step::ORDER {
        if !run.only.selects(step) {
            continue;
        }
        if run.resume && state.done(step) && state.artifact_present(step) {
            info!("step {} already done, reusing stored artifact", step);
            continue;
        }
        if cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }

        if let Some(reason) = precondition_skip(&ctx, &state, step).await? {
            info!("step {} skipped: {}", step, reason);
            let receipt = StepReceipt::new(
                step,
                step_inputs(&ctx, &state, step),
                json!({"skipped": true, "reason": reason}),
                &run.plan_hash,
            );
            state.mark(step, &receipt)?;
            telemetry.step_complete(step, json!({"skipped": true, "reason": reason}))?;
            continue;
        }

        info!("step {} starting", step);
        match execute_step(&ctx, &mut state, step).await {
            Ok(StepOutput {
                outputs,
                patch,
                telemetry_fields,
            }) => {
                let receipt = StepReceipt::new(
                    step,
                    step_inputs(&ctx, &state, step),
                    outputs,
                    &run.plan_hash,
                );
                state.mark(step, &receipt)?;
                state.merge_artifacts(patch)?;
                telemetry.step_complete(step, telemetry_fields)?;
                info!("step {} complete", step);
            }
            Err(e) => {
                telemetry.step_error(step, &e.to_string())?;
                return Err(e);
            }
        }
    }

    Ok(())
}

struct StepOutput {
    outputs: Value,
    patch: Artifacts,
    telemetry_fields: Value,
}

async fn execute_step(
    ctx: &StepContext<'_>,
    state: &mut State,
    step: Step,
) -> Result<StepOutput, LauncherError> {
    match step {
        Step::Funding => {
            let artifact = funding::run(ctx).await?;
            Ok(StepOutput {
                outputs: serde_json::to_value(&artifact).unwrap_or_default(),
                telemetry_fields: json!({"wallets": artifact.funded.len()}),
                patch: Artifacts {
                    funding: Some(artifact),
                    ..Default::default()
                },
            })
        }
        Step::Mint => {
            let artifact = mint::run(ctx).await?;
            Ok(StepOutput {
                outputs: serde_json::to_value(&artifact).unwrap_or_default(),
                telemetry_fields: json!({"mint": artifact.mint}),
                patch: Artifacts {
                    mint: Some(artifact),
                    ..Default::default()
                },
            })
        }
        Step::Metadata => {
            let mint_address = require_mint(state)?;
            let artifact = metadata::run(ctx, &mint_address).await?;
            Ok(StepOutput {
                outputs: serde_json::to_value(&artifact).unwrap_or_default(),
                telemetry_fields: json!({"mint": mint_address.to_string()}),
                patch: Artifacts {
                    metadata: Some(artifact),
                    ..Default::default()
                },
            })
        }
        Step::LpInit => {
            let mint_address = require_mint(state)?;
            let artifact = pool_init::run(ctx, &mint_address).await?;
            Ok(StepOutput {
                outputs: serde_json::to_value(&artifact).unwrap_or_default(),
                telemetry_fields: json!({"pool": artifact.pool}),
                patch: Artifacts {
                    lp_init: Some(artifact),
                    ..Default::default()
                },
            })
        }
        Step::Buys => {
            let mint_address = require_mint(state)?;
            let artifact = swaps::run(ctx, state, &mint_address).await?;
            let sent = artifact.swaps.iter().filter(|s| !s.skipped).count();
            Ok(StepOutput {
                outputs: serde_json::to_value(&artifact).unwrap_or_default(),
                telemetry_fields: json!({"swaps": artifact.swaps.len(), "sent": sent}),
                patch: Artifacts {
                    buys: Some(artifact),
                    ..Default::default()
                },
            })
        }
    }
}

// Receipt inputs mirror what each executor consumed
fn step_inputs(ctx: &StepContext<'_>, state: &State, step: Step) -> Value {
    let mint = state
        .artifacts()
        .mint
        .as_ref()
        .map(|m| m.mint.clone())
        .unwrap_or_default();
    match step {
        Step::Funding => json!({"wallets": ctx.plan.sub_wallet_ids().len()}),
        Step::Mint => json!({"lp_tokens": ctx.plan.token.lp_tokens}),
        Step::Metadata => json!({"mint": mint}),
        Step::LpInit => json!({"mint": mint}),
        Step::Buys => json!({"schedule_len": ctx.plan.schedule.len()}),
    }
}

/// The skip-if-present gate: probe the chain for the step's observable
/// effect. A probe failure is a transport error, never a silent skip.
async fn precondition_skip(
    ctx: &StepContext<'_>,
    state: &State,
    step: Step,
) -> Result<Option<&'static str>, LauncherError> {
    let rpc_failed = |source: anyhow::Error| LauncherError::RpcFailed {
        op: "account_exists",
        step: step.name().to_string(),
        source,
    };

    match step {
        Step::Mint => {
            // only probeable once a mint address is on record
            let Some(artifact) = state.artifacts().mint.as_ref() else {
                return Ok(None);
            };
            let mint_address: Pubkey = artifact
                .mint
                .parse()
                .map_err(|e| ConfigError::invalid("artifacts.mint.mint", e))?;
            if ctx
                .rpc
                .account_exists(&mint_address)
                .await
                .map_err(rpc_failed)?
            {
                return Ok(Some(REASON_MINT_EXISTS));
            }
            Ok(None)
        }
        Step::Metadata => {
            let mint_address = require_mint(state)?;
            let (pda, _) = find_metadata_pda(
                &mint_address,
                &ctx.config.program_ids.metaplex_token_metadata,
            )?;
            if ctx.rpc.account_exists(&pda).await.map_err(rpc_failed)? {
                return Ok(Some(REASON_METADATA_EXISTS));
            }
            Ok(None)
        }
        Step::LpInit => {
            let mint_address = require_mint(state)?;
            let (_, accounts) = pool_init::pool_accounts_for(ctx, &mint_address)?;
            if ctx
                .rpc
                .account_exists(&accounts.pool)
                .await
                .map_err(rpc_failed)?
            {
                return Ok(Some(REASON_POOL_EXISTS));
            }
            Ok(None)
        }
        // funding and buys are guarded by balance and buys_done checks
        Step::Funding | Step::Buys => Ok(None),
    }
}

fn require_mint(state: &State) -> Result<Pubkey, LauncherError> {
    let artifact = state
        .artifacts()
        .mint
        .as_ref()
        .ok_or_else(|| ConfigError::missing("artifacts.mint.mint"))?;
    Ok(artifact
        .mint
        .parse()
        .map_err(|e| ConfigError::invalid("artifacts.mint.mint", e))?)
}

fn prepare_seed_keypair(run: &RunConfig) -> Result<Keypair, LauncherError> {
    match &run.seed_keypair {
        Some(path) => Ok(load_seed_keypair(path)?),
        None if run.simulate => {
            warn!("no --seed-keypair given, using an ephemeral keypair for simulation");
            Ok(Keypair::generate())
        }
        None => Err(ConfigError::missing("--seed-keypair").into()),
    }
}

/// Build the in-memory wallet map. If the artifact map already points at
/// encrypted wallet files they are decrypted and reused (wallet files are
/// created once per plan execution and survive across resumes); otherwise
/// fresh keypairs are generated and persisted.
fn prepare_wallets(
    plan: &Plan,
    state: &mut State,
    vault: &WalletVault,
) -> Result<IndexMap<String, Keypair>, LauncherError> {
    if let Some(stored) = state.artifacts().wallets.clone() {
        if !stored.is_empty() {
            let mut wallets = IndexMap::with_capacity(stored.len());
            for (wallet_id, artifact) in stored {
                let keypair = vault.load(std::path::Path::new(&artifact.path))?;
                if keypair.pubkey().to_string() != artifact.pubkey {
                    return Err(ConfigError::invalid(
                        format!("artifacts.wallets.{}", wallet_id),
                        "decrypted keypair does not match the recorded pubkey",
                    )
                    .into());
                }
                wallets.insert(wallet_id, keypair);
            }
            info!("rehydrated {} wallets from the vault", wallets.len());
            return Ok(wallets);
        }
    }

    let ids = plan.sub_wallet_ids();
    let wallets = generate_subwallets(&ids);
    let dir = state.wallets_dir();
    let mut artifacts = IndexMap::with_capacity(wallets.len());
    for (wallet_id, keypair) in &wallets {
        let path = vault.save(&dir, wallet_id, keypair)?;
        artifacts.insert(
            wallet_id.clone(),
            WalletArtifact {
                pubkey: keypair.pubkey().to_string(),
                path: path.display().to_string(),
            },
        );
    }
    state.merge_artifacts(Artifacts {
        wallets: Some(artifacts),
        ..Default::default()
    })?;
    info!("generated {} sub-wallets", wallets.len());
    Ok(wallets)
}

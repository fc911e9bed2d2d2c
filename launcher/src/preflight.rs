use std::path::Path;

use indexmap::IndexMap;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;

use launcher_common::crypto::{sha256, Pubkey};
use launcher_common::instruction::compute_budget::compute_budget_instructions;
use launcher_common::instruction::metadata::{build_create_metadata_v3, CreateMetadataV3};
use launcher_common::instruction::amm::{build_initialize2, derive_pool_accounts};
use launcher_common::plan::Plan;
use launcher_common::transaction::{Message, Transaction};

use crate::config::LauncherConfig;
use crate::error::{ConfigError, LauncherError};
use crate::rpc::RpcClient;
use crate::state::{atomic_write_json, Artifacts};

/// The preflight report persisted to `<out>/preflight.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightReport {
    pub plan_hash: String,
    pub program_checks: IndexMap<String, bool>,
    pub simulate_metadata_ok: bool,
    pub simulate_init_ok: bool,
}

// The mint the dry-run simulations target: the real one once minted,
// otherwise a deterministic preview address derived from the plan id.
fn preview_mint(plan: &Plan, out_dir: &Path) -> Pubkey {
    let artifacts_path = out_dir.join("artifacts.json");
    if let Ok(bytes) = std::fs::read(&artifacts_path) {
        if let Ok(artifacts) = serde_json::from_slice::<Artifacts>(&bytes) {
            if let Some(mint) = artifacts.mint.and_then(|m| m.mint.parse().ok()) {
                return mint;
            }
        }
    }
    Pubkey::new(sha256(format!("PREVIEW_{}", plan.plan_id).as_bytes()))
}

/// Dry-run the launch configuration: probe the configured program ids and
/// simulate the metadata and pool-init transactions without sending
/// anything.
pub async fn run(
    rpc: &dyn RpcClient,
    plan: &Plan,
    plan_hash: &str,
    config: &LauncherConfig,
    out_dir: &Path,
) -> Result<PreflightReport, LauncherError> {
    let rpc_failed = |op: &'static str| {
        move |source: anyhow::Error| LauncherError::RpcFailed {
            op,
            step: "preflight".to_string(),
            source,
        }
    };

    let mut program_checks = IndexMap::new();
    for (name, program) in [
        (
            "metaplex_token_metadata",
            config.program_ids.metaplex_token_metadata,
        ),
        ("raydium_v4_amm", config.program_ids.raydium_v4_amm),
    ] {
        let exists = rpc
            .account_exists(&program)
            .await
            .map_err(rpc_failed("account_exists"))?;
        program_checks.insert(format!("prog_{}", name), exists);
    }

    let base_mint = preview_mint(plan, out_dir);
    // the plan's own program id stands in for the yet-unknown authorities;
    // simulation skips signature checks
    let placeholder: Pubkey = plan
        .dex
        .program_id
        .parse()
        .map_err(|e| ConfigError::invalid("dex.program_id", e))?;

    let blockhash = rpc
        .recent_blockhash()
        .await
        .map_err(rpc_failed("recent_blockhash"))?;
    let budget = compute_budget_instructions(
        config.fees.compute_unit_limit,
        config.fees.compute_unit_price_micro_lamports,
    );

    let mut metadata_instructions = budget.clone();
    metadata_instructions.push(build_create_metadata_v3(CreateMetadataV3 {
        metadata_program: config.program_ids.metaplex_token_metadata,
        mint: base_mint,
        mint_authority: placeholder,
        payer: placeholder,
        update_authority: placeholder,
        name: &plan.token.name,
        symbol: &plan.token.symbol,
        uri: plan.token.metadata_uri(),
        seller_fee_bps: 0,
        is_mutable: true,
        truncate: true,
    })?);
    let metadata_tx = Transaction::new_unsigned(Message::compile(
        &placeholder,
        &metadata_instructions,
        blockhash,
    )?);
    let metadata_sim = rpc
        .simulate(&metadata_tx)
        .await
        .map_err(rpc_failed("simulate"))?;

    let pool = derive_pool_accounts(
        &base_mint,
        &config.mints.wrapped_sol,
        &config.program_ids.raydium_v4_amm,
    )?;
    let mut init_instructions = budget;
    init_instructions.push(build_initialize2(
        &config.program_ids.raydium_v4_amm,
        &pool,
        &base_mint,
        &config.mints.wrapped_sol,
        &placeholder,
        plan.token.lp_tokens,
    ));
    let init_tx = Transaction::new_unsigned(Message::compile(
        &placeholder,
        &init_instructions,
        blockhash,
    )?);
    let init_sim = rpc.simulate(&init_tx).await.map_err(rpc_failed("simulate"))?;

    let report = PreflightReport {
        plan_hash: plan_hash.to_string(),
        program_checks,
        simulate_metadata_ok: metadata_sim.err.is_none(),
        simulate_init_ok: init_sim.err.is_none(),
    };

    std::fs::create_dir_all(out_dir).map_err(crate::error::StateError::from)?;
    atomic_write_json(&out_dir.join("preflight.json"), &report)?;

    info!("preflight: {}", json!(&report));
    Ok(report)
}

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use launcher_common::crypto::Pubkey;
use launcher_common::instruction::amm::derive_pool_accounts;
use launcher_common::instruction::metadata::find_metadata_pda;
use launcher_common::plan::plan_hash;

use crate::config::LauncherConfig;
use crate::error::LauncherError;
use crate::rpc::RpcClient;
use crate::state::{atomic_write_json, Artifacts};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyChecks {
    pub mint_exists: bool,
    pub metadata_exists: bool,
    pub pool_exists: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifySwap {
    pub wallet_id: String,
    pub sig: String,
}

/// The verification report persisted to `<out>/verify.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReport {
    pub schema_version: String,
    pub plan_hash: String,
    pub mint: String,
    pub metadata_pda: String,
    pub pool: String,
    pub checks: VerifyChecks,
    pub swaps: Vec<VerifySwap>,
}

/// Cross-reference the persisted artifacts with on-chain state. Strictly
/// read-only apart from writing the report; missing artifacts simply turn
/// into failing checks.
pub async fn run(
    rpc: &dyn RpcClient,
    config: &LauncherConfig,
    out_dir: &Path,
) -> Result<(VerifyReport, bool), LauncherError> {
    let rpc_failed = |source: anyhow::Error| LauncherError::RpcFailed {
        op: "account_exists",
        step: "verify".to_string(),
        source,
    };

    let artifacts: Artifacts = std::fs::read(out_dir.join("artifacts.json"))
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default();

    let mint_address = artifacts
        .mint
        .as_ref()
        .and_then(|m| m.mint.parse::<Pubkey>().ok());

    let mut checks = VerifyChecks::default();
    let mut metadata_pda = String::new();
    let mut pool = String::new();

    if let Some(mint) = mint_address {
        checks.mint_exists = rpc.account_exists(&mint).await.map_err(rpc_failed)?;

        let (pda, _) = find_metadata_pda(&mint, &config.program_ids.metaplex_token_metadata)?;
        metadata_pda = pda.to_string();
        checks.metadata_exists = rpc.account_exists(&pda).await.map_err(rpc_failed)?;

        let accounts = derive_pool_accounts(
            &mint,
            &config.mints.wrapped_sol,
            &config.program_ids.raydium_v4_amm,
        )?;
        pool = accounts.pool.to_string();
        checks.pool_exists = rpc.account_exists(&accounts.pool).await.map_err(rpc_failed)?;
    }

    let swaps: Vec<VerifySwap> = artifacts
        .buys
        .as_ref()
        .map(|buys| {
            buys.swaps
                .iter()
                .filter_map(|swap| {
                    swap.sig.as_ref().map(|sig| VerifySwap {
                        wallet_id: swap.wallet_id.clone(),
                        sig: sig.clone(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let plan_file_hash = std::fs::read(out_dir.join("plan.json"))
        .map(|bytes| plan_hash(&bytes))
        .unwrap_or_default();

    let report = VerifyReport {
        schema_version: "1.0.0".to_string(),
        plan_hash: plan_file_hash,
        mint: mint_address.map(|m| m.to_string()).unwrap_or_default(),
        metadata_pda,
        pool,
        checks,
        swaps,
    };

    std::fs::create_dir_all(out_dir).map_err(crate::error::StateError::from)?;
    atomic_write_json(&out_dir.join("verify.json"), &report)?;

    let ok = report.checks.mint_exists
        && report.checks.metadata_exists
        && report.checks.pool_exists;
    info!("verify: mint_exists={}", verdict(report.checks.mint_exists));
    info!(
        "verify: metadata_exists={}",
        verdict(report.checks.metadata_exists)
    );
    info!("verify: pool_exists={}", verdict(report.checks.pool_exists));
    info!("verify: swaps recorded={}", report.swaps.len());

    Ok((report, ok))
}

fn verdict(ok: bool) -> &'static str {
    if ok {
        "OK"
    } else {
        "FAIL"
    }
}

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::tempdir;

use launcher_common::crypto::{Hash, Keypair, Pubkey};
use launcher_common::plan::Plan;
use launcher_common::transaction::Transaction;

use launcher::config::{LauncherConfig, OnlyFilter, RunConfig};
use launcher::error::{ConfigError, LauncherError, EXIT_CONFIG_ERROR, EXIT_RPC_FAILED};
use launcher::orchestrator::execute;
use launcher::rpc::{CancelToken, RpcClient, SimulationResult};
use launcher::state::{State, WalletArtifact};
use launcher::step::Step;
use launcher::vault::WalletVault;

const WSOL: &str = "So11111111111111111111111111111111111111112";

/// In-memory double for the RPC facade.
#[derive(Default)]
struct FakeRpc {
    existing: Mutex<HashSet<String>>,
    balances: Mutex<HashMap<String, u64>>,
    sent_payers: Mutex<Vec<String>>,
    sends: AtomicUsize,
    simulations: AtomicUsize,
    fail_sends: bool,
}

impl FakeRpc {
    fn with_existing(addresses: &[&str]) -> Self {
        let rpc = Self::default();
        rpc.existing
            .lock()
            .unwrap()
            .extend(addresses.iter().map(|a| a.to_string()));
        rpc
    }

    fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Default::default()
        }
    }

    fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcClient for FakeRpc {
    async fn recent_blockhash(&self) -> Result<Hash> {
        Ok(Hash::new([1; 32]))
    }

    async fn account_exists(&self, pubkey: &Pubkey) -> Result<bool> {
        Ok(self.existing.lock().unwrap().contains(&pubkey.to_string()))
    }

    async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&pubkey.to_string())
            .copied()
            .unwrap_or(0))
    }

    async fn simulate(&self, _tx: &Transaction) -> Result<SimulationResult> {
        self.simulations.fetch_add(1, Ordering::SeqCst);
        Ok(SimulationResult::default())
    }

    async fn send_and_confirm(&self, tx: &Transaction) -> Result<String> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        if self.fail_sends {
            return Err(anyhow!("connection refused"));
        }
        self.sent_payers
            .lock()
            .unwrap()
            .push(tx.message.account_keys[0].to_string());
        Ok("SIG".to_string())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn plan_value(n_buyers: usize) -> Value {
    let mut wallets = vec![
        json!({
            "wallet_id": "w_seed",
            "role": "SEED",
            "funding": {"total_lamports": 0u64, "base_lamports": 0u64, "buffer_lamports": 0u64}
        }),
        json!({
            "wallet_id": "w1",
            "role": "LP_CREATOR",
            "funding": {"total_lamports": 2_000_000_000u64, "base_lamports": 2_000_000_000u64, "buffer_lamports": 0u64},
            "action": {"type": "CREATE_LP", "slippage_bps": 50}
        }),
    ];
    let mut schedule = vec!["w1".to_string()];
    for i in 0..n_buyers {
        let id = format!("w{}", i + 2);
        wallets.push(json!({
            "wallet_id": id,
            "role": "BUYER",
            "funding": {"total_lamports": 1_000_000_000u64, "base_lamports": 950_000_000u64, "buffer_lamports": 50_000_000u64},
            "action": {"type": "SWAP_BUY", "effective_base_sol": 0.95, "min_out_tokens": 1000u64, "slippage_bps": 50, "atomic": true}
        }));
        schedule.push(id);
    }
    let sum = 2_000_000_000u64 + n_buyers as u64 * 1_000_000_000;

    json!({
        "version": "1.0",
        "model": "downstream",
        "network": "mainnet-beta",
        "plan_id": "plan-test",
        "created_at": "2024-05-01T12:00:00Z",
        "token": {
            "name": "Atomic Token",
            "symbol": "ATM",
            "decimals": 6,
            "total_mint": 10_000_000u64,
            "lp_tokens": 1_000_000u64,
            "uri": "https://example.org/atm.json"
        },
        "inputs": {
            "B_total": 3.0,
            "T0": 1_000_000.0,
            "q_atomic": 0.0,
            "n_buys": n_buyers,
            "follow_ratio": 0.0,
            "fee": 0.0025,
            "mm_pct": 0.1,
            "buffer_pct": 0.05,
            "snap_lamports": false
        },
        "dex": {
            "variant": "raydium_v4",
            "program_id": "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8",
            "pool_type": "amm",
            "quote_mint": WSOL,
            "quote_decimals": 9
        },
        "schedule": schedule,
        "wallets": wallets,
        "invariants": {
            "sum_non_seed_lamports": sum,
            "seed_lamports": sum
        },
        "tx_defaults": {}
    })
}

fn plan(n_buyers: usize) -> Plan {
    Plan::from_value(plan_value(n_buyers)).unwrap()
}

fn vault() -> WalletVault {
    WalletVault::new("test-pass").unwrap()
}

fn write_seed_keypair(dir: &Path) -> PathBuf {
    let keypair = Keypair::generate();
    let path = dir.join("seed.json");
    let values: Vec<u8> = keypair.to_bytes().to_vec();
    std::fs::write(&path, serde_json::to_vec(&values).unwrap()).unwrap();
    path
}

fn run_config(out: &Path, only: &str, resume: bool, simulate: bool, seed: Option<PathBuf>) -> RunConfig {
    RunConfig {
        out_dir: out.to_path_buf(),
        resume,
        only: OnlyFilter::parse(only).unwrap(),
        plan_hash: "TESTHASH".to_string(),
        cu_limit: Some(1_000_000),
        cu_price_micro: None,
        simulate,
        max_buys: None,
        seed_keypair: seed,
    }
}

fn seed_mint_artifact(out: &Path) {
    std::fs::create_dir_all(out).unwrap();
    std::fs::write(
        out.join("artifacts.json"),
        serde_json::to_vec(&json!({"mint": {"mint": WSOL}})).unwrap(),
    )
    .unwrap();
}

fn read_artifacts(out: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(out.join("artifacts.json")).unwrap()).unwrap()
}

fn receipt_names(out: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(out.join("receipts"))
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test]
async fn test_full_happy_path_writes_all_receipts_and_artifacts() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("state");
    let seed = write_seed_keypair(dir.path());
    let rpc = FakeRpc::default();
    let plan = plan(1);
    let cfg = run_config(&out, "all", false, false, Some(seed));

    execute(&plan, &cfg, &LauncherConfig::default(), &rpc, &vault(), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(
        receipt_names(&out),
        vec![
            "buys.json",
            "funding.json",
            "lp_init.json",
            "metadata.json",
            "mint.json"
        ]
    );

    let artifacts = read_artifacts(&out);
    assert!(artifacts["mint"]["mint"].as_str().unwrap().len() > 30);
    assert!(artifacts["lp_init"]["pool"].as_str().unwrap().len() > 30);
    // one SWAP_BUY action in the schedule -> one swap entry
    assert_eq!(artifacts["buys"]["swaps"].as_array().unwrap().len(), 1);
    assert_eq!(artifacts["buys"]["swaps"][0]["sig"], "SIG");
    assert_eq!(artifacts["buys_done"]["w2"], true);

    // funding for w1 and w2, mint, metadata, lp_init, one swap
    assert_eq!(rpc.sends(), 6);

    // every receipt carries the plan hash
    let state = State::open(&out).unwrap();
    for step in Step::ORDER {
        assert!(state.done(step), "step {} not done", step);
        let receipt = state.load_receipt(step).unwrap().unwrap();
        assert_eq!(receipt.plan_hash.as_deref(), Some("TESTHASH"));
        assert!(receipt.ok);
    }

    // telemetry has one completion event per step
    let telemetry = std::fs::read_to_string(out.join("telemetry.ndjson")).unwrap();
    for step in Step::ORDER {
        assert!(
            telemetry.contains(&format!("{}_complete", step.name())),
            "missing {}_complete",
            step.name()
        );
    }
}

#[tokio::test]
async fn test_resume_creates_no_new_receipts() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("state");
    let seed = write_seed_keypair(dir.path());
    let plan = plan(1);

    let rpc = FakeRpc::default();
    let cfg = run_config(&out, "all", false, false, Some(seed.clone()));
    execute(&plan, &cfg, &LauncherConfig::default(), &rpc, &vault(), &CancelToken::new())
        .await
        .unwrap();

    let receipts_before: Vec<(String, Vec<u8>)> = receipt_names(&out)
        .into_iter()
        .map(|name| {
            let bytes = std::fs::read(out.join("receipts").join(&name)).unwrap();
            (name, bytes)
        })
        .collect();

    // resumed run: every step already done, nothing re-executes
    let rpc2 = FakeRpc::default();
    let cfg2 = run_config(&out, "all", true, false, Some(seed));
    execute(&plan, &cfg2, &LauncherConfig::default(), &rpc2, &vault(), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(rpc2.sends(), 0);
    let receipts_after: Vec<(String, Vec<u8>)> = receipt_names(&out)
        .into_iter()
        .map(|name| {
            let bytes = std::fs::read(out.join("receipts").join(&name)).unwrap();
            (name, bytes)
        })
        .collect();
    assert_eq!(receipts_before, receipts_after);
}

#[tokio::test]
async fn test_precondition_skip_on_existing_mint() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("state");
    seed_mint_artifact(&out);

    let rpc = FakeRpc::with_existing(&[WSOL]);
    let plan = plan(1);
    let cfg = run_config(&out, "mint", false, true, None);

    execute(&plan, &cfg, &LauncherConfig::default(), &rpc, &vault(), &CancelToken::new())
        .await
        .unwrap();

    // no transaction was built or sent
    assert_eq!(rpc.sends(), 0);
    assert_eq!(rpc.simulations.load(Ordering::SeqCst), 0);

    let state = State::open(&out).unwrap();
    assert!(state.done(Step::Mint));
    let receipt = state.load_receipt(Step::Mint).unwrap().unwrap();
    assert_eq!(receipt.outputs["skipped"], true);
    assert_eq!(receipt.outputs["reason"], "mint_exists");
    assert_eq!(receipt_names(&out), vec!["mint.json"]);
}

#[tokio::test]
async fn test_idempotent_swaps_skip_on_second_run() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("state");
    seed_mint_artifact(&out);
    let plan = plan(2);

    let rpc = FakeRpc::default();
    let cfg = run_config(&out, "buys", false, true, None);
    execute(&plan, &cfg, &LauncherConfig::default(), &rpc, &vault(), &CancelToken::new())
        .await
        .unwrap();

    let artifacts = read_artifacts(&out);
    let swaps = artifacts["buys"]["swaps"].as_array().unwrap();
    assert_eq!(swaps.len(), 2);
    assert!(swaps.iter().all(|s| s["skipped"].is_null()));
    assert_eq!(artifacts["buys_done"]["w2"], true);
    assert_eq!(artifacts["buys_done"]["w3"], true);

    // second run: every scheduled buy is already done
    let rpc2 = FakeRpc::default();
    let cfg2 = run_config(&out, "buys", false, true, None);
    execute(&plan, &cfg2, &LauncherConfig::default(), &rpc2, &vault(), &CancelToken::new())
        .await
        .unwrap();

    let artifacts = read_artifacts(&out);
    let swaps = artifacts["buys"]["swaps"].as_array().unwrap();
    assert_eq!(swaps.len(), 2);
    for swap in swaps {
        assert_eq!(swap["skipped"], true);
        assert_eq!(swap["reason"], "already_swapped");
    }
    // order numbering survives the skip path
    assert_eq!(swaps[0]["order"], 1);
    assert_eq!(swaps[1]["order"], 2);
}

#[tokio::test]
async fn test_vault_rehydrates_wallets_on_resume() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("state");
    let wallets_dir = out.join("wallets");
    let plan = plan(1);
    let vault = vault();

    // pre-generate the wallets the way a previous run would have
    let mut wallet_artifacts = indexmap::IndexMap::new();
    let mut pubkeys = HashMap::new();
    for id in plan.sub_wallet_ids() {
        let keypair = Keypair::generate();
        let path = vault.save(&wallets_dir, &id, &keypair).unwrap();
        pubkeys.insert(id.clone(), keypair.pubkey().to_string());
        wallet_artifacts.insert(
            id,
            WalletArtifact {
                pubkey: keypair.pubkey().to_string(),
                path: path.display().to_string(),
            },
        );
    }
    std::fs::write(
        out.join("artifacts.json"),
        serde_json::to_vec(&json!({
            "mint": {"mint": WSOL},
            "wallets": wallet_artifacts,
        }))
        .unwrap(),
    )
    .unwrap();

    // non-simulated buys: the swap transaction must be paid by the
    // decrypted buyer keypair
    let rpc = FakeRpc::default();
    let cfg = run_config(&out, "buys", true, false, None);
    // a sending run demands a seed keypair even if funding is skipped
    let seed = write_seed_keypair(dir.path());
    let cfg = RunConfig {
        seed_keypair: Some(seed),
        ..cfg
    };
    execute(&plan, &cfg, &LauncherConfig::default(), &rpc, &vault, &CancelToken::new())
        .await
        .unwrap();

    let payers = rpc.sent_payers.lock().unwrap().clone();
    assert_eq!(payers, vec![pubkeys["w2"].clone()]);
}

#[tokio::test]
async fn test_max_buys_caps_and_preserves_order() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("state");
    seed_mint_artifact(&out);
    let plan = plan(3);

    let rpc = FakeRpc::default();
    let mut cfg = run_config(&out, "buys", false, true, None);
    cfg.max_buys = Some(1);
    execute(&plan, &cfg, &LauncherConfig::default(), &rpc, &vault(), &CancelToken::new())
        .await
        .unwrap();

    let artifacts = read_artifacts(&out);
    let swaps = artifacts["buys"]["swaps"].as_array().unwrap();
    assert_eq!(swaps.len(), 3);
    assert!(swaps[0]["skipped"].is_null());
    for (index, swap) in swaps.iter().enumerate() {
        assert_eq!(swap["order"], index as u64 + 1);
    }
    assert_eq!(swaps[1]["reason"], "max_buys_reached");
    assert_eq!(swaps[2]["reason"], "max_buys_reached");

    // only the first buy is marked done
    assert_eq!(artifacts["buys_done"]["w2"], true);
    assert!(artifacts["buys_done"]["w3"].is_null());
}

#[tokio::test]
async fn test_rpc_exhaustion_leaves_step_unmarked() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("state");
    let seed = write_seed_keypair(dir.path());
    let rpc = FakeRpc::failing();
    let plan = plan(1);
    let cfg = run_config(&out, "fund", false, false, Some(seed));

    let err = execute(&plan, &cfg, &LauncherConfig::default(), &rpc, &vault(), &CancelToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, LauncherError::RpcFailed { .. }));
    assert_eq!(err.exit_code(), EXIT_RPC_FAILED);
    // the full retry budget was spent
    assert_eq!(rpc.sends(), 5);

    let state = State::open(&out).unwrap();
    assert!(!state.done(Step::Funding));
    assert!(state.artifacts().funding.is_none());
    assert!(receipt_names(&out).is_empty());

    let telemetry = std::fs::read_to_string(out.join("telemetry.ndjson")).unwrap();
    assert!(telemetry.contains("funding_error"));
}

#[tokio::test]
async fn test_only_buys_without_mint_artifact_is_config_error() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("state");
    let plan = plan(1);
    let cfg = run_config(&out, "buys", false, true, None);

    let err = execute(&plan, &cfg, &LauncherConfig::default(), &FakeRpc::default(), &vault(), &CancelToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LauncherError::Config(ConfigError::Missing { .. })
    ));
    assert_eq!(err.exit_code(), EXIT_CONFIG_ERROR);
}

#[tokio::test]
async fn test_simulate_mode_sends_nothing() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("state");
    let plan = plan(1);
    // no seed keypair: simulation falls back to an ephemeral one
    let cfg = run_config(&out, "all", false, true, None);

    let rpc = FakeRpc::default();
    execute(&plan, &cfg, &LauncherConfig::default(), &rpc, &vault(), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(rpc.sends(), 0);
    assert!(rpc.simulations.load(Ordering::SeqCst) > 0);
    assert_eq!(receipt_names(&out).len(), 5);

    let artifacts = read_artifacts(&out);
    assert_eq!(artifacts["metadata"]["simulated"], true);
    assert_eq!(artifacts["mint"]["simulated"], true);
}

#[tokio::test]
async fn test_cancellation_stops_between_steps() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("state");
    let plan = plan(1);
    let cfg = run_config(&out, "all", false, true, None);

    let cancel = CancelToken::new();
    cancel.cancel();
    let err = execute(&plan, &cfg, &LauncherConfig::default(), &FakeRpc::default(), &vault(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, LauncherError::Cancelled));
    assert!(receipt_names(&out).is_empty());
}

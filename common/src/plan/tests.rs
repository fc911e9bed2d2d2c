use serde_json::json;

use super::*;

pub fn sample_plan_value() -> serde_json::Value {
    json!({
        "version": "1.0",
        "model": "downstream",
        "network": "mainnet-beta",
        "plan_id": "plan-0001",
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
            "n_buys": 1,
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
            "quote_mint": "So11111111111111111111111111111111111111112",
            "quote_decimals": 9
        },
        "schedule": ["w1", "w2"],
        "wallets": [
            {
                "wallet_id": "w_seed",
                "role": "SEED",
                "funding": {"total_lamports": 0u64, "base_lamports": 0u64, "buffer_lamports": 0u64}
            },
            {
                "wallet_id": "w1",
                "role": "LP_CREATOR",
                "funding": {"total_lamports": 2_000_000_000u64, "base_lamports": 1_900_000_000u64, "buffer_lamports": 100_000_000u64},
                "action": {"type": "CREATE_LP", "slippage_bps": 50}
            },
            {
                "wallet_id": "w2",
                "role": "BUYER",
                "funding": {"total_lamports": 1_000_000_000u64, "base_lamports": 950_000_000u64, "buffer_lamports": 50_000_000u64},
                "action": {"type": "SWAP_BUY", "effective_base_sol": 0.95, "min_out_tokens": 1000u64, "slippage_bps": 50, "atomic": true}
            }
        ],
        "invariants": {
            "sum_non_seed_lamports": 3_000_000_000u64,
            "seed_lamports": 3_000_000_000u64
        },
        "tx_defaults": {
            "compute_unit_limit": 1_000_000u32,
            "compute_unit_price_micro_lamports": 1000u64
        }
    })
}

pub fn sample_plan() -> Plan {
    Plan::from_value(sample_plan_value()).unwrap()
}

#[test]
fn test_sample_plan_accepted() {
    let plan = sample_plan();
    assert_eq!(plan.token.lp_tokens, plan.inputs.t0 as u64);
    assert_eq!(plan.wallets.len(), 3);
    assert_eq!(plan.schedule, vec!["w1", "w2"]);
    assert_eq!(plan.lp_creator().unwrap().wallet_id, "w1");
    assert_eq!(plan.sub_wallet_ids(), vec!["w1", "w2"]);
}

#[test]
fn test_roundtrip_yields_equal_plan() {
    let plan = sample_plan();
    let serialized = serde_json::to_vec(&plan).unwrap();
    let reloaded = Plan::from_slice(&serialized).unwrap();
    assert_eq!(plan, reloaded);
}

#[test]
fn test_sol_fields_coerce_to_lamports() {
    let mut value = sample_plan_value();
    value["wallets"][2]["funding"] = json!({"total_sol": 1.0, "base_sol": 0.95, "buffer_sol": 0.05});
    let plan = Plan::from_value(value).unwrap();
    let funding = plan.wallet("w2").unwrap().funding;
    assert_eq!(funding.total_lamports, 1_000_000_000);
    assert_eq!(funding.base_lamports, 950_000_000);
    assert_eq!(funding.buffer_lamports, 50_000_000);
}

#[test]
fn test_missing_total_defaults_to_base_plus_buffer() {
    let mut value = sample_plan_value();
    value["wallets"][2]["funding"] = json!({"base_lamports": 600_000_000u64, "buffer_lamports": 400_000_000u64});
    let plan = Plan::from_value(value).unwrap();
    assert_eq!(plan.wallet("w2").unwrap().funding.total_lamports, 1_000_000_000);
}

#[test]
fn test_lp_tokens_mismatch_rejected() {
    let mut value = sample_plan_value();
    value["token"]["lp_tokens"] = json!(999_999u64);
    let err = Plan::from_value(value).unwrap_err();
    assert_eq!(err, PlanError::LpTokensMismatch);
    assert_eq!(err.rule(), "lp_tokens");
}

#[test]
fn test_non_seed_sum_mismatch_rejected() {
    let mut value = sample_plan_value();
    value["invariants"]["sum_non_seed_lamports"] = json!(1u64);
    let err = Plan::from_value(value).unwrap_err();
    assert!(matches!(err, PlanError::NonSeedSumMismatch { .. }));
}

#[test]
fn test_seed_lamports_tolerance() {
    // off by one without snapping: rejected
    let mut value = sample_plan_value();
    value["invariants"]["seed_lamports"] = json!(3_000_000_001u64);
    assert!(matches!(
        Plan::from_value(value).unwrap_err(),
        PlanError::SeedLamports { .. }
    ));

    // off by one with snapping: accepted
    let mut value = sample_plan_value();
    value["invariants"]["seed_lamports"] = json!(3_000_000_001u64);
    value["inputs"]["snap_lamports"] = json!(true);
    assert!(Plan::from_value(value).is_ok());
}

#[test]
fn test_duplicate_wallet_id_rejected() {
    let mut value = sample_plan_value();
    value["wallets"][2]["wallet_id"] = json!("w1");
    // keep invariant 5 satisfiable so rule 4 is the one that fires
    value["schedule"] = json!(["w1"]);
    let err = Plan::from_value(value).unwrap_err();
    assert_eq!(err, PlanError::DuplicateWalletId("w1".into()));
}

#[test]
fn test_unknown_schedule_id_rejected() {
    let mut value = sample_plan_value();
    value["schedule"] = json!(["w1", "ghost"]);
    let err = Plan::from_value(value).unwrap_err();
    assert_eq!(err, PlanError::UnknownScheduleId("ghost".into()));
}

#[test]
fn test_lp_creator_required() {
    let mut value = sample_plan_value();
    value["wallets"][1]["role"] = json!("BUYER");
    assert_eq!(Plan::from_value(value).unwrap_err(), PlanError::LpCreator);

    // LP_CREATOR present but without a CREATE_LP action
    let mut value = sample_plan_value();
    value["wallets"][1]["action"] = json!({"type": "SWAP_BUY"});
    assert_eq!(Plan::from_value(value).unwrap_err(), PlanError::LpCreator);
}

#[test]
fn test_lp_creator_action_in_actions_list() {
    let mut value = sample_plan_value();
    value["wallets"][1]["action"] = serde_json::Value::Null;
    value["wallets"][1]["actions"] = json!([{"type": "CREATE_LP"}]);
    assert!(Plan::from_value(value).is_ok());
}

#[test]
fn test_slippage_bounds() {
    let mut value = sample_plan_value();
    value["wallets"][2]["action"]["slippage_bps"] = json!(6000);
    let err = Plan::from_value(value).unwrap_err();
    assert_eq!(err.rule(), "slippage");
    assert!(matches!(err, PlanError::Slippage { bps: 6000, .. }));

    // boundary value accepted
    let mut value = sample_plan_value();
    value["wallets"][2]["action"]["slippage_bps"] = json!(5000);
    assert!(Plan::from_value(value).is_ok());
}

#[test]
fn test_negative_base_sol_rejected() {
    let mut value = sample_plan_value();
    value["wallets"][2]["action"]["effective_base_sol"] = json!(-0.5);
    assert_eq!(
        Plan::from_value(value).unwrap_err(),
        PlanError::NegativeBaseSol("w2".into())
    );
}

#[test]
fn test_decimals_bound() {
    let mut value = sample_plan_value();
    value["token"]["decimals"] = json!(10);
    assert_eq!(Plan::from_value(value).unwrap_err(), PlanError::Decimals);
}

#[test]
fn test_lp_tokens_positive() {
    let mut value = sample_plan_value();
    value["token"]["lp_tokens"] = json!(0u64);
    value["inputs"]["T0"] = json!(0.0);
    assert_eq!(
        Plan::from_value(value).unwrap_err(),
        PlanError::LpTokensNotPositive
    );
}

#[test]
fn test_created_at_validated() {
    let mut value = sample_plan_value();
    value["created_at"] = json!("yesterday");
    assert!(matches!(
        Plan::from_value(value).unwrap_err(),
        PlanError::CreatedAt(_)
    ));
}

#[test]
fn test_mint_metadata_fallback_uri() {
    let mut value = sample_plan_value();
    value["token"]["uri"] = serde_json::Value::Null;
    value["token"]["mint_metadata"] = json!("ipfs://legacy");
    let plan = Plan::from_value(value).unwrap();
    assert_eq!(plan.token.metadata_uri(), "ipfs://legacy");
}

#[test]
fn test_plan_hash_stable() {
    let bytes = serde_json::to_vec(&sample_plan_value()).unwrap();
    assert_eq!(plan_hash(&bytes), plan_hash(&bytes));
    assert_eq!(plan_hash(&bytes).len(), 64);
    assert_ne!(plan_hash(&bytes), plan_hash(b"other"));
}

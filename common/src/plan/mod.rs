use chrono::DateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::crypto::sha256_hex;
use crate::units::sol_to_lamports;

// Wallet roles referenced by the validator and the executors. Roles are an
// open set; only these two have dedicated semantics.
pub const ROLE_SEED: &str = "SEED";
pub const ROLE_LP_CREATOR: &str = "LP_CREATOR";

// Action types
pub const ACTION_CREATE_LP: &str = "CREATE_LP";
pub const ACTION_SWAP_BUY: &str = "SWAP_BUY";
pub const ACTION_SWAP_BUY_SOL: &str = "SWAP_BUY_SOL";

pub const MAX_SLIPPAGE_BPS: u16 = 5000;
pub const MAX_TOKEN_DECIMALS: u8 = 9;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("token.lp_tokens must equal inputs.T0")]
    LpTokensMismatch,

    #[error("sum of non-seed lamports {actual} does not match invariants.sum_non_seed_lamports {expected}")]
    NonSeedSumMismatch { expected: u64, actual: u64 },

    #[error("seed lamports invariant violated: |{non_seed} - {seed}| > {tolerance}")]
    SeedLamports {
        non_seed: u64,
        seed: u64,
        tolerance: u64,
    },

    #[error("duplicate wallet_id {0}")]
    DuplicateWalletId(String),

    #[error("schedule references unknown wallet id {0}")]
    UnknownScheduleId(String),

    #[error("exactly one LP_CREATOR wallet carrying a CREATE_LP action is required")]
    LpCreator,

    #[error("slippage_bps {bps} out of bounds in wallet {wallet_id}")]
    Slippage { wallet_id: String, bps: u16 },

    #[error("effective_base_sol must be >= 0 in wallet {0}")]
    NegativeBaseSol(String),

    #[error("token.decimals must be between 0 and {MAX_TOKEN_DECIMALS}")]
    Decimals,

    #[error("token.lp_tokens must be > 0")]
    LpTokensNotPositive,

    #[error("created_at is not a valid ISO-8601 timestamp: {0}")]
    CreatedAt(String),

    #[error("malformed plan: {0}")]
    Parse(String),
}

impl PlanError {
    /// Short rule identifier, stamped into error telemetry.
    pub fn rule(&self) -> &'static str {
        match self {
            Self::LpTokensMismatch => "lp_tokens",
            Self::NonSeedSumMismatch { .. } => "sum_non_seed_lamports",
            Self::SeedLamports { .. } => "seed_lamports",
            Self::DuplicateWalletId(_) => "duplicate_wallet_id",
            Self::UnknownScheduleId(_) => "unknown_schedule_id",
            Self::LpCreator => "lp_creator",
            Self::Slippage { .. } => "slippage",
            Self::NegativeBaseSol(_) => "effective_base_sol",
            Self::Decimals => "decimals",
            Self::LpTokensNotPositive => "lp_tokens_positive",
            Self::CreatedAt(_) => "created_at",
            Self::Parse(_) => "parse",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_mint: u64,
    pub lp_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mint_metadata: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub authorities: IndexMap<String, String>,
}

impl Token {
    /// Metadata URI, with the legacy `mint_metadata` field as fallback.
    pub fn metadata_uri(&self) -> &str {
        self.uri
            .as_deref()
            .or(self.mint_metadata.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inputs {
    #[serde(rename = "B_total")]
    pub b_total: f64,
    #[serde(rename = "T0")]
    pub t0: f64,
    #[serde(default)]
    pub q_atomic: f64,
    pub n_buys: u32,
    #[serde(default)]
    pub follow_ratio: f64,
    pub fee: f64,
    pub mm_pct: f64,
    pub buffer_pct: f64,
    #[serde(default)]
    pub snap_lamports: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dex {
    pub variant: String,
    pub program_id: String,
    pub pool_type: String,
    pub quote_mint: String,
    pub quote_decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

/// Per-wallet funding envelope, always stored in lamports. Plans may
/// express any of the three amounts in SOL instead; deserialization
/// coerces via `round(x * 10^9)` and fills a missing total from
/// base + buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Funding {
    pub total_lamports: u64,
    pub base_lamports: u64,
    pub buffer_lamports: u64,
}

#[derive(Deserialize)]
struct RawFunding {
    total_lamports: Option<u64>,
    base_lamports: Option<u64>,
    buffer_lamports: Option<u64>,
    total_sol: Option<f64>,
    base_sol: Option<f64>,
    buffer_sol: Option<f64>,
}

impl<'de> Deserialize<'de> for Funding {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawFunding::deserialize(deserializer)?;
        let base = raw
            .base_lamports
            .or_else(|| raw.base_sol.map(sol_to_lamports))
            .unwrap_or(0);
        let buffer = raw
            .buffer_lamports
            .or_else(|| raw.buffer_sol.map(sol_to_lamports))
            .unwrap_or(0);
        let total = raw
            .total_lamports
            .or_else(|| raw.total_sol.map(sol_to_lamports))
            .unwrap_or(base + buffer);
        Ok(Funding {
            total_lamports: total,
            base_lamports: base,
            buffer_lamports: buffer,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub effective_base_sol: f64,
    #[serde(default)]
    pub min_out_tokens: u64,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,
    #[serde(default)]
    pub atomic: bool,
}

fn default_slippage_bps() -> u16 {
    50
}

impl Action {
    pub fn is_swap_buy(&self) -> bool {
        self.action_type == ACTION_SWAP_BUY || self.action_type == ACTION_SWAP_BUY_SOL
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub wallet_id: String,
    pub role: String,
    pub funding: Funding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

impl Wallet {
    pub fn is_seed(&self) -> bool {
        self.role == ROLE_SEED
    }

    fn carries_action(&self, action_type: &str) -> bool {
        self.action
            .as_ref()
            .map(|a| a.action_type == action_type)
            .unwrap_or(false)
            || self.actions.iter().any(|a| a.action_type == action_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invariants {
    pub sum_non_seed_lamports: u64,
    pub seed_lamports: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_equalities: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_unit_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_unit_price_micro_lamports: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jito_tip_lamports: Option<u64>,
}

/// The immutable launch plan. Validation is not implied by
/// deserialization; use [`Plan::from_slice`] / [`Plan::from_value`] to get
/// a checked plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub version: String,
    pub model: String,
    pub network: String,
    pub plan_id: String,
    pub created_at: String,
    pub token: Token,
    pub inputs: Inputs,
    pub dex: Dex,
    pub schedule: Vec<String>,
    pub wallets: Vec<Wallet>,
    pub invariants: Invariants,
    #[serde(default)]
    pub tx_defaults: TxDefaults,
}

impl Plan {
    /// Parse and validate a plan from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PlanError> {
        let plan: Plan =
            serde_json::from_slice(bytes).map_err(|e| PlanError::Parse(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Parse and validate a plan from a JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, PlanError> {
        let plan: Plan =
            serde_json::from_value(value).map_err(|e| PlanError::Parse(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn seed_wallet(&self) -> Option<&Wallet> {
        self.wallets.iter().find(|w| w.is_seed())
    }

    pub fn lp_creator(&self) -> Option<&Wallet> {
        self.wallets.iter().find(|w| w.role == ROLE_LP_CREATOR)
    }

    pub fn wallet(&self, wallet_id: &str) -> Option<&Wallet> {
        self.wallets.iter().find(|w| w.wallet_id == wallet_id)
    }

    /// Wallet ids that get a generated keypair (everything but the seed).
    pub fn sub_wallet_ids(&self) -> Vec<String> {
        self.wallets
            .iter()
            .filter(|w| !w.is_seed())
            .map(|w| w.wallet_id.clone())
            .collect()
    }

    /// Run every plan invariant and the runtime bounds. All violations are
    /// categorical; there is no partial acceptance.
    pub fn validate(&self) -> Result<(), PlanError> {
        // 1. LP seeding equals the economic model's T0
        if self.token.lp_tokens != self.inputs.t0.trunc() as u64 {
            return Err(PlanError::LpTokensMismatch);
        }

        // 2. non-seed funding adds up to the declared sum
        let non_seed: u64 = self
            .wallets
            .iter()
            .filter(|w| !w.is_seed())
            .map(|w| w.funding.total_lamports)
            .sum();
        if non_seed != self.invariants.sum_non_seed_lamports {
            return Err(PlanError::NonSeedSumMismatch {
                expected: self.invariants.sum_non_seed_lamports,
                actual: non_seed,
            });
        }

        // 3. seed balance covers the non-seed total, one lamport of
        // tolerance when amounts were snapped
        let tolerance = if self.inputs.snap_lamports { 1 } else { 0 };
        if non_seed.abs_diff(self.invariants.seed_lamports) > tolerance {
            return Err(PlanError::SeedLamports {
                non_seed,
                seed: self.invariants.seed_lamports,
                tolerance,
            });
        }

        // 4. wallet ids unique
        let mut seen = HashSet::new();
        for wallet in &self.wallets {
            if !seen.insert(wallet.wallet_id.as_str()) {
                return Err(PlanError::DuplicateWalletId(wallet.wallet_id.clone()));
            }
        }

        // 5. every scheduled id resolves
        for wallet_id in &self.schedule {
            if !seen.contains(wallet_id.as_str()) {
                return Err(PlanError::UnknownScheduleId(wallet_id.clone()));
            }
        }

        // 6. exactly one LP_CREATOR, and it carries CREATE_LP
        let lp_creators: Vec<&Wallet> = self
            .wallets
            .iter()
            .filter(|w| w.role == ROLE_LP_CREATOR)
            .collect();
        match lp_creators.as_slice() {
            [lp] if lp.carries_action(ACTION_CREATE_LP) => {}
            _ => return Err(PlanError::LpCreator),
        }

        // 7. per-action bounds
        for wallet in &self.wallets {
            for action in wallet.action.iter().chain(wallet.actions.iter()) {
                if action.slippage_bps > MAX_SLIPPAGE_BPS {
                    return Err(PlanError::Slippage {
                        wallet_id: wallet.wallet_id.clone(),
                        bps: action.slippage_bps,
                    });
                }
                if action.effective_base_sol < 0.0 {
                    return Err(PlanError::NegativeBaseSol(wallet.wallet_id.clone()));
                }
            }
        }

        // runtime bounds
        if self.token.decimals > MAX_TOKEN_DECIMALS {
            return Err(PlanError::Decimals);
        }
        if self.token.lp_tokens == 0 {
            return Err(PlanError::LpTokensNotPositive);
        }
        if DateTime::parse_from_rfc3339(&self.created_at).is_err() {
            return Err(PlanError::CreatedAt(self.created_at.clone()));
        }

        Ok(())
    }
}

/// Hex SHA-256 over the raw plan file bytes. Stamped into every receipt so
/// receipts from a different plan cannot be silently reused.
pub fn plan_hash(bytes: &[u8]) -> String {
    sha256_hex(bytes)
}

#[cfg(test)]
mod tests;

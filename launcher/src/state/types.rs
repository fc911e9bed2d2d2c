use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// Skip reasons recorded in receipts and swap entries
pub const REASON_ALREADY_FUNDED: &str = "already_funded";
pub const REASON_ALREADY_SWAPPED: &str = "already_swapped";
pub const REASON_MAX_BUYS_REACHED: &str = "max_buys_reached";
pub const REASON_MINT_EXISTS: &str = "mint_exists";
pub const REASON_METADATA_EXISTS: &str = "metadata_exists";
pub const REASON_POOL_EXISTS: &str = "pool_exists";

/// One funded (or skipped) wallet in the funding step output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FundingEntry {
    Skipped {
        wallet_id: String,
        skipped: bool,
        reason: String,
    },
    Sent {
        wallet_id: String,
        lamports: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        sig: Option<String>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        simulated: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingArtifact {
    pub funded: Vec<FundingEntry>,
    pub seed_wallet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintArtifact {
    pub mint: String,
    // a pre-seeded artifact may carry only the mint address
    #[serde(default)]
    pub lp_creator_ata: String,
    #[serde(default)]
    pub minted_tokens: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub simulated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataArtifact {
    Sent { tx_sig: String },
    Simulated { simulated: bool, logs: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpInitArtifact {
    pub pool: String,
    pub vault_base: String,
    pub vault_quote: String,
    pub lp_mint: String,
    pub tokens_to_lp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_sig: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub simulated: bool,
}

/// One scheduled swap in the buys step output. `order` numbers are
/// monotonic and contiguous over qualifying wallets, skips included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapEntry {
    pub order: u32,
    pub wallet_id: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_lamports: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_out_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slippage_bps: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub simulated: bool,
}

impl SwapEntry {
    pub fn skipped(order: u32, wallet_id: &str, reason: &str) -> Self {
        Self {
            order,
            wallet_id: wallet_id.to_string(),
            skipped: true,
            reason: Some(reason.to_string()),
            in_lamports: None,
            min_out_tokens: None,
            slippage_bps: None,
            sig: None,
            simulated: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuysArtifact {
    pub swaps: Vec<SwapEntry>,
}

/// Pointer to one generated sub-wallet: its public key and the encrypted
/// key file it can be rehydrated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletArtifact {
    #[serde(rename = "pub")]
    pub pubkey: String,
    pub path: String,
}

/// The merged, persisted output state of all completed steps. This is the
/// external `artifacts.json` contract; merges are last-write-wins per
/// top-level slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding: Option<FundingArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mint: Option<MintArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lp_init: Option<LpInitArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buys: Option<BuysArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallets: Option<IndexMap<String, WalletArtifact>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buys_done: Option<IndexMap<String, bool>>,
}

/// A top-level patch applied to [`Artifacts`]: every populated slot
/// replaces the stored one.
pub type ArtifactPatch = Artifacts;

impl Artifacts {
    pub fn merge(&mut self, patch: ArtifactPatch) {
        if patch.funding.is_some() {
            self.funding = patch.funding;
        }
        if patch.mint.is_some() {
            self.mint = patch.mint;
        }
        if patch.metadata.is_some() {
            self.metadata = patch.metadata;
        }
        if patch.lp_init.is_some() {
            self.lp_init = patch.lp_init;
        }
        if patch.buys.is_some() {
            self.buys = patch.buys;
        }
        if patch.wallets.is_some() {
            self.wallets = patch.wallets;
        }
        if patch.buys_done.is_some() {
            self.buys_done = patch.buys_done;
        }
    }

    /// Whether a wallet already has a recorded successful swap.
    pub fn buy_done(&self, wallet_id: &str) -> bool {
        self.buys_done
            .as_ref()
            .and_then(|m| m.get(wallet_id).copied())
            .unwrap_or(false)
    }

    pub fn mark_buy_done(&mut self, wallet_id: &str) {
        self.buys_done
            .get_or_insert_with(IndexMap::new)
            .insert(wallet_id.to_string(), true);
    }
}

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use launcher_common::crypto::Pubkey;

use crate::error::ConfigError;
use crate::step::Step;

/// Default values for the launcher configuration.
pub mod defaults {
    pub const METAPLEX_TOKEN_METADATA: &str = "metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s";
    pub const RAYDIUM_V4_AMM: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";
    pub const WRAPPED_SOL: &str = "So11111111111111111111111111111111111111112";
    pub const COMPUTE_UNIT_LIMIT: u32 = 1_000_000;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramIds {
    #[serde(default = "default_metaplex")]
    pub metaplex_token_metadata: Pubkey,
    #[serde(default = "default_raydium")]
    pub raydium_v4_amm: Pubkey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mints {
    #[serde(default = "default_wrapped_sol")]
    pub wrapped_sol: Pubkey,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fees {
    #[serde(default)]
    pub compute_unit_limit: Option<u32>,
    #[serde(default)]
    pub compute_unit_price_micro_lamports: Option<u64>,
}

fn default_metaplex() -> Pubkey {
    defaults::METAPLEX_TOKEN_METADATA.parse().unwrap()
}

fn default_raydium() -> Pubkey {
    defaults::RAYDIUM_V4_AMM.parse().unwrap()
}

fn default_wrapped_sol() -> Pubkey {
    defaults::WRAPPED_SOL.parse().unwrap()
}

impl Default for ProgramIds {
    fn default() -> Self {
        Self {
            metaplex_token_metadata: default_metaplex(),
            raydium_v4_amm: default_raydium(),
        }
    }
}

impl Default for Mints {
    fn default() -> Self {
        Self {
            wrapped_sol: default_wrapped_sol(),
        }
    }
}

/// Typed, closed launcher configuration. Every recognized key has a
/// default; unknown keys are ignored but logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(default)]
    pub program_ids: ProgramIds,
    #[serde(default)]
    pub mints: Mints,
    #[serde(default)]
    pub fees: Fees,
}

impl LauncherConfig {
    /// Load from a YAML file. A missing path yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let value: serde_yaml::Value =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: display.clone(),
                source,
            })?;

        warn_unknown_keys(&value);

        serde_yaml::from_value(value).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }
}

// The closed key schema; anything outside it is reported once at load
fn warn_unknown_keys(value: &serde_yaml::Value) {
    let known: [(&str, &[&str]); 3] = [
        ("program_ids", &["metaplex_token_metadata", "raydium_v4_amm"]),
        ("mints", &["wrapped_sol"]),
        (
            "fees",
            &["compute_unit_limit", "compute_unit_price_micro_lamports"],
        ),
    ];
    let sections: BTreeSet<&str> = known.iter().map(|(section, _)| *section).collect();

    let Some(root) = value.as_mapping() else {
        return;
    };
    for (key, nested) in root {
        let Some(key) = key.as_str() else { continue };
        if !sections.contains(key) {
            warn!("ignoring unknown config key {}", key);
            continue;
        }
        let Some(fields) = known
            .iter()
            .find(|(section, _)| *section == key)
            .map(|(_, fields)| *fields)
        else {
            continue;
        };
        if let Some(map) = nested.as_mapping() {
            for (field, _) in map {
                if let Some(field) = field.as_str() {
                    if !fields.contains(&field) {
                        warn!("ignoring unknown config key {}.{}", key, field);
                    }
                }
            }
        }
    }
}

/// Which steps a run executes: everything, or exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnlyFilter {
    All,
    Only(Step),
}

impl OnlyFilter {
    /// Parse the CLI value, honoring the `fund` and `lp` aliases.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "all" => Ok(Self::All),
            "fund" | "funding" => Ok(Self::Only(Step::Funding)),
            "mint" => Ok(Self::Only(Step::Mint)),
            "metadata" => Ok(Self::Only(Step::Metadata)),
            "lp" | "lp_init" => Ok(Self::Only(Step::LpInit)),
            "buys" => Ok(Self::Only(Step::Buys)),
            other => Err(ConfigError::invalid(
                "--only",
                format!("unknown step {}", other),
            )),
        }
    }

    pub fn selects(&self, step: Step) -> bool {
        match self {
            Self::All => true,
            Self::Only(only) => *only == step,
        }
    }
}

/// Per-run execution settings, assembled from the CLI.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub out_dir: PathBuf,
    pub resume: bool,
    pub only: OnlyFilter,
    pub plan_hash: String,
    pub cu_limit: Option<u32>,
    pub cu_price_micro: Option<u64>,
    pub simulate: bool,
    pub max_buys: Option<usize>,
    pub seed_keypair: Option<PathBuf>,
}

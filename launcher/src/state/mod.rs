mod types;

pub use types::*;

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use log::trace;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use launcher_common::time::timestamp_ms;

use crate::error::StateError;
use crate::step::Step;

pub const RECEIPT_SCHEMA_VERSION: &str = "1.0.0";

const CHECKPOINTS_FILE: &str = "checkpoints.json";
const ARTIFACTS_FILE: &str = "artifacts.json";
const RECEIPTS_DIR: &str = "receipts";

/// Durable record of one step execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReceipt {
    pub schema_version: String,
    pub step: String,
    pub ok: bool,
    pub inputs: Value,
    pub outputs: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_hash: Option<String>,
    pub created_ms: u64,
}

impl StepReceipt {
    pub fn new(step: Step, inputs: Value, outputs: Value, plan_hash: &str) -> Self {
        Self {
            schema_version: RECEIPT_SCHEMA_VERSION.to_string(),
            step: step.to_string(),
            ok: true,
            inputs,
            outputs,
            plan_hash: Some(plan_hash.to_string()),
            created_ms: timestamp_ms(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Checkpoints {
    done: Vec<String>,
}

// Crash-safe JSON write: temp file in the same directory, fsync, rename
// over the target, then fsync the directory so the rename is durable.
pub(crate) fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StateError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    {
        use std::io::Write;
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StateError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    let value = serde_json::from_slice(&bytes).map_err(|source| StateError::Corrupted {
        path: path.display().to_string(),
        source,
    })?;
    Ok(Some(value))
}

/// The state directory: checkpoints, per-step receipts and the merged
/// artifact map. The done-set is the sole source of truth for "has this
/// step run successfully".
pub struct State {
    dir: PathBuf,
    receipts_dir: PathBuf,
    checkpoints: Checkpoints,
    artifacts: Artifacts,
}

impl State {
    pub fn open(dir: &Path) -> Result<Self, StateError> {
        fs::create_dir_all(dir)?;
        let receipts_dir = dir.join(RECEIPTS_DIR);
        fs::create_dir_all(&receipts_dir)?;

        let checkpoints = load_json(&dir.join(CHECKPOINTS_FILE))?.unwrap_or_default();
        let artifacts = load_json(&dir.join(ARTIFACTS_FILE))?.unwrap_or_default();

        Ok(Self {
            dir: dir.to_path_buf(),
            receipts_dir,
            checkpoints,
            artifacts,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn wallets_dir(&self) -> PathBuf {
        self.dir.join("wallets")
    }

    pub fn done(&self, step: Step) -> bool {
        self.checkpoints.done.iter().any(|s| s == step.name())
    }

    /// Record a completed step: append to the done-set and overwrite the
    /// step's receipt. Both writes are atomic renames.
    pub fn mark(&mut self, step: Step, receipt: &StepReceipt) -> Result<(), StateError> {
        trace!("mark step {} done", step);
        atomic_write_json(&self.receipts_dir.join(format!("{}.json", step.name())), receipt)?;
        if !self.done(step) {
            self.checkpoints.done.push(step.name().to_string());
        }
        atomic_write_json(&self.dir.join(CHECKPOINTS_FILE), &self.checkpoints)?;
        Ok(())
    }

    /// Shallow-merge a patch into the artifact map and persist it.
    pub fn merge_artifacts(&mut self, patch: ArtifactPatch) -> Result<(), StateError> {
        self.artifacts.merge(patch);
        atomic_write_json(&self.dir.join(ARTIFACTS_FILE), &self.artifacts)
    }

    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    /// Persist a wallet's swap completion immediately. The swaps step
    /// calls this after every landed transaction so a crash can never
    /// lose (or double) a buy.
    pub fn mark_buy_done(&mut self, wallet_id: &str) -> Result<(), StateError> {
        self.artifacts.mark_buy_done(wallet_id);
        atomic_write_json(&self.dir.join(ARTIFACTS_FILE), &self.artifacts)
    }

    pub fn load_receipt(&self, step: Step) -> Result<Option<StepReceipt>, StateError> {
        load_json(&self.receipts_dir.join(format!("{}.json", step.name())))
    }

    /// Whether the artifact slot for `step` holds data, which is what the
    /// resume gate reuses.
    pub fn artifact_present(&self, step: Step) -> bool {
        match step {
            Step::Funding => self.artifacts.funding.is_some(),
            Step::Mint => self.artifacts.mint.is_some(),
            Step::Metadata => self.artifacts.metadata.is_some(),
            Step::LpInit => self.artifacts.lp_init.is_some(),
            Step::Buys => self.artifacts.buys.is_some(),
        }
    }
}

use thiserror::Error;

use launcher_common::crypto::{KeypairError, PdaError};
use launcher_common::instruction::EncodeError;
use launcher_common::plan::PlanError;
use launcher_common::transaction::TransactionError;

// Process exit codes, part of the CLI contract
pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_PLAN_INVALID: i32 = 2;
pub const EXIT_RPC_FAILED: i32 = 3;
pub const EXIT_CONFIG_ERROR: i32 = 4;
pub const EXIT_VAULT_ERROR: i32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {key}")]
    Missing { key: String },

    #[error("invalid configuration value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("unable to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("unable to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    pub fn missing(key: impl Into<String>) -> Self {
        Self::Missing { key: key.into() }
    }

    pub fn invalid(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("cipher initialization failed")]
    Cipher,

    #[error("nonce generation failed")]
    NonceGeneration,

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed (wrong passphrase or corrupted file)")]
    Decrypt,

    #[error("encrypted value too short")]
    InvalidEncryptedValue,

    #[error("malformed keypair: {0}")]
    Keypair(#[from] KeypairError),

    #[error("malformed seed keypair file {path}: {reason}")]
    MalformedSeedFile { path: String, reason: String },

    #[error("wallet file error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupted state file {path}: {source}")]
    Corrupted {
        path: String,
        source: serde_json::Error,
    },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Top-level error taxonomy. Every failure path of the orchestrator maps
/// onto one of these, which in turn maps onto a process exit code.
#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("invalid plan: {0}")]
    PlanInvalid(#[from] PlanError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("wallet vault error: {0}")]
    WalletVault(#[from] VaultError),

    #[error("rpc {op} failed during step {step}: {source}")]
    RpcFailed {
        op: &'static str,
        step: String,
        source: anyhow::Error,
    },

    #[error("simulation failed in step {step}")]
    SimulationFailed { step: String, logs: Vec<String> },

    #[error("instruction encoding failed: {0}")]
    InstructionEncode(#[from] EncodeError),

    #[error("transaction assembly failed: {0}")]
    Transaction(#[from] TransactionError),

    #[error("state store error: {0}")]
    State(#[from] StateError),

    #[error("interrupted")]
    Cancelled,
}

impl From<PdaError> for LauncherError {
    fn from(e: PdaError) -> Self {
        Self::InstructionEncode(EncodeError::Pda(e))
    }
}

impl LauncherError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PlanInvalid(_) => EXIT_PLAN_INVALID,
            Self::RpcFailed { .. } => EXIT_RPC_FAILED,
            Self::Config(_) => EXIT_CONFIG_ERROR,
            Self::WalletVault(_) => EXIT_VAULT_ERROR,
            _ => EXIT_FAILURE,
        }
    }

    /// Event name for the telemetry error record.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlanInvalid(_) => "plan_invalid",
            Self::Config(_) => "config_error",
            Self::WalletVault(_) => "wallet_vault_error",
            Self::RpcFailed { .. } => "rpc_failed",
            Self::SimulationFailed { .. } => "simulation_failed",
            Self::InstructionEncode(_) => "instruction_encode_error",
            Self::Transaction(_) => "transaction_error",
            Self::State(_) => "state_error",
            Self::Cancelled => "cancelled",
        }
    }
}

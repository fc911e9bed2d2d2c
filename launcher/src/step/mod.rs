pub mod funding;
pub mod metadata;
pub mod mint;
pub mod pool_init;
pub mod swaps;

use indexmap::IndexMap;
use strum::{Display, EnumString};

use launcher_common::crypto::Keypair;
use launcher_common::instruction::Instruction;
use launcher_common::plan::Plan;
use launcher_common::transaction::{Message, Transaction};

use crate::config::{LauncherConfig, RunConfig};
use crate::error::LauncherError;
use crate::rpc::{CancelToken, RetryPolicy, RpcClient};

/// The fixed launch pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Step {
    Funding,
    Mint,
    Metadata,
    LpInit,
    Buys,
}

impl Step {
    pub const ORDER: [Step; 5] = [
        Step::Funding,
        Step::Mint,
        Step::Metadata,
        Step::LpInit,
        Step::Buys,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::Funding => "funding",
            Step::Mint => "mint",
            Step::Metadata => "metadata",
            Step::LpInit => "lp_init",
            Step::Buys => "buys",
        }
    }
}

/// Everything a step executor needs, threaded explicitly from the
/// orchestrator. Executors never reach for globals.
pub struct StepContext<'a> {
    pub rpc: &'a dyn RpcClient,
    pub plan: &'a Plan,
    pub run: &'a RunConfig,
    pub config: &'a LauncherConfig,
    pub wallets: &'a IndexMap<String, Keypair>,
    pub seed: &'a Keypair,
    pub retry: &'a RetryPolicy,
    pub cancel: &'a CancelToken,
}

/// How one transaction left the launcher.
pub enum TxOutcome {
    Sent { sig: String },
    Simulated { err: Option<String>, logs: Vec<String> },
}

impl TxOutcome {
    pub fn sig(&self) -> Option<&str> {
        match self {
            Self::Sent { sig } => Some(sig),
            Self::Simulated { .. } => None,
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::Simulated { .. })
    }
}

/// Assemble, sign and submit one transaction.
///
/// Under `--simulate` the transaction is simulated and the result is the
/// outcome, whatever it says. Otherwise a failing simulation aborts the
/// step before anything is sent, and the send itself is retried under the
/// step's retry policy.
pub async fn send_or_simulate(
    ctx: &StepContext<'_>,
    step: Step,
    instructions: &[Instruction],
    payer: &Keypair,
    signers: &[&Keypair],
) -> Result<TxOutcome, LauncherError> {
    let rpc_failed = |op: &'static str, source: anyhow::Error| LauncherError::RpcFailed {
        op,
        step: step.name().to_string(),
        source,
    };

    let blockhash = ctx
        .rpc
        .recent_blockhash()
        .await
        .map_err(|e| rpc_failed("recent_blockhash", e))?;
    let message = Message::compile(&payer.pubkey(), instructions, blockhash)?;
    let mut tx = Transaction::new_unsigned(message);
    tx.sign(signers)?;

    let simulation = ctx
        .rpc
        .simulate(&tx)
        .await
        .map_err(|e| rpc_failed("simulate", e))?;

    if ctx.run.simulate {
        return Ok(TxOutcome::Simulated {
            err: simulation.err,
            logs: simulation.logs,
        });
    }

    if simulation.err.is_some() {
        return Err(LauncherError::SimulationFailed {
            step: step.name().to_string(),
            logs: simulation.logs,
        });
    }

    let sig = ctx
        .retry
        .run(ctx.cancel, || async { ctx.rpc.send_and_confirm(&tx).await })
        .await
        .map_err(|e| rpc_failed("send_and_confirm", e))?;
    Ok(TxOutcome::Sent { sig })
}

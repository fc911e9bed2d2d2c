use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, trace, warn};
use rand::Rng;
use serde_json::{json, Value};
use tokio::time::sleep;
use url::Url;

use launcher_common::crypto::{Hash, Pubkey};
use launcher_common::transaction::Transaction;

/// Result of a transaction simulation. A populated `err` means the
/// transaction would fail on-chain.
#[derive(Debug, Clone, Default)]
pub struct SimulationResult {
    pub err: Option<String>,
    pub logs: Vec<String>,
}

/// The narrow set of chain operations the orchestrator consumes. One
/// production HTTP implementation exists; tests inject an in-memory
/// double through this trait.
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn recent_blockhash(&self) -> Result<Hash>;

    async fn account_exists(&self, pubkey: &Pubkey) -> Result<bool>;

    async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64>;

    async fn simulate(&self, tx: &Transaction) -> Result<SimulationResult>;

    async fn send_and_confirm(&self, tx: &Transaction) -> Result<String>;

    async fn close(&self) -> Result<()>;
}

/// Cooperative cancellation flag, observed between transactions and
/// between retry attempts. An in-flight send is allowed to complete so
/// the receipt remains truthful.
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Flip the token on the first interrupt signal.
    pub fn install_interrupt_handler(&self) {
        let token = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing the in-flight transaction");
                token.cancel();
            }
        });
    }
}

/// Explicit retry combinator for `send_and_confirm`: bounded attempts,
/// exponential backoff with jitter, cancellation observed between
/// attempts. Simulation is never retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(2000),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .min_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .min(self.max_delay);
        if !self.jitter {
            return exp;
        }
        // uniform in [exp/2, exp] so consecutive retries desynchronize
        let base = exp.as_millis() as u64;
        let jittered = base / 2 + rand::thread_rng().gen_range(0..=base / 2 + 1);
        Duration::from_millis(jittered.min(self.max_delay.as_millis() as u64))
    }

    pub async fn run<T, F, Fut>(&self, cancel: &CancelToken, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;
        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.backoff(attempt);
                warn!(
                    "retrying in {:?} (attempt {}/{})",
                    delay,
                    attempt + 1,
                    self.max_attempts
                );
                sleep(delay).await;
            }
            if cancel.is_cancelled() {
                return Err(anyhow!("cancelled before attempt {}", attempt + 1));
            }
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    debug!("attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("retries exhausted")))
    }
}

/// Configuration for the HTTP JSON-RPC client.
#[derive(Debug, Clone)]
pub struct HttpRpcConfig {
    pub url: String,
    pub timeout: Duration,
    pub commitment: String,
    pub confirm_poll_interval: Duration,
    pub confirm_timeout: Duration,
}

impl HttpRpcConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            timeout: Duration::from_secs(60),
            commitment: "finalized".to_string(),
            confirm_poll_interval: Duration::from_millis(500),
            confirm_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(serde::Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u32,
    method: &'a str,
    params: Value,
}

#[derive(serde::Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(serde::Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Production RPC facade speaking Solana-style JSON-RPC 2.0 over HTTP.
pub struct HttpRpc {
    client: reqwest::Client,
    url: Url,
    config: HttpRpcConfig,
}

impl HttpRpc {
    pub fn new(config: HttpRpcConfig) -> Result<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| anyhow!("invalid rpc url {}: {}", config.url, e))?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            url,
            config,
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        trace!("rpc call {}", method);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: rand::random::<u32>(),
            method,
            params,
        };

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("{} timed out after {:?}", method, self.config.timeout)
                } else {
                    anyhow!("{} transport error: {}", method, e)
                }
            })?;

        if !response.status().is_success() {
            return Err(anyhow!("{} http error {}", method, response.status().as_u16()));
        }

        let rpc_response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("{} malformed response: {}", method, e))?;

        if let Some(error) = rpc_response.error {
            return Err(anyhow!("{} rpc error {}: {}", method, error.code, error.message));
        }
        rpc_response
            .result
            .ok_or_else(|| anyhow!("{} returned no result", method))
    }

    async fn confirm(&self, signature: &str) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.config.confirm_timeout;
        loop {
            let result = self
                .call("getSignatureStatuses", json!([[signature]]))
                .await?;
            let status = &result["value"][0];
            if !status.is_null() {
                if !status["err"].is_null() {
                    return Err(anyhow!("transaction {} failed: {}", signature, status["err"]));
                }
                let confirmation = status["confirmationStatus"].as_str().unwrap_or("");
                if confirmation == self.config.commitment || confirmation == "finalized" {
                    return Ok(());
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(anyhow!(
                    "confirmation of {} timed out after {:?}",
                    signature,
                    self.config.confirm_timeout
                ));
            }
            sleep(self.config.confirm_poll_interval).await;
        }
    }
}

#[async_trait]
impl RpcClient for HttpRpc {
    async fn recent_blockhash(&self) -> Result<Hash> {
        let result = self
            .call(
                "getLatestBlockhash",
                json!([{"commitment": self.config.commitment}]),
            )
            .await?;
        let blockhash = result["value"]["blockhash"]
            .as_str()
            .ok_or_else(|| anyhow!("getLatestBlockhash returned no blockhash"))?;
        blockhash
            .parse()
            .map_err(|e| anyhow!("invalid blockhash {}: {}", blockhash, e))
    }

    async fn account_exists(&self, pubkey: &Pubkey) -> Result<bool> {
        let result = self
            .call(
                "getAccountInfo",
                json!([pubkey.to_string(), {"encoding": "base64", "commitment": self.config.commitment}]),
            )
            .await?;
        Ok(!result["value"].is_null())
    }

    async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64> {
        let result = self
            .call(
                "getBalance",
                json!([pubkey.to_string(), {"commitment": self.config.commitment}]),
            )
            .await?;
        result["value"]
            .as_u64()
            .ok_or_else(|| anyhow!("getBalance returned no value"))
    }

    async fn simulate(&self, tx: &Transaction) -> Result<SimulationResult> {
        let result = self
            .call(
                "simulateTransaction",
                json!([tx.to_base64(), {"encoding": "base64", "commitment": self.config.commitment}]),
            )
            .await?;
        let value = &result["value"];
        let err = if value["err"].is_null() {
            None
        } else {
            Some(value["err"].to_string())
        };
        let logs = value["logs"]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|l| l.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(SimulationResult { err, logs })
    }

    async fn send_and_confirm(&self, tx: &Transaction) -> Result<String> {
        // preflight stays enabled; a failing transaction should be
        // rejected before it costs anything
        let result = self
            .call(
                "sendTransaction",
                json!([tx.to_base64(), {
                    "encoding": "base64",
                    "skipPreflight": false,
                    "preflightCommitment": self.config.commitment
                }]),
            )
            .await?;
        let signature = result
            .as_str()
            .ok_or_else(|| anyhow!("sendTransaction returned no signature"))?
            .to_string();
        self.confirm(&signature).await?;
        Ok(signature)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

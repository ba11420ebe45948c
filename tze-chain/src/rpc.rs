//! Node JSON-RPC access.
//!
//! Only `getrawtransaction <txid> 1` is needed. Responses are converted into
//! [`Transaction`] here so nothing downstream handles untyped JSON.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tze_codec::{OutPoint, Transaction, TxInput, TxOutput};

use crate::config::{ExplorerConfig, RpcAuth};
use crate::error::{ChainError, Result};

/// zcashd: "No such mempool or blockchain transaction".
const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;

const WORK_QUEUE_FULL: &str = "Work queue depth exceeded";
const MAX_ATTEMPTS: u32 = 5;
const WORK_QUEUE_BACKOFF: Duration = Duration::from_millis(500);

/// Source of decoded transactions.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Fetch a transaction in decoded (verbose) form.
    async fn fetch_transaction(&self, txid: &str) -> Result<Transaction>;
}

#[async_trait]
impl<T: NodeRpc + ?Sized> NodeRpc for Arc<T> {
    async fn fetch_transaction(&self, txid: &str) -> Result<Transaction> {
        (**self).fetch_transaction(txid).await
    }
}

#[derive(Serialize, Debug)]
struct RpcRequest<'a, T> {
    jsonrpc: &'static str,
    method: &'a str,
    params: T,
    id: u64,
}

#[derive(Deserialize, Debug)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize, Debug)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Clone, Debug)]
enum AuthMethod {
    None,
    Basic { username: String, password: String },
}

/// JSON-RPC client for a zcashd-compatible node.
#[derive(Clone, Debug)]
pub struct JsonRpcClient {
    url: Url,
    client: Client,
    auth: AuthMethod,
    id_counter: Arc<AtomicU64>,
}

impl JsonRpcClient {
    /// Create a client for `url`.
    pub fn new(url: &str, auth: &RpcAuth, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| ChainError::Config(format!("invalid RPC URL: {e}")))?;
        let auth = match auth {
            RpcAuth::None => AuthMethod::None,
            RpcAuth::Basic { username, password } => AuthMethod::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            RpcAuth::Cookie { path } => AuthMethod::Basic {
                username: "__cookie__".to_string(),
                password: read_cookie_token(path)?,
            },
        };
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            url,
            client,
            auth,
            id_counter: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn from_config(config: &ExplorerConfig) -> Result<Self> {
        Self::new(&config.rpc_url, &config.rpc_auth, config.request_timeout)
    }

    /// Send a request, retrying while the node reports a full work queue.
    async fn send_request<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize + Send + Sync,
        R: DeserializeOwned,
    {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        let mut attempts = 0;
        loop {
            attempts += 1;

            let mut builder = self.client.post(self.url.clone()).json(&request);
            if let AuthMethod::Basic { username, password } = &self.auth {
                builder = builder.basic_auth(username, Some(password));
            }

            let response = builder.send().await?;
            let status = response.status();
            let body = response.bytes().await?;

            if String::from_utf8_lossy(&body).contains(WORK_QUEUE_FULL) {
                if attempts >= MAX_ATTEMPTS {
                    return Err(ChainError::WorkQueueFull);
                }
                debug!(method, attempts, "node work queue full, backing off");
                tokio::time::sleep(WORK_QUEUE_BACKOFF).await;
                continue;
            }

            // zcashd reports method errors with 404/500 and a JSON-RPC body.
            let parsed: RpcResponse<R> = match serde_json::from_slice(&body) {
                Ok(parsed) => parsed,
                Err(_) if !status.is_success() => return Err(ChainError::Status(status.as_u16())),
                Err(err) => return Err(err.into()),
            };

            return match (parsed.error, parsed.result) {
                (Some(error), _) => Err(ChainError::Rpc {
                    code: error.code,
                    message: error.message,
                }),
                (None, Some(result)) => Ok(result),
                (None, None) => Err(ChainError::InvalidResponse(format!(
                    "{method}: empty response body"
                ))),
            };
        }
    }
}

#[async_trait]
impl NodeRpc for JsonRpcClient {
    async fn fetch_transaction(&self, txid: &str) -> Result<Transaction> {
        let raw: RawTransaction = self
            .send_request("getrawtransaction", (txid, 1u8))
            .await
            .map_err(|err| not_found_as(err, txid))?;
        Ok(raw.into())
    }
}

fn not_found_as(err: ChainError, txid: &str) -> ChainError {
    match err {
        ChainError::Rpc { code, .. } if code == RPC_INVALID_ADDRESS_OR_KEY => {
            ChainError::NotFound(format!("transaction {txid}"))
        }
        other => other,
    }
}

/// Read the token from a node cookie file (`__cookie__:<token>`).
fn read_cookie_token(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path)?;
    let trimmed = content.trim();
    Ok(trimmed
        .strip_prefix("__cookie__:")
        .unwrap_or(trimmed)
        .to_string())
}

// === Wire types ===

#[derive(Debug, Deserialize)]
pub(crate) struct RawTransaction {
    txid: String,
    #[serde(default)]
    height: Option<i64>,
    #[serde(default)]
    vin: Vec<RawInput>,
    #[serde(default)]
    vout: Vec<RawOutput>,
}

#[derive(Debug, Deserialize)]
struct RawInput {
    txid: Option<String>,
    vout: Option<u32>,
    #[serde(rename = "scriptSig")]
    script_sig: Option<RawScript>,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    n: Option<u32>,
    #[serde(rename = "valueZat")]
    value_zat: Option<u64>,
    #[serde(rename = "scriptPubKey")]
    script_pub_key: Option<RawScript>,
}

#[derive(Debug, Deserialize)]
struct RawScript {
    hex: Option<String>,
}

impl From<RawTransaction> for Transaction {
    fn from(raw: RawTransaction) -> Self {
        let inputs = raw
            .vin
            .into_iter()
            .map(|input| TxInput {
                prev_out: match (input.txid, input.vout) {
                    (Some(txid), Some(index)) => Some(OutPoint::new(txid, index)),
                    _ => None,
                },
                script_hex: input.script_sig.and_then(|script| script.hex),
            })
            .collect();

        let outputs = raw
            .vout
            .into_iter()
            .enumerate()
            .map(|(position, output)| TxOutput {
                index: output.n.unwrap_or_else(|| {
                    warn!(position, "output without `n`, using its position");
                    position as u32
                }),
                value_zat: output.value_zat,
                script_hex: output.script_pub_key.and_then(|script| script.hex),
            })
            .collect();

        Transaction {
            txid: raw.txid,
            block_height: raw.height.and_then(|h| u64::try_from(h).ok()),
            inputs,
            outputs,
        }
    }
}

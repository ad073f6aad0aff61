//! JSON-RPC Ledger Connection Adapter
//!
//! Implements `LedgerConnector` / `LedgerConnection` over HTTP JSON-RPC 2.0:
//! `status` for the handshake, `query` (`call_function`) for reads and
//! `broadcast_tx_commit` for writes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::NetworkConfig;
use crate::domain::{
    AccountId, FunctionCall, NodeStatus, SessionError, TransactionOutcome, ViewResult,
};
use crate::ports::{KeyStore, LedgerConnection, LedgerConnector, TransactionSigner};

/// JSON-RPC request structure.
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, T: Serialize> {
    jsonrpc: &'static str,
    method: &'a str,
    params: T,
    id: u64,
}

/// JSON-RPC response structure.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error as the node reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Short message.
    pub message: String,
    /// Free-form detail.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Error class (e.g. `HANDLER_ERROR`).
    #[serde(default)]
    pub name: Option<String>,
    /// Specific cause (e.g. `NO_CONTRACT_CODE`).
    #[serde(default)]
    pub cause: Option<ErrorCause>,
}

/// Cause attached to a structured node error.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorCause {
    /// Cause name.
    pub name: String,
    /// Cause details.
    #[serde(default)]
    pub info: Option<serde_json::Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = self
            .cause
            .as_ref()
            .map(|c| c.name.as_str())
            .or(self.name.as_deref())
            .unwrap_or(self.message.as_str());
        write!(f, "{} ({})", label, self.code)?;
        match &self.data {
            Some(serde_json::Value::String(s)) => write!(f, ": {}", s),
            Some(other) => write!(f, ": {}", other),
            None => Ok(()),
        }
    }
}

/// Why a JSON-RPC exchange failed.
#[derive(Debug)]
enum RpcFailure {
    Transport(String),
    Rpc(JsonRpcError),
    Parse(String),
}

#[derive(Debug, Serialize)]
struct CallFunctionParams<'a> {
    request_type: &'static str,
    finality: &'static str,
    account_id: &'a str,
    method_name: &'a str,
    args_base64: String,
}

#[derive(Debug, Deserialize)]
struct CallFunctionResponse {
    #[serde(default)]
    result: Option<Vec<u8>>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    logs: Vec<String>,
    #[serde(default)]
    block_height: u64,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    chain_id: String,
    sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
    latest_block_height: u64,
}

#[derive(Debug, Deserialize)]
enum FinalStatus {
    NotStarted,
    Started,
    Failure(serde_json::Value),
    SuccessValue(String),
}

#[derive(Debug, Deserialize)]
struct FinalExecutionOutcome {
    status: FinalStatus,
    transaction: TransactionView,
    #[serde(default)]
    receipts_outcome: Vec<ReceiptOutcome>,
}

#[derive(Debug, Deserialize)]
struct TransactionView {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct ReceiptOutcome {
    outcome: OutcomeLogs,
}

#[derive(Debug, Deserialize)]
struct OutcomeLogs {
    #[serde(default)]
    logs: Vec<String>,
}

/// Opens `JsonRpcConnection`s.
#[derive(Clone, Default)]
pub struct JsonRpcConnector {
    timeout: Option<Duration>,
    signer: Option<Arc<dyn TransactionSigner>>,
}

impl JsonRpcConnector {
    /// Connector without a request timeout or signer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every HTTP request by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sign write calls with `signer`.
    pub fn with_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.signer = Some(signer);
        self
    }
}

#[async_trait]
impl LedgerConnector for JsonRpcConnector {
    async fn connect(
        &self,
        config: &NetworkConfig,
        key_store: Arc<dyn KeyStore>,
    ) -> Result<Arc<dyn LedgerConnection>, SessionError> {
        let connection = JsonRpcConnection::new(
            config.node_url().clone(),
            config.network_id(),
            self.timeout,
            key_store,
            self.signer.clone(),
        )?;

        let status = connection.status().await?;
        if status.chain_id != config.network_id() {
            return Err(SessionError::Connection(format!(
                "{} serves chain `{}`, expected `{}`",
                config.node_url(),
                status.chain_id,
                config.network_id()
            )));
        }

        info!(
            node = %config.node_url(),
            chain_id = %status.chain_id,
            height = status.latest_block_height,
            "Connected to ledger"
        );
        Ok(Arc::new(connection))
    }
}

/// Ledger connection speaking JSON-RPC over HTTP.
pub struct JsonRpcConnection {
    http_client: reqwest::Client,
    rpc_url: Url,
    network_id: String,
    request_id: AtomicU64,
    key_store: Arc<dyn KeyStore>,
    signer: Option<Arc<dyn TransactionSigner>>,
}

impl JsonRpcConnection {
    /// Create a connection. No request is sent until the first call.
    /// Writes are signed with access keys looked up in `key_store`.
    pub fn new(
        rpc_url: Url,
        network_id: &str,
        timeout: Option<Duration>,
        key_store: Arc<dyn KeyStore>,
        signer: Option<Arc<dyn TransactionSigner>>,
    ) -> Result<Self, SessionError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| SessionError::Connection(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            rpc_url,
            network_id: network_id.to_string(),
            request_id: AtomicU64::new(1),
            key_store,
            signer,
        })
    }

    /// Make a JSON-RPC call.
    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, RpcFailure> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        debug!(method, id, url = %self.rpc_url, "JSON-RPC request");

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        let response = self
            .http_client
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;

        let rpc_response: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| RpcFailure::Parse(e.to_string()))?;

        if let Some(error) = rpc_response.error {
            return Err(RpcFailure::Rpc(error));
        }

        rpc_response
            .result
            .ok_or_else(|| RpcFailure::Parse("response missing result".to_string()))
    }

    fn remote_error(method: &str, failure: RpcFailure) -> SessionError {
        match failure {
            RpcFailure::Transport(e) => SessionError::Connection(e),
            RpcFailure::Rpc(e) => SessionError::RemoteCall {
                method: method.to_string(),
                reason: e.to_string(),
            },
            RpcFailure::Parse(e) => SessionError::Decode {
                method: method.to_string(),
                reason: e,
            },
        }
    }
}

#[async_trait]
impl LedgerConnection for JsonRpcConnection {
    fn network_id(&self) -> &str {
        &self.network_id
    }

    async fn status(&self) -> Result<NodeStatus, SessionError> {
        let status: StatusResponse = self
            .call("status", Vec::<()>::new())
            .await
            .map_err(|failure| match failure {
                RpcFailure::Transport(e) => {
                    SessionError::Connection(format!("{} unreachable: {}", self.rpc_url, e))
                }
                RpcFailure::Rpc(e) => {
                    SessionError::Connection(format!("handshake rejected: {}", e))
                }
                RpcFailure::Parse(e) => {
                    SessionError::Connection(format!("bad handshake response: {}", e))
                }
            })?;

        Ok(NodeStatus {
            chain_id: status.chain_id,
            latest_block_height: status.sync_info.latest_block_height,
        })
    }

    async fn view_function(
        &self,
        contract_id: &AccountId,
        method: &str,
        args: &serde_json::Value,
    ) -> Result<ViewResult, SessionError> {
        let args_bytes = serde_json::to_vec(args).map_err(|e| SessionError::Decode {
            method: method.to_string(),
            reason: e.to_string(),
        })?;

        let params = CallFunctionParams {
            request_type: "call_function",
            finality: "final",
            account_id: contract_id.as_str(),
            method_name: method,
            args_base64: STANDARD.encode(args_bytes),
        };

        let response: CallFunctionResponse = self
            .call("query", params)
            .await
            .map_err(|f| Self::remote_error(method, f))?;

        if let Some(error) = response.error {
            warn!(contract = %contract_id, method, %error, "View call failed");
            return Err(SessionError::RemoteCall {
                method: method.to_string(),
                reason: error,
            });
        }

        Ok(ViewResult {
            result: response.result.unwrap_or_default(),
            logs: response.logs,
            block_height: response.block_height,
        })
    }

    async fn function_call(
        &self,
        signer_id: &AccountId,
        call: &FunctionCall,
    ) -> Result<TransactionOutcome, SessionError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| SessionError::Signing("no transaction signer configured".to_string()))?;

        let key = self
            .key_store
            .get_key(&self.network_id, signer_id.as_str())
            .await?
            .ok_or_else(|| {
                SessionError::Signing(format!(
                    "no access key for {} on {}",
                    signer_id, self.network_id
                ))
            })?;

        let signed = signer
            .sign_function_call(&self.network_id, signer_id, &key, call)
            .await?;

        let outcome: FinalExecutionOutcome = self
            .call("broadcast_tx_commit", [signed])
            .await
            .map_err(|f| Self::remote_error(&call.method_name, f))?;

        let logs = outcome
            .receipts_outcome
            .into_iter()
            .flat_map(|r| r.outcome.logs)
            .collect();

        match outcome.status {
            FinalStatus::SuccessValue(encoded) => {
                let return_value = STANDARD.decode(encoded).map_err(|e| SessionError::Decode {
                    method: call.method_name.clone(),
                    reason: e.to_string(),
                })?;
                info!(
                    tx = %outcome.transaction.hash,
                    contract = %call.receiver_id,
                    method = %call.method_name,
                    "Transaction committed"
                );
                Ok(TransactionOutcome {
                    transaction_hash: outcome.transaction.hash,
                    return_value,
                    logs,
                })
            }
            FinalStatus::Failure(failure) => Err(SessionError::RemoteCall {
                method: call.method_name.clone(),
                reason: failure.to_string(),
            }),
            FinalStatus::NotStarted | FinalStatus::Started => Err(SessionError::RemoteCall {
                method: call.method_name.clone(),
                reason: format!("transaction {} did not finish", outcome.transaction.hash),
            }),
        }
    }
}

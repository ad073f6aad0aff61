//! # Outbound Ports
//!
//! Traits for the external collaborators: the ledger network, transaction
//! signing, key and auth persistence, page navigation, and the wallet
//! service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use crate::config::NetworkConfig;
use crate::domain::{
    AccountId, AuthData, FunctionCall, Identity, KeyPair, NodeStatus, SessionError,
    TransactionOutcome, ViewResult,
};

/// Opens ledger connections - outbound port.
#[async_trait]
pub trait LedgerConnector: Send + Sync {
    /// Open a connection to the configured RPC endpoint and complete the
    /// handshake. Write calls sign with keys from `key_store`. Fails with
    /// `SessionError::Connection`, never retries.
    async fn connect(
        &self,
        config: &NetworkConfig,
        key_store: Arc<dyn KeyStore>,
    ) -> Result<Arc<dyn LedgerConnection>, SessionError>;
}

/// A live ledger connection - outbound port.
#[async_trait]
pub trait LedgerConnection: Send + Sync {
    /// Network the connection was opened against.
    fn network_id(&self) -> &str;

    /// Node status (used for the handshake).
    async fn status(&self) -> Result<NodeStatus, SessionError>;

    /// Run a read-only contract method.
    async fn view_function(
        &self,
        contract_id: &AccountId,
        method: &str,
        args: &serde_json::Value,
    ) -> Result<ViewResult, SessionError>;

    /// Sign `call` with the stored key of `signer_id`, submit it and wait
    /// for the outcome. A missing key is `SessionError::Signing`.
    async fn function_call(
        &self,
        signer_id: &AccountId,
        call: &FunctionCall,
    ) -> Result<TransactionOutcome, SessionError>;
}

/// Produces signed transactions - outbound port.
///
/// Transaction encoding is owned by the implementation; the connection only
/// broadcasts what it returns.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Sign `call` on behalf of `signer_id` with its access key, returning
    /// the base64 encoded signed transaction.
    async fn sign_function_call(
        &self,
        network_id: &str,
        signer_id: &AccountId,
        key: &KeyPair,
        call: &FunctionCall,
    ) -> Result<String, SessionError>;
}

/// Local key persistence - outbound port.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Store a key under `(network, name)`, replacing any previous one.
    async fn set_key(&self, network_id: &str, name: &str, key: &KeyPair)
        -> Result<(), SessionError>;

    /// Fetch a key.
    async fn get_key(&self, network_id: &str, name: &str)
        -> Result<Option<KeyPair>, SessionError>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn remove_key(&self, network_id: &str, name: &str) -> Result<(), SessionError>;

    /// Names with a stored key on `network_id`.
    async fn names(&self, network_id: &str) -> Result<Vec<String>, SessionError>;
}

/// Wallet auth persistence - outbound port.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Load auth data stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<AuthData>, SessionError>;

    /// Persist auth data under `key`.
    async fn save(&self, key: &str, data: &AuthData) -> Result<(), SessionError>;

    /// Forget `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// Sends the visitor somewhere else - outbound port.
pub trait Navigator: Send + Sync {
    /// Leave the application for `url`.
    fn navigate(&self, url: &Url);
}

/// Wallet service - outbound port.
#[async_trait]
pub trait WalletService: Send + Sync {
    /// Resolve the identity from persisted wallet state.
    async fn load_identity(&self) -> Result<Identity, SessionError>;

    /// Signed-in account id, `""` if none.
    fn account_id(&self) -> String;

    /// Start the wallet redirect that grants access to `contract_id`.
    async fn request_sign_in(&self, contract_id: &AccountId) -> Result<(), SessionError>;

    /// Finish a sign-in from the wallet's return URL. Returns the granted
    /// account, or `None` when the URL carries no grant.
    async fn complete_sign_in(&self, callback: &Url) -> Result<Option<AccountId>, SessionError>;

    /// Drop all local credential material. Idempotent.
    async fn sign_out(&self) -> Result<(), SessionError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Which path a recorded call took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    /// `view_function`
    View,
    /// `function_call`
    Change,
}

/// A request that reached the mock ledger.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    /// Read or write path.
    pub kind: CallKind,
    /// Contract addressed.
    pub contract_id: String,
    /// Method invoked.
    pub method: String,
    /// JSON arguments.
    pub args: serde_json::Value,
    /// Signer for write calls.
    pub signer_id: Option<String>,
    /// Public key of the stored access key the write was signed with.
    pub signer_key: Option<String>,
    /// Attached deposit for write calls.
    pub deposit: u128,
}

#[derive(Default)]
struct MockLedgerState {
    views: HashMap<(String, String), Result<Vec<u8>, String>>,
    changes: HashMap<(String, String), Result<Vec<u8>, String>>,
    calls: Vec<RecordedCall>,
}

/// In-memory ledger for testing. Acts as both connector and connection;
/// clones share state.
#[derive(Clone)]
pub struct MockLedger {
    chain_id: String,
    fail_connect: bool,
    key_store: Option<Arc<dyn KeyStore>>,
    connects: Arc<AtomicUsize>,
    state: Arc<Mutex<MockLedgerState>>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new("testnet")
    }
}

impl MockLedger {
    /// Ledger reporting `chain_id` during the handshake.
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            fail_connect: false,
            key_store: None,
            connects: Arc::new(AtomicUsize::new(0)),
            state: Arc::new(Mutex::new(MockLedgerState::default())),
        }
    }

    /// Refuse every connection attempt.
    pub fn unreachable() -> Self {
        Self {
            fail_connect: true,
            ..Self::default()
        }
    }

    /// Answer `method` on `contract` with `value`.
    pub fn with_view(self, contract: &str, method: &str, value: serde_json::Value) -> Self {
        let bytes = serde_json::to_vec(&value).unwrap_or_default();
        self.state
            .lock()
            .views
            .insert((contract.to_string(), method.to_string()), Ok(bytes));
        self
    }

    /// Fail `method` on `contract` with a remote fault.
    pub fn with_view_error(self, contract: &str, method: &str, reason: &str) -> Self {
        self.state
            .lock()
            .views
            .insert((contract.to_string(), method.to_string()), Err(reason.to_string()));
        self
    }

    /// Answer `method` on `contract` with raw result bytes.
    pub fn with_view_bytes(self, contract: &str, method: &str, bytes: Vec<u8>) -> Self {
        self.state
            .lock()
            .views
            .insert((contract.to_string(), method.to_string()), Ok(bytes));
        self
    }

    /// Outcome of a write call to `method` on `contract`.
    pub fn with_change(self, contract: &str, method: &str, value: serde_json::Value) -> Self {
        let bytes = serde_json::to_vec(&value).unwrap_or_default();
        self.state
            .lock()
            .changes
            .insert((contract.to_string(), method.to_string()), Ok(bytes));
        self
    }

    /// Number of `connect` calls seen.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Requests that reached the ledger, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl LedgerConnector for MockLedger {
    async fn connect(
        &self,
        config: &NetworkConfig,
        key_store: Arc<dyn KeyStore>,
    ) -> Result<Arc<dyn LedgerConnection>, SessionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(SessionError::Connection(format!(
                "{}: connection refused",
                config.node_url()
            )));
        }
        if self.chain_id != config.network_id() {
            return Err(SessionError::Connection(format!(
                "node serves `{}`, expected `{}`",
                self.chain_id,
                config.network_id()
            )));
        }
        Ok(Arc::new(Self {
            key_store: Some(key_store),
            ..self.clone()
        }))
    }
}

#[async_trait]
impl LedgerConnection for MockLedger {
    fn network_id(&self) -> &str {
        &self.chain_id
    }

    async fn status(&self) -> Result<NodeStatus, SessionError> {
        Ok(NodeStatus {
            chain_id: self.chain_id.clone(),
            latest_block_height: 1,
        })
    }

    async fn view_function(
        &self,
        contract_id: &AccountId,
        method: &str,
        args: &serde_json::Value,
    ) -> Result<ViewResult, SessionError> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall {
            kind: CallKind::View,
            contract_id: contract_id.to_string(),
            method: method.to_string(),
            args: args.clone(),
            signer_id: None,
            signer_key: None,
            deposit: 0,
        });

        match state
            .views
            .get(&(contract_id.to_string(), method.to_string()))
        {
            Some(Ok(bytes)) => Ok(ViewResult {
                result: bytes.clone(),
                logs: Vec::new(),
                block_height: 1,
            }),
            Some(Err(reason)) => Err(SessionError::RemoteCall {
                method: method.to_string(),
                reason: reason.clone(),
            }),
            None => Err(SessionError::RemoteCall {
                method: method.to_string(),
                reason: format!("MethodNotFound on {}", contract_id),
            }),
        }
    }

    async fn function_call(
        &self,
        signer_id: &AccountId,
        call: &FunctionCall,
    ) -> Result<TransactionOutcome, SessionError> {
        let key = match &self.key_store {
            Some(store) => match store.get_key(&self.chain_id, signer_id.as_str()).await? {
                Some(key) => Some(key),
                None => {
                    return Err(SessionError::Signing(format!(
                        "no access key for {} on {}",
                        signer_id, self.chain_id
                    )))
                }
            },
            None => None,
        };

        let mut state = self.state.lock();
        state.calls.push(RecordedCall {
            kind: CallKind::Change,
            contract_id: call.receiver_id.to_string(),
            method: call.method_name.clone(),
            args: call.args.clone(),
            signer_id: Some(signer_id.to_string()),
            signer_key: key.map(|k| k.public_key().to_string()),
            deposit: call.deposit,
        });

        let tx_hash = format!("mock-tx-{}", state.calls.len());
        match state
            .changes
            .get(&(call.receiver_id.to_string(), call.method_name.clone()))
        {
            Some(Ok(bytes)) => Ok(TransactionOutcome {
                transaction_hash: tx_hash,
                return_value: bytes.clone(),
                logs: Vec::new(),
            }),
            Some(Err(reason)) => Err(SessionError::RemoteCall {
                method: call.method_name.clone(),
                reason: reason.clone(),
            }),
            None => Ok(TransactionOutcome {
                transaction_hash: tx_hash,
                ..Default::default()
            }),
        }
    }
}

/// Navigator that records every redirect instead of leaving.
#[derive(Clone, Default)]
pub struct RecordingNavigator {
    visited: Arc<Mutex<Vec<Url>>>,
}

impl RecordingNavigator {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every URL navigated to, in order.
    pub fn visited(&self) -> Vec<Url> {
        self.visited.lock().clone()
    }

    /// Most recent redirect.
    pub fn last(&self) -> Option<Url> {
        self.visited.lock().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &Url) {
        self.visited.lock().push(url.clone());
    }
}

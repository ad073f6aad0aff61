//! # Contract Handles
//!
//! `ContractHandle` is a capability-scoped view of one contract: it only
//! forwards method names declared in its `CapabilitySet`, and only on the
//! path (read or write) they were declared for. `LockupContract` layers the
//! typed `LockupApi` on top of a handle.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::{
    AccountId, CapabilitySet, FunctionCall, Identity, MethodKind, SessionError, TaskArgs,
    TaskInfo, TransactionOutcome, ADD_TOKEN_DEPOSIT, DEFAULT_FUNCTION_CALL_GAS,
};
use crate::ports::{LedgerConnection, LockupApi};

/// Capability-scoped handle on one contract.
#[derive(Clone)]
pub struct ContractHandle {
    connection: Arc<dyn LedgerConnection>,
    contract_id: AccountId,
    capabilities: CapabilitySet,
    signer: Identity,
}

impl std::fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractHandle")
            .field("contract_id", &self.contract_id)
            .field("capabilities", &self.capabilities)
            .field("signer", &self.signer)
            .finish()
    }
}

impl ContractHandle {
    /// Bind `capabilities` on `contract_id`. Write calls are signed by
    /// `signer`.
    pub fn new(
        connection: Arc<dyn LedgerConnection>,
        contract_id: AccountId,
        capabilities: CapabilitySet,
        signer: Identity,
    ) -> Self {
        Self {
            connection,
            contract_id,
            capabilities,
            signer,
        }
    }

    /// Contract the handle is scoped to.
    pub fn contract_id(&self) -> &AccountId {
        &self.contract_id
    }

    /// Declared capabilities.
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Declared read methods.
    pub fn view_methods(&self) -> &[String] {
        self.capabilities.view_methods()
    }

    /// Declared write methods.
    pub fn change_methods(&self) -> &[String] {
        self.capabilities.change_methods()
    }

    /// Account that signs write calls.
    pub fn signer(&self) -> &Identity {
        &self.signer
    }

    fn authorize(&self, method: &str, kind: MethodKind) -> Result<(), SessionError> {
        self.capabilities
            .check(self.contract_id.as_str(), method, kind)
            .inspect_err(|_| {
                warn!(contract = %self.contract_id, method, ?kind, "Rejected unbound method");
            })
    }

    /// Run a bound read method and return the raw result bytes.
    pub async fn view_raw(
        &self,
        method: &str,
        args: &serde_json::Value,
    ) -> Result<Vec<u8>, SessionError> {
        self.authorize(method, MethodKind::View)?;
        debug!(contract = %self.contract_id, method, "View call");
        let result = self
            .connection
            .view_function(&self.contract_id, method, args)
            .await?;
        Ok(result.result)
    }

    /// Run a bound read method and decode its JSON result.
    pub async fn view<T: DeserializeOwned>(
        &self,
        method: &str,
        args: &serde_json::Value,
    ) -> Result<T, SessionError> {
        let bytes = self.view_raw(method, args).await?;
        serde_json::from_slice(&bytes).map_err(|e| SessionError::Decode {
            method: method.to_string(),
            reason: e.to_string(),
        })
    }

    /// Run a bound write method with the default gas.
    pub async fn call(
        &self,
        method: &str,
        args: serde_json::Value,
        deposit: u128,
    ) -> Result<TransactionOutcome, SessionError> {
        self.call_with_gas(method, args, DEFAULT_FUNCTION_CALL_GAS, deposit)
            .await
    }

    /// Run any bound method on the path it was declared for and return the
    /// raw result bytes. Write methods attach no deposit.
    pub async fn invoke(
        &self,
        method: &str,
        args: serde_json::Value,
    ) -> Result<Vec<u8>, SessionError> {
        let kind = self.capabilities.kind_of(method).ok_or_else(|| {
            warn!(contract = %self.contract_id, method, "Rejected unbound method");
            SessionError::Capability {
                contract: self.contract_id.to_string(),
                method: method.to_string(),
            }
        })?;
        if kind.requires_signature() {
            Ok(self.call(method, args, 0).await?.return_value)
        } else {
            self.view_raw(method, &args).await
        }
    }

    /// Run a bound write method.
    pub async fn call_with_gas(
        &self,
        method: &str,
        args: serde_json::Value,
        gas: u64,
        deposit: u128,
    ) -> Result<TransactionOutcome, SessionError> {
        self.authorize(method, MethodKind::Change)?;
        let signer = self
            .signer
            .account()
            .ok_or_else(|| SessionError::NotSignedIn(method.to_string()))?;

        let call = FunctionCall {
            receiver_id: self.contract_id.clone(),
            method_name: method.to_string(),
            args,
            gas,
            deposit,
        };
        debug!(contract = %self.contract_id, method, signer = %signer, deposit, "Change call");
        self.connection.function_call(signer, &call).await
    }
}

/// The lockup contract bound with its fixed capabilities.
#[derive(Clone, Debug)]
pub struct LockupContract {
    handle: ContractHandle,
}

impl LockupContract {
    /// Bind the lockup capabilities on `contract_id`.
    pub fn bind(
        connection: Arc<dyn LedgerConnection>,
        contract_id: AccountId,
        signer: Identity,
    ) -> Self {
        Self {
            handle: ContractHandle::new(connection, contract_id, CapabilitySet::lockup(), signer),
        }
    }

    /// Underlying string-keyed handle.
    pub fn handle(&self) -> &ContractHandle {
        &self.handle
    }
}

#[async_trait]
impl LockupApi for LockupContract {
    async fn get_token_list(&self) -> Result<Vec<AccountId>, SessionError> {
        self.handle.view("get_token_list", &json!({})).await
    }

    async fn get_tasks(&self) -> Result<Vec<TaskInfo>, SessionError> {
        self.handle.view("get_tasks", &json!({})).await
    }

    async fn get_tasks_by_token_id(
        &self,
        token_id: &AccountId,
    ) -> Result<Vec<TaskInfo>, SessionError> {
        self.handle
            .view("get_tasks_by_token_id", &json!({ "token_id": token_id }))
            .await
    }

    async fn add_token(&self, token_id: &AccountId) -> Result<TransactionOutcome, SessionError> {
        self.handle
            .call("add_token", json!({ "token_id": token_id }), ADD_TOKEN_DEPOSIT)
            .await
    }

    async fn add_task(&self, args: &TaskArgs) -> Result<TransactionOutcome, SessionError> {
        args.validate()?;
        let args = serde_json::to_value(args)
            .map_err(|e| SessionError::InvalidArguments(e.to_string()))?;
        self.handle.call("add_task", args, 0).await
    }

    async fn claim(
        &self,
        token_id: &AccountId,
        task_hash: &str,
    ) -> Result<TransactionOutcome, SessionError> {
        if task_hash.is_empty() {
            return Err(SessionError::InvalidArguments(
                "task hash must not be empty".to_string(),
            ));
        }
        self.handle
            .call("claim", json!({ "token_id": token_id, "hash": task_hash }), 0)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{U128, U64};
    use crate::ports::{CallKind, MockLedger};

    fn account(id: &str) -> AccountId {
        AccountId::new(id).unwrap()
    }

    fn lockup(ledger: &MockLedger, signer: Identity) -> LockupContract {
        LockupContract::bind(Arc::new(ledger.clone()), account("app.testnet"), signer)
    }

    #[tokio::test]
    async fn test_unbound_method_never_reaches_ledger() {
        let ledger = MockLedger::default();
        let contract = lockup(&ledger, Identity::Anonymous);

        let result = contract.handle().view_raw("get_owner", &json!({})).await;
        assert!(matches!(
            result,
            Err(SessionError::Capability { ref method, .. }) if method == "get_owner"
        ));
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_routes_by_declared_kind() {
        let ledger = MockLedger::default()
            .with_view("app.testnet", "get_tasks", json!([]))
            .with_change("app.testnet", "claim", json!("10"));
        let contract = lockup(&ledger, Identity::Authenticated(account("alice.testnet")));

        assert_eq!(contract.handle().invoke("get_tasks", json!({})).await.unwrap(), b"[]");
        let claimed = contract
            .handle()
            .invoke("claim", json!({"token_id": "usdc.testnet", "hash": "h"}))
            .await
            .unwrap();
        assert_eq!(claimed, br#""10""#);
        let result = contract.handle().invoke("get_owner", json!({})).await;
        assert!(matches!(result, Err(SessionError::Capability { .. })));

        let kinds: Vec<CallKind> = ledger.calls().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![CallKind::View, CallKind::Change]);
    }

    #[tokio::test]
    async fn test_write_method_on_read_path_is_rejected() {
        let ledger = MockLedger::default();
        let contract = lockup(&ledger, Identity::Anonymous);
        let result = contract.handle().view_raw("claim", &json!({})).await;
        assert!(matches!(result, Err(SessionError::Capability { .. })));
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_token_list_decodes() {
        let ledger = MockLedger::default().with_view(
            "app.testnet",
            "get_token_list",
            json!(["usdc.testnet", "dai.testnet"]),
        );
        let tokens = lockup(&ledger, Identity::Anonymous)
            .get_token_list()
            .await
            .unwrap();
        assert_eq!(tokens, vec![account("usdc.testnet"), account("dai.testnet")]);
    }

    #[tokio::test]
    async fn test_get_tasks_by_token_id_sends_token() {
        let ledger = MockLedger::default().with_view(
            "app.testnet",
            "get_tasks_by_token_id",
            json!([{
                "token_id": "usdc.testnet",
                "start_time": 0,
                "end_time": 1050,
                "vesting_period": 100,
                "amount": 100,
                "single_claim_amount": 5,
                "index": 0
            }]),
        );
        let tasks = lockup(&ledger, Identity::Anonymous)
            .get_tasks_by_token_id(&account("usdc.testnet"))
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].claim_count(), 10);
        assert_eq!(ledger.calls()[0].args, json!({"token_id": "usdc.testnet"}));
    }

    #[tokio::test]
    async fn test_remote_fault_passes_through() {
        let ledger =
            MockLedger::default().with_view_error("app.testnet", "get_tasks", "wasm execution failed");
        let result = lockup(&ledger, Identity::Anonymous).get_tasks().await;
        assert!(matches!(
            result,
            Err(SessionError::RemoteCall { ref reason, .. }) if reason == "wasm execution failed"
        ));
    }

    #[tokio::test]
    async fn test_malformed_result_is_decode_error() {
        let ledger = MockLedger::default().with_view("app.testnet", "get_tasks", json!({"oops": 1}));
        let result = lockup(&ledger, Identity::Anonymous).get_tasks().await;
        assert!(matches!(result, Err(SessionError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_write_requires_sign_in() {
        let ledger = MockLedger::default();
        let result = lockup(&ledger, Identity::Anonymous)
            .claim(&account("usdc.testnet"), "hash")
            .await;
        assert!(matches!(result, Err(SessionError::NotSignedIn(ref m)) if m == "claim"));
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_add_token_attaches_storage_deposit() {
        let ledger = MockLedger::default();
        let signer = Identity::Authenticated(account("owner.testnet"));
        let outcome = lockup(&ledger, signer)
            .add_token(&account("usdc.testnet"))
            .await
            .unwrap();
        assert!(!outcome.transaction_hash.is_empty());

        let call = &ledger.calls()[0];
        assert_eq!(call.kind, CallKind::Change);
        assert_eq!(call.deposit, 1_250_000_000_000_000_000_000);
        assert_eq!(call.signer_id.as_deref(), Some("owner.testnet"));
    }

    #[tokio::test]
    async fn test_add_task_validates_before_sending() {
        let ledger = MockLedger::default();
        let signer = Identity::Authenticated(account("owner.testnet"));
        let args = TaskArgs {
            token_id: account("usdc.testnet"),
            account_list: vec![],
            start_time: U64(0),
            end_time: U64(10),
            vesting_period: U64(1),
            amount: U128(100),
        };
        let result = lockup(&ledger, signer).add_task(&args).await;
        assert!(matches!(result, Err(SessionError::InvalidArguments(_))));
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_add_task_sends_string_encoded_numbers() {
        let ledger = MockLedger::default();
        let signer = Identity::Authenticated(account("owner.testnet"));
        let args = TaskArgs {
            token_id: account("usdc.testnet"),
            account_list: vec![account("bob.testnet")],
            start_time: U64(0),
            end_time: U64(1050),
            vesting_period: U64(100),
            amount: U128(100),
        };
        lockup(&ledger, signer).add_task(&args).await.unwrap();
        let sent = &ledger.calls()[0].args;
        assert_eq!(sent["amount"], "100");
        assert_eq!(sent["end_time"], "1050");
    }
}

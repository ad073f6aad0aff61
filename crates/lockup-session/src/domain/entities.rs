//! # Domain Entities
//!
//! Records exchanged with the lockup contract, token contracts, the node and
//! the wallet.

use serde::{Deserialize, Serialize};

use super::capability::{FT_BALANCE_OF, FT_METADATA};
use super::errors::SessionError;
use super::value_objects::{AccountId, U128, U64};

/// A vesting task as listed by the lockup contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Token contract being vested.
    pub token_id: AccountId,
    /// Vesting start (nanoseconds).
    pub start_time: u64,
    /// Vesting end (nanoseconds).
    pub end_time: u64,
    /// Length of one vesting step (nanoseconds).
    pub vesting_period: u64,
    /// Total amount locked by the task.
    pub amount: u128,
    /// Amount released per account per step.
    pub single_claim_amount: u128,
    /// Position of the task in the contract's task list.
    pub index: u32,
}

impl TaskInfo {
    /// Number of vesting steps in the task.
    pub fn claim_count(&self) -> u64 {
        if self.vesting_period == 0 {
            return 0;
        }
        self.end_time.saturating_sub(self.start_time) / self.vesting_period
    }
}

/// Arguments of `add_task`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskArgs {
    /// Token contract being vested.
    pub token_id: AccountId,
    /// Beneficiaries sharing the amount equally.
    pub account_list: Vec<AccountId>,
    /// Vesting start (nanoseconds).
    pub start_time: U64,
    /// Vesting end (nanoseconds).
    pub end_time: U64,
    /// Length of one vesting step (nanoseconds).
    pub vesting_period: U64,
    /// Total amount to lock.
    pub amount: U128,
}

impl TaskArgs {
    /// Check the preconditions the contract asserts on task creation.
    pub fn validate(&self) -> Result<(), SessionError> {
        let start = self.start_time.0;
        let end = self.end_time.0;
        let period = self.vesting_period.0;

        if self.account_list.is_empty() {
            return Err(SessionError::InvalidArguments(
                "account list must not be empty".to_string(),
            ));
        }
        if start >= end {
            return Err(SessionError::InvalidArguments(format!(
                "start time {} must be before end time {}",
                start, end
            )));
        }
        if period == 0 {
            return Err(SessionError::InvalidArguments(
                "vesting period must be positive".to_string(),
            ));
        }
        if end - start < period {
            return Err(SessionError::InvalidArguments(format!(
                "duration {} is shorter than a single vesting period {}",
                end - start,
                period
            )));
        }
        Ok(())
    }
}

fn parse_result(method: &str, raw: &[u8]) -> Result<serde_json::Value, SessionError> {
    serde_json::from_slice(raw).map_err(|e| SessionError::Decode {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

/// Fungible token metadata exactly as the token contract returned it.
///
/// The shape is not validated; accessors return `None` for absent fields.
/// `raw()` keeps the contract's bytes, so numbers wider than `f64` survive.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenMetadata {
    raw: Vec<u8>,
    json: serde_json::Value,
}

impl TokenMetadata {
    /// Wrap an `ft_metadata` result. Fails if it is not JSON.
    pub fn from_bytes(raw: Vec<u8>) -> Result<Self, SessionError> {
        let json = parse_result(FT_METADATA, &raw)?;
        Ok(Self { raw, json })
    }

    /// Token symbol.
    pub fn symbol(&self) -> Option<&str> {
        self.json.get("symbol").and_then(|v| v.as_str())
    }

    /// Token name.
    pub fn name(&self) -> Option<&str> {
        self.json.get("name").and_then(|v| v.as_str())
    }

    /// Decimal places.
    pub fn decimals(&self) -> Option<u8> {
        self.json
            .get("decimals")
            .and_then(|v| v.as_u64())
            .and_then(|d| u8::try_from(d).ok())
    }

    /// Parsed JSON.
    pub fn as_json(&self) -> &serde_json::Value {
        &self.json
    }

    /// Bytes as returned by the contract.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

/// Token balance exactly as the token contract returned it.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenBalance {
    raw: Vec<u8>,
    json: serde_json::Value,
}

impl TokenBalance {
    /// Wrap an `ft_balance_of` result. Fails if it is not JSON.
    pub fn from_bytes(raw: Vec<u8>) -> Result<Self, SessionError> {
        let json = parse_result(FT_BALANCE_OF, &raw)?;
        Ok(Self { raw, json })
    }

    /// Balance as an integer, if the value is a decimal string or number.
    pub fn as_u128(&self) -> Option<u128> {
        match &self.json {
            serde_json::Value::String(s) => s.parse().ok(),
            // Read the digits from the raw bytes; the parsed form is an f64
            // past u64::MAX.
            serde_json::Value::Number(_) => std::str::from_utf8(&self.raw).ok()?.trim().parse().ok(),
            _ => None,
        }
    }

    /// Parsed JSON.
    pub fn as_json(&self) -> &serde_json::Value {
        &self.json
    }

    /// Bytes as returned by the contract.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

/// A state-changing contract invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCall {
    /// Contract receiving the call.
    pub receiver_id: AccountId,
    /// Method name.
    pub method_name: String,
    /// JSON arguments.
    pub args: serde_json::Value,
    /// Attached gas.
    pub gas: u64,
    /// Attached deposit in yoctoNEAR.
    pub deposit: u128,
}

/// Raw answer to a view call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewResult {
    /// Bytes returned by the contract (usually JSON).
    pub result: Vec<u8>,
    /// Log lines emitted during execution.
    pub logs: Vec<String>,
    /// Height the query was answered at.
    pub block_height: u64,
}

/// Receipt of a committed transaction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactionOutcome {
    /// Transaction hash.
    pub transaction_hash: String,
    /// Decoded `SuccessValue` bytes (empty for unit returns).
    pub return_value: Vec<u8>,
    /// Log lines emitted by the receipts.
    pub logs: Vec<String>,
}

impl TransactionOutcome {
    /// Decode the return value as JSON, `None` for an empty return.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<Option<T>, SessionError> {
        if self.return_value.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&self.return_value)
            .map(Some)
            .map_err(|e| SessionError::Decode {
                method: "transaction outcome".to_string(),
                reason: e.to_string(),
            })
    }
}

/// Node status reported during the connection handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeStatus {
    /// Chain identifier the node serves.
    pub chain_id: String,
    /// Latest block height known to the node.
    pub latest_block_height: u64,
}

/// Persisted result of a completed wallet sign-in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    /// Account that granted access.
    pub account_id: AccountId,
    /// Every public key the wallet reported for the account.
    #[serde(default)]
    pub all_keys: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_args() -> TaskArgs {
        TaskArgs {
            token_id: AccountId::new("ft.testnet").unwrap(),
            account_list: vec![
                AccountId::new("bob.testnet").unwrap(),
                AccountId::new("john.testnet").unwrap(),
            ],
            start_time: U64(0),
            end_time: U64(1050),
            vesting_period: U64(100),
            amount: U128(100),
        }
    }

    #[test]
    fn test_task_args_valid() {
        assert!(task_args().validate().is_ok());
    }

    #[test]
    fn test_task_args_empty_accounts() {
        let mut args = task_args();
        args.account_list.clear();
        assert!(matches!(args.validate(), Err(SessionError::InvalidArguments(_))));
    }

    #[test]
    fn test_task_args_period_longer_than_duration() {
        let mut args = task_args();
        args.vesting_period = U64(2000);
        assert!(args.validate().is_err());

        args.vesting_period = U64(0);
        assert!(args.validate().is_err());

        let mut args = task_args();
        args.end_time = U64(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_task_args_wire_format() {
        let json = serde_json::to_value(task_args()).unwrap();
        assert_eq!(json["start_time"], "0");
        assert_eq!(json["end_time"], "1050");
        assert_eq!(json["amount"], "100");
        assert_eq!(json["account_list"][1], "john.testnet");
    }

    #[test]
    fn test_task_info_decodes_contract_json() {
        let raw = br#"{"token_id":"ft.testnet","start_time":0,"end_time":1050,
            "vesting_period":100,"amount":100000000000000000000000000,
            "single_claim_amount":5000000000000000000000000,"index":0}"#;
        let task: TaskInfo = serde_json::from_slice(raw).unwrap();
        assert_eq!(task.amount, 100_000_000_000_000_000_000_000_000);
        assert_eq!(task.claim_count(), 10);
    }

    #[test]
    fn test_token_balance_parses_string() {
        let balance = TokenBalance::from_bytes(br#""1250000000000000000000""#.to_vec()).unwrap();
        assert_eq!(balance.as_u128(), Some(1_250_000_000_000_000_000_000));
        assert_eq!(TokenBalance::from_bytes(b"null".to_vec()).unwrap().as_u128(), None);
    }

    #[test]
    fn test_token_balance_bare_number_keeps_precision() {
        let balance = TokenBalance::from_bytes(b"100000000000000000000000001".to_vec()).unwrap();
        assert_eq!(balance.as_u128(), Some(100_000_000_000_000_000_000_000_001));
        assert_eq!(balance.raw(), b"100000000000000000000000001");
    }

    #[test]
    fn test_token_metadata_accessors() {
        let md = TokenMetadata::from_bytes(br#"{"symbol": "USDC", "decimals": 6}"#.to_vec()).unwrap();
        assert_eq!(md.symbol(), Some("USDC"));
        assert_eq!(md.decimals(), Some(6));
        assert_eq!(md.name(), None);
    }

    #[test]
    fn test_token_metadata_not_json_is_decode_error() {
        let result = TokenMetadata::from_bytes(b"<html>".to_vec());
        assert!(matches!(result, Err(SessionError::Decode { ref method, .. }) if method == "ft_metadata"));
    }

    #[test]
    fn test_auth_data_wire_format() {
        let data: AuthData =
            serde_json::from_str(r#"{"accountId":"alice.testnet","allKeys":["ed25519:abc"]}"#)
                .unwrap();
        assert_eq!(data.account_id.as_str(), "alice.testnet");
        assert_eq!(data.all_keys.len(), 1);
    }

    #[test]
    fn test_outcome_json_empty_is_none() {
        let outcome = TransactionOutcome::default();
        assert_eq!(outcome.json::<u32>().unwrap(), None);
    }
}

//! # Inbound Ports
//!
//! Typed interface of the designated contract. Only the bound operations
//! exist as methods, so an unbound call does not compile.

use async_trait::async_trait;

use crate::domain::{AccountId, SessionError, TaskArgs, TaskInfo, TransactionOutcome};

/// Lockup (vesting) contract API - inbound port.
#[async_trait]
pub trait LockupApi: Send + Sync {
    /// List the token contracts registered with the lockup contract.
    async fn get_token_list(&self) -> Result<Vec<AccountId>, SessionError>;

    /// List every vesting task.
    async fn get_tasks(&self) -> Result<Vec<TaskInfo>, SessionError>;

    /// List the tasks vesting one token.
    async fn get_tasks_by_token_id(
        &self,
        token_id: &AccountId,
    ) -> Result<Vec<TaskInfo>, SessionError>;

    /// Register a token contract. Attaches the token storage deposit.
    async fn add_token(&self, token_id: &AccountId) -> Result<TransactionOutcome, SessionError>;

    /// Create a vesting task.
    async fn add_task(&self, args: &TaskArgs) -> Result<TransactionOutcome, SessionError>;

    /// Claim the vested amount of a task for the signed-in account.
    async fn claim(
        &self,
        token_id: &AccountId,
        task_hash: &str,
    ) -> Result<TransactionOutcome, SessionError>;
}

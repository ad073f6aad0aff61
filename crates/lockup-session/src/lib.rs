//! # Lockup Session
//!
//! Session facade connecting a client to one ledger account and the lockup
//! (vesting) contract.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Connect to the ledger's JSON-RPC endpoint for a named environment
//! - Resolve the visitor's identity from a completed wallet sign-in
//! - Bind the lockup contract with fixed read and write capabilities
//! - Look up metadata and balances on arbitrary fungible token contracts
//! - Log in through the wallet redirect and log out idempotently
//!
//! ## Capabilities
//!
//! | Contract | Read | Write |
//! |----------|------|-------|
//! | lockup | `get_token_list`, `get_tasks`, `get_tasks_by_token_id` | `add_token`, `add_task`, `claim` |
//! | token (transient) | `ft_metadata` or `ft_balance_of` | none |
//!
//! ## Module Structure
//!
//! ```text
//! lockup-session/
//! ├── domain/          # Errors, AccountId/Identity, CapabilitySet, records, keys
//! ├── ports/           # LockupApi (inbound) + ledger/wallet/store traits (outbound)
//! ├── adapters/        # JSON-RPC connection, redirect wallet, key and auth stores
//! ├── application/     # ContractHandle, LockupContract, Session
//! └── config.rs        # EnvironmentConfig -> NetworkConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{
    FileAuthStore, FileKeyStore, InMemoryAuthStore, InMemoryKeyStore, JsonRpcConnection,
    JsonRpcConnector, WebWallet,
};
pub use application::{ContractHandle, LockupContract, Session, SessionBackends};
pub use config::{EnvironmentConfig, NetworkConfig};
pub use domain::{
    AccountId, AuthData, CapabilitySet, FunctionCall, Identity, KeyPair, MethodKind, PublicKey,
    SessionError, TaskArgs, TaskInfo, TokenBalance, TokenMetadata, TransactionOutcome, U128, U64,
    ADD_TOKEN_DEPOSIT, DEFAULT_FUNCTION_CALL_GAS, LOCKUP_CHANGE_METHODS, LOCKUP_VIEW_METHODS,
};
pub use ports::{
    AuthStore, KeyStore, LedgerConnection, LedgerConnector, LockupApi, Navigator,
    TransactionSigner, WalletService, MockLedger, RecordingNavigator,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

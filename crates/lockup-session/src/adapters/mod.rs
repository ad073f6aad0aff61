//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound port traits: the JSON-RPC ledger connection, the
//! redirect wallet, and the key and auth stores.

mod auth_store;
mod json_rpc;
mod key_store;
mod wallet;

pub use auth_store::{FileAuthStore, InMemoryAuthStore};
pub use json_rpc::{ErrorCause, JsonRpcConnection, JsonRpcConnector, JsonRpcError};
pub use key_store::{FileKeyStore, InMemoryKeyStore};
pub use wallet::{WebWallet, AUTH_KEY_SUFFIX, PENDING_KEY_PREFIX};

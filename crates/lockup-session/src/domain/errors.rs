//! # Domain Errors
//!
//! Error taxonomy for the session facade. Nothing here is retried: every
//! variant is surfaced to the immediate caller as-is.

use thiserror::Error;

/// Session facade error types.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Environment configuration is missing a field or holds an invalid value.
    /// Detected by `Session::initialize` before any connection is opened.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The RPC endpoint is unreachable or rejected the handshake.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A method name outside the handle's read/write lists was invoked.
    #[error("Method `{method}` is not bound on contract handle `{contract}`")]
    Capability {
        /// Contract the handle is scoped to
        contract: String,
        /// Method that was requested
        method: String,
    },

    /// The call reached the network but the network returned a fault.
    #[error("Remote call `{method}` failed: {reason}")]
    RemoteCall {
        /// Contract method that was called
        method: String,
        /// Fault reported by the node or the contract
        reason: String,
    },

    /// A state-changing call was issued while the session is anonymous.
    #[error("Write call `{0}` requires a signed-in account")]
    NotSignedIn(String),

    /// Key or auth material could not be read or written.
    #[error("Key store error: {0}")]
    KeyStore(String),

    /// The transaction could not be signed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// A response did not decode into the expected shape.
    #[error("Failed to decode `{method}` response: {reason}")]
    Decode {
        /// Method whose response failed to decode
        method: String,
        /// Decoder message
        reason: String,
    },

    /// An account identifier violates the ledger's naming rules.
    #[error("Invalid account id `{0}`")]
    InvalidAccountId(String),

    /// Call arguments break a precondition the contract would reject.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

impl SessionError {
    /// Shorthand for a missing configuration field.
    pub fn missing_field(field: &str) -> Self {
        SessionError::Configuration(format!("missing required field `{}`", field))
    }

    /// True for errors raised before any network traffic.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            SessionError::Configuration(_)
                | SessionError::Capability { .. }
                | SessionError::NotSignedIn(_)
                | SessionError::InvalidAccountId(_)
                | SessionError::InvalidArguments(_)
        )
    }
}

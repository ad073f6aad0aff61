//! # Value Objects
//!
//! Account identifiers, the visitor identity, and the string-encoded
//! integers the ledger uses in JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::SessionError;

/// Minimum account id length.
pub const MIN_ACCOUNT_ID_LEN: usize = 2;

/// Maximum account id length.
pub const MAX_ACCOUNT_ID_LEN: usize = 64;

/// Gas attached to every function call (30 TGas).
pub const DEFAULT_FUNCTION_CALL_GAS: u64 = 30_000_000_000_000;

/// Storage cost per byte in yoctoNEAR.
pub const STORAGE_BYTE_COST: u128 = 10_000_000_000_000_000_000;

/// Bytes the token contract reserves when the lockup contract registers with it.
pub const TOKEN_REGISTRATION_BYTES: u128 = 125;

/// Deposit attached to `add_token` to cover the token registration.
pub const ADD_TOKEN_DEPOSIT: u128 = STORAGE_BYTE_COST * TOKEN_REGISTRATION_BYTES;

/// On-ledger account identifier (a person or a contract).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(String);

impl AccountId {
    /// Validate and wrap an account id.
    pub fn new(id: impl Into<String>) -> Result<Self, SessionError> {
        let id = id.into();
        if is_valid_account_id(&id) {
            Ok(Self(id))
        } else {
            Err(SessionError::InvalidAccountId(id))
        }
    }

    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Ledger naming rules: 2-64 chars of `a-z0-9` joined by single `-`, `_` or `.`.
pub fn is_valid_account_id(id: &str) -> bool {
    if id.len() < MIN_ACCOUNT_ID_LEN || id.len() > MAX_ACCOUNT_ID_LEN {
        return false;
    }

    let mut last_was_separator = true;
    for c in id.chars() {
        match c {
            'a'..='z' | '0'..='9' => last_was_separator = false,
            '-' | '_' | '.' => {
                if last_was_separator {
                    return false;
                }
                last_was_separator = true;
            }
            _ => return false,
        }
    }

    !last_was_separator
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AccountId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccountId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AccountId::new(s).map_err(serde::de::Error::custom)
    }
}

/// Who is driving the session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Identity {
    /// No completed wallet authentication.
    #[default]
    Anonymous,
    /// Wallet granted access for this account.
    Authenticated(AccountId),
}

impl Identity {
    /// Inverse of `account_id`: `""` is anonymous, anything else must be a
    /// valid account id.
    pub fn from_account_id(account_id: &str) -> Result<Self, SessionError> {
        if account_id.is_empty() {
            Ok(Identity::Anonymous)
        } else {
            AccountId::new(account_id).map(Identity::Authenticated)
        }
    }

    /// Account id, or `""` when anonymous.
    pub fn account_id(&self) -> &str {
        match self {
            Identity::Anonymous => "",
            Identity::Authenticated(id) => id.as_str(),
        }
    }

    /// The signed-in account, if any.
    pub fn account(&self) -> Option<&AccountId> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(id) => Some(id),
        }
    }

    /// Check if a wallet grant is present.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated(_))
    }
}

macro_rules! string_encoded_int {
    ($name:ident, $inner:ty, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub $inner);

        impl From<$inner> for $name {
            fn from(v: $inner) -> Self {
                Self(v)
            }
        }

        impl From<$name> for $inner {
            fn from(v: $name) -> $inner {
                v.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse::<$inner>()
                    .map($name)
                    .map_err(|e| serde::de::Error::custom(format!("{}: {}", s, e)))
            }
        }
    };
}

string_encoded_int!(U64, u64, "u64 carried as a decimal string in JSON.");
string_encoded_int!(U128, u128, "u128 carried as a decimal string in JSON.");

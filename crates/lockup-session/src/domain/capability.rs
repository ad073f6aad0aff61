//! # Capability Model
//!
//! Which method names a bound contract handle may invoke, split into read
//! (view, no state change) and write (change, requires a signed
//! transaction). A name appears in at most one list; anything outside both
//! lists is rejected before a request is built.

use std::collections::BTreeSet;

use super::errors::SessionError;

/// Read capabilities of the lockup contract.
pub const LOCKUP_VIEW_METHODS: &[&str] = &["get_token_list", "get_tasks", "get_tasks_by_token_id"];

/// Write capabilities of the lockup contract.
pub const LOCKUP_CHANGE_METHODS: &[&str] = &["add_token", "add_task", "claim"];

/// Fungible token metadata query.
pub const FT_METADATA: &str = "ft_metadata";

/// Fungible token balance query.
pub const FT_BALANCE_OF: &str = "ft_balance_of";

/// How a bound method is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// Side-effect-free query answered by any node.
    View,
    /// State-mutating call submitted as a signed transaction.
    Change,
}

impl MethodKind {
    /// Check if a signature is required.
    pub fn requires_signature(&self) -> bool {
        matches!(self, MethodKind::Change)
    }
}

/// Declared read and write method lists of one contract handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySet {
    view_methods: Vec<String>,
    change_methods: Vec<String>,
}

impl CapabilitySet {
    /// Build a set, rejecting names that appear in both lists or twice.
    pub fn new<V, C>(view_methods: V, change_methods: C) -> Result<Self, SessionError>
    where
        V: IntoIterator,
        V::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let view_methods: Vec<String> = view_methods.into_iter().map(Into::into).collect();
        let change_methods: Vec<String> = change_methods.into_iter().map(Into::into).collect();

        let mut seen = BTreeSet::new();
        for name in view_methods.iter().chain(change_methods.iter()) {
            if name.is_empty() {
                return Err(SessionError::Configuration(
                    "capability list contains an empty method name".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(SessionError::Configuration(format!(
                    "method `{}` declared more than once across capability lists",
                    name
                )));
            }
        }

        Ok(Self {
            view_methods,
            change_methods,
        })
    }

    /// Read-only set (empty write list).
    pub fn view_only<V>(view_methods: V) -> Result<Self, SessionError>
    where
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Self::new(view_methods, std::iter::empty::<String>())
    }

    /// The fixed capabilities bound against the designated contract.
    pub fn lockup() -> Self {
        Self {
            view_methods: LOCKUP_VIEW_METHODS.iter().map(|m| m.to_string()).collect(),
            change_methods: LOCKUP_CHANGE_METHODS.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Classify a method name, `None` if it is not bound.
    pub fn kind_of(&self, method: &str) -> Option<MethodKind> {
        if self.view_methods.iter().any(|m| m == method) {
            Some(MethodKind::View)
        } else if self.change_methods.iter().any(|m| m == method) {
            Some(MethodKind::Change)
        } else {
            None
        }
    }

    /// Require `method` to be bound as `kind`.
    pub fn check(&self, contract: &str, method: &str, kind: MethodKind) -> Result<(), SessionError> {
        match self.kind_of(method) {
            Some(k) if k == kind => Ok(()),
            _ => Err(SessionError::Capability {
                contract: contract.to_string(),
                method: method.to_string(),
            }),
        }
    }

    /// Declared read methods, in declaration order.
    pub fn view_methods(&self) -> &[String] {
        &self.view_methods
    }

    /// Declared write methods, in declaration order.
    pub fn change_methods(&self) -> &[String] {
        &self.change_methods
    }
}

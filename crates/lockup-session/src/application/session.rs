//! # Session
//!
//! Owns the connection, the resolved identity and the bound lockup contract
//! for one visitor. Only `initialize`, `complete_login` and `logout` change
//! that state.

use std::sync::Arc;

use serde_json::json;
use tracing::info;
use url::Url;

use crate::adapters::WebWallet;
use crate::application::contract::{ContractHandle, LockupContract};
use crate::config::{EnvironmentConfig, NetworkConfig};
use crate::domain::{
    AccountId, CapabilitySet, Identity, SessionError, TokenBalance, TokenMetadata, FT_BALANCE_OF,
    FT_METADATA,
};
use crate::ports::{AuthStore, KeyStore, LedgerConnection, LedgerConnector, Navigator, WalletService};

/// External collaborators a session is built from.
pub struct SessionBackends {
    connector: Arc<dyn LedgerConnector>,
    key_store: Arc<dyn KeyStore>,
    auth_store: Arc<dyn AuthStore>,
    navigator: Arc<dyn Navigator>,
    callback_url: Option<Url>,
}

impl SessionBackends {
    /// Bundle the connector and the wallet's stores.
    pub fn new(
        connector: Arc<dyn LedgerConnector>,
        key_store: Arc<dyn KeyStore>,
        auth_store: Arc<dyn AuthStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            connector,
            key_store,
            auth_store,
            navigator,
            callback_url: None,
        }
    }

    /// Finish a wallet sign-in from `url` before resolving the identity.
    pub fn with_callback_url(mut self, url: Url) -> Self {
        self.callback_url = Some(url);
        self
    }
}

/// A visitor's session against the designated contract.
pub struct Session {
    config: NetworkConfig,
    connection: Arc<dyn LedgerConnection>,
    wallet: Arc<dyn WalletService>,
    identity: Identity,
    contract: LockupContract,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("network_id", &self.config.network_id())
            .field("identity", &self.identity)
            .field("contract", &self.config.contract_id())
            .finish()
    }
}

impl Session {
    /// Validate `config`, connect, resolve the identity and bind the
    /// lockup contract.
    ///
    /// Configuration problems are reported before any connection attempt.
    pub async fn initialize(
        config: &EnvironmentConfig,
        backends: SessionBackends,
    ) -> Result<Self, SessionError> {
        let config = config.validate()?;
        let connection = backends
            .connector
            .connect(&config, backends.key_store.clone())
            .await?;

        let wallet: Arc<dyn WalletService> = Arc::new(WebWallet::new(
            config.clone(),
            backends.key_store,
            backends.auth_store,
            backends.navigator,
        ));

        if let Some(callback) = &backends.callback_url {
            wallet.complete_sign_in(callback).await?;
        }

        let identity = wallet.load_identity().await?;
        let contract = LockupContract::bind(
            connection.clone(),
            config.contract_id().clone(),
            identity.clone(),
        );

        info!(
            network = config.network_id(),
            contract = %config.contract_id(),
            account = identity.account_id(),
            "Session initialized"
        );

        Ok(Self {
            config,
            connection,
            wallet,
            identity,
            contract,
        })
    }

    /// Current identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Signed-in account id, `""` when anonymous.
    pub fn account_id(&self) -> &str {
        self.identity.account_id()
    }

    /// The bound lockup contract.
    pub fn contract(&self) -> &LockupContract {
        &self.contract
    }

    /// Underlying ledger connection.
    pub fn connection(&self) -> &Arc<dyn LedgerConnection> {
        &self.connection
    }

    /// Validated configuration.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Read-only handle on `token_id` exposing only `ft_metadata`.
    pub fn metadata_handle(&self, token_id: &AccountId) -> Result<ContractHandle, SessionError> {
        self.token_handle(token_id, FT_METADATA)
    }

    /// Read-only handle on `token_id` exposing only `ft_balance_of`.
    pub fn balance_handle(&self, token_id: &AccountId) -> Result<ContractHandle, SessionError> {
        self.token_handle(token_id, FT_BALANCE_OF)
    }

    fn token_handle(&self, token_id: &AccountId, method: &str) -> Result<ContractHandle, SessionError> {
        Ok(ContractHandle::new(
            self.connection.clone(),
            token_id.clone(),
            CapabilitySet::view_only([method])?,
            self.identity.clone(),
        ))
    }

    /// Fetch the token's metadata exactly as the token contract returns it.
    pub async fn resolve_token_metadata(
        &self,
        token_id: &AccountId,
    ) -> Result<TokenMetadata, SessionError> {
        let handle = self.metadata_handle(token_id)?;
        TokenMetadata::from_bytes(handle.view_raw(FT_METADATA, &json!({})).await?)
    }

    /// Fetch the token balance held by the designated contract's account.
    ///
    /// The subject is always the configured contract, whatever the
    /// visitor's identity.
    pub async fn resolve_token_balance(
        &self,
        token_id: &AccountId,
    ) -> Result<TokenBalance, SessionError> {
        let handle = self.balance_handle(token_id)?;
        let raw = handle
            .view_raw(
                FT_BALANCE_OF,
                &json!({ "account_id": self.config.contract_id() }),
            )
            .await?;
        TokenBalance::from_bytes(raw)
    }

    /// Send the visitor to the wallet to grant access to the designated
    /// contract. The identity changes once the wallet redirects back and
    /// the callback is completed.
    pub async fn login(&self) -> Result<(), SessionError> {
        self.wallet.request_sign_in(self.config.contract_id()).await
    }

    /// Complete a wallet sign-in in place and rebind the contract to the
    /// granted account.
    pub async fn complete_login(&mut self, callback: &Url) -> Result<&Identity, SessionError> {
        if self.wallet.complete_sign_in(callback).await?.is_some() {
            let identity = Identity::from_account_id(&self.wallet.account_id())?;
            self.rebind(identity);
        }
        Ok(&self.identity)
    }

    /// Drop all local credential material and become anonymous. Calling it
    /// again is a no-op.
    pub async fn logout(&mut self) -> Result<(), SessionError> {
        self.wallet.sign_out().await?;
        if self.identity.is_authenticated() {
            info!(account = self.identity.account_id(), "Session logged out");
            self.rebind(Identity::Anonymous);
        }
        Ok(())
    }

    fn rebind(&mut self, identity: Identity) {
        self.contract = LockupContract::bind(
            self.connection.clone(),
            self.config.contract_id().clone(),
            identity.clone(),
        );
        self.identity = identity;
    }
}

//! Redirect Wallet Adapter
//!
//! Implements `WalletService` for a web wallet that grants function-call
//! access through a login redirect and reports the result back on the
//! application URL.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::NetworkConfig;
use crate::domain::{AccountId, AuthData, Identity, KeyPair, SessionError};
use crate::ports::{AuthStore, KeyStore, Navigator, WalletService};

/// Key-store name prefix for keys awaiting the wallet's grant.
pub const PENDING_KEY_PREFIX: &str = "pending_key";

/// Suffix appended to the app key prefix to form the auth-store key.
pub const AUTH_KEY_SUFFIX: &str = "_wallet_auth_key";

/// Wallet path that starts a sign-in.
const LOGIN_PATH: &str = "login";

/// Web wallet reached by redirect.
pub struct WebWallet {
    config: NetworkConfig,
    key_store: Arc<dyn KeyStore>,
    auth_store: Arc<dyn AuthStore>,
    navigator: Arc<dyn Navigator>,
    auth: RwLock<Option<AuthData>>,
}

impl WebWallet {
    /// Create a wallet with no auth data loaded yet.
    pub fn new(
        config: NetworkConfig,
        key_store: Arc<dyn KeyStore>,
        auth_store: Arc<dyn AuthStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            config,
            key_store,
            auth_store,
            navigator,
            auth: RwLock::new(None),
        }
    }

    /// Auth-store key for this application.
    pub fn auth_key(&self) -> String {
        format!("{}{}", self.config.app_key_prefix(), AUTH_KEY_SUFFIX)
    }

    /// Build the wallet login URL granting `public_key` access to
    /// `contract_id`.
    pub fn login_url(&self, contract_id: &AccountId, public_key: &str) -> Result<Url, SessionError> {
        let mut url = self.config.wallet_url().clone();
        url.path_segments_mut()
            .map_err(|_| {
                SessionError::Configuration(format!(
                    "wallet_url `{}` cannot carry a path",
                    self.config.wallet_url()
                ))
            })?
            .pop_if_empty()
            .push(LOGIN_PATH)
            .push("");

        {
            let mut query = url.query_pairs_mut();
            if let Some(app_url) = self.config.app_url() {
                query.append_pair("success_url", app_url.as_str());
                query.append_pair("failure_url", app_url.as_str());
            }
            query.append_pair("contract_id", contract_id.as_str());
            query.append_pair("public_key", public_key);
        }
        Ok(url)
    }
}

#[async_trait]
impl WalletService for WebWallet {
    async fn load_identity(&self) -> Result<Identity, SessionError> {
        let data = self.auth_store.load(&self.auth_key()).await?;
        let identity = match &data {
            Some(auth) => Identity::Authenticated(auth.account_id.clone()),
            None => Identity::Anonymous,
        };
        *self.auth.write() = data;
        debug!(account = identity.account_id(), "Resolved wallet identity");
        Ok(identity)
    }

    fn account_id(&self) -> String {
        self.auth
            .read()
            .as_ref()
            .map(|auth| auth.account_id.to_string())
            .unwrap_or_default()
    }

    async fn request_sign_in(&self, contract_id: &AccountId) -> Result<(), SessionError> {
        let key = KeyPair::generate();
        let public_key = key.public_key().to_string();

        self.key_store
            .set_key(
                self.config.network_id(),
                &format!("{}{}", PENDING_KEY_PREFIX, public_key),
                &key,
            )
            .await?;

        let url = self.login_url(contract_id, &public_key)?;
        info!(contract = %contract_id, wallet = %self.config.wallet_url(), "Redirecting to wallet for sign-in");
        self.navigator.navigate(&url);
        Ok(())
    }

    async fn complete_sign_in(&self, callback: &Url) -> Result<Option<AccountId>, SessionError> {
        let mut account_id = None;
        let mut public_key = None;
        let mut all_keys = Vec::new();
        for (name, value) in callback.query_pairs() {
            match name.as_ref() {
                "account_id" if !value.is_empty() => account_id = Some(value.into_owned()),
                "public_key" if !value.is_empty() => public_key = Some(value.into_owned()),
                "all_keys" => {
                    all_keys = value
                        .split(',')
                        .filter(|k| !k.is_empty())
                        .map(str::to_string)
                        .collect()
                }
                _ => {}
            }
        }

        let Some(account_id) = account_id else {
            return Ok(None);
        };
        let account_id = AccountId::new(account_id)?;

        let auth = AuthData {
            account_id: account_id.clone(),
            all_keys,
        };
        self.auth_store.save(&self.auth_key(), &auth).await?;
        *self.auth.write() = Some(auth);

        if let Some(public_key) = public_key {
            let network = self.config.network_id();
            let pending = format!("{}{}", PENDING_KEY_PREFIX, public_key);
            match self.key_store.get_key(network, &pending).await? {
                Some(key) => {
                    self.key_store
                        .set_key(network, account_id.as_str(), &key)
                        .await?;
                    self.key_store.remove_key(network, &pending).await?;
                }
                None => warn!(%public_key, "Wallet granted a key this client never requested"),
            }
        }

        info!(account = %account_id, "Wallet sign-in completed");
        Ok(Some(account_id))
    }

    async fn sign_out(&self) -> Result<(), SessionError> {
        let network = self.config.network_id();
        let auth_key = self.auth_key();

        // Stored auth data still names the account after a partial sign-out.
        let in_memory = self.auth.read().as_ref().map(|auth| auth.account_id.clone());
        let account = match in_memory {
            Some(account) => Some(account),
            None => self
                .auth_store
                .load(&auth_key)
                .await?
                .map(|auth| auth.account_id),
        };

        if let Some(account) = &account {
            self.key_store.remove_key(network, account.as_str()).await?;
        }
        for name in self.key_store.names(network).await? {
            if name.starts_with(PENDING_KEY_PREFIX) {
                self.key_store.remove_key(network, &name).await?;
            }
        }
        self.auth_store.remove(&auth_key).await?;

        *self.auth.write() = None;
        if let Some(account) = account {
            info!(%account, "Signed out");
        }
        Ok(())
    }
}

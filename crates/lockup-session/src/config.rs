//! # Session Configuration
//!
//! Network endpoint configuration: a raw `EnvironmentConfig` (every field
//! optional so that "missing" is representable) and the validated,
//! immutable `NetworkConfig` the session is built from.
//!
//! Sources, in order: a named environment preset, an optional TOML file,
//! then `LOCKUP_*` / `CONTRACT_NAME` environment variables.
//!
//! ```toml
//! network_id = "testnet"
//! node_url = "https://rpc.testnet.near.org"
//! wallet_url = "https://wallet.testnet.near.org"
//! contract_name = "lockup.testnet"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::{AccountId, SessionError};

/// Contract used when `CONTRACT_NAME` is not set.
pub const DEFAULT_CONTRACT_NAME: &str = "lockup.testnet";

/// Environment used when `LOCKUP_ENV` is not set.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Selects the named environment.
pub const ENV_ENVIRONMENT: &str = "LOCKUP_ENV";
/// Overrides the designated contract.
pub const ENV_CONTRACT_NAME: &str = "CONTRACT_NAME";
/// Overrides the RPC endpoint.
pub const ENV_NODE_URL: &str = "LOCKUP_NODE_URL";
/// Overrides the wallet endpoint.
pub const ENV_WALLET_URL: &str = "LOCKUP_WALLET_URL";

/// Raw network endpoint configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Network identifier (must match the node's chain id).
    pub network_id: Option<String>,
    /// RPC endpoint URL.
    pub node_url: Option<String>,
    /// Wallet service URL.
    pub wallet_url: Option<String>,
    /// Designated contract account.
    pub contract_name: Option<String>,
    /// Helper service URL.
    pub helper_url: Option<String>,
    /// Block explorer URL.
    pub explorer_url: Option<String>,
    /// Where the wallet sends the visitor back to after sign-in.
    pub app_url: Option<String>,
}

impl EnvironmentConfig {
    /// Preset for a named environment.
    pub fn for_environment(env: &str, contract_name: &str) -> Result<Self, SessionError> {
        let contract_name = Some(contract_name.to_string());
        let config = match env {
            "production" | "mainnet" => Self {
                network_id: Some("mainnet".into()),
                node_url: Some("https://rpc.mainnet.near.org".into()),
                wallet_url: Some("https://wallet.near.org".into()),
                helper_url: Some("https://helper.mainnet.near.org".into()),
                explorer_url: Some("https://explorer.mainnet.near.org".into()),
                contract_name,
                app_url: None,
            },
            "development" | "testnet" => Self {
                network_id: Some("testnet".into()),
                node_url: Some("https://rpc.testnet.near.org".into()),
                wallet_url: Some("https://wallet.testnet.near.org".into()),
                helper_url: Some("https://helper.testnet.near.org".into()),
                explorer_url: Some("https://explorer.testnet.near.org".into()),
                contract_name,
                app_url: None,
            },
            "betanet" => Self {
                network_id: Some("betanet".into()),
                node_url: Some("https://rpc.betanet.near.org".into()),
                wallet_url: Some("https://wallet.betanet.near.org".into()),
                helper_url: Some("https://helper.betanet.near.org".into()),
                explorer_url: Some("https://explorer.betanet.near.org".into()),
                contract_name,
                app_url: None,
            },
            "local" => Self {
                network_id: Some("localnet".into()),
                node_url: Some("http://localhost:3030".into()),
                wallet_url: Some("http://localhost:4000/wallet".into()),
                contract_name,
                ..Self::default()
            },
            // CI networks have no wallet; validation reports it.
            "test" | "ci" => Self {
                network_id: Some("shared-test".into()),
                node_url: Some("https://rpc.ci-testnet.near.org".into()),
                contract_name,
                ..Self::default()
            },
            "ci-betanet" => Self {
                network_id: Some("shared-test-staging".into()),
                node_url: Some("https://rpc.ci-betanet.near.org".into()),
                contract_name,
                ..Self::default()
            },
            other => {
                return Err(SessionError::Configuration(format!(
                    "Unconfigured environment '{}'",
                    other
                )))
            }
        };
        Ok(config)
    }

    /// Preset `env` (default `LOCKUP_ENV`), then the TOML `file`, then the
    /// variable overrides. Variables are read through `var`, usually
    /// `|name| std::env::var(name).ok()`.
    pub fn resolve<F>(env: Option<&str>, file: Option<&Path>, var: F) -> Result<Self, SessionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = env
            .map(str::to_string)
            .or_else(|| var(ENV_ENVIRONMENT))
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        let contract = var(ENV_CONTRACT_NAME).unwrap_or_else(|| DEFAULT_CONTRACT_NAME.to_string());

        let mut config = Self::for_environment(&env, &contract)?;
        if let Some(path) = file {
            config = config.merge(Self::load(path)?);
        }
        config.apply_overrides(var);
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SessionError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            SessionError::Configuration(format!(
                "cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    /// Parse from a TOML string.
    pub fn parse(content: &str) -> Result<Self, SessionError> {
        toml::from_str(content).map_err(|e| SessionError::Configuration(e.to_string()))
    }

    /// Fields set in `other` replace ours.
    pub fn merge(mut self, other: EnvironmentConfig) -> Self {
        fn pick(base: &mut Option<String>, over: Option<String>) {
            if over.is_some() {
                *base = over;
            }
        }
        pick(&mut self.network_id, other.network_id);
        pick(&mut self.node_url, other.node_url);
        pick(&mut self.wallet_url, other.wallet_url);
        pick(&mut self.contract_name, other.contract_name);
        pick(&mut self.helper_url, other.helper_url);
        pick(&mut self.explorer_url, other.explorer_url);
        pick(&mut self.app_url, other.app_url);
        self
    }

    /// Apply `CONTRACT_NAME`, `LOCKUP_NODE_URL` and `LOCKUP_WALLET_URL` as
    /// reported by `var`.
    pub fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var(ENV_CONTRACT_NAME) {
            self.contract_name = Some(v);
        }
        if let Some(v) = var(ENV_NODE_URL) {
            self.node_url = Some(v);
        }
        if let Some(v) = var(ENV_WALLET_URL) {
            self.wallet_url = Some(v);
        }
    }

    /// Check every required field and produce the immutable configuration.
    pub fn validate(&self) -> Result<NetworkConfig, SessionError> {
        let network_id = required(&self.network_id, "network_id")?.to_string();
        let node_url = parse_url(required(&self.node_url, "node_url")?, "node_url")?;
        let wallet_url = parse_url(required(&self.wallet_url, "wallet_url")?, "wallet_url")?;
        let contract_id = AccountId::new(required(&self.contract_name, "contract_name")?)
            .map_err(|e| SessionError::Configuration(format!("contract_name: {}", e)))?;

        Ok(NetworkConfig {
            network_id,
            node_url,
            wallet_url,
            contract_id,
            helper_url: optional_url(&self.helper_url, "helper_url")?,
            explorer_url: optional_url(&self.explorer_url, "explorer_url")?,
            app_url: optional_url(&self.app_url, "app_url")?,
        })
    }
}

fn required<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str, SessionError> {
    match field.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SessionError::missing_field(name)),
    }
}

fn parse_url(value: &str, name: &str) -> Result<Url, SessionError> {
    Url::parse(value).map_err(|e| SessionError::Configuration(format!("{}: {}", name, e)))
}

fn optional_url(field: &Option<String>, name: &str) -> Result<Option<Url>, SessionError> {
    match field.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => parse_url(v, name).map(Some),
        _ => Ok(None),
    }
}

/// Validated network endpoint configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    network_id: String,
    node_url: Url,
    wallet_url: Url,
    contract_id: AccountId,
    helper_url: Option<Url>,
    explorer_url: Option<Url>,
    app_url: Option<Url>,
}

impl NetworkConfig {
    /// Network identifier.
    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    /// RPC endpoint.
    pub fn node_url(&self) -> &Url {
        &self.node_url
    }

    /// Wallet service endpoint.
    pub fn wallet_url(&self) -> &Url {
        &self.wallet_url
    }

    /// Designated contract.
    pub fn contract_id(&self) -> &AccountId {
        &self.contract_id
    }

    /// Helper service endpoint, if configured.
    pub fn helper_url(&self) -> Option<&Url> {
        self.helper_url.as_ref()
    }

    /// Block explorer, if configured.
    pub fn explorer_url(&self) -> Option<&Url> {
        self.explorer_url.as_ref()
    }

    /// Sign-in return address, if configured.
    pub fn app_url(&self) -> Option<&Url> {
        self.app_url.as_ref()
    }

    /// Namespace for persisted wallet auth data.
    pub fn app_key_prefix(&self) -> &str {
        self.contract_id.as_str()
    }
}

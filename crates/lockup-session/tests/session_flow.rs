//! End-to-end session behavior against the in-memory ledger.

use std::sync::Arc;

use serde_json::json;
use url::Url;

use lockup_session::ports::CallKind;
use lockup_session::{
    AccountId, EnvironmentConfig, Identity, InMemoryAuthStore, InMemoryKeyStore, KeyStore,
    LockupApi, MockLedger, RecordingNavigator, Session, SessionBackends, SessionError,
};

fn scenario() -> EnvironmentConfig {
    EnvironmentConfig {
        contract_name: Some("app.testnet".into()),
        network_id: Some("testnet".into()),
        node_url: Some("https://rpc.testnet".into()),
        wallet_url: Some("https://wallet.testnet".into()),
        ..Default::default()
    }
}

/// Stores shared across page loads.
#[derive(Clone)]
struct Browser {
    ledger: MockLedger,
    keys: Arc<InMemoryKeyStore>,
    auth: Arc<InMemoryAuthStore>,
    navigator: RecordingNavigator,
}

impl Browser {
    fn new(ledger: MockLedger) -> Self {
        Self {
            ledger,
            keys: Arc::new(InMemoryKeyStore::new()),
            auth: Arc::new(InMemoryAuthStore::new()),
            navigator: RecordingNavigator::new(),
        }
    }

    fn backends(&self) -> SessionBackends {
        SessionBackends::new(
            Arc::new(self.ledger.clone()),
            self.keys.clone(),
            self.auth.clone(),
            Arc::new(self.navigator.clone()),
        )
    }

    async fn open(&self) -> Session {
        Session::initialize(&scenario(), self.backends()).await.unwrap()
    }

    async fn open_at(&self, callback: Url) -> Session {
        Session::initialize(&scenario(), self.backends().with_callback_url(callback))
            .await
            .unwrap()
    }

    /// Simulate the wallet approving the last login request for `account`.
    fn wallet_grant(&self, account: &str) -> Url {
        let login = self.navigator.last().expect("login redirect");
        let public_key = login
            .query_pairs()
            .find(|(k, _)| k == "public_key")
            .map(|(_, v)| v.into_owned())
            .expect("public key in login url");

        let mut callback = Url::parse("https://app.example/").unwrap();
        callback
            .query_pairs_mut()
            .append_pair("account_id", account)
            .append_pair("public_key", &public_key)
            .append_pair("all_keys", &public_key);
        callback
    }
}

#[tokio::test]
async fn test_missing_required_field_never_connects() {
    for mask in 0u8..15 {
        let mut config = scenario();
        if mask & 1 == 0 {
            config.network_id = None;
        }
        if mask & 2 == 0 {
            config.node_url = None;
        }
        if mask & 4 == 0 {
            config.wallet_url = None;
        }
        if mask & 8 == 0 {
            config.contract_name = None;
        }

        let browser = Browser::new(MockLedger::default());
        let result = Session::initialize(&config, browser.backends()).await;
        assert!(
            matches!(result, Err(SessionError::Configuration(_))),
            "mask {:04b} should fail configuration",
            mask
        );
        assert_eq!(browser.ledger.connect_count(), 0);
    }
}

#[tokio::test]
async fn test_blank_field_is_missing() {
    let mut config = scenario();
    config.wallet_url = Some("   ".into());
    let browser = Browser::new(MockLedger::default());
    let result = Session::initialize(&config, browser.backends()).await;
    assert!(matches!(result, Err(SessionError::Configuration(ref m)) if m.contains("wallet_url")));
    assert_eq!(browser.ledger.connect_count(), 0);
}

#[tokio::test]
async fn test_scenario_anonymous_with_lockup_capabilities() {
    let browser = Browser::new(MockLedger::default());
    let session = browser.open().await;

    assert_eq!(session.account_id(), "");
    assert_eq!(session.identity(), &Identity::Anonymous);

    let handle = session.contract().handle();
    assert_eq!(handle.contract_id().as_str(), "app.testnet");
    assert_eq!(
        handle.view_methods(),
        ["get_token_list", "get_tasks", "get_tasks_by_token_id"].map(String::from)
    );
    assert_eq!(
        handle.change_methods(),
        ["add_token", "add_task", "claim"].map(String::from)
    );
    assert_eq!(browser.ledger.connect_count(), 1);
}

#[tokio::test]
async fn test_unbound_methods_fail_without_network_call() {
    let browser = Browser::new(MockLedger::default());
    let session = browser.open().await;
    let handle = session.contract().handle();

    for method in ["get_owner", "ft_metadata", "new", ""] {
        let view = handle.view_raw(method, &json!({})).await;
        assert!(matches!(view, Err(SessionError::Capability { .. })), "{}", method);
        let call = handle.call(method, json!({}), 0).await;
        assert!(matches!(call, Err(SessionError::Capability { .. })), "{}", method);
    }
    assert!(browser.ledger.calls().is_empty());
}

#[tokio::test]
async fn test_login_round_trip_then_initialize() {
    let browser = Browser::new(MockLedger::default());
    let session = browser.open().await;
    session.login().await.unwrap();

    let login = browser.navigator.last().unwrap();
    assert_eq!(login.host_str(), Some("wallet.testnet"));
    assert!(login
        .query_pairs()
        .any(|(k, v)| k == "contract_id" && v == "app.testnet"));

    let callback = browser.wallet_grant("alice.testnet");
    let returned = browser.open_at(callback).await;
    assert_eq!(returned.account_id(), "alice.testnet");

    // A later page load resolves the same identity from persisted state.
    let reloaded = browser.open().await;
    assert_eq!(
        reloaded.identity(),
        &Identity::Authenticated(AccountId::new("alice.testnet").unwrap())
    );
    assert_eq!(
        browser.keys.names("testnet").await.unwrap(),
        vec!["alice.testnet".to_string()]
    );
}

#[tokio::test]
async fn test_logout_then_initialize_is_anonymous() {
    let browser = Browser::new(MockLedger::default());
    browser.open().await.login().await.unwrap();
    let mut session = browser.open_at(browser.wallet_grant("bob.testnet")).await;
    assert_eq!(session.account_id(), "bob.testnet");

    session.logout().await.unwrap();
    assert_eq!(session.account_id(), "");
    session.logout().await.unwrap();

    let reopened = browser.open().await;
    assert_eq!(reopened.account_id(), "");
    assert!(browser.keys.names("testnet").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_writes_need_a_signed_in_account() {
    let browser = Browser::new(MockLedger::default());
    let session = browser.open().await;
    let token = AccountId::new("usdc.testnet").unwrap();

    let result = session.contract().add_token(&token).await;
    assert!(matches!(result, Err(SessionError::NotSignedIn(_))));
    assert!(browser.ledger.calls().is_empty());

    session.login().await.unwrap();
    let signed_in = browser.open_at(browser.wallet_grant("owner.testnet")).await;
    signed_in.contract().add_token(&token).await.unwrap();

    let granted = browser
        .keys
        .get_key("testnet", "owner.testnet")
        .await
        .unwrap()
        .unwrap();
    let calls = browser.ledger.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, CallKind::Change);
    assert_eq!(calls[0].signer_id.as_deref(), Some("owner.testnet"));
    assert_eq!(calls[0].signer_key, Some(granted.public_key().to_string()));
}

#[tokio::test]
async fn test_abandoned_login_leaves_nothing_after_logout() {
    let browser = Browser::new(MockLedger::default());
    let mut session = browser.open().await;
    session.login().await.unwrap();
    session.login().await.unwrap();
    assert_eq!(browser.keys.names("testnet").await.unwrap().len(), 2);

    session.logout().await.unwrap();
    assert!(browser.keys.names("testnet").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_balance_subject_is_the_designated_contract() {
    let ledger = MockLedger::default().with_view("usdc.testnet", "ft_balance_of", json!("1000"));
    let browser = Browser::new(ledger);
    let token = AccountId::new("usdc.testnet").unwrap();

    let anonymous = browser.open().await;
    anonymous.login().await.unwrap();
    let alice = browser.open_at(browser.wallet_grant("alice.testnet")).await;
    assert_ne!(anonymous.identity(), alice.identity());

    let first = anonymous.resolve_token_balance(&token).await.unwrap();
    let second = alice.resolve_token_balance(&token).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.as_u128(), Some(1000));

    let calls = browser.ledger.calls();
    assert_eq!(calls.len(), 2);
    for call in &calls {
        assert_eq!(call.contract_id, "usdc.testnet");
        assert_eq!(call.method, "ft_balance_of");
        assert_eq!(call.args, json!({"account_id": "app.testnet"}));
    }
}

#[tokio::test]
async fn test_token_metadata_is_returned_unmodified() {
    let metadata = json!({
        "spec": "ft-1.0.0",
        "name": "USD Coin",
        "symbol": "USDC",
        "decimals": 6,
        "icon": null,
        "extra": {"nested": [1, 2, 3]}
    });
    let ledger = MockLedger::default().with_view("usdc.testnet", "ft_metadata", metadata.clone());
    let browser = Browser::new(ledger);
    let session = browser.open().await;
    let token = AccountId::new("usdc.testnet").unwrap();

    let handle = session.metadata_handle(&token).unwrap();
    assert_eq!(handle.contract_id(), &token);
    assert_eq!(handle.view_methods(), ["ft_metadata".to_string()]);
    assert!(handle.change_methods().is_empty());

    let resolved = session.resolve_token_metadata(&token).await.unwrap();
    assert_eq!(resolved.as_json(), &metadata);
    assert_eq!(resolved.symbol(), Some("USDC"));

    let calls = browser.ledger.calls();
    assert_eq!(calls[0].args, json!({}));
}

#[tokio::test]
async fn test_token_metadata_keeps_wide_integers() {
    let raw = br#"{"symbol":"WIDE","total_supply":340282366920938463463374607431768211455}"#;
    let ledger = MockLedger::default().with_view_bytes("wide.testnet", "ft_metadata", raw.to_vec());
    let browser = Browser::new(ledger);
    let session = browser.open().await;
    let token = AccountId::new("wide.testnet").unwrap();

    let resolved = session.resolve_token_metadata(&token).await.unwrap();
    assert_eq!(resolved.raw(), raw);
    assert_eq!(resolved.symbol(), Some("WIDE"));
}

#[tokio::test]
async fn test_token_without_metadata_is_remote_fault() {
    let browser = Browser::new(MockLedger::default());
    let session = browser.open().await;
    let token = AccountId::new("plain.testnet").unwrap();
    let result = session.resolve_token_metadata(&token).await;
    assert!(matches!(result, Err(SessionError::RemoteCall { ref method, .. }) if method == "ft_metadata"));
}

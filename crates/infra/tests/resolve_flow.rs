//! End-to-end flows: engine + dispatcher + listings + cache against a mock
//! Central cluster.

use std::sync::Arc;

use centralkit_core::{BatchDispatcher, IdentifierCache, TokenManager};
use centralkit_domain::{Account, CacheEntry, CacheKind, TokenSet};
use centralkit_infra::{CentralApi, CentralAuthClient, FileTokenStore, RequestEngine, SqliteCacheStore};
use serde_json::json;
use url::Url;
use wiremock::matchers::{bearer_token, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    cache: IdentifierCache,
    store: Arc<SqliteCacheStore>,
    _token_dir: tempfile::TempDir,
}

async fn harness(server: &MockServer, access_token: &str) -> Harness {
    let account = Account {
        base_url: server.uri(),
        customer_id: "cust-1".to_string(),
        client_id: "cid".to_string(),
        client_secret: "secret".to_string(),
    };

    let token_dir = tempfile::tempdir().unwrap();
    let token_store = Arc::new(FileTokenStore::new(token_dir.path().join("tokens.json")));
    let auth = Arc::new(CentralAuthClient::new(account).unwrap());
    let tokens = Arc::new(TokenManager::new(auth, token_store));
    tokens
        .install_tokens(TokenSet::new(
            access_token.to_string(),
            Some("refresh-1".to_string()),
            7200,
        ))
        .await
        .unwrap();

    let engine = RequestEngine::builder(Url::parse(&server.uri()).unwrap(), tokens)
        .build()
        .unwrap();
    let dispatcher = Arc::new(BatchDispatcher::new(Arc::new(engine)));
    let api = Arc::new(CentralApi::new(dispatcher));
    let store = Arc::new(SqliteCacheStore::in_memory().unwrap());

    let cache = IdentifierCache::new(store.clone(), api);
    cache.hydrate().await.unwrap();
    Harness { cache, store, _token_dir: token_dir }
}

async fn mount_sites(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/central/v2/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 2,
            "sites": [
                {"site_id": 1, "site_name": "Nashville-HQ", "city": "Nashville", "state": "TN"},
                {"site_id": 2, "site_name": "Memphis-Branch", "city": "Memphis", "state": "TN"}
            ]
        })))
        .mount(server)
        .await;
}

async fn mount_devices(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/monitoring/v2/aps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "aps": [{"serial": "CN100AAA01", "macaddr": "20:4C:03:2F:F9:54",
                     "name": "lobby-ap", "ip_address": "10.0.0.5",
                     "site": "Nashville-HQ", "group_name": "campus"}]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/monitoring/v1/switches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "switches": [{"serial": "CN200BBB01", "macaddr": "11:22:33:44:55:66",
                          "name": "core-sw", "ip_address": "10.0.0.1"}]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/monitoring/v1/gateways"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"gateways": []})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn empty_site_table_resolves_by_substring_after_one_listing() {
    let server = MockServer::start().await;
    mount_sites(&server).await;

    let h = harness(&server, "valid-token").await;
    let resolution = h.cache.resolve(CacheKind::Site, "Nashville", true).await.unwrap();

    assert_eq!(resolution.found().map(CacheEntry::name), Some("Nashville-HQ"));
    // One listing was enough; the next resolve is served from memory.
    let again = h.cache.resolve(CacheKind::Site, "Memphis", false).await.unwrap();
    assert_eq!(again.found().map(CacheEntry::name), Some("Memphis-Branch"));
}

#[tokio::test]
async fn punctuated_mac_resolves_against_fanned_out_inventory() {
    let server = MockServer::start().await;
    mount_devices(&server).await;

    let h = harness(&server, "valid-token").await;
    let resolution = h.cache.resolve(CacheKind::Device, "20:4c:03:2f:f9:54", true).await.unwrap();

    assert_eq!(
        resolution.found().map(CacheEntry::canonical_key),
        Some("CN100AAA01".to_string())
    );
}

#[tokio::test]
async fn refreshed_tables_persist_for_the_next_cache_instance() {
    let server = MockServer::start().await;
    mount_sites(&server).await;

    let h = harness(&server, "valid-token").await;
    h.cache.resolve(CacheKind::Site, "Nashville", true).await.unwrap();

    // Second instance over the same store resolves offline.
    struct NoSource;
    #[async_trait::async_trait]
    impl centralkit_core::InventorySource for NoSource {
        async fn list(
            &self,
            _kind: CacheKind,
        ) -> centralkit_domain::Result<Vec<CacheEntry>> {
            panic!("offline cache must not list");
        }
    }

    let offline = IdentifierCache::new(h.store.clone(), Arc::new(NoSource));
    offline.hydrate().await.unwrap();
    let resolution = offline.resolve(CacheKind::Site, "Nashville", false).await.unwrap();
    assert_eq!(resolution.found().map(CacheEntry::name), Some("Nashville-HQ"));
}

#[tokio::test]
async fn stale_token_is_refreshed_mid_listing() {
    let server = MockServer::start().await;

    // Stale bearer gets the invalid_token 401, fresh bearer gets the data.
    Mock::given(method("GET"))
        .and(path("/central/v2/sites"))
        .and(bearer_token("stale-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_token"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/central/v2/sites"))
        .and(bearer_token("minted-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "sites": [{"site_id": 1, "site_name": "Nashville-HQ"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "minted-token",
            "refresh_token": "refresh-2",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "stale-token").await;
    let resolution = h.cache.resolve(CacheKind::Site, "Nashville-HQ", true).await.unwrap();

    assert_eq!(resolution.found().map(CacheEntry::name), Some("Nashville-HQ"));
}

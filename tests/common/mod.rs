use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dev2gis_client::{
    ApiClient, ClientConfig, CredentialStore, MemoryCredentialStore, Navigator, UploadFile,
};
use dev2gis_client::types::TokenPair;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::MockServer;

/// Navigator that counts login redirects
#[derive(Default)]
pub struct CountingNavigator {
    redirects: AtomicUsize,
}

impl CountingNavigator {
    pub fn count(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Navigator for CountingNavigator {
    fn redirect_to_login(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct TestClient {
    pub client: ApiClient,
    pub store: Arc<MemoryCredentialStore>,
    pub navigator: Arc<CountingNavigator>,
}

/// Client pointed at the mock server with an empty memory store
pub fn test_client(server: &MockServer) -> TestClient {
    let store = Arc::new(MemoryCredentialStore::new());
    let navigator = Arc::new(CountingNavigator::default());
    let client = ApiClient::builder(ClientConfig::new(server.uri()))
        .store(store.clone())
        .navigator(navigator.clone())
        .build()
        .unwrap();

    TestClient {
        client,
        store,
        navigator,
    }
}

/// Seed the store with a token pair
#[allow(dead_code)]
pub fn seed_tokens(store: &MemoryCredentialStore, access: &str, refresh: &str) {
    store
        .store_tokens(&TokenPair {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            expires_at: None,
        })
        .unwrap();
}

/// Unsigned token for the given user expiring `expires_in` seconds from now
#[allow(dead_code)]
pub fn make_token(user_id: &str, expires_in: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = serde_json::json!({
        "user_id": user_id,
        "email": format!("{user_id}@example.com"),
        "name": "Test Pilot",
        "role": "user",
        "iat": now,
        "exp": now + expires_in,
    });
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.sig")
}

#[allow(dead_code)]
pub fn jpegs(count: usize) -> Vec<UploadFile> {
    (0..count)
        .map(|i| UploadFile::new(format!("DJI_{i:04}.JPG"), vec![0xFF, 0xD8, 0xFF, 0xE0]))
        .collect()
}

/// Bodies of all requests the server saw on `path`
#[allow(dead_code)]
pub async fn bodies_for(server: &MockServer, path: &str) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == path)
        .map(|request| String::from_utf8_lossy(&request.body).into_owned())
        .collect()
}

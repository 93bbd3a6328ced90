//! Authenticated API client with automatic token refresh

use crate::config::ClientConfig;
use crate::error::{extract_error_message, ClientError, RefreshError, Result};
use crate::session::{Navigator, NoopNavigator};
use crate::singleflight::SingleFlight;
use crate::token;
use crate::token_store::{CredentialStore, MemoryCredentialStore};
use crate::types::{RefreshRequest, TokenPair, UploadFile, UserInfo};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const REFRESH_PATH: &str = "/auth/refresh";

/// Endpoints whose 401 means bad credentials rather than an expired session
const AUTH_ENDPOINTS: [&str; 3] = ["/auth/login", "/auth/register", REFRESH_PATH];

/// Whether a 401 from `url` must never trigger a refresh
pub fn is_auth_endpoint(url: &str) -> bool {
    AUTH_ENDPOINTS.iter().any(|endpoint| url.contains(endpoint))
}

/// One part of a multipart body
#[derive(Debug, Clone)]
pub enum FormPart {
    Text { name: String, value: String },
    File { name: String, file: UploadFile },
}

/// Multipart body that can be rebuilt for a retry
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(mut self, name: impl Into<String>, file: UploadFile) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file,
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// Number of parts with the given field name
    pub fn field_count(&self, field: &str) -> usize {
        self.parts
            .iter()
            .filter(|part| match part {
                FormPart::Text { name, .. } | FormPart::File { name, .. } => name == field,
            })
            .count()
    }

    fn to_form(&self) -> Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File { name, file } => {
                    let part = reqwest::multipart::Part::bytes(file.data.to_vec())
                        .file_name(file.name.clone())
                        .mime_str(file.mime())
                        .map_err(|e| {
                            ClientError::Configuration(format!(
                                "invalid content type for {}: {e}",
                                file.name
                            ))
                        })?;
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}

/// Request body: nothing, JSON, or multipart form data
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(MultipartForm),
}

impl RequestBody {
    /// Serialize any value as a JSON body
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(RequestBody::Json(serde_json::to_value(value)?))
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart(_))
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<MultipartForm> for RequestBody {
    fn from(form: MultipartForm) -> Self {
        RequestBody::Multipart(form)
    }
}

impl From<()> for RequestBody {
    fn from(_: ()) -> Self {
        RequestBody::Empty
    }
}

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Outcome of a single send
struct Sent {
    status: StatusCode,
    body: Value,
    /// Access token attached by the client, if any
    token: Option<String>,
}

struct ClientInner {
    config: ClientConfig,
    http: Client,
    store: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
    /// Only one refresh runs at a time; concurrent 401s share its result
    refresh_flight: SingleFlight<String, RefreshError>,
}

/// Client for the dev2gis API
///
/// Attaches the stored bearer token, refreshes it once on a 401 and
/// normalizes every failure into [`ClientError`]. Cheap to clone; clones
/// share credentials and the refresh slot.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

/// Builder for [`ApiClient`]
pub struct ApiClientBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn CredentialStore>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl ApiClientBuilder {
    /// Use a custom credential store (defaults to memory)
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a custom navigator (defaults to no-op)
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn build(self) -> Result<ApiClient> {
        if self.config.base_url.is_empty() {
            return Err(ClientError::Configuration("base_url is required".into()));
        }

        let mut http = Client::builder().user_agent(self.config.user_agent.clone());
        if let Some(timeout) = self.config.timeout {
            http = http.timeout(timeout);
        }
        let http = http
            .build()
            .map_err(|e| ClientError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                config: self.config,
                http,
                store: self
                    .store
                    .unwrap_or_else(|| Arc::new(MemoryCredentialStore::new())),
                navigator: self.navigator.unwrap_or_else(|| Arc::new(NoopNavigator)),
                refresh_flight: SingleFlight::new(),
            }),
        })
    }
}

impl ApiClient {
    /// Create a client with in-memory credentials and no navigation
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder {
            config,
            store: None,
            navigator: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn base_url(&self) -> &str {
        &self.inner.config.base_url
    }

    /// Get the credential store (for advanced usage)
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.store
    }

    pub(crate) fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.inner.navigator
    }

    /// Whether a refresh is currently underway
    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh_flight.is_in_flight()
    }

    /// A usable access token is stored
    pub fn is_authenticated(&self) -> bool {
        self.inner
            .store
            .access_token()
            .is_some_and(|t| !token::is_token_expired(&t))
    }

    /// User encoded in the stored access token.
    ///
    /// An expired or undecodable token clears the stored credentials.
    pub fn current_user(&self) -> Option<UserInfo> {
        let access_token = self.inner.store.access_token()?;
        let user = token::user_from_token(&access_token)
            .filter(|_| !token::is_token_expired(&access_token));

        if user.is_none() {
            debug!("Stored access token is expired or invalid, clearing credentials");
            if let Err(e) = self.inner.store.clear() {
                warn!(error = %e, "Failed to clear stored credentials");
            }
        }
        user
    }

    /// Perform a request, refreshing and retrying once on an expired session
    pub async fn request(&self, url: &str, options: RequestOptions) -> Result<Value> {
        self.request_with_retry(url, options, 0).await
    }

    /// Like [`ApiClient::request`] with an explicit retry count.
    ///
    /// Only a first attempt (`retry_count == 0`) may trigger a refresh.
    pub async fn request_with_retry(
        &self,
        url: &str,
        options: RequestOptions,
        retry_count: u32,
    ) -> Result<Value> {
        self.execute(url, &options, retry_count)
            .await
            .map(|(_, body)| body)
    }

    /// Perform a request and deserialize the response body
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let (status, body) = self.execute(url, &options, 0).await?;
        serde_json::from_value(body).map_err(|e| {
            warn!(url = %url, status = %status, error = %e, "Unexpected response shape");
            ClientError::MalformedResponse {
                status: status.as_u16(),
                message: e.to_string(),
            }
        })
    }

    pub async fn get(&self, url: &str) -> Result<Value> {
        self.request(url, RequestOptions::new(Method::GET)).await
    }

    pub async fn post(&self, url: &str, body: impl Into<RequestBody>) -> Result<Value> {
        self.request(url, RequestOptions::new(Method::POST).body(body))
            .await
    }

    pub async fn put(&self, url: &str, body: impl Into<RequestBody>) -> Result<Value> {
        self.request(url, RequestOptions::new(Method::PUT).body(body))
            .await
    }

    pub async fn delete(&self, url: &str) -> Result<Value> {
        self.request(url, RequestOptions::new(Method::DELETE)).await
    }

    async fn execute(
        &self,
        url: &str,
        options: &RequestOptions,
        mut retry_count: u32,
    ) -> Result<(StatusCode, Value)> {
        loop {
            let sent = self.send_once(url, options, retry_count).await?;
            if sent.status.is_success() {
                return Ok((sent.status, sent.body));
            }

            let status = sent.status.as_u16();
            if sent.status == StatusCode::UNAUTHORIZED && !is_auth_endpoint(url) {
                if retry_count > 0 {
                    warn!(url = %url, "Request rejected again after token refresh");
                    return Err(ClientError::SessionExpired);
                }

                if let Err(e) = self.recover_session(sent.token.as_deref()).await {
                    warn!(url = %url, error = %e, "Could not recover session");
                    return Err(ClientError::SessionExpired);
                }
                retry_count += 1;
                continue;
            }

            let err = ClientError::from_response(status, &sent.body);
            debug!(url = %url, status = %status, error = %err, "Request failed");
            return Err(err);
        }
    }

    async fn send_once(&self, url: &str, options: &RequestOptions, attempt: u32) -> Result<Sent> {
        let full_url = self.inner.config.resolve(url);

        let mut headers = options.headers.clone();
        let token = if headers.contains_key(AUTHORIZATION) {
            None
        } else {
            self.inner.store.access_token()
        };
        if let Some(token) = &token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ClientError::Storage("stored access token is not a valid header value".into())
            })?;
            headers.insert(AUTHORIZATION, value);
        }
        if !options.body.is_multipart() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let mut builder = self
            .inner
            .http
            .request(options.method.clone(), &full_url)
            .headers(headers);
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        builder = match &options.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(serde_json::to_vec(value)?),
            RequestBody::Multipart(form) => builder.multipart(form.to_form()?),
        };

        debug!(method = %options.method, url = %full_url, attempt, "Sending request");

        let response = builder.send().await.map_err(|e| {
            warn!(url = %full_url, error = %e, "Request did not complete");
            ClientError::Network(e.to_string())
        })?;

        let status = response.status();
        let declares_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("json"));
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        // Error bodies are inspected for a message whatever they declare
        let body = if declares_json || !status.is_success() {
            serde_json::from_str(&text).unwrap_or_else(|_| json!({}))
        } else {
            json!({})
        };

        Ok(Sent {
            status,
            body,
            token,
        })
    }

    // A 401 for a token that has since been replaced needs no new refresh
    async fn recover_session(&self, sent_token: Option<&str>) -> std::result::Result<String, RefreshError> {
        if let (Some(sent), Some(current)) = (sent_token, self.inner.store.access_token()) {
            if sent != current {
                debug!("Access token was already refreshed, retrying with stored token");
                return Ok(current);
            }
        }
        self.refresh_access_token().await
    }

    /// Exchange the stored refresh token for a new token pair.
    ///
    /// Concurrent callers share one refresh call. On failure every stored
    /// credential is cleared and the navigator is sent to the login page.
    pub async fn refresh_access_token(&self) -> std::result::Result<String, RefreshError> {
        let inner = Arc::clone(&self.inner);
        let (result, leader) = self
            .inner
            .refresh_flight
            .work(move || perform_refresh(inner))
            .await;

        if !leader {
            debug!(success = result.is_ok(), "Joined in-flight token refresh");
        }
        result
    }
}

async fn perform_refresh(inner: Arc<ClientInner>) -> std::result::Result<String, RefreshError> {
    let outcome = exchange_refresh_token(&inner).await;

    match &outcome {
        Ok(_) => info!("Access token refreshed successfully"),
        Err(e) => {
            warn!(error = %e, "Token refresh failed, clearing stored credentials");
            if let Err(clear_err) = inner.store.clear() {
                warn!(error = %clear_err, "Failed to clear stored credentials");
            }
            inner.navigator.redirect_to_login();
        }
    }

    outcome
}

async fn exchange_refresh_token(inner: &ClientInner) -> std::result::Result<String, RefreshError> {
    let refresh_token = inner
        .store
        .refresh_token()
        .ok_or(RefreshError::NoRefreshToken)?;

    let url = inner.config.resolve(REFRESH_PATH);
    let response = inner
        .http
        .post(&url)
        .json(&RefreshRequest { refresh_token })
        .send()
        .await
        .map_err(|e| RefreshError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body: Value = response.json().await.unwrap_or_else(|_| json!({}));
        return Err(RefreshError::Rejected {
            status: status.as_u16(),
            message: extract_error_message(&body, status.as_u16()),
        });
    }

    let tokens: TokenPair = response
        .json()
        .await
        .map_err(|e| RefreshError::Malformed(e.to_string()))?;
    if tokens.access_token.is_empty() {
        return Err(RefreshError::Malformed("empty access token".into()));
    }

    inner
        .store
        .store_tokens(&tokens)
        .map_err(|e| RefreshError::Storage(e.to_string()))?;

    Ok(tokens.access_token)
}

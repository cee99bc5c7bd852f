//! Local stand-in for the Meteomatics token/data endpoints and the Blob REST API

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use meteomatics_ingest::IngestConfig;
use serde_json::json;
use sha2::Sha256;
use tokio::net::TcpListener;

pub const USERNAME: &str = "user";
pub const PASSWORD: &str = "pass";
/// base64("user:pass")
const EXPECTED_BASIC: &str = "Basic dXNlcjpwYXNz";
pub const ACCOUNT: &str = "devstoreaccount1";
pub const LOCKED_CONTAINER: &str = "locked";
/// base64("weatherdata-signing-key-0123456789")
pub const ACCOUNT_KEY: &str = "d2VhdGhlcmRhdGEtc2lnbmluZy1rZXktMDEyMzQ1Njc4OQ==";

#[derive(Default)]
pub struct ProviderState {
    pub token_calls: AtomicUsize,
    pub data_calls: AtomicUsize,
    pub blob_puts: AtomicUsize,
    /// Blob requests that carried a valid SharedKey signature
    pub signed_requests: AtomicUsize,
    pub reject_all_tokens: AtomicBool,
    pub reject_first_token: AtomicBool,
    pub failing_point: Mutex<Option<String>>,
    /// point -> body served for it
    pub responses: Mutex<HashMap<String, String>>,
    /// (range, parameters) per point
    pub requests: Mutex<HashMap<String, (String, String)>>,
    pub tokens_seen: Mutex<Vec<String>>,
    /// (container, blob) -> content
    pub blobs: Mutex<HashMap<(String, String), String>>,
}

impl ProviderState {
    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn data_calls(&self) -> usize {
        self.data_calls.load(Ordering::SeqCst)
    }

    pub fn blob_puts(&self) -> usize {
        self.blob_puts.load(Ordering::SeqCst)
    }

    pub fn signed_requests(&self) -> usize {
        self.signed_requests.load(Ordering::SeqCst)
    }

    pub fn fail_point(&self, point: &str) {
        *self.failing_point.lock().unwrap() = Some(point.to_string());
    }

    pub fn response_for(&self, point: &str) -> Option<String> {
        self.responses.lock().unwrap().get(point).cloned()
    }

    pub fn stored_blob(&self, container: &str, blob: &str) -> Option<String> {
        self.blobs
            .lock()
            .unwrap()
            .get(&(container.to_string(), blob.to_string()))
            .cloned()
    }
}

pub struct FakeMeteomatics {
    pub addr: SocketAddr,
    pub state: Arc<ProviderState>,
}

impl FakeMeteomatics {
    pub async fn start() -> Self {
        let state = Arc::new(ProviderState::default());
        let app = Router::new()
            .route("/api/v1/token", get(token))
            .route("/{range}/{parameters}/{point}/json", get(forecast))
            .route(
                "/devstoreaccount1/{container}/{blob}",
                get(get_blob).put(put_blob),
            )
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn connection_string(&self) -> String {
        format!(
            "BlobEndpoint={}/{ACCOUNT};SharedAccessSignature=sv=2021-08-06&ss=b&sig=test",
            self.base_url()
        )
    }

    /// Account-key connection string; `key` is base64
    pub fn account_key_connection_string(&self, key: &str) -> String {
        format!(
            "DefaultEndpointsProtocol=http;AccountName={ACCOUNT};AccountKey={key};BlobEndpoint={}/{ACCOUNT}",
            self.base_url()
        )
    }

    /// Configuration pointing every endpoint at this server, with valid secrets
    pub fn config(&self) -> IngestConfig {
        let mut config = IngestConfig::default();
        config.provider.token_url = format!("{}/api/v1/token", self.base_url());
        config.provider.api_base_url = self.base_url();
        config.provider.timeout_seconds = 5;
        config.provider.username = Some(USERNAME.to_string());
        config.provider.password = Some(PASSWORD.to_string());
        config.storage.connection_string = Some(self.connection_string());
        config.storage.timeout_seconds = 5;
        config
    }
}

pub fn fixed_clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 6, 0, 0).unwrap()
}

async fn token(State(state): State<Arc<ProviderState>>, headers: HeaderMap) -> Response {
    let call = state.token_calls.fetch_add(1, Ordering::SeqCst);

    let authorized = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some(EXPECTED_BASIC);
    let rejected = state.reject_all_tokens.load(Ordering::SeqCst)
        || (call == 0 && state.reject_first_token.load(Ordering::SeqCst));

    if !authorized || rejected {
        return (StatusCode::UNAUTHORIZED, "invalid credentials").into_response();
    }

    Json(json!({ "access_token": format!("token-{call}"), "token_type": "bearer" })).into_response()
}

async fn forecast(
    State(state): State<Arc<ProviderState>>,
    Path((range, parameters, point)): Path<(String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.data_calls.fetch_add(1, Ordering::SeqCst);

    let Some(token) = query.get("access_token").filter(|t| t.starts_with("token-")) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    state.tokens_seen.lock().unwrap().push(token.clone());

    if state.failing_point.lock().unwrap().as_deref() == Some(point.as_str()) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream failure").into_response();
    }

    let body = json!({
        "version": "3.0",
        "status": "OK",
        "range": range,
        "parameters": parameters,
        "point": point,
        "data": []
    })
    .to_string();

    state.responses.lock().unwrap().insert(point.clone(), body.clone());
    state
        .requests
        .lock()
        .unwrap()
        .insert(point, (range, parameters));

    ([(CONTENT_TYPE, "application/json")], body).into_response()
}

fn has_signature(query: &HashMap<String, String>) -> bool {
    query.get("sig").is_some_and(|sig| sig == "test")
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Recompute the SharedKey signature the way the Blob service does
fn expected_shared_key(method: &Method, uri: &Uri, headers: &HeaderMap) -> String {
    let content_length = match header(headers, "content-length") {
        "0" => "",
        other => other,
    };

    let mut ms_headers: Vec<(String, String)> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-ms-"))
        .map(|(name, value)| (name.as_str().to_string(), value.to_str().unwrap().to_string()))
        .collect();
    ms_headers.sort();
    let canonical_headers: String = ms_headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();

    let string_to_sign = format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}/{}{}",
        method.as_str(),
        content_length,
        header(headers, "content-type"),
        canonical_headers,
        ACCOUNT,
        uri.path()
    );

    let mut mac = Hmac::<Sha256>::new_from_slice(&STANDARD.decode(ACCOUNT_KEY).unwrap()).unwrap();
    mac.update(string_to_sign.as_bytes());
    format!("SharedKey {ACCOUNT}:{}", STANDARD.encode(mac.finalize().into_bytes()))
}

/// SAS query or a valid SharedKey header; `Err` carries the error code to return
fn check_blob_auth(
    state: &ProviderState,
    method: &Method,
    uri: &Uri,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
) -> Result<(), &'static str> {
    if has_signature(query) {
        return Ok(());
    }

    let authorization = header(headers, "authorization");
    if authorization.is_empty() {
        return Err("AuthorizationFailure");
    }
    if header(headers, "x-ms-date").is_empty()
        || authorization != expected_shared_key(method, uri, headers)
    {
        return Err("AuthenticationFailed");
    }

    state.signed_requests.fetch_add(1, Ordering::SeqCst);
    Ok(())
}

fn forbidden(code: &'static str) -> Response {
    (StatusCode::FORBIDDEN, [("x-ms-error-code", code)]).into_response()
}

async fn put_blob(
    State(state): State<Arc<ProviderState>>,
    Path((container, blob)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.blob_puts.fetch_add(1, Ordering::SeqCst);

    if let Err(code) = check_blob_auth(&state, &Method::PUT, &uri, &query, &headers) {
        return forbidden(code);
    }
    if container == LOCKED_CONTAINER {
        return forbidden("AuthorizationFailure");
    }
    if header(&headers, "x-ms-blob-type") != "BlockBlob" {
        return (StatusCode::BAD_REQUEST, [("x-ms-error-code", "MissingRequiredHeader")]).into_response();
    }

    state.blobs.lock().unwrap().insert((container, blob), body);
    StatusCode::CREATED.into_response()
}

async fn get_blob(
    State(state): State<Arc<ProviderState>>,
    Path((container, blob)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if let Err(code) = check_blob_auth(&state, &Method::GET, &uri, &query, &headers) {
        return forbidden(code);
    }

    match state.blobs.lock().unwrap().get(&(container, blob)) {
        Some(content) => content.clone().into_response(),
        None => (StatusCode::NOT_FOUND, [("x-ms-error-code", "BlobNotFound")]).into_response(),
    }
}

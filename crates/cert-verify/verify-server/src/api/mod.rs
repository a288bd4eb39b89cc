//! # `api`
//!
//! HTTP surface of the verifier.
//!
//! ## `POST /v1/certs/verify`
//!
//! ```json
//! {
//!     "request": {
//!         "certificate": { "id": "https://cdn.example.com/e-credentials/2024/a.json" }
//!     }
//! }
//! ```
//!
//! `certificate` carries either the document itself under `data` or a
//! content-store identifier under `id`; `data` wins when both are sent.
//! `request.operation` is optional and defaults to `verifyCertificate`.
//!
//! #### Success Response (`200`)
//!
//! ```json
//! {
//!     "id": "api.cert.verify",
//!     "ver": "v1",
//!     "ts": "2024-06-01T12:00:00.000Z",
//!     "params": { "msgid": "5b0c...", "status": "successful" },
//!     "responseCode": "OK",
//!     "result": { "response": { "valid": false, "errorCount": 1, "messages": ["..."] } }
//! }
//! ```
//!
//! #### Error Response (`400` / `500`)
//!
//! ```json
//! {
//!     "code": "CONTENT_FETCH_ERROR",
//!     "message": "failed to fetch certificate `a.json`: object `2024/a.json` not found",
//!     "responseCode": "CLIENT_ERROR"
//! }
//! ```
//!
//! ## `GET /health`
//!
//! Always `ok` while the process is up.
//!
//! ## `GET /ready`
//!
//! `200` while every worker mailbox is open, `503` otherwise.

pub mod context;

use axum::{
    Json,
    Router,
    body::Bytes,
    extract::State,
    http::{
        HeaderMap,
        StatusCode,
    },
    response::{
        IntoResponse,
        Response as HttpResponse,
    },
    routing::{
        get,
        post,
    },
};
use cert_verify_core::{
    CertificateRef,
    ErrorCode,
    ErrorResponse,
    Operation,
    VerificationRequest,
};
use serde::Deserialize;

use crate::actor::VerifierPool;

pub use context::{
    context_from_headers,
    forwarded_headers,
};

pub const VERIFY_PATH: &str = "/v1/certs/verify";

#[derive(Clone)]
struct AppState {
    pool: VerifierPool,
}

#[derive(Debug, Deserialize)]
struct VerifyBody {
    request: VerifyParams,
}

#[derive(Debug, Deserialize)]
struct VerifyParams {
    #[serde(default)]
    operation: Option<String>,
    certificate: CertificateRef,
}

pub fn build_router(pool: VerifierPool) -> Router {
    Router::new()
        .route(VERIFY_PATH, post(verify_certificate))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(AppState { pool })
}

pub async fn health() -> &'static str {
    "ok"
}

async fn ready(State(state): State<AppState>) -> StatusCode {
    if state.pool.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn verify_certificate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    let request = match parse_request(&headers, &body) {
        Ok(request) => request,
        Err(err) => {
            tracing::debug!(target: "cert_verify::api", error = %err, "Rejected malformed request");
            return error_response(&err);
        }
    };

    match state.pool.ask(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => error_response(&err),
    }
}

/// Turns the raw body and headers into a request for the pool. Anything that
/// does not parse is an `INVALID_REQUEST` and never reaches a worker.
pub fn parse_request(headers: &HeaderMap, body: &[u8]) -> Result<VerificationRequest, ErrorResponse> {
    let body: VerifyBody = serde_json::from_slice(body).map_err(|err| {
        ErrorResponse::client(ErrorCode::InvalidRequest, format!("invalid request body: {err}"))
    })?;

    let operation = body
        .request
        .operation
        .unwrap_or_else(|| Operation::VERIFY_CERTIFICATE.to_string());

    Ok(VerificationRequest {
        context: context_from_headers(headers, &operation),
        operation,
        certificate: body.request.certificate,
        headers: forwarded_headers(headers),
    })
}

fn error_response(err: &ErrorResponse) -> HttpResponse {
    let status = StatusCode::from_u16(err.response_code.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err)).into_response()
}

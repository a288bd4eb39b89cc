use std::fmt;

use chrono::{
    SecondsFormat,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::verdict::Verdict;

pub const API_ID: &str = "api.cert.verify";
pub const API_VERSION: &str = "v1";

/// What the verifier sends back for every request: a verdict-bearing
/// envelope or a structured error, never both and never neither.
pub type Reply = Result<Response, ErrorResponse>;

/// Coarse outcome class, mapped to an HTTP status by the API layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCode {
    Ok,
    ClientError,
    ServerError,
}

impl ResponseCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::ClientError => 400,
            Self::ServerError => 500,
        }
    }
}

/// Stable error codes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidOperation,
    InvalidRequest,
    ContentFetchError,
    InvalidCertificate,
    UnsupportedVerificationType,
    SignatureUnreachable,
    SignatureVerificationFailed,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidOperation => "INVALID_OPERATION",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::ContentFetchError => "CONTENT_FETCH_ERROR",
            Self::InvalidCertificate => "INVALID_CERTIFICATE",
            Self::UnsupportedVerificationType => "UNSUPPORTED_VERIFICATION_TYPE",
            Self::SignatureUnreachable => "SIGNATURE_UNREACHABLE",
            Self::SignatureVerificationFailed => "SIGNATURE_VERIFICATION_FAILED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{code}: {message}")]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
    pub response_code: ResponseCode,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>, response_code: ResponseCode) -> Self {
        Self {
            code,
            message: message.into(),
            response_code,
        }
    }

    pub fn client(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message, ResponseCode::ClientError)
    }

    pub fn server(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message, ResponseCode::ServerError)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::server(ErrorCode::InternalError, message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub response: Verdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseParams {
    pub msgid: String,
    pub status: String,
}

/// Success envelope: `{ id, ver, ts, params, responseCode, result: { response } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: String,
    pub ver: String,
    pub ts: String,
    pub params: ResponseParams,
    pub response_code: ResponseCode,
    pub result: VerifyResult,
}

impl Response {
    /// Wraps a verdict; `msgid` echoes the request's trace id.
    pub fn success(msgid: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            id: API_ID.to_string(),
            ver: API_VERSION.to_string(),
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            params: ResponseParams {
                msgid: msgid.into(),
                status: "successful".to_string(),
            },
            response_code: ResponseCode::Ok,
            result: VerifyResult { response: verdict },
        }
    }

    pub fn verdict(&self) -> &Verdict {
        &self.result.response
    }
}

use std::{
    collections::BTreeMap,
    fmt,
};

use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Map,
    Value,
};

/// Header carrying the caller's message id, recorded for trace correlation.
pub const REQUEST_MESSAGE_ID: &str = "msgid";

/// Operations the verifier understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    VerifyCertificate,
}

impl Operation {
    pub const VERIFY_CERTIFICATE: &'static str = "verifyCertificate";

    /// Case-insensitive lookup; unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case(Self::VERIFY_CERTIFICATE) {
            Some(Self::VerifyCertificate)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VerifyCertificate => Self::VERIFY_CERTIFICATE,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the certificate body comes from.
///
/// On the wire this is `{ "data"?: object, "id"?: string }`; `data` wins when
/// both are given and an empty reference is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CertificateParam", into = "CertificateParam")]
pub enum CertificateRef {
    Inline(Map<String, Value>),
    Id(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CertificateParam {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

impl TryFrom<CertificateParam> for CertificateRef {
    type Error = String;

    fn try_from(param: CertificateParam) -> Result<Self, Self::Error> {
        match (param.data, param.id) {
            (Some(data), _) => Ok(Self::Inline(data)),
            (None, Some(id)) if !id.trim().is_empty() => Ok(Self::Id(id)),
            _ => Err("certificate must contain either `data` or a non-empty `id`".to_string()),
        }
    }
}

impl From<CertificateRef> for CertificateParam {
    fn from(reference: CertificateRef) -> Self {
        match reference {
            CertificateRef::Inline(data) => {
                Self {
                    data: Some(data),
                    id: None,
                }
            }
            CertificateRef::Id(id) => {
                Self {
                    data: None,
                    id: Some(id),
                }
            }
        }
    }
}

/// Per-request metadata threaded through every call for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub trace_id: String,
    pub user_id: Option<String>,
    pub device_id: Option<String>,
    pub session_id: Option<String>,
    pub app_id: Option<String>,
    pub app_version: Option<String>,
    pub debug_enabled: bool,
    pub operation: String,
}

impl RequestContext {
    pub fn new(trace_id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            operation: operation.into(),
            ..Default::default()
        }
    }
}

/// One unit of work for the verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub operation: String,
    pub certificate: CertificateRef,
    pub context: RequestContext,
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
}

impl VerificationRequest {
    /// A `verifyCertificate` request with no forwarded headers.
    pub fn verify(certificate: CertificateRef, context: RequestContext) -> Self {
        Self {
            operation: Operation::VERIFY_CERTIFICATE.to_string(),
            certificate,
            context,
            headers: BTreeMap::new(),
        }
    }

    /// First value of the `msgid` header, if the caller sent one.
    pub fn message_id(&self) -> Option<&str> {
        self.headers
            .get(REQUEST_MESSAGE_ID)
            .and_then(|ids| ids.first())
            .map(String::as_str)
    }
}

use cert_verify_core::{
    CertificateError,
    ErrorCode,
    ErrorResponse,
    ResponseCode,
};
use thiserror::Error;

use crate::store::StoreError;

pub type Result<T, E = VerifyError> = std::result::Result<T, E>;

/// Every way a verification request can fail. An invalid signature is not
/// here: it is a finding in the verdict.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid operation name: {0}")]
    InvalidOperation(String),
    #[error("failed to fetch certificate `{id}`: {source}")]
    ContentFetch {
        id: String,
        #[source]
        source: StoreError,
    },
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),
    #[error("unsupported verification type `{0}`")]
    UnsupportedVerificationType(String),
    #[error("signature service unreachable: {0}")]
    SignatureUnreachable(String),
    #[error("signature service failed to verify: {0}")]
    SignatureVerificationFailed(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl VerifyError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidOperation(_) => ErrorCode::InvalidOperation,
            Self::ContentFetch { .. } => ErrorCode::ContentFetchError,
            Self::InvalidCertificate(_) => ErrorCode::InvalidCertificate,
            Self::UnsupportedVerificationType(_) => ErrorCode::UnsupportedVerificationType,
            Self::SignatureUnreachable(_) => ErrorCode::SignatureUnreachable,
            Self::SignatureVerificationFailed(_) => ErrorCode::SignatureVerificationFailed,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn response_code(&self) -> ResponseCode {
        match self {
            Self::InvalidOperation(_)
            | Self::InvalidCertificate(_)
            | Self::UnsupportedVerificationType(_) => ResponseCode::ClientError,
            Self::ContentFetch { source, .. } if source.is_client_error() => {
                ResponseCode::ClientError
            }
            Self::ContentFetch { .. }
            | Self::SignatureUnreachable(_)
            | Self::SignatureVerificationFailed(_)
            | Self::Internal(_) => ResponseCode::ServerError,
        }
    }
}

impl From<CertificateError> for VerifyError {
    fn from(err: CertificateError) -> Self {
        Self::InvalidCertificate(err.to_string())
    }
}

impl From<&VerifyError> for ErrorResponse {
    fn from(err: &VerifyError) -> Self {
        ErrorResponse::new(err.code(), err.to_string(), err.response_code())
    }
}

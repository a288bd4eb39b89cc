//! Shared data model of the certificate verifier: requests, the typed
//! certificate view, verdicts and reply envelopes.

pub mod certificate;
pub mod request;
pub mod response;
pub mod verdict;

pub use certificate::{
    Certificate,
    CertificateError,
    SignatureBlock,
    VerificationKind,
};
pub use request::{
    CertificateRef,
    Operation,
    REQUEST_MESSAGE_ID,
    RequestContext,
    VerificationRequest,
};
pub use response::{
    ErrorCode,
    ErrorResponse,
    Reply,
    Response,
    ResponseCode,
    ResponseParams,
    VerifyResult,
};
pub use verdict::Verdict;

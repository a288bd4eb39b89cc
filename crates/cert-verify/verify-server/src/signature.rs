//! Signature re-verification for signed badges.
//!
//! The cryptography lives in an external signing service. This module builds
//! the canonical payload, asks the service, and keeps "could not check" apart
//! from "checked and failed".

use std::{
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use cert_verify_core::{
    Certificate,
    RequestContext,
};
use reqwest::Client;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::value::RawValue;
use url::Url;

use crate::error::{
    Result,
    VerifyError,
};

pub const SIGNATURE_FAILED_MESSAGE: &str =
    "ERROR: Assertion.signature - certificate is not valid, signature verification failed";

/// Everything the signing service needs to re-check one signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureCheck {
    /// Canonical JSON of the certificate without its signature block.
    pub payload: String,
    pub signature_value: String,
    pub endpoint: Url,
    /// Claimed signer identity, `verification.creator`.
    pub creator: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("{0}")]
    Unreachable(String),
    #[error("{0}")]
    Service(String),
}

impl From<SignatureError> for VerifyError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::Unreachable(reason) => Self::SignatureUnreachable(reason),
            SignatureError::Service(reason) => Self::SignatureVerificationFailed(reason),
        }
    }
}

/// External capability answering whether a signature matches its payload.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify(&self, check: &SignatureCheck) -> Result<bool, SignatureError>;
}

/// Key id the signing service knows the creator's key by: the last path
/// segment of `creator` up to the first `_`.
pub fn key_id_from_creator(creator: &str) -> &str {
    let last = creator
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(creator);
    last.split('_').next().unwrap_or(last)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyBody<'a> {
    claim: &'a RawValue,
    signature_value: &'a str,
    key_id: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VerifyOutcome {
    Bare(bool),
    Wrapped { verified: bool },
}

/// Talks to the signing service over HTTP: `POST {endpoint}/verify`.
#[derive(Debug, Clone)]
pub struct HttpSignatureVerifier {
    client: Client,
}

impl HttpSignatureVerifier {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl SignatureVerifier for HttpSignatureVerifier {
    async fn verify(&self, check: &SignatureCheck) -> Result<bool, SignatureError> {
        let mut url = check.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| SignatureError::Service(format!("endpoint {} cannot hold a path", check.endpoint)))?
            .pop_if_empty()
            .push("verify");

        let claim = RawValue::from_string(check.payload.clone())
            .map_err(|err| SignatureError::Service(format!("payload is not JSON: {err}")))?;
        let body = VerifyBody {
            claim: &claim,
            signature_value: &check.signature_value,
            key_id: key_id_from_creator(&check.creator),
        };

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_connect() || err.is_timeout() {
                    SignatureError::Unreachable(err.to_string())
                } else {
                    SignatureError::Service(err.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(SignatureError::Service(format!(
                "signing service answered {}",
                response.status()
            )));
        }

        match response.json::<VerifyOutcome>().await {
            Ok(VerifyOutcome::Bare(verified) | VerifyOutcome::Wrapped { verified }) => Ok(verified),
            Err(err) => {
                Err(SignatureError::Service(format!(
                    "unreadable signing service response: {err}"
                )))
            }
        }
    }
}

/// Signature step of the verification pipeline.
#[derive(Clone)]
pub struct SignatureValidator {
    verifier: Arc<dyn SignatureVerifier>,
    endpoint: Url,
    timeout: Duration,
}

impl SignatureValidator {
    pub fn new(verifier: Arc<dyn SignatureVerifier>, endpoint: Url, timeout: Duration) -> Self {
        Self {
            verifier,
            endpoint,
            timeout,
        }
    }

    /// `Ok(Some(_))` is a negative finding, `Err(_)` means the signature
    /// could not be checked at all.
    #[tracing::instrument(level = "debug", skip_all, fields(trace_id = %context.trace_id))]
    pub async fn check_signature(
        &self,
        context: &RequestContext,
        certificate: &Certificate,
    ) -> Result<Option<String>> {
        let block = certificate.signature().ok_or_else(|| {
            VerifyError::InvalidCertificate("certificate carries no signature block".to_string())
        })?;

        let check = SignatureCheck {
            payload: certificate.canonical_payload(),
            signature_value: block.signature_value.clone(),
            endpoint: self.endpoint.clone(),
            creator: block.creator.clone(),
        };

        let verified = tokio::time::timeout(self.timeout, self.verifier.verify(&check))
            .await
            .map_err(|_| {
                VerifyError::SignatureUnreachable(format!(
                    "signing service did not answer within {:?}",
                    self.timeout
                ))
            })??;

        tracing::debug!(
            target: "cert_verify::signature",
            trace_id = %context.trace_id,
            creator = %check.creator,
            verified,
            "Signature checked"
        );

        Ok((!verified).then(|| SIGNATURE_FAILED_MESSAGE.to_string()))
    }
}

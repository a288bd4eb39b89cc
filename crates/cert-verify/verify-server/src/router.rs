use cert_verify_core::{
    Certificate,
    RequestContext,
    Verdict,
    VerificationKind,
};

use crate::{
    error::{
        Result,
        VerifyError,
    },
    expiry::check_expiry,
    signature::SignatureValidator,
};

/// Picks the checks for a certificate from its verification type and folds
/// their findings into one verdict.
#[derive(Clone)]
pub struct VerificationRouter {
    signature: SignatureValidator,
}

impl VerificationRouter {
    pub fn new(signature: SignatureValidator) -> Self {
        Self { signature }
    }

    /// Hosted certificates get the expiry check only. Signed badges get the
    /// signature check first, then expiry, and findings keep that order.
    #[tracing::instrument(level = "debug", skip_all, fields(trace_id = %context.trace_id))]
    pub async fn verify(
        &self,
        context: &RequestContext,
        certificate: &Certificate,
    ) -> Result<Verdict> {
        let mut messages = Vec::new();
        match certificate.kind() {
            VerificationKind::Hosted => {
                messages.extend(check_expiry(context, certificate.expires()));
            }
            VerificationKind::SignedBadge => {
                messages.extend(self.signature.check_signature(context, certificate).await?);
                messages.extend(check_expiry(context, certificate.expires()));
            }
            VerificationKind::Unsupported(kind) => {
                return Err(VerifyError::UnsupportedVerificationType(kind.clone()));
            }
        }
        Ok(Verdict::from_messages(messages))
    }
}

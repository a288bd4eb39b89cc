use std::{
    io::{
        BufReader,
        Write,
    },
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
    time::Duration,
};

use bytes::Bytes;
use cert_verify_core::{
    Certificate,
    CertificateRef,
    RequestContext,
};
use serde_json::Value;

use crate::{
    error::{
        Result,
        VerifyError,
    },
    store::{
        ContentStore,
        StoreError,
        container_relative_path,
    },
};

/// Produces the certificate body for a request, fetching it from the
/// content store when only an identifier was sent.
#[derive(Clone)]
pub struct CertificateResolver {
    store: Arc<dyn ContentStore>,
    container: String,
    scratch_dir: PathBuf,
    fetch_timeout: Duration,
}

impl CertificateResolver {
    pub fn new(
        store: Arc<dyn ContentStore>,
        container: impl Into<String>,
        scratch_dir: impl Into<PathBuf>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            container: container.into(),
            scratch_dir: scratch_dir.into(),
            fetch_timeout,
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(trace_id = %context.trace_id))]
    pub async fn resolve(
        &self,
        context: &RequestContext,
        reference: &CertificateRef,
    ) -> Result<Certificate> {
        match reference {
            CertificateRef::Inline(document) => {
                Ok(Certificate::from_value(Value::Object(document.clone()))?)
            }
            CertificateRef::Id(id) => self.download(context, id).await,
        }
    }

    async fn download(&self, context: &RequestContext, id: &str) -> Result<Certificate> {
        let path = container_relative_path(id, &self.container);
        tracing::debug!(
            target: "cert_verify::resolver",
            trace_id = %context.trace_id,
            id,
            path,
            "Downloading certificate"
        );

        let bytes = tokio::time::timeout(self.fetch_timeout, self.store.get(&path))
            .await
            .unwrap_or(Err(StoreError::Timeout(self.fetch_timeout)))
            .map_err(|source| {
                tracing::error!(
                    target: "cert_verify::resolver",
                    trace_id = %context.trace_id,
                    id,
                    error = %source,
                    "Failed to download certificate from the content store"
                );
                VerifyError::ContentFetch {
                    id: id.to_string(),
                    source,
                }
            })?;

        let scratch_dir = self.scratch_dir.clone();
        let document = tokio::task::spawn_blocking(move || stage_and_parse(&scratch_dir, &bytes))
            .await
            .map_err(|err| VerifyError::Internal(format!("staging task failed: {err}")))??;

        Ok(Certificate::from_value(document)?)
    }
}

/// Writes the fetched bytes to a private temp file and parses it back.
///
/// The file is removed when `staged` drops, on every return path.
fn stage_and_parse(scratch_dir: &Path, bytes: &Bytes) -> Result<Value> {
    let mut staged = tempfile::Builder::new()
        .prefix("cert-")
        .suffix(".json")
        .tempfile_in(scratch_dir)
        .map_err(|err| VerifyError::Internal(format!("cannot create temp file: {err}")))?;
    staged
        .write_all(bytes)
        .and_then(|()| staged.flush())
        .map_err(|err| VerifyError::Internal(format!("cannot write temp file: {err}")))?;

    let reader = staged
        .reopen()
        .map_err(|err| VerifyError::Internal(format!("cannot reopen temp file: {err}")))?;
    serde_json::from_reader(BufReader::new(reader))
        .map_err(|err| VerifyError::InvalidCertificate(format!("certificate is not valid JSON: {err}")))
}

use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::{
    actor::VerifierActor,
    resolver::CertificateResolver,
    router::VerificationRouter,
    server::CertVerifyServer,
    signature::{
        HttpSignatureVerifier,
        SignatureValidator,
    },
    store::{
        StoreConfig,
        StoreProvider,
        create_content_store,
    },
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Api server address
    #[arg(long, env = "CERT_VERIFY_LISTEN_ADDR", default_value = "0.0.0.0:9000")]
    pub listen_addr: SocketAddr,
    /// Log level
    #[arg(long, env = "CERT_VERIFY_LOG_LEVEL", default_value = "info")]
    pub log_level: LevelFilter,
    /// Number of verifier workers
    #[arg(long, env = "CERT_VERIFY_WORKERS", default_value = "4")]
    pub workers: usize,
    /// Pending requests each worker buffers before callers wait
    #[arg(long, env = "CERT_VERIFY_MAILBOX_SIZE", default_value = "64")]
    pub mailbox_size: usize,
    /// How long the API waits for a worker's reply, in milliseconds
    #[arg(long, env = "CERT_VERIFY_ASK_TIMEOUT_MS", default_value = "30000")]
    pub ask_timeout_ms: u64,
    /// Base URL of the signature verification service
    #[arg(long, env = "CERT_VERIFY_ENC_SERVICE_URL")]
    pub enc_service_url: Url,
    /// Signature service call timeout, in milliseconds
    #[arg(long, env = "CERT_VERIFY_SIGNATURE_TIMEOUT_MS", default_value = "10000")]
    pub signature_timeout_ms: u64,
    /// Content store backend: `http` or `local`
    #[arg(long, env = "CERT_VERIFY_STORE_PROVIDER", default_value = "http")]
    pub store_provider: StoreProvider,
    /// Base URL of the http content store
    #[arg(long, env = "CERT_VERIFY_STORE_BASE_URL")]
    pub store_base_url: Option<Url>,
    /// Container holding certificate bodies
    #[arg(long, env = "CERT_VERIFY_STORE_CONTAINER", default_value = "e-credentials")]
    pub store_container: String,
    /// Bearer token for the http content store
    #[arg(long, env = "CERT_VERIFY_STORE_AUTH_TOKEN", hide_env_values = true)]
    pub store_auth_token: Option<String>,
    /// Root directory of the local content store
    #[arg(long, env = "CERT_VERIFY_STORE_ROOT")]
    pub store_root: Option<PathBuf>,
    /// Content store fetch timeout, in milliseconds
    #[arg(long, env = "CERT_VERIFY_STORE_TIMEOUT_MS", default_value = "10000")]
    pub store_timeout_ms: u64,
    /// Directory for downloaded certificates, defaults to the system temp dir
    #[arg(long, env = "CERT_VERIFY_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,
}

impl Config {
    fn store_config(&self) -> StoreConfig {
        StoreConfig {
            provider: self.store_provider,
            container: self.store_container.clone(),
            base_url: self.store_base_url.clone(),
            auth_token: self.store_auth_token.clone(),
            root: self.store_root.clone(),
            timeout: Duration::from_millis(self.store_timeout_ms),
        }
    }

    /// Build the certificate verification server
    pub async fn build(self) -> anyhow::Result<CertVerifyServer> {
        let store = create_content_store(&self.store_config())?;
        tracing::info!(
            provider = ?self.store_provider,
            container = %self.store_container,
            "Content store configured"
        );

        let scratch_dir = self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir);
        tokio::fs::create_dir_all(&scratch_dir).await?;

        let signature_timeout = Duration::from_millis(self.signature_timeout_ms);
        let verifier = Arc::new(HttpSignatureVerifier::new(signature_timeout)?);
        let router = VerificationRouter::new(SignatureValidator::new(
            verifier,
            self.enc_service_url.clone(),
            signature_timeout,
        ));
        let resolver = CertificateResolver::new(
            store,
            self.store_container.clone(),
            scratch_dir,
            Duration::from_millis(self.store_timeout_ms),
        );

        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!(listen_addr = ?self.listen_addr, "Listening on address");

        Ok(CertVerifyServer {
            listener,
            actor: VerifierActor::new(resolver, router),
            workers: self.workers,
            mailbox_size: self.mailbox_size,
            ask_timeout: Duration::from_millis(self.ask_timeout_ms),
        })
    }
}

use anyhow::Result;
use std::{
    future::Future,
    pin::Pin,
    time::Duration,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::actor::{
    VerifierActor,
    VerifierPool,
};

pub struct CertVerifyServer {
    pub listener: TcpListener,
    pub actor: VerifierActor,
    pub workers: usize,
    pub mailbox_size: usize,
    pub ask_timeout: Duration,
}

// Type alias for boxed future
pub type BoxedFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

impl CertVerifyServer {
    /// Start the worker pool and the API server.
    pub fn start(self, cancel_token: CancellationToken) -> (BoxedFuture, BoxedFuture) {
        let (pool, handles) = VerifierPool::spawn(
            self.actor,
            self.workers,
            self.mailbox_size,
            self.ask_timeout,
            cancel_token.clone(),
        );
        tracing::debug!(workers = handles.len(), "Started verifier workers");

        let workers_handle = async move {
            for handle in handles {
                handle.await?;
            }
            Ok::<(), anyhow::Error>(())
        };

        let router = crate::api::build_router(pool);
        let listener = self.listener;
        let api_handle = async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    cancel_token.cancelled().await;
                    tracing::info!("Api received cancellation signal, shutting down...");
                })
                .await?;
            Ok::<(), anyhow::Error>(())
        };
        tracing::info!("Started API server");

        (Box::pin(api_handle), Box::pin(workers_handle))
    }

    /// Run the server until the cancellation token is cancelled.
    /// Will run until either the API server or the workers stop running.
    pub async fn run(self, cancel_token: CancellationToken) -> Result<()> {
        let (mut api_handle, mut workers_handle) = self.start(cancel_token.clone());
        tokio::select! {
            res = &mut api_handle => {
                if let Err(e) = &res {
                    metrics::counter!("api_server_errors_count").increment(1);
                    tracing::error!("API server encountered an error: {:?}", e);
                }
                cancel_token.cancel();
                workers_handle.await?;
                tracing::info!("Workers stopped.");
                res?;
                tracing::info!("Api stopped.");
            }
            res = &mut workers_handle => {
                if let Err(e) = &res {
                    metrics::counter!("worker_errors_count").increment(1);
                    tracing::error!("Verifier workers encountered an error: {:?}", e);
                }
                cancel_token.cancel();
                api_handle.await?;
                tracing::info!("Api stopped.");
                res?;
                tracing::info!("Workers stopped.");
            }
        }

        Ok(())
    }
}

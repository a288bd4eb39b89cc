use std::{
    sync::{
        Arc,
        atomic::{
            AtomicUsize,
            Ordering,
        },
    },
    time::Duration,
};

use cert_verify_core::{
    ErrorResponse,
    Reply,
    VerificationRequest,
};
use tokio::{
    sync::{
        mpsc,
        oneshot,
    },
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use super::{
    Envelope,
    Mailbox,
    VerifierActor,
};

/// A fixed set of workers, each draining its own bounded mailbox.
///
/// Requests are spread round-robin. A worker handles one request at a time,
/// so parallelism comes from the number of workers.
#[derive(Clone)]
pub struct VerifierPool {
    mailboxes: Arc<[Mailbox]>,
    next: Arc<AtomicUsize>,
    ask_timeout: Duration,
}

impl VerifierPool {
    /// Spawns `workers` copies of `actor`. The returned handles finish once
    /// `cancel_token` fires or every pool clone is dropped.
    pub fn spawn(
        actor: VerifierActor,
        workers: usize,
        mailbox_size: usize,
        ask_timeout: Duration,
        cancel_token: CancellationToken,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let workers = workers.max(1);
        let mut mailboxes = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for worker in 0..workers {
            let (tx, rx) = mpsc::channel(mailbox_size.max(1));
            mailboxes.push(tx);
            handles.push(tokio::spawn(actor.clone().run(
                worker,
                rx,
                cancel_token.clone(),
            )));
        }

        tracing::info!(
            target: "cert_verify::pool",
            workers,
            mailbox_size,
            "Verifier pool started"
        );

        let pool = Self {
            mailboxes: mailboxes.into(),
            next: Arc::new(AtomicUsize::new(0)),
            ask_timeout,
        };
        (pool, handles)
    }

    /// Sends `request` to the next worker and waits for its reply.
    ///
    /// Always resolves to a [`Reply`]: a closed mailbox, a lost reply or an
    /// elapsed `ask_timeout` come back as `INTERNAL_ERROR`.
    pub async fn ask(&self, request: VerificationRequest) -> Reply {
        let worker = self.next.fetch_add(1, Ordering::Relaxed) % self.mailboxes.len();
        let trace_id = request.context.trace_id.clone();
        let (reply_to, reply) = oneshot::channel();

        let exchange = async {
            self.mailboxes[worker]
                .send(Envelope { request, reply_to })
                .await
                .map_err(|_| ErrorResponse::internal("verifier worker is not running"))?;
            reply
                .await
                .map_err(|_| ErrorResponse::internal("verifier worker dropped the request"))?
        };

        match tokio::time::timeout(self.ask_timeout, exchange).await {
            Ok(reply) => reply,
            Err(_) => {
                tracing::error!(
                    target: "cert_verify::pool",
                    %trace_id,
                    worker,
                    timeout_ms = self.ask_timeout.as_millis(),
                    "Timed out waiting for verifier reply"
                );
                Err(ErrorResponse::internal(format!(
                    "no reply from verifier within {}ms",
                    self.ask_timeout.as_millis()
                )))
            }
        }
    }

    /// True while every worker's mailbox is still open.
    pub fn is_ready(&self) -> bool {
        self.mailboxes.iter().all(|mailbox| !mailbox.is_closed())
    }

    pub fn workers(&self) -> usize {
        self.mailboxes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actor::tests::{
            actor_with,
            hosted,
            request,
        },
        signature::MockSignatureVerifier,
        store::{
            ContentStore,
            MockContentStore,
            StoreError,
        },
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use cert_verify_core::{
        CertificateRef,
        ErrorCode,
        ResponseCode,
    };
    use tempfile::TempDir;

    fn inline_request() -> VerificationRequest {
        request(CertificateRef::Inline(hosted("2099-01-01T00:00:00Z")))
    }

    #[tokio::test]
    async fn spreads_requests_across_workers() {
        let scratch = TempDir::new().unwrap();
        let actor = actor_with(
            MockContentStore::new(),
            MockSignatureVerifier::new(),
            scratch.path(),
        );
        let (pool, handles) = VerifierPool::spawn(
            actor,
            3,
            8,
            Duration::from_secs(5),
            CancellationToken::new(),
        );
        assert_eq!(handles.len(), 3);
        assert_eq!(pool.workers(), 3);

        let replies =
            futures::future::join_all((0..9).map(|_| pool.ask(inline_request()))).await;
        assert!(replies.iter().all(|reply| reply.as_ref().unwrap().verdict().valid()));
        assert_eq!(pool.next.load(Ordering::Relaxed), 9);
    }

    #[tokio::test]
    async fn zero_workers_still_spawns_one() {
        let scratch = TempDir::new().unwrap();
        let actor = actor_with(
            MockContentStore::new(),
            MockSignatureVerifier::new(),
            scratch.path(),
        );
        let (pool, handles) =
            VerifierPool::spawn(actor, 0, 0, Duration::from_secs(5), CancellationToken::new());
        assert_eq!(handles.len(), 1);
        assert!(pool.ask(inline_request()).await.is_ok());
    }

    #[tokio::test]
    async fn errors_are_replies_not_failures() {
        let scratch = TempDir::new().unwrap();
        let mut store = MockContentStore::new();
        store
            .expect_get()
            .returning(|path| Err(StoreError::NotFound(path.to_string())));
        let actor = actor_with(store, MockSignatureVerifier::new(), scratch.path());
        let (pool, _handles) =
            VerifierPool::spawn(actor, 1, 4, Duration::from_secs(5), CancellationToken::new());

        let err = pool
            .ask(request(CertificateRef::Id("gone.json".to_string())))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ContentFetchError);

        assert!(pool.ask(inline_request()).await.is_ok());
    }

    #[tokio::test]
    async fn cancelled_pool_answers_with_internal_error() {
        let scratch = TempDir::new().unwrap();
        let actor = actor_with(
            MockContentStore::new(),
            MockSignatureVerifier::new(),
            scratch.path(),
        );
        let cancel_token = CancellationToken::new();
        let (pool, handles) =
            VerifierPool::spawn(actor, 2, 4, Duration::from_secs(5), cancel_token.clone());
        assert!(pool.is_ready());

        cancel_token.cancel();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(!pool.is_ready());
        let err = pool.ask(inline_request()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert_eq!(err.response_code, ResponseCode::ServerError);
    }

    struct SlowStore;

    #[async_trait]
    impl ContentStore for SlowStore {
        async fn get(&self, _path: &str) -> Result<Bytes, StoreError> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Err(StoreError::Backend("late".into()))
        }
    }

    #[tokio::test]
    async fn ask_timeout_yields_internal_error() {
        let scratch = TempDir::new().unwrap();
        let actor = actor_with(SlowStore, MockSignatureVerifier::new(), scratch.path());
        let (pool, _handles) = VerifierPool::spawn(
            actor,
            1,
            4,
            Duration::from_millis(50),
            CancellationToken::new(),
        );

        let err = pool
            .ask(request(CertificateRef::Id("slow.json".to_string())))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert!(err.message.contains("50ms"));
    }
}

//! # `actor`
//!
//! The request-handling actor. Every [`Envelope`] carries a single-use reply
//! sink; [`VerifierActor::on_request`] always writes exactly one [`Reply`]
//! into it, whether verification succeeded, produced findings, returned an
//! error or panicked. Nothing that goes wrong inside one request reaches the
//! worker loop that serves the next one.

pub mod pool;

use std::{
    panic::AssertUnwindSafe,
    time::Instant,
};

use cert_verify_core::{
    ErrorResponse,
    Operation,
    Reply,
    Response,
    VerificationRequest,
};
use futures::FutureExt;
use metrics::{
    counter,
    histogram,
};
use tokio::sync::{
    mpsc,
    oneshot,
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{
        Result,
        VerifyError,
    },
    resolver::CertificateResolver,
    router::VerificationRouter,
};

pub use pool::VerifierPool;

/// `tokio` `mpsc` channel feeding one worker.
pub type Mailbox = mpsc::Sender<Envelope>;

/// A request paired with the channel its reply goes to.
#[derive(Debug)]
pub struct Envelope {
    pub request: VerificationRequest,
    pub reply_to: oneshot::Sender<Reply>,
}

/// Stateless between requests; workers share one instance.
#[derive(Clone)]
pub struct VerifierActor {
    resolver: CertificateResolver,
    router: VerificationRouter,
}

impl VerifierActor {
    pub fn new(resolver: CertificateResolver, router: VerificationRouter) -> Self {
        Self { resolver, router }
    }

    /// Handles one envelope and sends its reply.
    pub async fn on_request(&self, envelope: Envelope) {
        let Envelope { request, reply_to } = envelope;
        let trace_id = request.context.trace_id.clone();
        let reply = self.handle(request).await;

        if reply_to.send(reply).is_err() {
            tracing::warn!(
                target: "cert_verify::actor",
                %trace_id,
                "Caller went away before the reply was delivered"
            );
        }
    }

    /// Runs one request behind the error boundary and returns its reply.
    #[tracing::instrument(
        level = "info",
        skip_all,
        target = "cert_verify::actor",
        fields(trace_id = %request.context.trace_id, operation = %request.operation, msgid = tracing::field::Empty)
    )]
    pub async fn handle(&self, request: VerificationRequest) -> Reply {
        if let Some(msgid) = request.message_id() {
            tracing::Span::current().record("msgid", msgid);
        }
        let operation = request.operation.clone();
        let started = Instant::now();
        counter!("cert_verify_requests_count").increment(1);
        tracing::info!(target: "cert_verify::actor", "Processing started");

        let outcome = AssertUnwindSafe(self.process(&request))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(VerifyError::Internal(panic_message(&*panic))));

        let reply = match outcome {
            Ok(response) => {
                tracing::info!(
                    target: "cert_verify::actor",
                    valid = response.verdict().valid(),
                    error_count = response.verdict().error_count(),
                    duration_ms = started.elapsed().as_millis(),
                    "Processing ended"
                );
                Ok(response)
            }
            Err(err) => {
                tracing::error!(
                    target: "cert_verify::actor",
                    code = %err.code(),
                    error = %err,
                    context = ?request.context,
                    duration_ms = started.elapsed().as_millis(),
                    "Processing failed"
                );
                counter!("cert_verify_errors_count", "code" => err.code().as_str()).increment(1);
                Err(ErrorResponse::from(&err))
            }
        };

        histogram!("cert_verify_duration_seconds", "operation" => operation)
            .record(started.elapsed().as_secs_f64());
        reply
    }

    async fn process(&self, request: &VerificationRequest) -> Result<Response> {
        match Operation::parse(&request.operation) {
            Some(Operation::VerifyCertificate) => {
                let certificate = self
                    .resolver
                    .resolve(&request.context, &request.certificate)
                    .await?;
                tracing::debug!(
                    target: "cert_verify::actor",
                    kind = ?certificate.kind(),
                    "Certificate resolved"
                );
                let verdict = self.router.verify(&request.context, &certificate).await?;
                Ok(Response::success(request.context.trace_id.clone(), verdict))
            }
            None => {
                tracing::info!(
                    target: "cert_verify::actor",
                    operation = %request.operation,
                    "Unsupported operation"
                );
                Err(VerifyError::InvalidOperation(request.operation.clone()))
            }
        }
    }

    /// Worker loop: takes envelopes from `rx` one at a time until the
    /// channel closes or `cancel_token` fires.
    pub async fn run(
        self,
        worker: usize,
        mut rx: mpsc::Receiver<Envelope>,
        cancel_token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = cancel_token.cancelled() => {
                    tracing::info!(target: "cert_verify::actor", worker, "Worker received cancellation signal, shutting down...");
                    break;
                }
                envelope = rx.recv() => {
                    match envelope {
                        Some(envelope) => self.on_request(envelope).await,
                        None => {
                            tracing::info!(target: "cert_verify::actor", worker, "Mailbox closed, shutting down...");
                            break;
                        }
                    }
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("request handler panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("request handler panicked: {message}")
    } else {
        "request handler panicked".to_string()
    }
}

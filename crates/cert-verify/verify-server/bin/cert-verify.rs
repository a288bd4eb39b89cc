use cert_verify_server::{
    CertVerifyServer,
    Config,
};

use clap::Parser;
use tokio_util::sync::CancellationToken;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize a tracing subscriber
    let _guard = rust_tracing::trace();

    let config = Config::parse();
    tracing::info!(
        workers = config.workers,
        enc_service_url = %config.enc_service_url,
        "Starting certificate verifier"
    );

    let server = config.build().await?;
    run_server(server, CancellationToken::new()).await;

    Ok(())
}

async fn run_server(server: CertVerifyServer, cancellation_token: CancellationToken) {
    let mut boxed_server_future = Box::pin(server.run(cancellation_token.clone()));

    tokio::select! {
        result = &mut boxed_server_future => {
           handle_server_result(result);
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C signal, initiating graceful shutdown");
            cancellation_token.cancel();
            handle_server_result(boxed_server_future.await);
        }
    }
}

/// Handle the result of the server
fn handle_server_result(result: Result<()>) {
    match result {
        Ok(()) => tracing::info!("Server shutdown gracefully"),
        Err(e) => {
            tracing::error!("Server encountered an error: {}", e);
        }
    }
}

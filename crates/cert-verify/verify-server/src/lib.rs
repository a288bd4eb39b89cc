#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod actor;
pub mod api;
mod config;
pub mod error;
pub mod expiry;
pub mod resolver;
pub mod router;
mod server;
pub mod signature;
pub mod store;
#[cfg(test)]
mod test_util;

pub use actor::{
    Envelope,
    VerifierActor,
    VerifierPool,
};
pub use config::Config;
pub use error::VerifyError;
pub use server::CertVerifyServer;

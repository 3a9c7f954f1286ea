//! Library root for `survey-bot`.
//!
//! Survey-bot is a Mattermost bot that watches a single channel and:
//! - Keeps a websocket subscription to the server open, reconnecting with backoff
//! - Filters the event feed down to new posts by other users in its channel
//! - Answers every post that says "hello", in a thread
//!
//! The architecture is built around a chat client trait, so the server side can be
//! swapped out (and mocked in tests).

pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;
pub mod session;

use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the survey-bot runtime:
/// - Initializes the crypto provider
/// - Logs in and resolves the configured team and channel
/// - Starts the event loop, which runs until Ctrl-C
pub async fn start(config: Config) -> Void {
    info!("Starting survey-bot ...");
    info!("Configuration: {:?}", config);

    // Start the crypto provider; an already installed one is fine.
    let _ = crypto::ring::default_provider().install_default();

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}

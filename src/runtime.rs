//! Runtime services and shared state for the survey-bot.

use std::{future::Future, sync::Arc, time::Duration};

use tracing::{error, info, instrument, warn};

use crate::{
    base::{
        config::Config,
        types::{NewPost, Res, Void},
    },
    interaction::{
        consumer::{Consumer, ReconnectPolicy},
        dispatcher::Dispatcher,
        responder::Responder,
        trigger::Trigger,
    },
    service::chat::ChatClient,
    session::Session,
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the configuration, the chat client, and the session resolved at startup.
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The chat client instance.
    pub chat: ChatClient,
    /// The bot's identity, team, and channel.
    pub session: Arc<Session>,
}

impl Runtime {
    /// Create a new runtime instance backed by Mattermost.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        let chat = ChatClient::mattermost(&config)?;

        Self::with_chat(config, chat).await
    }

    /// Create a new runtime instance on top of an existing chat client.
    pub async fn with_chat(config: Config, chat: ChatClient) -> Res<Self> {
        let session = Arc::new(Session::establish(&chat, &config).await?);

        Ok(Self { config, chat, session })
    }

    /// Run until Ctrl-C.
    pub async fn start(&self) -> Void {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for the interrupt signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` completes.
    ///
    /// On shutdown the event stream is dropped, which closes the connection, and running
    /// handlers get `shutdown_drain_timeout_secs` to finish before they are abandoned.
    pub async fn run_until<F>(&self, shutdown: F) -> Void
    where
        F: Future<Output = ()>,
    {
        let trigger = Trigger::new(self.config.trigger_case_insensitive)?;
        let responder = Responder::new(self.session.clone(), self.chat.clone(), trigger);
        let dispatcher = Dispatcher::new(self.session.clone(), responder, self.config.max_in_flight_dispatches);
        let consumer = Consumer::new(self.chat.clone(), dispatcher.clone(), ReconnectPolicy::from(&self.config));

        self.greet().await;

        let result = tokio::select! {
            result = consumer.run() => result,
            _ = shutdown => {
                info!("Closing websocket connection");
                Ok(())
            }
        };

        let timeout = Duration::from_secs(self.config.shutdown_drain_timeout_secs);
        if !dispatcher.drain(timeout).await {
            warn!("Abandoning {} message handler(s) still running after {:?}.", dispatcher.in_flight(), timeout);
        }

        info!("Shutting down");

        result
    }

    /// Announce the bot in its channel, if a greeting is configured.
    async fn greet(&self) {
        if self.config.startup_greeting.is_empty() {
            return;
        }

        let post = NewPost {
            channel_id: self.session.channel.id.clone(),
            message: self.config.startup_greeting.clone(),
            root_id: String::new(),
        };

        if let Err(e) = self.chat.create_post(&post).await {
            error!("Failed to post the startup greeting: {:#}", e);
        }
    }
}

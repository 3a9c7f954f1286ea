//! Keeps the event subscription open and feeds every event to the dispatcher.

use std::time::Duration;

use futures::StreamExt;
use rand::Rng;
use tracing::{info, instrument, warn};

use crate::{
    base::{config::Config, types::Void},
    service::chat::ChatClient,
};

use super::dispatcher::Dispatcher;

/// How long to wait between failed connection attempts, and when to give up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay after the first failure.
    pub base_delay_ms: u64,
    /// Cap on the exponential part of the delay.
    pub max_delay_ms: u64,
    /// Upper bound of the random jitter added on top.
    pub max_jitter_ms: u64,
    /// Consecutive failures before giving up; `0` never gives up.
    pub max_retries: u32,
}

impl From<&Config> for ReconnectPolicy {
    fn from(config: &Config) -> Self {
        Self {
            base_delay_ms: config.reconnect_base_delay_ms,
            max_delay_ms: config.reconnect_max_delay_ms,
            max_jitter_ms: config.reconnect_max_jitter_ms,
            max_retries: config.reconnect_max_retries,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the next attempt, after `failures` consecutive failures (at least one).
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        let delay_ms = self.base_delay_ms.saturating_mul(1_u64 << exponent).min(self.max_delay_ms);

        Duration::from_millis(delay_ms) + self.jitter()
    }

    /// Whether `failures` consecutive failures exhaust the retry budget.
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_retries != 0 && failures >= self.max_retries
    }

    fn jitter(&self) -> Duration {
        if self.max_jitter_ms == 0 {
            return Duration::ZERO;
        }

        Duration::from_millis(rand::thread_rng().gen_range(0..=self.max_jitter_ms))
    }
}

/// The process's long-running receive loop.
pub struct Consumer {
    chat: ChatClient,
    dispatcher: Dispatcher,
    policy: ReconnectPolicy,
}

impl Consumer {
    pub fn new(chat: ChatClient, dispatcher: Dispatcher, policy: ReconnectPolicy) -> Self {
        Self { chat, dispatcher, policy }
    }

    /// Receive events until the process shuts down.
    ///
    /// Failed connection attempts are retried with backoff, and so is a connection that
    /// closes before delivering a single event. Once a connection has delivered an event,
    /// the failure count starts over and a stream that ends or breaks is reopened right
    /// away. Only an exhausted retry budget makes this return.
    #[instrument(name = "Consumer::run", skip_all)]
    pub async fn run(&self) -> Void {
        let mut failures: u32 = 0;

        loop {
            let mut stream = match self.chat.open_event_stream().await {
                Ok(stream) => stream,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    warn!(failures, "Mattermost websocket disconnected, retrying: {:#}", e);
                    self.back_off(failures).await?;
                    continue;
                }
            };

            info!("Mattermost websocket connected");
            let mut delivered = false;

            while let Some(item) = stream.next().await {
                match item {
                    Ok(event) => {
                        delivered = true;
                        failures = 0;
                        self.dispatcher.dispatch(event).await;
                    }
                    Err(e) => {
                        warn!("Mattermost websocket failed: {:#}", e);
                        break;
                    }
                }
            }

            if delivered {
                info!("Mattermost websocket closed, reconnecting ...");
                continue;
            }

            failures = failures.saturating_add(1);
            warn!(failures, "Mattermost websocket closed before delivering any event, retrying");
            self.back_off(failures).await?;
        }
    }

    /// Sleep before the next attempt, or give up once the retry budget is spent.
    async fn back_off(&self, failures: u32) -> Void {
        if self.policy.exhausted(failures) {
            return Err(give_up(failures));
        }

        tokio::time::sleep(self.policy.backoff(failures)).await;

        Ok(())
    }
}

fn give_up(failures: u32) -> anyhow::Error {
    anyhow::anyhow!("Giving up on the Mattermost websocket after {} consecutive failed attempts.", failures)
}

//! Decides, per websocket event, whether the responder should see it, and runs it if so.

use std::{sync::Arc, time::Duration};

use tokio::sync::Semaphore;
use tracing::{Instrument, debug, error, instrument, warn};

use crate::{
    base::types::{EventKind, Post, WebSocketEvent},
    session::Session,
};

use super::responder::Responder;

/// Where an event ends up after filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Broadcast to a channel other than the session channel.
    OtherChannel,
    /// Not a `posted` event.
    OtherKind,
    /// A `posted` event whose payload could not be decoded.
    Undecodable,
    /// Posted by the bot itself.
    OwnMessage,
    /// Goes to the responder.
    Accepted(Post),
}

/// Filters events and hands qualifying messages to the responder, each on its own task.
///
/// The number of messages handled at once is capped; when the cap is reached,
/// [`Dispatcher::dispatch`] waits for a slot before spawning, which slows the receive
/// loop down instead of piling up tasks.
#[derive(Clone)]
pub struct Dispatcher {
    session: Arc<Session>,
    responder: Responder,
    permits: Arc<Semaphore>,
    capacity: u32,
}

impl Dispatcher {
    pub fn new(session: Arc<Session>, responder: Responder, max_in_flight: u32) -> Self {
        let capacity = max_in_flight.max(1);

        Self {
            session,
            responder,
            permits: Arc::new(Semaphore::new(capacity as usize)),
            capacity,
        }
    }

    /// Run the filter steps on `event`.
    ///
    /// The channel is checked before anything is decoded, and the author only after decoding.
    pub fn classify(&self, event: &WebSocketEvent) -> Disposition {
        if event.channel_id() != self.session.channel.id {
            return Disposition::OtherChannel;
        }

        if event.event != EventKind::Posted {
            return Disposition::OtherKind;
        }

        let post = match event.decode_post() {
            Ok(post) => post,
            Err(e) => {
                error!(seq = event.seq, "Could not decode posted event into a post: {:#}", e);
                return Disposition::Undecodable;
            }
        };

        if post.user_id == self.session.user.id {
            return Disposition::OwnMessage;
        }

        Disposition::Accepted(post)
    }

    /// Filter `event` and, if it qualifies, spawn the responder for it.
    ///
    /// Returns once the task is spawned, not when it completes. Replaying the same event
    /// spawns another, independent task.
    #[instrument(skip_all, fields(seq = event.seq))]
    pub async fn dispatch(&self, event: WebSocketEvent) {
        let post = match self.classify(&event) {
            Disposition::Accepted(post) => post,
            other => {
                debug!("Skipping event: {:?}", other);
                return;
            }
        };

        let Ok(permit) = self.permits.clone().acquire_owned().await else {
            warn!("Dispatcher is closed; dropping post {}.", post.id);
            return;
        };

        let responder = self.responder.clone();

        tokio::spawn(
            async move {
                let outcome = responder.respond(post).await;
                debug!("Outcome: {:?}", outcome);
                drop(permit);
            }
            .in_current_span(),
        );
    }

    /// Number of handlers currently running.
    pub fn in_flight(&self) -> usize {
        self.capacity as usize - self.permits.available_permits()
    }

    /// Wait up to `timeout` for every running handler to finish.
    ///
    /// Returns `false` if some were still running when the time ran out.
    pub async fn drain(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.permits.acquire_many(self.capacity)).await.is_ok()
    }
}

//! Applies the trigger rule to a message and posts the acknowledgment.

use std::sync::Arc;

use tracing::{debug, error, info, instrument};

use crate::{
    base::{
        replies,
        types::{NewPost, Post},
    },
    service::chat::ChatClient,
    session::Session,
};

use super::trigger::Trigger;

/// Final state of one message that reached the responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The message did not contain the trigger word.
    NotTriggered,
    /// An acknowledgment was posted under `root_id`.
    Replied { root_id: String },
    /// Posting the acknowledgment under `root_id` failed; it is not retried.
    ReplyFailed { root_id: String },
}

/// Answers greetings in the session channel.
///
/// It is trivially cloneable so every per-event task can own one.
#[derive(Clone)]
pub struct Responder {
    session: Arc<Session>,
    chat: ChatClient,
    trigger: Trigger,
}

impl Responder {
    pub fn new(session: Arc<Session>, chat: ChatClient, trigger: Trigger) -> Self {
        Self { session, chat, trigger }
    }

    /// Decide what to post for `post`, if anything.
    ///
    /// A greeting inside a thread is answered in that thread; a top-level greeting
    /// is answered under itself, which starts a new thread.
    pub fn plan(&self, post: &Post) -> Option<NewPost> {
        if !self.trigger.matches(&post.message) {
            return None;
        }

        let (message, root_id) = if post.root_id.is_empty() {
            (replies::NEW_THREAD_REPLY, post.id.clone())
        } else {
            (replies::EXISTING_THREAD_REPLY, post.root_id.clone())
        };

        Some(NewPost {
            channel_id: self.session.channel.id.clone(),
            message: message.to_string(),
            root_id,
        })
    }

    /// Apply the trigger rule to `post` and post the reply.
    ///
    /// Failures are logged and reported in the returned [`Outcome`], never propagated.
    #[instrument(skip_all, fields(post_id = %post.id))]
    pub async fn respond(&self, post: Post) -> Outcome {
        debug!("Message: {}", post.message);

        let Some(reply) = self.plan(&post) else {
            return Outcome::NotTriggered;
        };

        match self.chat.create_post(&reply).await {
            Ok(()) => {
                info!("Replied under {}", reply.root_id);
                Outcome::Replied { root_id: reply.root_id }
            }
            Err(e) => {
                error!(root_id = %reply.root_id, "Failed to create post: {:#}", e);
                Outcome::ReplyFailed { root_id: reply.root_id }
            }
        }
    }
}

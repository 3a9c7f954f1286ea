pub mod mattermost;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::base::types::{Channel, NewPost, Res, Team, User, Void, WebSocketEvent};

// Types.

/// A live subscription to the server's event feed.
///
/// Yields events until the connection closes; an `Err` item means the transport broke
/// and the subscription must be reopened.
pub type EventStream = BoxStream<'static, Res<WebSocketEvent>>;

// Traits.

/// Generic "chat" trait that clients must implement.
///
/// This trait defines the request/response operations the bot needs from a chat
/// server, plus the streaming subscription it listens on. Implementing this trait
/// allows the bot to run against a different server, or against a mock in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Authenticate with the configured token and return the bot's own account.
    async fn me(&self) -> Res<User>;

    /// Look up a team by its name.
    async fn team_by_name(&self, name: &str) -> Res<Team>;

    /// Look up a channel by its name within a team.
    async fn channel_by_name(&self, team_id: &str, name: &str) -> Res<Channel>;

    /// Create a post.
    async fn create_post(&self, post: &NewPost) -> Void;

    /// Open a new event subscription.
    ///
    /// Every call opens a fresh connection; the previous stream, if any, is the caller's to drop.
    async fn open_event_stream(&self) -> Res<EventStream>;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}

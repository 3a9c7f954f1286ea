//! Mattermost implementation of the chat client.
//!
//! Request/response operations go through the REST API v4 with `reqwest`; the event
//! feed is the server's websocket, opened with `tokio-tungstenite` and authenticated
//! with an `authentication_challenge` frame.

use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::base::{
    config::Config,
    types::{Channel, NewPost, Post, Res, Team, User, Void, WebSocketEvent},
};

use super::{ChatClient, EventStream, GenericChatClient};

// Extra methods on `ChatClient` applied by the mattermost implementation.

impl ChatClient {
    /// Creates a new Mattermost chat client.
    pub fn mattermost(config: &Config) -> Res<Self> {
        let client = MattermostChatClient::new(config)?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Structs.

/// Mattermost client implementation.
#[derive(Clone)]
pub struct MattermostChatClient {
    http: reqwest::Client,
    server: Url,
    websocket_url: Url,
    token: String,
}

impl MattermostChatClient {
    /// Create a new Mattermost chat client.
    #[instrument(name = "MattermostChatClient::new", skip_all)]
    pub fn new(config: &Config) -> Res<Self> {
        let server = Url::parse(&config.server).with_context(|| format!("Invalid Mattermost server URL `{}`", config.server))?;
        let websocket_url = websocket_url(&server)?;

        info!("Mattermost websocket endpoint: {}", websocket_url);

        Ok(Self {
            http: reqwest::Client::new(),
            server,
            websocket_url,
            token: config.token.clone(),
        })
    }

    /// Build a REST API v4 URL from path segments.
    fn endpoint(&self, segments: &[&str]) -> Res<Url> {
        api_url(&self.server, segments)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Res<T> {
        let url = self.endpoint(segments)?;
        let response = self.http.get(url).bearer_auth(&self.token).send().await.context("Mattermost request failed")?;

        read_json(response).await
    }
}

#[async_trait]
impl GenericChatClient for MattermostChatClient {
    #[instrument(skip(self))]
    async fn me(&self) -> Res<User> {
        self.get(&["users", "me"]).await
    }

    #[instrument(skip(self))]
    async fn team_by_name(&self, name: &str) -> Res<Team> {
        self.get(&["teams", "name", name]).await
    }

    #[instrument(skip(self))]
    async fn channel_by_name(&self, team_id: &str, name: &str) -> Res<Channel> {
        self.get(&["teams", team_id, "channels", "name", name]).await
    }

    #[instrument(skip(self))]
    async fn create_post(&self, post: &NewPost) -> Void {
        let url = self.endpoint(&["posts"])?;
        let response = self.http.post(url).bearer_auth(&self.token).json(post).send().await.context("Mattermost request failed")?;

        let created: Post = read_json(response).await?;
        debug!("Created post {}", created.id);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn open_event_stream(&self) -> Res<EventStream> {
        let (mut socket, _response) = connect_async(self.websocket_url.as_str()).await.context("Failed to connect to the Mattermost websocket")?;

        let challenge = json!({
            "seq": 1,
            "action": "authentication_challenge",
            "data": { "token": self.token },
        });

        socket
            .send(Message::Text(challenge.to_string()))
            .await
            .context("Failed to send the websocket authentication challenge")?;

        let events = socket.filter_map(|frame| async move {
            match frame {
                Ok(Message::Text(text)) => parse_frame(&text).map(Ok),
                Ok(Message::Close(frame)) => {
                    info!("Mattermost websocket closed: {:?}", frame);
                    None
                }
                // Pings are answered by tungstenite; binary frames are not used by the server.
                Ok(_) => None,
                Err(e) => Some(Err(anyhow::Error::from(e).context("Mattermost websocket error"))),
            }
        });

        Ok(events.boxed())
    }
}

// Helpers.

/// A text frame from the websocket: either a broadcast event or the reply to an action we sent.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Frame {
    Event(WebSocketEvent),
    Reply(ActionReply),
}

#[derive(Debug, Deserialize)]
struct ActionReply {
    status: String,
    #[serde(default)]
    seq_reply: i64,
    #[serde(default)]
    error: Option<Value>,
}

/// Parse a text frame, logging and dropping anything that is not an event.
fn parse_frame(text: &str) -> Option<WebSocketEvent> {
    match serde_json::from_str::<Frame>(text) {
        Ok(Frame::Event(event)) => Some(event),
        Ok(Frame::Reply(reply)) if reply.status == "OK" => {
            debug!(seq_reply = reply.seq_reply, "Websocket action acknowledged");
            None
        }
        Ok(Frame::Reply(reply)) => {
            error!(seq_reply = reply.seq_reply, "Mattermost rejected a websocket action: {:?}", reply.error);
            None
        }
        Err(e) => {
            warn!("Dropping malformed websocket frame: {}", e);
            None
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Res<T> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Mattermost API error {}: {}", status, body);
    }

    Ok(response.json().await?)
}

/// `{server}/api/v4/{segments...}`, keeping any path prefix the server is mounted under.
fn api_url(server: &Url, segments: &[&str]) -> Res<Url> {
    let mut url = server.clone();

    url.path_segments_mut()
        .map_err(|_| anyhow!("Mattermost server URL `{}` cannot be used as a base", server))?
        .pop_if_empty()
        .extend(["api", "v4"])
        .extend(segments);

    Ok(url)
}

/// The websocket endpoint for a server URL: `http` becomes `ws`, `https` becomes `wss`.
fn websocket_url(server: &Url) -> Res<Url> {
    let scheme = match server.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => bail!("Unsupported Mattermost server scheme `{}`", other),
    };

    let mut url = api_url(server, &["websocket"])?;
    url.set_scheme(scheme).map_err(|_| anyhow!("Failed to derive the websocket URL from `{}`", server))?;

    Ok(url)
}

// Tests.

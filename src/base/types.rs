use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::{DefaultOnNull, serde_as};

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

// Mattermost records.

/// A Mattermost user account (only the fields the bot needs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

/// A Mattermost team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

/// A Mattermost channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub display_name: String,
}

/// A message as carried by a `posted` event.
///
/// `root_id` is empty for top-level posts and holds the thread root otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub root_id: String,
    #[serde(default)]
    pub channel_id: String,
    pub user_id: String,
    #[serde(default)]
    pub message: String,
}

/// A post the bot is about to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub channel_id: String,
    pub message: String,
    /// Empty for a new top-level post; the thread root when replying.
    pub root_id: String,
}

// Websocket events.

/// Kinds of websocket events the server broadcasts.
///
/// Only `Posted` is acted upon; everything the bot does not know about lands in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Hello,
    Posted,
    PostEdited,
    PostDeleted,
    Typing,
    ChannelViewed,
    StatusChange,
    #[serde(other)]
    Other,
}

/// Routing information attached to every websocket event.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broadcast {
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub channel_id: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub team_id: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub user_id: String,
}

/// One event received over the Mattermost websocket.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSocketEvent {
    pub event: EventKind,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub broadcast: Broadcast,
    #[serde(default)]
    pub seq: i64,
}

impl WebSocketEvent {
    /// The channel this event was broadcast to (empty for non-channel events).
    pub fn channel_id(&self) -> &str {
        &self.broadcast.channel_id
    }

    /// Decode the serialized post carried by a `posted` event.
    ///
    /// The server ships the post as a JSON string inside `data.post`.
    pub fn decode_post(&self) -> Res<Post> {
        let raw = self.data.get("post").ok_or_else(|| anyhow!("event has no `post` payload"))?;
        let raw = raw.as_str().ok_or_else(|| anyhow!("`post` payload is not a string"))?;

        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const POSTED_FRAME: &str = r#"{
        "event": "posted",
        "data": {
            "channel_display_name": "Town Square",
            "channel_type": "O",
            "post": "{\"id\":\"p1\",\"root_id\":\"\",\"channel_id\":\"c1\",\"user_id\":\"u1\",\"message\":\"hello there\"}",
            "sender_name": "@alice"
        },
        "broadcast": { "omit_users": null, "user_id": "", "channel_id": "c1", "team_id": "" },
        "seq": 7
    }"#;

    #[test]
    fn parses_posted_frame() {
        let event: WebSocketEvent = serde_json::from_str(POSTED_FRAME).unwrap();

        assert_eq!(event.event, EventKind::Posted);
        assert_eq!(event.channel_id(), "c1");
        assert_eq!(event.seq, 7);

        let post = event.decode_post().unwrap();
        assert_eq!(post.id, "p1");
        assert_eq!(post.root_id, "");
        assert_eq!(post.user_id, "u1");
        assert_eq!(post.message, "hello there");
    }

    #[test]
    fn unknown_event_kinds_are_other() {
        let event: WebSocketEvent = serde_json::from_str(r#"{"event":"reaction_added","data":{},"broadcast":{"channel_id":"c1"},"seq":1}"#).unwrap();

        assert_eq!(event.event, EventKind::Other);
    }

    #[test]
    fn null_data_and_broadcast_fields_default() {
        let event: WebSocketEvent = serde_json::from_str(r#"{"event":"hello","data":null,"broadcast":{"channel_id":null,"team_id":null,"user_id":"u1"}}"#).unwrap();

        assert_eq!(event.event, EventKind::Hello);
        assert!(event.data.is_empty());
        assert_eq!(event.channel_id(), "");
        assert_eq!(event.broadcast.user_id, "u1");
    }

    #[test]
    fn decode_post_rejects_structural_errors() {
        let mut event: WebSocketEvent = serde_json::from_str(POSTED_FRAME).unwrap();

        event.data.insert("post".to_string(), json!(42));
        assert!(event.decode_post().is_err());

        event.data.insert("post".to_string(), json!("{not json"));
        assert!(event.decode_post().is_err());

        event.data.insert("post".to_string(), json!(r#"{"message":"missing ids"}"#));
        assert!(event.decode_post().is_err());

        event.data.remove("post");
        assert!(event.decode_post().is_err());
    }
}

//! The bot's resolved identity, team, and channel.

use anyhow::Context;
use tracing::{info, instrument, warn};

use crate::{
    base::{
        config::Config,
        types::{Channel, Res, Team, User},
    },
    service::chat::ChatClient,
};

/// Session state established once at startup.
///
/// It is never mutated afterwards; per-event tasks share it through an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The bot's own account.
    pub user: User,
    /// The team the bot works in.
    pub team: Team,
    /// The channel the bot listens to and replies in.
    pub channel: Channel,
}

impl Session {
    /// Log in and resolve the configured team and channel.
    ///
    /// Any failure here is a misconfiguration, so the error is meant to end the process.
    #[instrument(name = "Session::establish", skip_all)]
    pub async fn establish(chat: &ChatClient, config: &Config) -> Res<Self> {
        let user = chat.me().await.context("Could not log in")?;
        info!("Logged in to Mattermost as `{}` ({}).", user.username, user.id);

        if !config.username.is_empty() && config.username != user.username {
            warn!("Configured username `{}` does not match the token's account `{}`.", config.username, user.username);
        }

        let team = chat
            .team_by_name(&config.team)
            .await
            .with_context(|| format!("Could not find team `{}`. Is this bot a member?", config.team))?;

        let channel = chat
            .channel_by_name(&team.id, &config.channel)
            .await
            .with_context(|| format!("Could not find channel `{}`. Is this bot added to that channel?", config.channel))?;

        info!("Listening in channel `{}` ({}) of team `{}`.", channel.name, channel.id, team.name);

        Ok(Self { user, team, channel })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::anyhow;

    use super::*;
    use crate::{
        base::config::ConfigInner,
        service::chat::MockGenericChatClient,
    };

    fn config() -> Config {
        Config {
            inner: Arc::new(ConfigInner {
                server: "http://localhost:8065".to_string(),
                token: "token".to_string(),
                team: "acme".to_string(),
                channel: "surveys".to_string(),
                max_in_flight_dispatches: 4,
                ..Default::default()
            }),
        }
    }

    fn user() -> User {
        User { id: "bot".to_string(), username: "survey-bot".to_string() }
    }

    fn team() -> Team {
        Team { id: "t1".to_string(), name: "acme".to_string(), display_name: "Acme".to_string() }
    }

    fn channel() -> Channel {
        Channel { id: "c1".to_string(), name: "surveys".to_string(), team_id: "t1".to_string(), display_name: "Surveys".to_string() }
    }

    #[tokio::test]
    async fn resolves_user_team_and_channel() {
        let mut mock = MockGenericChatClient::new();
        mock.expect_me().returning(|| Ok(user()));
        mock.expect_team_by_name().withf(|name| name == "acme").returning(|_| Ok(team()));
        mock.expect_channel_by_name().withf(|team_id, name| team_id == "t1" && name == "surveys").returning(|_, _| Ok(channel()));

        let session = Session::establish(&ChatClient::new(Arc::new(mock)), &config()).await.unwrap();

        assert_eq!(session, Session { user: user(), team: team(), channel: channel() });
    }

    #[tokio::test]
    async fn login_failure_is_fatal() {
        let mut mock = MockGenericChatClient::new();
        mock.expect_me().returning(|| Err(anyhow!("401 Unauthorized")));
        mock.expect_team_by_name().never();

        let err = Session::establish(&ChatClient::new(Arc::new(mock)), &config()).await.unwrap_err();

        assert!(err.to_string().contains("Could not log in"));
    }

    #[tokio::test]
    async fn missing_channel_is_fatal() {
        let mut mock = MockGenericChatClient::new();
        mock.expect_me().returning(|| Ok(user()));
        mock.expect_team_by_name().returning(|_| Ok(team()));
        mock.expect_channel_by_name().returning(|_, _| Err(anyhow!("404 Not Found")));

        let err = Session::establish(&ChatClient::new(Arc::new(mock)), &config()).await.unwrap_err();

        assert!(err.to_string().contains("Could not find channel `surveys`"));
    }
}

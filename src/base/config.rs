//! Load configuration via `config` crate with env-override support.

use std::{fmt, ops::Deref, sync::Arc};

use serde::Deserialize;
use tracing::warn;

use crate::base::replies;

use super::types::Res;

/// Default cap on concurrently running message handlers.
fn default_max_in_flight_dispatches() -> u32 {
    64
}

/// Default delay before the first reconnect attempt.
fn default_reconnect_base_delay_ms() -> u64 {
    500
}

/// Default upper bound for the exponential reconnect delay.
fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

/// Default upper bound for the random jitter added to each reconnect delay.
fn default_reconnect_max_jitter_ms() -> u64 {
    250
}

/// Default grace period for in-flight handlers at shutdown.
fn default_shutdown_drain_timeout_secs() -> u64 {
    5
}

/// Default message posted to the channel once the bot is up.
fn default_startup_greeting() -> String {
    replies::STARTUP_GREETING.to_string()
}

/// Configuration for the survey-bot application.
#[derive(Debug, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Deserialize, Clone, Default)]
pub struct ConfigInner {
    /// Mattermost server base URL, e.g. `https://chat.example.com` (`MM_SERVER`).
    #[serde(default)]
    pub server: String,
    /// Personal access token of the bot account (`MM_TOKEN`).
    #[serde(default)]
    pub token: String,
    /// Name of the team the bot works in (`MM_TEAM`).
    #[serde(default)]
    pub team: String,
    /// Name of the channel the bot listens to and replies in (`MM_CHANNEL`).
    #[serde(default)]
    pub channel: String,
    /// Expected username of the bot account (`MM_USERNAME`).
    #[serde(default)]
    pub username: String,
    /// Maximum number of messages handled at the same time (`MM_MAX_IN_FLIGHT_DISPATCHES`).
    #[serde(default = "default_max_in_flight_dispatches")]
    pub max_in_flight_dispatches: u32,
    /// Delay before the first reconnect attempt, in milliseconds (`MM_RECONNECT_BASE_DELAY_MS`).
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Cap on the exponential reconnect delay, in milliseconds (`MM_RECONNECT_MAX_DELAY_MS`).
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// Upper bound of the random jitter added to every reconnect delay (`MM_RECONNECT_MAX_JITTER_MS`).
    #[serde(default = "default_reconnect_max_jitter_ms")]
    pub reconnect_max_jitter_ms: u64,
    /// Consecutive failed connection attempts before giving up; `0` retries forever (`MM_RECONNECT_MAX_RETRIES`).
    #[serde(default)]
    pub reconnect_max_retries: u32,
    /// Match the trigger word regardless of case (`MM_TRIGGER_CASE_INSENSITIVE`).
    #[serde(default)]
    pub trigger_case_insensitive: bool,
    /// Message posted to the channel at startup; empty disables it (`MM_STARTUP_GREETING`).
    #[serde(default = "default_startup_greeting")]
    pub startup_greeting: String,
    /// Seconds to wait for in-flight handlers when shutting down (`MM_SHUTDOWN_DRAIN_TIMEOUT_SECS`).
    #[serde(default = "default_shutdown_drain_timeout_secs")]
    pub shutdown_drain_timeout_secs: u64,
}

// The token never shows up in logs.
impl fmt::Debug for ConfigInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigInner")
            .field("server", &self.server)
            .field("token", &"<redacted>")
            .field("team", &self.team)
            .field("channel", &self.channel)
            .field("username", &self.username)
            .field("max_in_flight_dispatches", &self.max_in_flight_dispatches)
            .field("reconnect_base_delay_ms", &self.reconnect_base_delay_ms)
            .field("reconnect_max_delay_ms", &self.reconnect_max_delay_ms)
            .field("reconnect_max_jitter_ms", &self.reconnect_max_jitter_ms)
            .field("reconnect_max_retries", &self.reconnect_max_retries)
            .field("trigger_case_insensitive", &self.trigger_case_insensitive)
            .field("startup_greeting", &self.startup_greeting)
            .field("shutdown_drain_timeout_secs", &self.shutdown_drain_timeout_secs)
            .finish()
    }
}

impl Config {
    /// Load the configuration.
    ///
    /// Sources, lowest precedence first: a `.env` file (exported into the environment),
    /// the explicit file (or `.hidden/config.toml` when present), then `MM_*` environment variables.
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        if let Some(e) = dotenv_problem(dotenvy::dotenv()) {
            warn!("Could not load the `.env` file: {}", e);
        }

        let mut cfg = config::Config::builder();

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        cfg = cfg.add_source(config::Environment::with_prefix("MM").try_parsing(true));

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Check the tuning knobs; connection parameters are only checked when they are used.
    pub fn validate(&self) -> Res<()> {
        if self.max_in_flight_dispatches < 1 {
            return Err(anyhow::anyhow!("Max in-flight dispatches must be at least 1."));
        }

        if self.reconnect_max_delay_ms < self.reconnect_base_delay_ms {
            return Err(anyhow::anyhow!("Reconnect max delay must not be smaller than the base delay."));
        }

        Ok(())
    }
}

/// The error worth reporting from a `.env` load; a missing file is not one.
fn dotenv_problem<T>(result: dotenvy::Result<T>) -> Option<dotenvy::Error> {
    match result {
        Ok(_) => None,
        Err(e) if e.not_found() => None,
        Err(e) => Some(e),
    }
}

//! Canned messages the bot posts.

/// Acknowledgment posted when the greeting was sent inside an existing thread.
pub const EXISTING_THREAD_REPLY: &str = "I replied in an existing thread.";

/// Acknowledgment posted under a top-level greeting, which starts a new thread.
pub const NEW_THREAD_REPLY: &str = "I just replied to a new post, starting a chain.";

/// Default message posted to the channel once the bot has logged in.
pub const STARTUP_GREETING: &str = "Hi! I am a bot.";

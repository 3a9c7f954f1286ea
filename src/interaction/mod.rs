//! Event handling for survey-bot.
//!
//! This module turns the server's event feed into replies:
//! - Keeping the websocket subscription alive (`consumer`)
//! - Filtering events and spawning handlers (`dispatcher`)
//! - Matching greetings and posting acknowledgments (`responder`, `trigger`)

pub mod consumer;
pub mod dispatcher;
pub mod responder;
pub mod trigger;

//! Service integrations for external APIs and clients.
//!
//! This module contains the chat service used by the survey-bot. It defines a
//! generic trait and a concrete Mattermost implementation, allowing for easy testing.

pub mod chat;

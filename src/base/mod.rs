//! Core components, types, and utilities for the survey-bot.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - Canned replies the bot posts.
//! - Common types and result handling.

pub mod config;
pub mod replies;
pub mod types;

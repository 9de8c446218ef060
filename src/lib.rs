//! igfetch bot library.
//!
//! Conversation state, fetch orchestration, staging and delivery for a
//! Telegram front-end that pulls media from Instagram.

/// Telegram-facing logic: conversation, delivery, handlers, views.
pub mod bot;
/// Configuration management.
pub mod config;
/// Worker pool for blocking platform calls.
pub mod executor;
/// Fetch orchestration on top of the platform client.
pub mod fetch;
/// External platform client abstraction and Instagram implementation.
pub mod platform;
/// Telegram dispatcher wiring.
pub mod runner;
/// Per-requester session blobs on disk.
pub mod session;
/// Staging folders, media bundles and archive packaging.
pub mod staging;
/// Utility functions.
pub mod utils;

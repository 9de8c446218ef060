/// Conversation state machine
pub mod conversation;
/// Staged media delivery
pub mod delivery;
/// Outbound chat gateway
pub mod gateway;
/// Per-request handlers
pub mod handlers;
/// Keyboards and texts
pub mod views;

pub use conversation::{Action, CallbackOutcome, Conversation, Menu, Prompt, PromptStore};
pub use gateway::{ChatGateway, TelegramGateway};

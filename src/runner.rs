//! Telegram runtime: dispatcher wiring, commands and update endpoints.

use crate::bot::conversation::{CallbackOutcome, Conversation, Menu};
use crate::bot::gateway::TelegramGateway;
use crate::bot::{handlers, views};
use crate::config::Settings;
use crate::fetch::Fetcher;
use anyhow::Result;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ParseMode, User};
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info};

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message and main menu
    #[command(description = "Start the bot.")]
    Start,
    /// Explain the available flows
    #[command(description = "Show help.")]
    Help,
    /// Check bot health
    #[command(description = "Check bot health.")]
    Healthcheck,
}

/// Requester id of an update sender. Updates without a sender (channel
/// posts, anonymous admins) have no requester and are ignored.
fn requester_id(from: Option<&User>) -> Option<i64> {
    from.map(|u| u.id.0.cast_signed())
}

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<Settings>, fetcher: Arc<Fetcher>) {
    let bot = Bot::new(settings.bot_token.clone());
    let conversation = Arc::new(Conversation::new());
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![settings, fetcher, conversation])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text),
                ),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    settings: Arc<Settings>,
    conversation: Arc<Conversation>,
) -> Result<(), teloxide::RequestError> {
    let Some(user_id) = requester_id(msg.from.as_ref()) else {
        debug!(chat_id = msg.chat.id.0, "Ignoring command without a sender");
        return respond(());
    };
    let res = match cmd {
        Command::Start => {
            info!(user_id, "Start command");
            conversation.prompts().clear(user_id).await;
            bot.send_message(msg.chat.id, views::WELCOME)
                .parse_mode(ParseMode::Html)
                .reply_markup(views::menu_keyboard(Menu::Main, settings.is_owner(user_id)))
                .await
        }
        Command::Help => {
            bot.send_message(msg.chat.id, views::HELP)
                .parse_mode(ParseMode::Html)
                .await
        }
        Command::Healthcheck => {
            info!(user_id, "Healthcheck command");
            bot.send_message(msg.chat.id, "OK").await
        }
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    settings: Arc<Settings>,
    fetcher: Arc<Fetcher>,
    conversation: Arc<Conversation>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = process_text(bot, &msg, &settings, &fetcher, &conversation).await {
        error!("Text handler error: {}", e);
    }
    respond(())
}

async fn process_text(
    bot: Bot,
    msg: &Message,
    settings: &Settings,
    fetcher: &Fetcher,
    conversation: &Conversation,
) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(user_id) = requester_id(msg.from.as_ref()) else {
        debug!(chat_id = msg.chat.id.0, "Ignoring text without a sender");
        return Ok(());
    };
    let action = conversation
        .handle(user_id, settings.is_owner(user_id), text)
        .await;

    let gateway = TelegramGateway::new(bot, msg.chat.id);
    handlers::execute(action, user_id, &gateway, fetcher).await
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    settings: Arc<Settings>,
    conversation: Arc<Conversation>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = process_callback(&bot, &q, &settings, &conversation).await {
        error!("Callback handler error: {}", e);
    }
    respond(())
}

async fn process_callback(
    bot: &Bot,
    q: &CallbackQuery,
    settings: &Settings,
    conversation: &Conversation,
) -> Result<()> {
    let user_id = q.from.id.0.cast_signed();
    let is_owner = settings.is_owner(user_id);
    let data = q.data.as_deref().unwrap_or_default();

    let outcome = conversation.on_callback(user_id, is_owner, data).await;

    if let Some(CallbackOutcome::Denied) = outcome {
        info!(user_id, "Owner-only action refused");
        bot.answer_callback_query(q.id.clone())
            .text(views::OWNER_ONLY_BUTTON)
            .show_alert(true)
            .await?;
        return Ok(());
    }

    bot.answer_callback_query(q.id.clone()).await?;

    let Some(message) = q.regular_message() else {
        return Ok(());
    };
    let (chat_id, message_id) = (message.chat.id, message.id);

    match outcome {
        Some(CallbackOutcome::ShowMenu(menu)) => {
            bot.edit_message_text(chat_id, message_id, views::menu_title(menu))
                .reply_markup(views::menu_keyboard(menu, is_owner))
                .await?;
        }
        Some(CallbackOutcome::AwaitReply(prompt)) => {
            bot.edit_message_text(chat_id, message_id, views::prompt_text(prompt))
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Some(CallbackOutcome::Denied) | None => {}
    }
    Ok(())
}

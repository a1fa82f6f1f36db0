pub mod callbacks;
pub mod commands;

use std::{sync::Arc, time::Instant};

use teloxide::{
    prelude::*,
    types::{ChatMemberUpdated, Me},
    RequestError,
};

use crate::{
    config::Config,
    database::Database,
    processor::{InboundMessage, MessageProcessor},
};

pub use callbacks::handle_callback_query;
use commands::CommandParams;

pub async fn handle_new_message(
    bot: Bot,
    me: Me,
    message: Message,
    config: Arc<Config>,
    database: Arc<Database>,
    processor: Arc<MessageProcessor>,
    started_at: Instant,
) -> Result<(), RequestError> {
    let sender_id = message.from.as_ref().map(|from| from.id);
    // Bot ignores messages made by itself.
    if sender_id == Some(me.id) {
        return Ok(());
    }

    if let Some(command) = CommandParams::new(
        &bot, &me, &message, &config, &database, &processor, started_at,
    )
    .and_then(CommandParams::make_command)
    {
        return command.await;
    }

    match database.is_chat_fixing_enabled(message.chat.id).await {
        Ok(true) => {}
        Ok(false) => return Ok(()),
        Err(e) => {
            log::error!("Failed to check if fixing is on in {}: {e}", message.chat.id);
            return Ok(());
        }
    }

    let Some(inbound) = InboundMessage::from_message(&message) else {
        return Ok(());
    };

    let action = match processor.process(me.id, &inbound).await {
        Ok(action) => action,
        Err(e) => {
            log::error!("Failed to process a message in {}: {e}", message.chat.id);
            return Ok(());
        }
    };

    if let Err(e) = processor
        .execute(&bot, message.chat.id, message.id, action)
        .await
    {
        // Not much else to do. Both messages may be in the chat now.
        log::warn!("Failed to fix a message in {}: {e}", message.chat.id);
    }

    Ok(())
}

/// Remember chats the bot gets added to or whose title changed.
pub async fn handle_my_chat_member(
    update: ChatMemberUpdated,
    database: Arc<Database>,
) -> Result<(), RequestError> {
    if !update.new_chat_member.kind.is_present() {
        log::info!("Left chat {}", update.chat.id);
        return Ok(());
    }

    if let Err(e) = database.add_chat(update.chat.id, update.chat.title()).await {
        log::error!("Failed to remember chat {}: {e}", update.chat.id);
        return Ok(());
    }
    log::info!(
        "Now in chat {} ({})",
        update.chat.id,
        update.chat.title().unwrap_or("no title")
    );
    Ok(())
}

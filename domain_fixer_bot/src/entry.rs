use std::{sync::Arc, time::Instant};
use teloxide::{dptree::deps, prelude::*};

use crate::{
    config::{Config, RegistryKind},
    database::Database,
    fixers::{DomainRegistry, FixerTable},
    handlers::{self, commands::Command},
    processor::MessageProcessor,
};

/// Run the bot until it's stopped with Ctrl+C.
///
/// Returns early, with an error logged, if the database can't be opened or
/// Telegram doesn't accept the token.
pub async fn entry(config: Config) {
    log::info!("ASYNC WOOOO");
    let started_at = Instant::now();

    let bot = Bot::new(&config.token);

    if let Err(e) = bot.set_my_commands(Command::generate_bot_commands()).await {
        log::error!("Failed to set bot commands! {e}");
        return;
    }

    // Shows up in the bot's profile, so it's the closest thing to a status line.
    if let Err(e) = bot
        .set_my_short_description()
        .short_description(config.activity.clone())
        .await
    {
        log::warn!("Failed to set the bot description: {e}");
    }

    let database = match Database::new(&config.database_url).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            log::error!("Failed to open the database at {}: {e}", config.database_url);
            return;
        }
    };

    let registry = match config.registry {
        RegistryKind::Database => DomainRegistry::Persisted(database.clone()),
        RegistryKind::Static => DomainRegistry::Static(FixerTable::defaults()),
    };
    log::info!("Domain fixers come from the {}", registry.kind());

    let processor = Arc::new(MessageProcessor {
        registry,
        policy: config.rewrite_policy,
        silent_broad_mentions: config.silent_broad_mentions,
        reply_like_original: config.reply_like_original,
    });

    let config = Arc::new(config);

    log::info!("Creating the handler...");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handlers::handle_new_message))
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback_query))
        .branch(Update::filter_my_chat_member().endpoint(handlers::handle_my_chat_member));

    log::info!("Dispatching the dispatcher!");

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .dependencies(deps![config, database.clone(), processor, started_at])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("it appears we have been bonked.");

    database.close().await;
}

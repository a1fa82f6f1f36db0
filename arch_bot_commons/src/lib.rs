//! This crate houses functions common for my bots, because some things
//! are just boilerplate and aaAAAAAAAAA

pub mod useful_methods;

use std::future::Future;

use teloxide::{prelude::*, types::ChatMember, RequestError};

/// Initialize logging and run the `closure` to completion in an async runtime.
///
/// Logging uses the filter from the environment variable `RUST_LOG`, or
/// `default_filter` if it's not set. This uses the crate [pretty_env_logger][]
/// internally, see its documentation for more details on the filter syntax.
///
/// # Panics
///
/// Panics if the tokio runtime can't be built.
///
/// [pretty_env_logger]: https://docs.rs/pretty_env_logger
pub fn start_everything<T>(default_filter: &str, closure: impl Future<Output = T>) -> T {
    let log_filter = std::env::var_os("RUST_LOG")
        .and_then(|x| x.into_string().ok())
        .unwrap_or_else(|| default_filter.to_string());

    // journald timestamps the lines by itself.
    let running_as_systemd_service = std::env::var_os("JOURNAL_STREAM").is_some();

    let mut builder = match running_as_systemd_service {
        true => pretty_env_logger::formatted_builder(),
        false => pretty_env_logger::formatted_timed_builder(),
    };

    builder.parse_filters(&log_filter);

    if builder.try_init().is_err() {
        log::error!("Tried to init logger twice!");
    }

    log::info!("hi");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build the tokio runtime!")
        .block_on(closure)
}

/// Find out if a user of this ID is an admin (or the owner) of the specified chat.
///
/// Private chats have no admins, so this asks Telegram anyway and
/// will most likely get `false` for anyone but the chat partner.
pub async fn is_chat_admin(bot: &Bot, user: UserId, chat: ChatId) -> Result<bool, RequestError> {
    let ChatMember { kind, .. } = bot.get_chat_member(chat, user).await?;
    Ok(kind.is_privileged())
}

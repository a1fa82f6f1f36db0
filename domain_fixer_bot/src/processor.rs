//! Deciding what to do with a new message, and doing it.

use arch_bot_commons::useful_methods::*;
use teloxide::{
    prelude::*,
    types::{MessageId, UserId},
    ApiError, RequestError,
};

use crate::{
    error::FixerError,
    fixers::{rewrite, DomainRegistry, Rewrite, RewritePolicy},
};

/// Words that ping the whole chat.
const BROAD_MENTIONS: &[&str] = &["@all", "@everyone", "@here"];

/// The parts of a message that matter for fixing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage<'a> {
    pub author_id: Option<UserId>,
    /// Name to credit the original message to.
    pub author_name: String,
    pub text: &'a str,
    pub mentions_everyone: bool,
    pub reply_to: Option<MessageId>,
}

impl<'a> InboundMessage<'a> {
    /// Returns [`None`] for messages without text. Captions don't count, since
    /// resending a caption alone would lose the media it's attached to.
    #[must_use]
    pub fn from_message(message: &'a Message) -> Option<Self> {
        let text = message.text()?;
        Some(InboundMessage {
            author_id: message.from.as_ref().map(|user| user.id),
            author_name: message.sender_display_name(),
            text,
            mentions_everyone: mentions_everyone(text),
            reply_to: message.reply_to_id(),
        })
    }
}

/// Whether this text pings everyone in the chat.
#[must_use]
pub fn mentions_everyone(text: &str) -> bool {
    text.split_whitespace().any(|word| {
        let word = word.trim_end_matches(|x: char| x.is_ascii_punctuation());
        BROAD_MENTIONS.iter().any(|x| x.eq_ignore_ascii_case(word))
    })
}

/// What to do about a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Leave it be.
    Ignore,
    /// Post `text` as a new message, then delete the original.
    ReplaceAndDelete {
        text: String,
        /// Send without a notification.
        silent: bool,
        /// Reply to this message, like the original did.
        reply_to: Option<MessageId>,
    },
}

pub struct MessageProcessor {
    pub registry: DomainRegistry,
    pub policy: RewritePolicy,
    /// Replace messages that ping everyone silently, so that the ping isn't repeated.
    pub silent_broad_mentions: bool,
    /// Make the replacement reply to what the original replied to.
    pub reply_like_original: bool,
}

impl MessageProcessor {
    /// Decide what to do about a message. `bot_id` is our own ID; our own
    /// messages are never touched.
    ///
    /// The fixer table is read anew for every message.
    pub async fn process(
        &self,
        bot_id: UserId,
        message: &InboundMessage<'_>,
    ) -> Result<Action, FixerError> {
        log::debug!("Got a message from {}", message.author_name);

        if message.author_id == Some(bot_id) {
            log::debug!("That message is mine");
            return Ok(Action::Ignore);
        }

        let table = self.registry.snapshot().await?;

        match rewrite(message.text, &message.author_name, &table, &self.policy) {
            Rewrite::Unchanged(_) => {
                log::debug!("The original message is already fine");
                Ok(Action::Ignore)
            }
            Rewrite::Changed(text) => Ok(Action::ReplaceAndDelete {
                text,
                silent: self.silent_broad_mentions && message.mentions_everyone,
                reply_to: message.reply_to.filter(|_| self.reply_like_original),
            }),
        }
    }

    /// Carry out an action on a message in a chat.
    ///
    /// The replacement is sent first. If deleting the original fails after that,
    /// both stay in the chat. A message someone else already deleted is fine.
    pub async fn execute(
        &self,
        bot: &Bot,
        chat_id: ChatId,
        message_id: MessageId,
        action: Action,
    ) -> Result<(), FixerError> {
        let Action::ReplaceAndDelete {
            text,
            silent,
            reply_to,
        } = action
        else {
            return Ok(());
        };

        bot.archsendmsg_plain(chat_id, &text, SendOptions { silent, reply_to })
            .await
            .map_err(FixerError::PlatformSend)?;

        match bot.delete_message(chat_id, message_id).await {
            Ok(_) => Ok(()),
            Err(RequestError::Api(
                ApiError::MessageIdInvalid | ApiError::MessageToDeleteNotFound,
            )) => {
                // Someone else probably has already deleted it. That's fine.
                Ok(())
            }
            Err(e) => Err(FixerError::PlatformDelete(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        database::Database,
        fixers::{FixerTable, WwwPolicy},
    };
    use std::sync::Arc;

    const BOT_ID: UserId = UserId(777);

    fn processor(registry: DomainRegistry) -> MessageProcessor {
        MessageProcessor {
            registry,
            policy: RewritePolicy::default(),
            silent_broad_mentions: true,
            reply_like_original: true,
        }
    }

    fn message(text: &str) -> InboundMessage<'_> {
        InboundMessage {
            author_id: Some(UserId(42)),
            author_name: "@someone".to_string(),
            text,
            mentions_everyone: mentions_everyone(text),
            reply_to: None,
        }
    }

    #[tokio::test]
    async fn fixes_links() {
        let processor = processor(DomainRegistry::Static(FixerTable::defaults()));
        let action = processor
            .process(BOT_ID, &message("https://x.com/a/status/1"))
            .await
            .unwrap();
        assert_eq!(
            action,
            Action::ReplaceAndDelete {
                text: "https://fixupx.com/a/status/1\nOriginal message posted by @someone"
                    .to_string(),
                silent: false,
                reply_to: None,
            }
        );
    }

    #[tokio::test]
    async fn own_messages_are_ignored() {
        let processor = processor(DomainRegistry::Static(FixerTable::defaults()));
        let mut own = message("https://x.com/a/status/1");
        own.author_id = Some(BOT_ID);
        assert_eq!(processor.process(BOT_ID, &own).await.unwrap(), Action::Ignore);
    }

    #[tokio::test]
    async fn fine_messages_are_ignored() {
        let processor = processor(DomainRegistry::Static(FixerTable::defaults()));
        for text in ["hi", "https://example.com/", "https://fixupx.com/a/status/1"] {
            assert_eq!(
                processor.process(BOT_ID, &message(text)).await.unwrap(),
                Action::Ignore
            );
        }
    }

    #[tokio::test]
    async fn broad_mentions_and_replies_carry_over() {
        let mut processor = processor(DomainRegistry::Static(FixerTable::defaults()));
        processor.policy.www = WwwPolicy::Drop;

        let mut msg = message("@everyone look https://www.reddit.com/r/a");
        msg.reply_to = Some(MessageId(5));

        let action = processor.process(BOT_ID, &msg).await.unwrap();
        assert_eq!(
            action,
            Action::ReplaceAndDelete {
                text: "@everyone look https://rxddit.com/r/a\nOriginal message posted by @someone"
                    .to_string(),
                silent: true,
                reply_to: Some(MessageId(5)),
            }
        );

        processor.silent_broad_mentions = false;
        processor.reply_like_original = false;
        let Action::ReplaceAndDelete {
            silent, reply_to, ..
        } = processor.process(BOT_ID, &msg).await.unwrap()
        else {
            panic!("message should have been fixed");
        };
        assert!(!silent);
        assert_eq!(reply_to, None);
    }

    #[tokio::test]
    async fn broken_database_is_reported() {
        let database = Arc::new(Database::new("sqlite::memory:").await.unwrap());
        let processor = processor(DomainRegistry::Persisted(database.clone()));

        assert!(matches!(
            processor.process(BOT_ID, &message("https://x.com/a")).await,
            Ok(Action::ReplaceAndDelete { .. })
        ));

        database.close().await;
        assert!(matches!(
            processor.process(BOT_ID, &message("https://x.com/a")).await,
            Err(FixerError::PersistenceUnavailable(_))
        ));
    }

    #[test]
    fn broad_mention_detection() {
        assert!(mentions_everyone("@everyone hi"));
        assert!(mentions_everyone("hey @HERE!"));
        assert!(mentions_everyone("@all, look"));
        assert!(!mentions_everyone("email@everyone.com"));
        assert!(!mentions_everyone("@everyones_favorite"));
        assert!(!mentions_everyone("everyone"));
    }
}

use std::{future::Future, time::Duration};

use teloxide::{
    payloads::SendMessageSetters,
    requests::Requester,
    sugar::request::RequestReplyExt,
    types::{Message, MessageId, Recipient},
    Bot, RequestError,
};

/// Maximum length of a single Telegram text message, in UTF-16 code units.
/// Counting bytes instead is stricter, so it's what we do.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// How a message should be sent by [`BotArchSendMsg::archsendmsg_plain`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Send without a notification sound.
    pub silent: bool,
    /// Reply to this message. Only the first part of a split message is a reply.
    pub reply_to: Option<MessageId>,
}

pub trait BotArchSendMsg {
    /// Opinionated method to send a plain text message (no markup parsing), with
    /// retries due to flood waiting. Also splits the message into many if it's longer
    /// than the character limit.
    fn archsendmsg_plain(
        &self,
        to_where: impl Into<Recipient> + Send,
        text: &str,
        options: SendOptions,
    ) -> impl Future<Output = Result<Vec<Message>, RequestError>> + Send;
}

impl BotArchSendMsg for Bot {
    async fn archsendmsg_plain(
        &self,
        to_where: impl Into<Recipient> + Send,
        text: &str,
        options: SendOptions,
    ) -> Result<Vec<Message>, RequestError> {
        let to_where: Recipient = to_where.into();
        let mut sent_messages = Vec::new();

        for (index, part) in split_by_length(text, TELEGRAM_MESSAGE_LIMIT)
            .into_iter()
            .enumerate()
        {
            if index > 0 {
                // Don't hammer the API with a wall of text.
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            // Try up to 3 times lol
            let mut looped: u8 = 0;
            let message = loop {
                looped += 1;
                let mut request = self
                    .send_message(to_where.clone(), part)
                    .disable_notification(options.silent);
                if let (0, Some(reply_to)) = (index, options.reply_to) {
                    request = request.reply_to(reply_to);
                }

                match request.await {
                    Ok(message) => break message,
                    Err(RequestError::RetryAfter(seconds)) if looped < 3 => {
                        log::debug!("Flood wait of {seconds:?} while sending, retrying");
                        tokio::time::sleep(seconds.duration()).await;
                    }
                    Err(e) => return Err(e),
                }
            };

            sent_messages.push(message);
        }

        Ok(sent_messages)
    }
}

/// Splits text into parts that are each at most `max_len` bytes long.
///
/// Tries to cut at a newline, then at whitespace, then at any character boundary, in
/// that order of preference. Whitespace at the cut is dropped. Empty input yields no parts.
///
/// # Panics
///
/// Panics if `max_len` is less than 4, the largest possible size of a character.
#[must_use]
pub fn split_by_length(text: &str, max_len: usize) -> Vec<&str> {
    assert!(max_len >= 4, "Max length is too small");

    let mut output = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        if rest.len() <= max_len {
            output.push(rest);
            break;
        }

        // Largest char boundary that fits.
        let mut limit = max_len;
        while !rest.is_char_boundary(limit) {
            limit -= 1;
        }
        let window = &rest[..limit];

        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(char::is_whitespace))
            .filter(|&at| at > 0)
            .unwrap_or(limit);

        output.push(rest[..cut].trim_end());
        rest = rest[cut..].trim_start();
    }

    output
}

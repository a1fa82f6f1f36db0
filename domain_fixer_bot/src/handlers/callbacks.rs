use std::{fmt::Display, str::FromStr, sync::Arc};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use html_escape::encode_text;
use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode},
    ApiError, RequestError,
};

use crate::{
    config::Config,
    database::Database,
    fixers::DomainFixer,
    processor::MessageProcessor,
    timestamp::{resolve_timezone, TimestampStyle},
};

/// "Size of the callback data in bytes: 1-64"
/// - https://core.telegram.org/bots/api#inlinekeyboardbutton
pub const MAX_CALLBACK_DATA_LEN: usize = 64;

/// What a button press is about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackData {
    /// Show a Unix timestamp in some style.
    Timestamp { unix: i64, style: TimestampStyle },
    /// Enable or disable the fixer of this domain.
    ToggleFixer(String),
}

impl Display for CallbackData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timestamp { unix, style } => write!(f, "TS {} {}", unix, style.letter()),
            Self::ToggleFixer(domain) => write!(f, "FX {}", domain),
        }
    }
}

impl FromStr for CallbackData {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(' ');
        match parts.next() {
            Some("TS") => {
                let unix = parts
                    .next()
                    .and_then(|x| x.parse().ok())
                    .ok_or("bad timestamp")?;
                let style = parts
                    .next()
                    .and_then(|x| {
                        let mut chars = x.chars();
                        match (chars.next(), chars.next()) {
                            (Some(letter), None) => TimestampStyle::from_letter(letter),
                            _ => None,
                        }
                    })
                    .ok_or("bad timestamp style")?;
                if parts.next().is_some() {
                    return Err("too many parameters");
                }
                Ok(Self::Timestamp { unix, style })
            }
            Some("FX") => match (parts.next(), parts.next()) {
                (Some(domain), None) if !domain.is_empty() => {
                    Ok(Self::ToggleFixer(domain.to_string()))
                }
                _ => Err("bad domain"),
            },
            _ => Err("unknown action"),
        }
    }
}

/// Keyboard with a button for every timestamp style.
#[must_use]
pub fn timestamp_keyboard(unix: i64) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = TimestampStyle::ALL
        .into_iter()
        .map(|style| {
            InlineKeyboardButton::callback(
                format!("{} - {}", style.letter(), style.example()),
                CallbackData::Timestamp { unix, style }.to_string(),
            )
        })
        .collect();
    InlineKeyboardMarkup::new(buttons.chunks(2).map(<[_]>::to_vec))
}

/// Text listing domain fixers, and optionally a keyboard to toggle them.
///
/// Fixers whose domain is too long to fit in a button's data get no button.
#[must_use]
pub fn fixer_list(
    fixers: &[DomainFixer],
    source: &str,
    with_buttons: bool,
) -> (String, Option<InlineKeyboardMarkup>) {
    let mut text = format!("<b>Domain fixers</b> ({}):\n\n", encode_text(source));
    if fixers.is_empty() {
        text.push_str("None at all.");
    }
    for fixer in fixers {
        text.push_str(&encode_text(&fixer.to_string()));
        text.push('\n');
    }

    if !with_buttons {
        return (text, None);
    }

    let rows: Vec<Vec<InlineKeyboardButton>> = fixers
        .iter()
        .filter_map(|fixer| {
            let data = CallbackData::ToggleFixer(fixer.original.clone()).to_string();
            if data.len() > MAX_CALLBACK_DATA_LEN {
                return None;
            }
            let label = match fixer.enabled {
                true => format!("Disable {}", fixer.original),
                false => format!("Enable {}", fixer.original),
            };
            Some(vec![InlineKeyboardButton::callback(label, data)])
        })
        .collect();

    (text, Some(InlineKeyboardMarkup::new(rows)))
}

/// What to show when someone picks a timestamp style.
#[must_use]
pub fn timestamp_alert(unix: i64, style: TimestampStyle, tz: Tz, now: DateTime<Utc>) -> String {
    let Some(moment) = DateTime::from_timestamp(unix, 0) else {
        return "That timestamp is out of range.".to_string();
    };
    let moment = moment.with_timezone(&tz);
    format!(
        "{}\n\nTimezone: {}\nUnix timestamp: {}",
        style.render(&moment, now),
        tz.name(),
        unix
    )
}

pub async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    config: Arc<Config>,
    database: Arc<Database>,
    processor: Arc<MessageProcessor>,
) -> Result<(), RequestError> {
    macro_rules! goodbye {
        ($text:expr) => {
            bot.answer_callback_query(query.id.clone())
                .text($text)
                .show_alert(true)
                .await?;
            return Ok(());
        };
        () => {
            bot.answer_callback_query(query.id.clone()).await?;
            return Ok(());
        };
    }

    let Some(query_data) = &query.data else {
        goodbye!("No query data.");
    };

    let data = match CallbackData::from_str(query_data) {
        Ok(data) => data,
        Err(e) => {
            goodbye!(format!("Invalid query data: {}", e));
        }
    };

    match data {
        CallbackData::Timestamp { unix, style } => {
            // Shown in the timezone of whoever pressed it, not who asked for it.
            let tz = match database.get_user_timezone(query.from.id).await {
                Ok(name) => name.as_deref().and_then(resolve_timezone).unwrap_or(Tz::UTC),
                Err(e) => {
                    log::error!("Failed to get user timezone: {e}");
                    Tz::UTC
                }
            };
            goodbye!(timestamp_alert(unix, style, tz, Utc::now()));
        }
        CallbackData::ToggleFixer(domain) => {
            if !config.is_owner(query.from.id) {
                goodbye!("Access denied.");
            }
            let Some(fixers_db) = processor.registry.database() else {
                goodbye!("Domain fixers can't be changed while the static table is in use.");
            };

            let enabled = match fixers_db.toggle_domain_fixer(&domain).await {
                Ok(Some(enabled)) => enabled,
                Ok(None) => {
                    goodbye!(format!("No such domain fixer: {}", domain));
                }
                Err(e) => {
                    log::error!("Failed to toggle domain fixer {domain}: {e}");
                    goodbye!("Database error. Please try again later.");
                }
            };
            log::info!(
                "User {} turned the fixer of {} {}",
                query.from.id,
                domain,
                if enabled { "on" } else { "off" }
            );

            // Refresh the list the button was on.
            if let (Some(message), Ok(fixers)) = (
                query.regular_message(),
                fixers_db.get_domain_fixers(false).await,
            ) {
                let (text, keyboard) = fixer_list(&fixers, processor.registry.kind(), true);
                let mut request = bot
                    .edit_message_text(message.chat.id, message.id, text)
                    .parse_mode(ParseMode::Html);
                if let Some(keyboard) = keyboard {
                    request = request.reply_markup(keyboard);
                }
                match request.await {
                    Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => {}
                    Err(e) => return Err(e),
                }
            }

            bot.answer_callback_query(query.id.clone())
                .text(format!(
                    "{} is now {}",
                    domain,
                    if enabled { "enabled" } else { "disabled" }
                ))
                .await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn callback_data_parsing() {
        assert_eq!(
            "TS 1614639000 R".parse(),
            Ok(CallbackData::Timestamp {
                unix: 1614639000,
                style: TimestampStyle::Relative
            })
        );
        assert_eq!(
            "TS -5 d".parse(),
            Ok(CallbackData::Timestamp {
                unix: -5,
                style: TimestampStyle::ShortDate
            })
        );
        assert_eq!(
            "FX reddit.com".parse(),
            Ok(CallbackData::ToggleFixer("reddit.com".to_string()))
        );

        for bad in ["", "TS", "TS 12", "TS 12 X", "TS 12 RR", "TS x R", "TS 1 R 2", "FX", "FX a b", "REVIEW 1"] {
            assert!(bad.parse::<CallbackData>().is_err(), "{bad}");
        }
    }

    #[test]
    fn callback_data_printing() {
        let data = CallbackData::Timestamp {
            unix: 1614639000,
            style: TimestampStyle::LongDateTime,
        };
        assert_eq!(data.to_string(), "TS 1614639000 F");
        assert_eq!(data.to_string().parse(), Ok(data));
    }

    #[test]
    fn timestamp_keyboard_fits() {
        let keyboard = timestamp_keyboard(i64::MIN);
        let buttons: Vec<&InlineKeyboardButton> = keyboard.inline_keyboard.iter().flatten().collect();
        assert_eq!(buttons.len(), TimestampStyle::ALL.len());
        for row in &keyboard.inline_keyboard {
            assert!(row.len() <= 2);
        }
        assert!(CallbackData::Timestamp {
            unix: i64::MIN,
            style: TimestampStyle::LongDateTime
        }
        .to_string()
        .len()
            <= MAX_CALLBACK_DATA_LEN);
    }

    #[test]
    fn fixer_list_buttons() {
        let long_domain = format!("{}.com", "a".repeat(80));
        let fixers = [
            DomainFixer::new("reddit.com", "rxddit", true),
            DomainFixer::new("x.com", "fixupx", false),
            DomainFixer::new(&long_domain, "b", true),
        ];

        let (text, keyboard) = fixer_list(&fixers, "database", true);
        assert!(text.contains("✅ reddit.com -&gt; rxddit"));
        assert!(text.contains("❌ x.com -&gt; fixupx"));
        let keyboard = keyboard.unwrap();
        // The long one doesn't fit into button data.
        assert_eq!(keyboard.inline_keyboard.len(), 2);
        assert_eq!(keyboard.inline_keyboard[0][0].text, "Disable reddit.com");
        assert_eq!(keyboard.inline_keyboard[1][0].text, "Enable x.com");

        let (_, keyboard) = fixer_list(&fixers, "database", false);
        assert!(keyboard.is_none());
    }

    #[test]
    fn alert_text() {
        let berlin = resolve_timezone("Europe/Berlin").unwrap();
        let now = DateTime::from_timestamp(1614639000, 0).unwrap();
        assert_eq!(
            timestamp_alert(1614639000, TimestampStyle::ShortTime, berlin, now),
            "23:50\n\nTimezone: Europe/Berlin\nUnix timestamp: 1614639000"
        );
        assert_eq!(
            timestamp_alert(1614639000, TimestampStyle::Relative, Tz::UTC, now),
            "now\n\nTimezone: UTC\nUnix timestamp: 1614639000"
        );
    }
}

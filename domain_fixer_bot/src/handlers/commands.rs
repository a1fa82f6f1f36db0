use std::{future::Future, pin::Pin, time::Duration, time::Instant};

use arch_bot_commons::{is_chat_admin, useful_methods::*};
use chrono::Utc;
use html_escape::encode_text;
use teloxide::{
    prelude::*,
    sugar::request::RequestReplyExt,
    types::{BotCommand, Me, ParseMode},
    RequestError,
};

use crate::{
    config::Config,
    database::Database,
    fixers::{validate_fixer, DomainFixer},
    handlers::callbacks::{fixer_list, timestamp_keyboard},
    processor::MessageProcessor,
    timestamp::{find_timezones, parse_date_time, resolve_timezone},
};

pub const COMMANDS: &[Command] = &[
    START,
    HELP,
    PING,
    STATUS,
    SET_TIMEZONE,
    TIMEZONE,
    TIMESTAMP,
    FIXERS,
    FIXER_ENABLE,
    FIXER_DISABLE,
    FIXER_SET,
    FIXING_ON,
    FIXING_OFF,
];

pub type Ret = Result<(), RequestError>;
pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = Ret> + Send + 'a>>;

pub struct CommandParams<'a> {
    pub bot: &'a Bot,
    pub bot_me: &'a Me,
    pub message: &'a Message,
    pub message_text: &'a str,
    pub command_len: usize,
    pub config: &'a Config,
    pub database: &'a Database,
    pub processor: &'a MessageProcessor,
    pub started_at: Instant,
}

impl<'a> CommandParams<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new<'new>(
        bot: &'new Bot,
        bot_me: &'new Me,
        message: &'new Message,
        config: &'new Config,
        database: &'new Database,
        processor: &'new MessageProcessor,
        started_at: Instant,
    ) -> Option<CommandParams<'new>> {
        let message_text = message.text()?;

        if !message_text.starts_with('/') {
            return None;
        }

        let command = message_text.split_whitespace().next()?;

        if !command.is_ascii() {
            // Telegram commands must be ASCII.
            // See https://core.telegram.org/bots/api#botcommand
            return None;
        }

        let command_len = command.len();

        Some(CommandParams {
            bot,
            bot_me,
            message,
            message_text,
            command_len,
            config,
            database,
            processor,
            started_at,
        })
    }

    /// Find the command this message calls, and start running it.
    pub fn make_command(self) -> Option<CommandFuture<'a>> {
        // "/ping@Domain_Fixer_Bot" is "/ping", if the username is ours.
        let callname = if let Some(username_start) = self.command().find('@') {
            // Bot names are guaranteed ASCII, so ignore ASCII case specifically.
            if !self.command()[username_start + '@'.len_utf8()..]
                .eq_ignore_ascii_case(self.bot_me.username())
            {
                // This command is not for us. Ignore.
                return None;
            }

            &self.command()[0..username_start]
        } else {
            self.command()
        };
        for command in COMMANDS {
            if command.is_matching_callname(callname) {
                return Some((command.function)(self));
            }
        }
        None
    }

    /// Get text command, like `/set_timezone`.
    #[inline]
    pub fn command(&self) -> &str {
        &self.message_text[..self.command_len]
    }

    /// Get text parameters, like `Europe/Berlin` in `/set_timezone Europe/Berlin`.
    #[inline]
    pub fn get_params(&self) -> &str {
        self.message_text[self.command_len..].trim()
    }
}

pub struct Command {
    pub callname: &'static str,
    pub description: &'static str,
    pub function: fn(CommandParams) -> CommandFuture,
    hidden: bool,
}

impl Command {
    pub fn is_matching_callname(&self, command: &str) -> bool {
        self.callname
            .split_ascii_whitespace()
            .next()
            .is_some_and(|x| x.eq_ignore_ascii_case(command))
    }

    pub fn get_help(&self, mut output: impl std::fmt::Write) -> Result<(), std::fmt::Error> {
        output.write_str(self.callname)?;
        if !self.description.is_empty() {
            output.write_str(" - ")?;
            output.write_str(self.description)?;
        }

        Ok(())
    }

    pub fn generate_help() -> String {
        let mut response = String::from("HELP:\n\n");
        for command in COMMANDS {
            if command.hidden {
                continue;
            }
            // Writing into a String can't fail.
            let _ = command.get_help(&mut response);
            response += "\n\n";
        }
        response.truncate(response.trim_end().len());
        response
    }

    pub fn generate_bot_commands() -> Vec<BotCommand> {
        let mut output = Vec::new();

        for command in COMMANDS {
            if command.hidden {
                continue;
            }
            let Some(callname) = command.callname.split_ascii_whitespace().next() else {
                continue;
            };

            // Cut off the /
            let callname = callname[1..].trim().to_string();
            let description = command
                .description
                .replace("&lt;", "<")
                .replace("&gt;", ">");

            output.push(BotCommand {
                command: callname,
                description,
            });
        }

        output
    }
}

/// "1d 2h 3m 4s", skipping the larger units that are zero.
#[must_use]
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (days, hours, minutes, seconds) =
        (secs / 86400, secs / 3600 % 24, secs / 60 % 60, secs % 60);
    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

///////////////////////////////////////
/////////////////COMMAND DEFINITIONS
///////////////////////////////////////

/// Wraps the function's return value in a pinning closure.
macro_rules! wrap {
    ($thing:expr) => {
        |cp| Box::pin($thing(cp))
    };
}

/// Reply to the command with HTML text.
macro_rules! respond {
    ($cp:expr, $text:expr) => {
        $cp.bot
            .send_message($cp.message.chat.id, $text)
            .reply_to($cp.message.id)
            .parse_mode(ParseMode::Html)
            .await?
    };
}

/// Unwrap a database result, or tell the user it broke and bail.
macro_rules! db_try {
    ($cp:expr, $result:expr) => {
        match $result {
            Ok(x) => x,
            Err(e) => {
                log::error!("Database error while handling {}: {}", $cp.command(), e);
                respond!($cp, "Something went wrong with the database. Please try again later.");
                return Ok(());
            }
        }
    };
}

/// Bail unless the sender may edit domain fixers.
macro_rules! owners_only {
    ($cp:expr) => {
        if !$cp
            .message
            .from
            .as_ref()
            .is_some_and(|x| $cp.config.is_owner(x.id))
        {
            respond!($cp, "Only the bot owners can do that.");
            return Ok(());
        }
    };
}

/// Get the database behind domain fixers, or bail if they're not editable.
macro_rules! fixers_db {
    ($cp:expr) => {
        match $cp.processor.registry.database() {
            Some(x) => x,
            None => {
                respond!(
                    $cp,
                    "Domain fixers can't be changed while the static table is in use."
                );
                return Ok(());
            }
        }
    };
}

pub const START: Command = Command {
    callname: "/start",
    description: "",
    function: wrap!(start),
    hidden: true,
};
async fn start(cp: CommandParams<'_>) -> Ret {
    if !cp.message.chat.is_private() {
        return Ok(());
    }
    respond!(
        cp,
        "hi

Add me to a group, and I'll repost links to sites with poor embeds through mirrors \
that embed properly, then delete the original message.

For a full list of commands, send /help"
    );
    Ok(())
}

pub const HELP: Command = Command {
    callname: "/help",
    description: "Show this help.",
    function: wrap!(help),
    hidden: false,
};
async fn help(cp: CommandParams<'_>) -> Ret {
    respond!(cp, Command::generate_help());
    Ok(())
}

pub const PING: Command = Command {
    callname: "/ping",
    description: "Check if the bot is alive.",
    function: wrap!(ping),
    hidden: false,
};
async fn ping(cp: CommandParams<'_>) -> Ret {
    respond!(cp, "pong");
    Ok(())
}

pub const STATUS: Command = Command {
    callname: "/status",
    description: "Show what the bot is up to.",
    function: wrap!(status),
    hidden: false,
};
async fn status(cp: CommandParams<'_>) -> Ret {
    let active = match cp.processor.registry.snapshot().await {
        Ok(table) => table.len().to_string(),
        Err(e) => {
            log::error!("Failed to read domain fixers for /status: {e}");
            "unknown (database error)".to_string()
        }
    };
    let response = format!(
        "<b>{}</b>\n\nUptime: {}\nDomain fixers from: {}\nActive domain fixers: {}",
        encode_text(&cp.config.activity),
        format_uptime(cp.started_at.elapsed()),
        cp.processor.registry.kind(),
        active,
    );
    respond!(cp, response);
    Ok(())
}

pub const SET_TIMEZONE: Command = Command {
    callname: "/set_timezone &lt;timezone&gt;",
    description: "Remember your timezone, like Europe/Berlin.",
    function: wrap!(set_timezone),
    hidden: false,
};
async fn set_timezone(cp: CommandParams<'_>) -> Ret {
    let Some(user) = &cp.message.from else {
        respond!(cp, "Anonymous senders can't have a timezone.");
        return Ok(());
    };

    let query = cp.get_params();
    if query.is_empty() {
        respond!(
            cp,
            "Usage: <code>/set_timezone Europe/Berlin</code>\nPart of a name works too, to search for it."
        );
        return Ok(());
    }

    if let Some(tz) = resolve_timezone(query) {
        db_try!(
            cp,
            cp.database
                .set_user_timezone(user.id, &cp.message.sender_display_name(), tz.name())
                .await
        );
        respond!(cp, format!("Your timezone is now <code>{}</code>.", tz.name()));
        return Ok(());
    }

    let found = find_timezones(query);
    if found.is_empty() {
        respond!(
            cp,
            format!("No timezone matches <code>{}</code>.", encode_text(query))
        );
        return Ok(());
    }

    let mut response = String::from("No exact match. Did you mean one of these?\n");
    for name in found {
        response.push_str("\n<code>");
        response.push_str(name);
        response.push_str("</code>");
    }
    respond!(cp, response);
    Ok(())
}

pub const TIMEZONE: Command = Command {
    callname: "/timezone",
    description: "Show your timezone.",
    function: wrap!(timezone),
    hidden: false,
};
async fn timezone(cp: CommandParams<'_>) -> Ret {
    let Some(user) = &cp.message.from else {
        respond!(cp, "Anonymous senders can't have a timezone.");
        return Ok(());
    };

    match db_try!(cp, cp.database.get_user_timezone(user.id).await) {
        Some(name) => respond!(
            cp,
            format!("Your timezone is <code>{}</code>.", encode_text(&name))
        ),
        None => respond!(cp, "You haven't set a timezone. Use /set_timezone to set one."),
    };
    Ok(())
}

pub const TIMESTAMP: Command = Command {
    callname: "/timestamp [time] [date]",
    description: "Turn a time and/or date in your timezone into a timestamp in any format.",
    function: wrap!(timestamp),
    hidden: false,
};
async fn timestamp(cp: CommandParams<'_>) -> Ret {
    let Some(user) = &cp.message.from else {
        respond!(cp, "Anonymous senders can't have a timezone.");
        return Ok(());
    };

    let stored = db_try!(cp, cp.database.get_user_timezone(user.id).await);
    let Some(tz) = stored.as_deref().and_then(resolve_timezone) else {
        respond!(
            cp,
            "Set your timezone first with <code>/set_timezone</code>, so that I know what your time means."
        );
        return Ok(());
    };

    let Some(moment) = parse_date_time(cp.get_params(), tz, Utc::now()) else {
        respond!(cp, "You sent a date/time in incorrect format");
        return Ok(());
    };

    cp.bot
        .send_message(cp.message.chat.id, "Select format")
        .reply_to(cp.message.id)
        .reply_markup(timestamp_keyboard(moment.timestamp()))
        .await?;
    Ok(())
}

pub const FIXERS: Command = Command {
    callname: "/fixers",
    description: "List domain fixers.",
    function: wrap!(fixers),
    hidden: false,
};
async fn fixers(cp: CommandParams<'_>) -> Ret {
    let registry = &cp.processor.registry;
    let fixers: Vec<DomainFixer> = match registry.database() {
        Some(db) => db_try!(cp, db.get_domain_fixers(false).await),
        None => db_try!(cp, registry.snapshot().await)
            .all_active()
            .iter()
            .map(|(original, fixer)| DomainFixer::new(original, fixer, true))
            .collect(),
    };

    let editable = registry.database().is_some()
        && cp
            .message
            .from
            .as_ref()
            .is_some_and(|x| cp.config.is_owner(x.id));

    let (text, keyboard) = fixer_list(&fixers, registry.kind(), editable);
    let mut request = cp
        .bot
        .send_message(cp.message.chat.id, text)
        .reply_to(cp.message.id)
        .parse_mode(ParseMode::Html);
    if let Some(keyboard) = keyboard {
        request = request.reply_markup(keyboard);
    }
    request.await?;
    Ok(())
}

async fn fixer_toggle_inner(cp: CommandParams<'_>, enabled: bool) -> Ret {
    owners_only!(cp);
    let db = fixers_db!(cp);

    let domain = cp.get_params().to_ascii_lowercase();
    if domain.is_empty() || domain.contains(char::is_whitespace) {
        respond!(
            cp,
            format!("Usage: <code>{} reddit.com</code>", encode_text(cp.command()))
        );
        return Ok(());
    }

    if !db_try!(cp, db.set_domain_fixer_enabled(&domain, enabled).await) {
        respond!(
            cp,
            format!("No such domain fixer: <code>{}</code>", encode_text(&domain))
        );
        return Ok(());
    }

    log::info!(
        "Domain fixer of {} {} by {}",
        domain,
        if enabled { "enabled" } else { "disabled" },
        cp.message.sender_display_name()
    );
    respond!(
        cp,
        format!(
            "Domain fixer of <code>{}</code> is now {}.",
            encode_text(&domain),
            if enabled { "enabled" } else { "disabled" }
        )
    );
    Ok(())
}

pub const FIXER_ENABLE: Command = Command {
    callname: "/fixer_enable &lt;domain&gt;",
    description: "Enable a domain fixer.",
    function: wrap!(fixer_enable),
    hidden: true,
};
fn fixer_enable(cp: CommandParams<'_>) -> impl Future<Output = Ret> + Send + '_ {
    fixer_toggle_inner(cp, true)
}

pub const FIXER_DISABLE: Command = Command {
    callname: "/fixer_disable &lt;domain&gt;",
    description: "Disable a domain fixer.",
    function: wrap!(fixer_disable),
    hidden: true,
};
fn fixer_disable(cp: CommandParams<'_>) -> impl Future<Output = Ret> + Send + '_ {
    fixer_toggle_inner(cp, false)
}

pub const FIXER_SET: Command = Command {
    callname: "/fixer_set &lt;domain&gt; &lt;fixer&gt;",
    description: "Add a domain fixer or change what it replaces the domain with.",
    function: wrap!(fixer_set),
    hidden: true,
};
async fn fixer_set(cp: CommandParams<'_>) -> Ret {
    owners_only!(cp);
    let db = fixers_db!(cp);

    let mut params = cp.get_params().split_whitespace();
    let (Some(original), Some(fixer), None) = (params.next(), params.next(), params.next()) else {
        respond!(cp, "Usage: <code>/fixer_set reddit.com rxddit</code>");
        return Ok(());
    };

    let fixer = match validate_fixer(original, fixer) {
        Ok(x) => x,
        Err(e) => {
            respond!(cp, format!("Can't do that: {}.", e));
            return Ok(());
        }
    };

    db_try!(cp, db.set_domain_fixer(&fixer.original, &fixer.fixer).await);
    let current = db_try!(cp, db.get_domain_fixer(&fixer.original).await).unwrap_or(fixer);

    log::info!(
        "Domain fixer set to {} by {}",
        current,
        cp.message.sender_display_name()
    );
    respond!(cp, format!("Done: {}", encode_text(&current.to_string())));
    Ok(())
}

async fn fixing_switch_inner(cp: CommandParams<'_>, enabled: bool) -> Ret {
    let chat = &cp.message.chat;

    // Anonymous admins post as the chat itself.
    let allowed = chat.is_private()
        || cp.message.sender_chat.as_ref().is_some_and(|x| x.id == chat.id)
        || match &cp.message.from {
            Some(user) => is_chat_admin(cp.bot, user.id, chat.id).await?,
            None => false,
        };
    if !allowed {
        respond!(cp, "Only chat admins can do that.");
        return Ok(());
    }

    db_try!(cp, cp.database.add_chat(chat.id, chat.title()).await);
    db_try!(cp, cp.database.set_chat_fixing(chat.id, enabled).await);

    log::info!(
        "Fixing turned {} in chat {} by {}",
        if enabled { "on" } else { "off" },
        chat.id,
        cp.message.sender_display_name()
    );
    respond!(
        cp,
        if enabled {
            "Okay, I'll fix links in this chat."
        } else {
            "Okay, I'll leave links in this chat alone."
        }
    );
    Ok(())
}

pub const FIXING_ON: Command = Command {
    callname: "/fixing_on",
    description: "Fix links in this chat (chat admins only).",
    function: wrap!(fixing_on),
    hidden: false,
};
fn fixing_on(cp: CommandParams<'_>) -> impl Future<Output = Ret> + Send + '_ {
    fixing_switch_inner(cp, true)
}

pub const FIXING_OFF: Command = Command {
    callname: "/fixing_off",
    description: "Stop fixing links in this chat (chat admins only).",
    function: wrap!(fixing_off),
    hidden: false,
};
fn fixing_off(cp: CommandParams<'_>) -> impl Future<Output = Ret> + Send + '_ {
    fixing_switch_inner(cp, false)
}

//! Bot configuration, read once at startup from environment variables.
//!
//! All variables are prefixed with `FIXER_BOT_`:
//!
//! - `FIXER_BOT_TOKEN` - bot token. If unset, it's read from the file `key`
//!   (or `key_debug` in debug builds) in the working directory.
//! - `FIXER_BOT_DATABASE_URL` - SQLite database URL
//!   (default: `sqlite:domain_fixer_bot.sqlite`).
//! - `FIXER_BOT_REGISTRY` - where domain fixers come from: `database` (default),
//!   or `static` for the built in table that can't be edited.
//! - `FIXER_BOT_OWNERS` - comma separated user IDs allowed to edit domain fixers.
//! - `FIXER_BOT_DROP_WWW` - drop a bare `www.` from fixed URLs (default: no).
//! - `FIXER_BOT_SILENT_BROAD_MENTIONS` - send fixed messages silently if the
//!   original pinged everyone (default: yes).
//! - `FIXER_BOT_REPLY_LIKE_ORIGINAL` - make the fixed message a reply to whatever
//!   the original replied to (default: yes).
//! - `FIXER_BOT_ACTIVITY` - line shown in the bot's profile and `/status`.

use std::{env, fs};

use teloxide::types::UserId;
use thiserror::Error;

use crate::fixers::{RewritePolicy, WwwPolicy};

const PREFIX: &str = "FIXER_BOT_";

pub const DEFAULT_DATABASE_URL: &str = "sqlite:domain_fixer_bot.sqlite";
pub const DEFAULT_ACTIVITY: &str = "Rolling the balls of wool";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no bot token: set FIXER_BOT_TOKEN or put it into the file \"{0}\"")]
    MissingToken(&'static str),
    #[error("FIXER_BOT_{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Which store domain fixers are read from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegistryKind {
    #[default]
    Database,
    Static,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub token: String,
    pub database_url: String,
    pub registry: RegistryKind,
    pub owners: Vec<UserId>,
    pub rewrite_policy: RewritePolicy,
    pub silent_broad_mentions: bool,
    pub reply_like_original: bool,
    pub activity: String,
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read the configuration with a custom variable source. `lookup` gets full
    /// variable names, prefix included.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let get = |name: &str| {
            lookup(&format!("{PREFIX}{name}"))
                .map(|x| x.trim().to_string())
                .filter(|x| !x.is_empty())
        };

        let token = match get("TOKEN") {
            Some(token) => token,
            None => read_key_file()?,
        };

        let database_url = get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let registry = match get("REGISTRY") {
            None => RegistryKind::default(),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "database" | "db" => RegistryKind::Database,
                "static" => RegistryKind::Static,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "REGISTRY",
                        value,
                        reason: "expected \"database\" or \"static\"",
                    })
                }
            },
        };

        let owners = match get("OWNERS") {
            None => Vec::new(),
            Some(value) => parse_owners(&value).ok_or(ConfigError::Invalid {
                name: "OWNERS",
                value,
                reason: "expected comma separated numeric user IDs",
            })?,
        };

        let www = if parse_flag("DROP_WWW", get("DROP_WWW"), false)? {
            WwwPolicy::Drop
        } else {
            WwwPolicy::Keep
        };

        Ok(Config {
            token,
            database_url,
            registry,
            owners,
            rewrite_policy: RewritePolicy { www },
            silent_broad_mentions: parse_flag(
                "SILENT_BROAD_MENTIONS",
                get("SILENT_BROAD_MENTIONS"),
                true,
            )?,
            reply_like_original: parse_flag(
                "REPLY_LIKE_ORIGINAL",
                get("REPLY_LIKE_ORIGINAL"),
                true,
            )?,
            activity: get("ACTIVITY").unwrap_or_else(|| DEFAULT_ACTIVITY.to_string()),
        })
    }

    /// Whether this user may edit the global domain fixer table.
    #[must_use]
    pub fn is_owner(&self, user: UserId) -> bool {
        self.owners.contains(&user)
    }
}

fn read_key_file() -> Result<String, ConfigError> {
    let path = match cfg!(debug_assertions) {
        true => "key_debug",
        false => "key",
    };
    fs::read_to_string(path)
        .ok()
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .ok_or(ConfigError::MissingToken(path))
}

fn parse_owners(value: &str) -> Option<Vec<UserId>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(|x| x.parse().ok().map(UserId))
        .collect()
}

fn parse_flag(name: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value,
            reason: "expected a yes/no value",
        }),
    }
}

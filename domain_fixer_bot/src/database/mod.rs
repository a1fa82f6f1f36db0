use std::{str::FromStr, time::Duration};

pub use sqlx::Error;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Executor, Row, Sqlite,
};
use teloxide::types::{ChatId, UserId};

use crate::fixers::{DomainFixer, DEFAULT_FIXERS};

type Pool = sqlx::Pool<Sqlite>;

pub struct Database {
    pool: Pool,
}

fn fixer_from_row(row: SqliteRow) -> DomainFixer {
    DomainFixer {
        original: row.get("original"),
        fixer: row.get("fixer"),
        enabled: row.get("enabled"),
    }
}

impl Database {
    /// Open (creating if needed) the database at this `sqlite:` URL and make sure
    /// all tables exist.
    pub async fn new(url: &str) -> Result<Database, Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .pragma("cache_size", "-32768")
            .busy_timeout(Duration::from_secs(600));

        // Every connection to an in-memory database gets its own empty one,
        // so there must be exactly one connection that never gets closed.
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(32)
        };

        let pool = pool_options.connect_with(options).await?;

        // Do some init. Create the tables...

        // DOMAIN_FIXERS:
        // original (registrable domain like "reddit.com", unique primary key, string)
        // fixer (label to replace the domain label with, like "rxddit", string)
        // enabled (0 for no, 1 for yes)
        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS domain_fixers (
                original TEXT PRIMARY KEY NOT NULL COLLATE NOCASE,
                fixer TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1
            ) STRICT;",
        ))
        .await?;

        // USERS:
        // userid (key, i64 because sqlite doesn't support u64)
        // name (last seen @username or full name, string)
        // timezone (IANA timezone name, may be NULL)
        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                userid INTEGER PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                timezone TEXT NULL
            ) STRICT;",
        ))
        .await?;

        // CHATS:
        // chatid (key, i64)
        // title (may be NULL for private chats)
        // fixing_enabled (0 for no, 1 for yes)
        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS chats (
                chatid INTEGER PRIMARY KEY NOT NULL,
                title TEXT NULL,
                fixing_enabled INTEGER NOT NULL DEFAULT 1
            ) STRICT;",
        ))
        .await?;

        // Seed the fixers we ship with. Existing rows are left alone, so
        // anything an admin changed stays changed.
        for (original, fixer) in DEFAULT_FIXERS {
            sqlx::query(
                "INSERT OR IGNORE INTO domain_fixers(original, fixer, enabled)
                VALUES (?, ?, 1);",
            )
            .bind(original)
            .bind(fixer)
            .execute(&pool)
            .await?;
        }

        Ok(Database { pool })
    }

    /// Close all connections. Any query after this fails.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get all domain fixers, or only the enabled ones, sorted by domain.
    pub async fn get_domain_fixers(&self, only_enabled: bool) -> Result<Vec<DomainFixer>, Error> {
        let query = if only_enabled {
            "SELECT original, fixer, enabled FROM domain_fixers
            WHERE enabled=1 ORDER BY original;"
        } else {
            "SELECT original, fixer, enabled FROM domain_fixers ORDER BY original;"
        };
        sqlx::query(query)
            .map(fixer_from_row)
            .fetch_all(&self.pool)
            .await
    }

    /// Get a single domain fixer by its domain.
    pub async fn get_domain_fixer(&self, original: &str) -> Result<Option<DomainFixer>, Error> {
        sqlx::query("SELECT original, fixer, enabled FROM domain_fixers WHERE original=?;")
            .bind(original)
            .map(fixer_from_row)
            .fetch_optional(&self.pool)
            .await
    }

    /// Enable or disable a domain fixer. Returns `false` if there's no such fixer.
    pub async fn set_domain_fixer_enabled(
        &self,
        original: &str,
        enabled: bool,
    ) -> Result<bool, Error> {
        let result = sqlx::query("UPDATE domain_fixers SET enabled=? WHERE original=?;")
            .bind(enabled)
            .bind(original)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip a domain fixer between enabled and disabled.
    /// Returns the new state, or [`None`] if there's no such fixer.
    pub async fn toggle_domain_fixer(&self, original: &str) -> Result<Option<bool>, Error> {
        sqlx::query(
            "UPDATE domain_fixers SET enabled=1-enabled WHERE original=?
            RETURNING enabled;",
        )
        .bind(original)
        .map(|row: SqliteRow| row.get::<bool, _>("enabled"))
        .fetch_optional(&self.pool)
        .await
    }

    /// Insert a new enabled domain fixer, or change the label of an existing one
    /// without touching whether it's enabled.
    pub async fn set_domain_fixer(&self, original: &str, fixer: &str) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO domain_fixers(original, fixer, enabled)
            VALUES (?, ?, 1)
        ON CONFLICT DO
            UPDATE SET fixer=?;",
        )
        .bind(original.to_ascii_lowercase())
        .bind(fixer)
        .bind(fixer)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remember a user's name and timezone.
    #[allow(clippy::cast_possible_wrap)]
    pub async fn set_user_timezone(
        &self,
        user: UserId,
        name: &str,
        timezone: &str,
    ) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO users(userid, name, timezone)
            VALUES (?, ?, ?)
        ON CONFLICT DO
            UPDATE SET name=?, timezone=?;",
        )
        .bind(user.0 as i64)
        .bind(name)
        .bind(timezone)
        .bind(name)
        .bind(timezone)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a user's timezone, if they ever set one.
    #[allow(clippy::cast_possible_wrap)]
    pub async fn get_user_timezone(&self, user: UserId) -> Result<Option<String>, Error> {
        let timezone = sqlx::query("SELECT timezone FROM users WHERE userid=?;")
            .bind(user.0 as i64)
            .map(|row: SqliteRow| row.get::<Option<String>, _>("timezone"))
            .fetch_optional(&self.pool)
            .await?;
        Ok(timezone.flatten())
    }

    /// Remember a chat the bot is in, or update its title.
    pub async fn add_chat(&self, chat: ChatId, title: Option<&str>) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO chats(chatid, title)
            VALUES (?, ?)
        ON CONFLICT DO
            UPDATE SET title=COALESCE(?, title);",
        )
        .bind(chat.0)
        .bind(title)
        .bind(title)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Turn URL fixing on or off in a chat.
    pub async fn set_chat_fixing(&self, chat: ChatId, enabled: bool) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO chats(chatid, fixing_enabled)
            VALUES (?, ?)
        ON CONFLICT DO
            UPDATE SET fixing_enabled=?;",
        )
        .bind(chat.0)
        .bind(enabled)
        .bind(enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Whether URLs should be fixed in this chat. Chats we know nothing about get fixing.
    pub async fn is_chat_fixing_enabled(&self, chat: ChatId) -> Result<bool, Error> {
        let enabled = sqlx::query("SELECT fixing_enabled FROM chats WHERE chatid=?;")
            .bind(chat.0)
            .map(|row: SqliteRow| row.get::<bool, _>("fixing_enabled"))
            .fetch_optional(&self.pool)
            .await?;
        Ok(enabled.unwrap_or(true))
    }
}

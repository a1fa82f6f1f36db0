//! A bot that reposts links to sites with poor embeds through mirror domains
//! that embed properly, and deletes the original message.

pub mod config;
pub mod database;
mod entry;
pub mod error;
pub mod fixers;
mod handlers;
pub mod processor;
pub mod timestamp;

pub use entry::*;

/// Log filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "WARN,domain_fixer_bot=info";

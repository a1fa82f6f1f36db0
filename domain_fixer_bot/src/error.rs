use teloxide::RequestError;
use thiserror::Error;

use crate::database;

/// Things that can go wrong while fixing a message.
///
/// Not finding a URL or a fixer for it isn't an error, that's just a message
/// that gets left alone.
#[derive(Debug, Error)]
pub enum FixerError {
    #[error("could not read domain fixers from the database: {0}")]
    PersistenceUnavailable(#[from] database::Error),
    #[error("could not send the fixed message: {0}")]
    PlatformSend(#[source] RequestError),
    #[error("could not delete the original message: {0}")]
    PlatformDelete(#[source] RequestError),
}

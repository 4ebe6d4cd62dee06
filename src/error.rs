//! Error types for Marcador

use thiserror::Error;

use crate::config::ConfigError;
use crate::location::{LocationError, LocationParseError};
use crate::store::StoreError;
use crate::tree::xhtml::XhtmlError;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type
///
/// Stale addresses and content drift are not errors: they surface as
/// `None`/`false` from the resolver, validator and tracker.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Chapter markup error: {0}")]
    Xhtml(#[from] XhtmlError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<LocationParseError> for Error {
    fn from(err: LocationParseError) -> Self {
        Error::Location(LocationError::Parse(err))
    }
}

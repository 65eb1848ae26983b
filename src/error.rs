//! Error type shared by the persistence layer, review sessions and configuration.
//!
//! The scheduler itself cannot fail; every error here comes from the code around it.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlashcardError>;

#[derive(Error, Debug)]
pub enum FlashcardError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("card {0} not found")]
    CardNotFound(i64),

    #[error("deck {0} not found")]
    DeckNotFound(i64),

    #[error("efactor stability {0} is outside [0, 1]")]
    InvalidStability(f64),

    #[error("tag name is empty")]
    EmptyTagName,

    #[error("invalid configuration for {key}: {message}")]
    InvalidConfig { key: String, message: String },
}

impl FlashcardError {
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CardNotFound(_) | Self::DeckNotFound(_))
    }
}

//! Runtime settings read from the environment (and a `.env` file, if present).

use crate::error::{FlashcardError, Result};
use crate::models::user_stat::DEFAULT_EFACTOR_STABILITY;
use std::path::PathBuf;

pub const DB_PATH_KEY: &str = "FLASHCARDS_DB";
pub const EFACTOR_STABILITY_KEY: &str = "FLASHCARDS_EFACTOR_STABILITY";
pub const DUE_LIMIT_KEY: &str = "FLASHCARDS_DUE_LIMIT";

const DEFAULT_DB_PATH: &str = "db.sqlite3";
const DEFAULT_DUE_LIMIT: usize = 100;

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub database_path: PathBuf,
    /// Stability written to user statistics created by this process.
    pub efactor_stability: f64,
    /// Upper bound on cards loaded into one review session.
    pub due_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            efactor_stability: DEFAULT_EFACTOR_STABILITY,
            due_limit: DEFAULT_DUE_LIMIT,
        }
    }
}

impl AppConfig {
    /// Loads `.env` (missing file is fine) and then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(DB_PATH_KEY).filter(|p| !p.trim().is_empty()) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup(EFACTOR_STABILITY_KEY) {
            let stability: f64 = raw.trim().parse().map_err(|_| {
                FlashcardError::invalid_config(
                    EFACTOR_STABILITY_KEY,
                    format!("'{raw}' is not a number"),
                )
            })?;
            if !(0.0..=1.0).contains(&stability) {
                return Err(FlashcardError::invalid_config(
                    EFACTOR_STABILITY_KEY,
                    format!("{stability} is outside [0, 1]"),
                ));
            }
            config.efactor_stability = stability;
        }

        if let Some(raw) = lookup(DUE_LIMIT_KEY) {
            config.due_limit = raw.trim().parse().map_err(|_| {
                FlashcardError::invalid_config(
                    DUE_LIMIT_KEY,
                    format!("'{raw}' is not a card count"),
                )
            })?;
        }

        Ok(config)
    }
}

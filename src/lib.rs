pub mod config;
pub mod database;
pub mod error;
pub mod models;

pub use config::AppConfig;
pub use error::{FlashcardError, Result};
pub use models::{
    Card, CardSchedule, Deck, ReviewLog, ReviewSession, ScheduleUpdate, Tag, UserStat,
};

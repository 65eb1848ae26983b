//! Deck is a named set of cards owned by one user
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Summary numbers shown for a deck.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckStats {
    pub total_cards: usize,
    pub due_cards: usize,
    /// Number of reviews per UTC calendar day, oldest day first.
    pub reviews_per_day: Vec<(chrono::NaiveDate, usize)>,
}

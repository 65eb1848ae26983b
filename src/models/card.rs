//! A card is a <front, back> pair plus the SM-2 state that decides when it is shown again.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ease factor every new card starts with.
pub const INITIAL_EFACTOR: f64 = 2.5;

/// Scheduling fields of a card. Only the scheduler produces new values for them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardSchedule {
    pub interval_days: u32,
    /// Consecutive successful reviews since the last lapse.
    pub repetition: u32,
    pub efactor: f64,
    /// `None` means the card is due right away.
    pub next_review: Option<DateTime<Utc>>,
}

impl CardSchedule {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            interval_days: 0,
            repetition: 0,
            efactor: INITIAL_EFACTOR,
            next_review: Some(now),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.next_review {
            Some(next_review) => next_review <= now,
            None => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub deck_id: i64,
    pub front: String,
    pub back: String,
    pub schedule: CardSchedule,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_new_schedule_defaults() {
        let schedule = CardSchedule::new(at(9));

        assert_eq!(schedule.interval_days, 0);
        assert_eq!(schedule.repetition, 0);
        assert_eq!(schedule.efactor, 2.5);
        assert_eq!(schedule.next_review, Some(at(9)));
    }

    #[test]
    fn test_new_card_is_due_immediately() {
        let schedule = CardSchedule::new(at(9));
        assert!(schedule.is_due(at(9)));
        assert!(!schedule.is_due(at(9) - Duration::seconds(1)));
    }

    #[test]
    fn test_missing_next_review_is_always_due() {
        let schedule = CardSchedule {
            interval_days: 30,
            repetition: 4,
            efactor: 2.5,
            next_review: None,
        };

        assert!(schedule.is_due(at(0)));
    }
}

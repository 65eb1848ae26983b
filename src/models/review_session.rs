//! Review session over a deck's due cards.
//! Each graded card goes through the SM-2 scheduler and is saved before the session moves on.

use super::{Card, ScheduleUpdate};
use crate::database::db::{self, RecordedReview, ReviewRequest};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;

/// Walks the due queue of one deck, front side first.
///
/// A lapsed card is not shown again in the same session; the scheduler has already
/// put it back in the queue for the next day.
pub struct ReviewSession {
    pub deck_id: i64,
    cards: Vec<Card>,
    current_index: usize,
    pub show_back: bool,
    outcomes: Vec<ScheduleUpdate>,
}

impl ReviewSession {
    /// Loads up to `limit` cards that are due at `now`.
    pub fn start(
        deck_id: i64,
        now: DateTime<Utc>,
        limit: usize,
        conn: &Connection,
    ) -> Result<Self> {
        let cards = db::get_cards_due_for_review(deck_id, now, limit, conn)?;
        debug!(deck_id, cards = cards.len(), "review session started");
        Ok(Self::new_from_due_cards(deck_id, cards))
    }

    pub fn new_from_due_cards(deck_id: i64, cards: Vec<Card>) -> Self {
        Self {
            deck_id,
            cards,
            current_index: 0,
            show_back: false,
            outcomes: Vec::new(),
        }
    }

    pub fn current_card(&self) -> Option<&Card> {
        self.cards.get(self.current_index)
    }

    pub fn toggle_back(&mut self) {
        self.show_back = !self.show_back;
    }

    /// Grades the current card, saves the review and moves to the next card.
    ///
    /// Returns `None` once the session is completed.
    pub fn grade_current_card(
        &mut self,
        quality: i32,
        user_id: Option<i64>,
        response_time: Option<f64>,
        now: DateTime<Utc>,
        conn: &mut Connection,
    ) -> Result<Option<RecordedReview>> {
        let Some(card) = self.cards.get_mut(self.current_index) else {
            return Ok(None);
        };

        let mut request = ReviewRequest::new(card.id, quality).at(now);
        request.user_id = user_id;
        request.response_time = response_time;

        let recorded = db::record_review(&request, conn)?;

        recorded.update.apply_to(&mut card.schedule);
        self.outcomes.push(recorded.update.clone());
        self.current_index += 1;
        self.show_back = false;

        Ok(Some(recorded))
    }

    /// Cards graded so far.
    pub fn graded(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().take(self.current_index)
    }

    pub fn reviewed_count(&self) -> usize {
        self.outcomes.len()
    }

    pub fn lapsed_count(&self) -> usize {
        self.outcomes.iter().filter(|update| update.is_lapse()).count()
    }

    pub fn total_count(&self) -> usize {
        self.cards.len()
    }

    pub fn remaining_count(&self) -> usize {
        self.total_count() - self.reviewed_count()
    }

    pub fn is_completed(&self) -> bool {
        self.current_index >= self.cards.len()
    }

    pub fn progress_message(&self) -> String {
        if self.is_completed() {
            format!(
                "Done: {} reviewed, {} to relearn tomorrow",
                self.reviewed_count(),
                self.lapsed_count()
            )
        } else {
            format!(
                "Card {} of {}",
                self.current_index + 1,
                self.total_count()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn deck_with_cards(terms: &[&str]) -> (Connection, i64) {
        let conn = db::init_in_memory().unwrap();
        let deck_id = db::new_deck(1, "Polish Vocabulary", t0(), &conn).unwrap();
        for term in terms {
            db::add_card(deck_id, term, "", t0(), &conn).unwrap();
        }
        (conn, deck_id)
    }

    #[test]
    fn test_session_grades_every_due_card() {
        let (mut conn, deck_id) = deck_with_cards(&["cześć", "dziękuję", "proszę"]);
        let mut session = ReviewSession::start(deck_id, t0(), 100, &conn).unwrap();
        assert_eq!(session.total_count(), 3);
        assert_eq!(session.progress_message(), "Card 1 of 3");

        for quality in [5, 1, 4] {
            session.toggle_back();
            assert!(session.show_back);
            let recorded = session
                .grade_current_card(quality, None, None, t0(), &mut conn)
                .unwrap()
                .unwrap();
            assert_eq!(recorded.update.interval_days, 1);
            assert!(!session.show_back);
        }

        assert!(session.is_completed());
        assert!(session.current_card().is_none());
        assert_eq!(session.reviewed_count(), 3);
        assert_eq!(session.lapsed_count(), 1);
        assert_eq!(session.remaining_count(), 0);
        assert_eq!(
            session.progress_message(),
            "Done: 3 reviewed, 1 to relearn tomorrow"
        );
        assert!(
            session
                .graded()
                .all(|card| card.schedule.next_review == Some(t0() + Duration::days(1)))
        );

        // Nothing is due until tomorrow
        assert!(db::next_due_card(deck_id, t0(), &conn).unwrap().is_none());
        assert_eq!(
            db::get_cards_due_for_review(deck_id, t0() + Duration::days(1), 100, &conn)
                .unwrap()
                .len(),
            3
        );
    }

    #[test]
    fn test_grading_completed_session_returns_none() {
        let (mut conn, deck_id) = deck_with_cards(&[]);
        let mut session = ReviewSession::start(deck_id, t0(), 100, &conn).unwrap();

        assert!(session.is_completed());
        assert!(
            session
                .grade_current_card(5, None, None, t0(), &mut conn)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_session_updates_user_stat() {
        let (mut conn, deck_id) = deck_with_cards(&["woda"]);
        db::create_user_stat(1, None, &conn).unwrap();
        let mut session = ReviewSession::start(deck_id, t0(), 100, &conn).unwrap();

        let recorded = session
            .grade_current_card(5, Some(1), Some(4.0), t0(), &mut conn)
            .unwrap()
            .unwrap();

        assert_eq!(recorded.log.response_time, Some(4.0));
        let stat = recorded.user_stat.unwrap();
        assert!((stat.average_efactor - 2.55).abs() < 1e-9);
    }

    #[test]
    fn test_session_respects_limit() {
        let (conn, deck_id) = deck_with_cards(&["a", "b", "c", "d"]);
        let session = ReviewSession::start(deck_id, t0(), 2, &conn).unwrap();
        assert_eq!(session.total_count(), 2);
        assert_eq!(session.remaining_count(), 2);
    }
}

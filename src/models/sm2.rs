//! Scheduling step applied to a card after each graded answer.
//!
//! Grades arrive as untrusted integers and are clamped to 0..=5 first; the clamped grade is
//! what [`ScheduleUpdate`] carries and what ends up in the review log. A grade below 3 is a
//! lapse: the repetition count drops to zero and the card returns one day later, never the
//! same day. Past the second success the interval is the previous interval times the old
//! E-Factor, floored to whole days rather than rounded. The E-Factor moves on every grade and
//! stops at 1.3.
//!
//! When a [`UserStat`] is handed in, the new E-Factor is blended into the user's running
//! average. No I/O happens here; storing the outcome is up to the caller.

use super::{CardSchedule, ReviewLog, UserStat};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// E-Factor floor.
pub const MIN_EFACTOR: f64 = 1.3;
pub const MAX_QUALITY: i32 = 5;
/// Lowest quality that counts as a successful recall.
pub const PASSING_QUALITY: u8 = 3;

/// New scheduling state produced by one review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleUpdate {
    pub interval_days: u32,
    pub efactor: f64,
    pub repetition: u32,
    pub next_review: DateTime<Utc>,
    /// Quality after clamping, i.e. the grade the transition used.
    pub quality: u8,
}

impl ScheduleUpdate {
    pub fn is_lapse(&self) -> bool {
        self.quality < PASSING_QUALITY
    }

    /// Writes the new state onto a card's schedule.
    pub fn apply_to(&self, schedule: &mut CardSchedule) {
        schedule.interval_days = self.interval_days;
        schedule.repetition = self.repetition;
        schedule.efactor = self.efactor;
        schedule.next_review = Some(self.next_review);
    }

    /// Builds the log entry for this review.
    /// `reviewed_at` is the `now` the update was computed with.
    pub fn to_log(
        &self,
        card_id: i64,
        reviewed_at: DateTime<Utc>,
        response_time: Option<f64>,
    ) -> ReviewLog {
        ReviewLog {
            card_id,
            review_date: reviewed_at,
            quality: self.quality,
            interval_days: self.interval_days,
            efactor: self.efactor,
            response_time,
        }
    }
}

/// Clamps untrusted client input into 0-5.
pub fn clamp_quality(quality: i32) -> u8 {
    quality.clamp(0, MAX_QUALITY) as u8
}

/// Calculates the next scheduling state according to SM-2.
/// quality: 0-5 (0 = complete blackout, 5 = perfect response), anything else is clamped.
pub fn schedule(state: &CardSchedule, quality: i32, now: DateTime<Utc>) -> ScheduleUpdate {
    let quality = clamp_quality(quality);

    let (interval_days, repetition) = if quality < PASSING_QUALITY {
        // Forgotten: start over tomorrow
        (1, 0)
    } else {
        let repetition = state.repetition.saturating_add(1);
        let interval = match repetition {
            1 => 1,
            2 => 6,
            // Uses the E-Factor from before this review's update
            _ => grown_interval(state.interval_days, state.efactor),
        };
        (interval, repetition)
    };

    let efactor = next_efactor(state.efactor, quality);

    ScheduleUpdate {
        interval_days,
        efactor,
        repetition,
        // Only saturates for intervals reaching past chrono's last representable date
        next_review: now
            .checked_add_signed(Duration::days(i64::from(interval_days)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
        quality,
    }
}

/// Runs [`schedule`] and, when the review belongs to a user with statistics,
/// folds the new E-Factor into their running average.
///
/// The average is informational; it never changes the card's own E-Factor.
pub fn review(
    state: &CardSchedule,
    quality: i32,
    now: DateTime<Utc>,
    user_stat: Option<&mut UserStat>,
) -> ScheduleUpdate {
    let update = schedule(state, quality, now);
    if let Some(stat) = user_stat {
        stat.absorb(update.efactor);
    }
    update
}

fn next_efactor(efactor: f64, quality: u8) -> f64 {
    let miss = f64::from(MAX_QUALITY as u8 - quality);
    let new_ef = efactor + (0.1 - miss * (0.08 + miss * 0.02));
    new_ef.max(MIN_EFACTOR)
}

/// floor(interval × EF). Both operands are non-negative so this is truncation.
/// A third success always lands at least one day out.
fn grown_interval(interval_days: u32, efactor: f64) -> u32 {
    let grown = (f64::from(interval_days) * efactor).floor() as u32;
    grown.max(1)
}

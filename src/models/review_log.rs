use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One review event. Written once and never changed afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewLog {
    pub card_id: i64,
    pub review_date: DateTime<Utc>,
    /// The clamped quality the schedule was computed from.
    pub quality: u8,
    pub interval_days: u32,
    pub efactor: f64,
    /// Seconds the user took to answer, when the client measured it.
    pub response_time: Option<f64>,
}

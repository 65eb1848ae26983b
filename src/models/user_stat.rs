//! Per-user running average of ease factors, kept for analytics only.
use super::card::INITIAL_EFACTOR;
use serde::{Deserialize, Serialize};

/// Stability used when the user never stored one.
pub const DEFAULT_EFACTOR_STABILITY: f64 = 0.5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserStat {
    pub user_id: i64,
    pub average_efactor: f64,
    /// Weight of the old average in [0, 1]. Closer to 1 moves the average more slowly.
    pub efactor_stability: Option<f64>,
}

impl UserStat {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            average_efactor: INITIAL_EFACTOR,
            efactor_stability: None,
        }
    }

    pub fn stability(&self) -> f64 {
        self.efactor_stability.unwrap_or(DEFAULT_EFACTOR_STABILITY)
    }

    /// Blends a freshly computed card ease factor into the average.
    pub fn absorb(&mut self, efactor: f64) {
        let alpha = self.stability();
        self.average_efactor = alpha * self.average_efactor + (1.0 - alpha) * efactor;
    }
}

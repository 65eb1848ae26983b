pub mod card;
pub mod deck;
pub mod review_log;
pub mod review_session;
pub mod sm2;
pub mod tag;
pub mod user_stat;

pub use card::{Card, CardSchedule};
pub use deck::{Deck, DeckStats};
pub use review_log::ReviewLog;
pub use review_session::ReviewSession;
pub use sm2::ScheduleUpdate;
pub use tag::Tag;
pub use user_stat::UserStat;

pub mod db;

pub use db::{RecordedReview, ReviewRequest};

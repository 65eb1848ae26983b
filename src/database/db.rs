//! Database operations for the flashcard application
//!
//! Handles SQLite initialization, CRUD for decks and cards, the due queue,
//! and recording reviews. A review updates the card, appends its log entry and
//! updates the user's statistic inside a single transaction.

use crate::error::{FlashcardError, Result};
use crate::models::sm2::{self, MIN_EFACTOR};
use crate::models::tag;
use crate::models::{
    Card, CardSchedule, Deck, DeckStats, ReviewLog, ScheduleUpdate, Tag, UserStat,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a connection waits for another writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CARD_COLUMNS: &str =
    "id, deck_id, front, back, interval_days, repetition, efactor, next_review, created_at";

const REVIEW_LOG_COLUMNS: &str =
    "id, card_id, review_date, quality, interval_days, efactor, response_time";

/// Opens (or creates) the database file and makes sure all tables exist.
pub fn init_database<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path.as_ref())?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    create_schema(&conn)?;
    info!(path = %path.as_ref().display(), "database ready");
    Ok(conn)
}

/// In-memory database with the full schema; used by tests and throwaway sessions.
pub fn init_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Creates tables for decks, cards, review logs and user statistics.
///
/// Timestamps are stored as UTC milliseconds. Deleting a deck removes its cards,
/// and deleting a card removes its review logs and tag links. Tags themselves are
/// shared between decks and stay.
pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS decks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS cards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            deck_id INTEGER NOT NULL,
            front TEXT NOT NULL,
            back TEXT NOT NULL,
            interval_days INTEGER NOT NULL DEFAULT 0,
            repetition INTEGER NOT NULL DEFAULT 0,
            efactor REAL NOT NULL DEFAULT 2.5,
            next_review INTEGER,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_cards_due ON cards(deck_id, next_review);

        CREATE TABLE IF NOT EXISTS review_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            card_id INTEGER NOT NULL,
            review_date INTEGER NOT NULL,
            quality INTEGER NOT NULL,
            interval_days INTEGER NOT NULL,
            efactor REAL NOT NULL,
            response_time REAL,
            FOREIGN KEY (card_id) REFERENCES cards(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_review_logs_card ON review_logs(card_id, review_date);

        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS card_tags (
            card_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            PRIMARY KEY (card_id, tag_id),
            FOREIGN KEY (card_id) REFERENCES cards(id) ON DELETE CASCADE,
            FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS user_stats (
            user_id INTEGER PRIMARY KEY,
            average_efactor REAL NOT NULL,
            efactor_stability REAL
        );",
    )?;
    Ok(())
}

fn to_millis(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp_millis()
}

fn timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}

fn optional_timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(_) => timestamp_at(row, idx).map(Some),
        None => Ok(None),
    }
}

fn deck_from_row(row: &Row) -> rusqlite::Result<Deck> {
    Ok(Deck {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        created_at: timestamp_at(row, 3)?,
    })
}

fn card_from_row(row: &Row) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        deck_id: row.get(1)?,
        front: row.get(2)?,
        back: row.get(3)?,
        schedule: CardSchedule {
            interval_days: row.get(4)?,
            repetition: row.get(5)?,
            efactor: row.get(6)?,
            next_review: optional_timestamp_at(row, 7)?,
        },
        created_at: timestamp_at(row, 8)?,
    })
}

fn review_log_from_row(row: &Row) -> rusqlite::Result<(i64, ReviewLog)> {
    Ok((
        row.get(0)?,
        ReviewLog {
            card_id: row.get(1)?,
            review_date: timestamp_at(row, 2)?,
            quality: row.get(3)?,
            interval_days: row.get(4)?,
            efactor: row.get(5)?,
            response_time: row.get(6)?,
        },
    ))
}

fn ensure_deck_exists(deck_id: i64, conn: &Connection) -> Result<()> {
    get_deck(deck_id, conn)?.ok_or(FlashcardError::DeckNotFound(deck_id))?;
    Ok(())
}

/// Creates a new deck for a user and returns its ID
pub fn new_deck(user_id: i64, name: &str, now: DateTime<Utc>, conn: &Connection) -> Result<i64> {
    conn.execute(
        "INSERT INTO decks (user_id, name, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, name, to_millis(now)],
    )?;
    let deck_id = conn.last_insert_rowid();
    info!(deck_id, user_id, name, "deck created");
    Ok(deck_id)
}

pub fn get_deck(deck_id: i64, conn: &Connection) -> Result<Option<Deck>> {
    let deck = conn
        .query_row(
            "SELECT id, user_id, name, created_at FROM decks WHERE id = ?1",
            params![deck_id],
            deck_from_row,
        )
        .optional()?;
    Ok(deck)
}

/// Retrieves all decks owned by a user, newest first
pub fn get_decks_for_user(user_id: i64, conn: &Connection) -> Result<Vec<Deck>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, created_at FROM decks
         WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC",
    )?;
    let decks = stmt
        .query_map(params![user_id], deck_from_row)?
        .collect::<rusqlite::Result<Vec<Deck>>>()?;
    Ok(decks)
}

pub fn rename_deck(deck_id: i64, name: &str, conn: &Connection) -> Result<()> {
    let changed = conn.execute(
        "UPDATE decks SET name = ?1 WHERE id = ?2",
        params![name, deck_id],
    )?;
    if changed == 0 {
        return Err(FlashcardError::DeckNotFound(deck_id));
    }
    Ok(())
}

/// Deletes a deck together with its cards and their review logs
pub fn delete_deck(deck_id: i64, conn: &Connection) -> Result<()> {
    let changed = conn.execute("DELETE FROM decks WHERE id = ?1", params![deck_id])?;
    if changed == 0 {
        return Err(FlashcardError::DeckNotFound(deck_id));
    }
    info!(deck_id, "deck deleted");
    Ok(())
}

/// Adds a card to a deck with a fresh SM-2 schedule (due right away).
///
/// Returns the card ID.
pub fn add_card(
    deck_id: i64,
    front: &str,
    back: &str,
    now: DateTime<Utc>,
    conn: &Connection,
) -> Result<i64> {
    ensure_deck_exists(deck_id, conn)?;

    let schedule = CardSchedule::new(now);
    conn.execute(
        "INSERT INTO cards (deck_id, front, back, interval_days, repetition, efactor, next_review, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            deck_id,
            front,
            back,
            schedule.interval_days,
            schedule.repetition,
            schedule.efactor,
            schedule.next_review.map(to_millis),
            to_millis(now)
        ],
    )?;

    let card_id = conn.last_insert_rowid();
    debug!(card_id, deck_id, "card added");
    Ok(card_id)
}

pub fn get_card(card_id: i64, conn: &Connection) -> Result<Option<Card>> {
    let card = conn
        .query_row(
            &format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1"),
            params![card_id],
            card_from_row,
        )
        .optional()?;
    Ok(card)
}

/// Retrieves all cards of a deck, unscheduled first, then by next review
pub fn get_cards_for_deck(deck_id: i64, conn: &Connection) -> Result<Vec<Card>> {
    search_cards(deck_id, None, None, conn)
}

/// Edits the text of a card. Its schedule is left alone.
pub fn update_card_content(card_id: i64, front: &str, back: &str, conn: &Connection) -> Result<()> {
    let changed = conn.execute(
        "UPDATE cards SET front = ?1, back = ?2 WHERE id = ?3",
        params![front, back, card_id],
    )?;
    if changed == 0 {
        return Err(FlashcardError::CardNotFound(card_id));
    }
    Ok(())
}

/// Deletes a card and its review history
pub fn delete_card(card_id: i64, conn: &Connection) -> Result<()> {
    let changed = conn.execute("DELETE FROM cards WHERE id = ?1", params![card_id])?;
    if changed == 0 {
        return Err(FlashcardError::CardNotFound(card_id));
    }
    debug!(card_id, "card deleted");
    Ok(())
}

/// Retrieves cards of a deck that are due at `now`
///
/// A card is due when its next review is missing or not after `now`.
/// Cards without a next review come first, then the most overdue, ties broken by ID.
pub fn get_cards_due_for_review(
    deck_id: i64,
    now: DateTime<Utc>,
    limit: usize,
    conn: &Connection,
) -> Result<Vec<Card>> {
    ensure_deck_exists(deck_id, conn)?;

    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(&format!(
        "SELECT {CARD_COLUMNS} FROM cards
         WHERE deck_id = ?1 AND (next_review IS NULL OR next_review <= ?2)
         ORDER BY next_review IS NOT NULL, next_review ASC, id ASC
         LIMIT ?3"
    ))?;
    let cards = stmt
        .query_map(params![deck_id, to_millis(now), limit], card_from_row)?
        .collect::<rusqlite::Result<Vec<Card>>>()?;

    debug!(deck_id, due = cards.len(), "loaded due cards");
    Ok(cards)
}

/// The card that should be shown next, if anything is due
pub fn next_due_card(deck_id: i64, now: DateTime<Utc>, conn: &Connection) -> Result<Option<Card>> {
    Ok(get_cards_due_for_review(deck_id, now, 1, conn)?
        .into_iter()
        .next())
}

/// Creates the statistic row for a user if it is missing and returns the stored row.
///
/// `stability` is only written on creation; an existing row keeps its value.
/// It must lie in [0, 1].
pub fn create_user_stat(
    user_id: i64,
    stability: Option<f64>,
    conn: &Connection,
) -> Result<UserStat> {
    if let Some(stability) = stability {
        // Also rejects NaN, which SQLite would silently store as NULL
        if !(0.0..=1.0).contains(&stability) {
            return Err(FlashcardError::InvalidStability(stability));
        }
    }

    let fresh = UserStat {
        efactor_stability: stability,
        ..UserStat::new(user_id)
    };
    conn.execute(
        "INSERT OR IGNORE INTO user_stats (user_id, average_efactor, efactor_stability)
         VALUES (?1, ?2, ?3)",
        params![fresh.user_id, fresh.average_efactor, fresh.efactor_stability],
    )?;
    Ok(get_user_stat(user_id, conn)?.unwrap_or(fresh))
}

pub fn get_user_stat(user_id: i64, conn: &Connection) -> Result<Option<UserStat>> {
    let stat = conn
        .query_row(
            "SELECT user_id, average_efactor, efactor_stability FROM user_stats WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(UserStat {
                    user_id: row.get(0)?,
                    average_efactor: row.get(1)?,
                    efactor_stability: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(stat)
}

fn tag_from_row(row: &Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn ensure_card_exists(card_id: i64, conn: &Connection) -> Result<()> {
    get_card(card_id, conn)?.ok_or(FlashcardError::CardNotFound(card_id))?;
    Ok(())
}

fn find_or_create_tag(name: &str, conn: &Connection) -> Result<Tag> {
    let name = tag::normalize_name(name).ok_or(FlashcardError::EmptyTagName)?;
    conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![name])?;
    let tag = conn.query_row(
        "SELECT id, name FROM tags WHERE name = ?1",
        params![name],
        tag_from_row,
    )?;
    Ok(tag)
}

/// Puts a tag on a card, creating the tag when no tag has that name yet.
///
/// Tagging twice with the same name is a no-op.
pub fn tag_card(card_id: i64, name: &str, conn: &Connection) -> Result<Tag> {
    ensure_card_exists(card_id, conn)?;
    let tag = find_or_create_tag(name, conn)?;
    conn.execute(
        "INSERT OR IGNORE INTO card_tags (card_id, tag_id) VALUES (?1, ?2)",
        params![card_id, tag.id],
    )?;
    debug!(card_id, tag_id = tag.id, "card tagged");
    Ok(tag)
}

/// Replaces every tag on a card with the given names. Blank names are skipped.
pub fn set_card_tags(card_id: i64, names: &[&str], conn: &Connection) -> Result<Vec<Tag>> {
    ensure_card_exists(card_id, conn)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM card_tags WHERE card_id = ?1", params![card_id])?;
    for name in names.iter().copied().filter_map(tag::normalize_name) {
        tag_card(card_id, name, &tx)?;
    }
    tx.commit()?;

    tags_for_card(card_id, conn)
}

pub fn tags_for_card(card_id: i64, conn: &Connection) -> Result<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name FROM tags t
         JOIN card_tags ct ON ct.tag_id = t.id
         WHERE ct.card_id = ?1
         ORDER BY t.name",
    )?;
    let tags = stmt
        .query_map(params![card_id], tag_from_row)?
        .collect::<rusqlite::Result<Vec<Tag>>>()?;
    Ok(tags)
}

/// Tags used by at least one card of the deck, by name
pub fn tags_for_deck(deck_id: i64, conn: &Connection) -> Result<Vec<Tag>> {
    ensure_deck_exists(deck_id, conn)?;

    let mut stmt = conn.prepare(
        "SELECT DISTINCT t.id, t.name FROM tags t
         JOIN card_tags ct ON ct.tag_id = t.id
         JOIN cards c ON c.id = ct.card_id
         WHERE c.deck_id = ?1
         ORDER BY t.name",
    )?;
    let tags = stmt
        .query_map(params![deck_id], tag_from_row)?
        .collect::<rusqlite::Result<Vec<Tag>>>()?;
    Ok(tags)
}

/// `LIKE` pattern matching `text` anywhere, with wildcards in `text` taken literally.
fn contains_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Lists a deck's cards, optionally narrowed to cards whose front or back contains
/// `query` (case-insensitive for ASCII) and to cards carrying `tag_id`.
///
/// Cards without a next review come first, then by next review, ties broken by ID.
pub fn search_cards(
    deck_id: i64,
    query: Option<&str>,
    tag_id: Option<i64>,
    conn: &Connection,
) -> Result<Vec<Card>> {
    ensure_deck_exists(deck_id, conn)?;

    let pattern = query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(contains_pattern);
    let mut stmt = conn.prepare(&format!(
        "SELECT {CARD_COLUMNS} FROM cards
         WHERE deck_id = ?1
           AND (?2 IS NULL OR front LIKE ?2 ESCAPE '\\' OR back LIKE ?2 ESCAPE '\\')
           AND (?3 IS NULL OR EXISTS (
                SELECT 1 FROM card_tags ct WHERE ct.card_id = cards.id AND ct.tag_id = ?3))
         ORDER BY next_review IS NOT NULL, next_review ASC, id ASC"
    ))?;
    let cards = stmt
        .query_map(params![deck_id, pattern, tag_id], card_from_row)?
        .collect::<rusqlite::Result<Vec<Card>>>()?;
    Ok(cards)
}

/// A review submitted by a client. `quality` is untrusted and gets clamped.
#[derive(Clone, Debug, PartialEq)]
pub struct ReviewRequest {
    pub card_id: i64,
    pub quality: i32,
    /// Owner of the review; their statistic is updated when one exists.
    pub user_id: Option<i64>,
    /// Defaults to the current time.
    pub reviewed_at: Option<DateTime<Utc>>,
    pub response_time: Option<f64>,
}

impl ReviewRequest {
    pub fn new(card_id: i64, quality: i32) -> Self {
        Self {
            card_id,
            quality,
            user_id: None,
            reviewed_at: None,
            response_time: None,
        }
    }

    pub fn by_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn at(mut self, reviewed_at: DateTime<Utc>) -> Self {
        self.reviewed_at = Some(reviewed_at);
        self
    }

    pub fn with_response_time(mut self, seconds: f64) -> Self {
        self.response_time = Some(seconds);
        self
    }
}

/// Everything a review wrote.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedReview {
    pub log_id: i64,
    pub update: ScheduleUpdate,
    pub log: ReviewLog,
    /// The user's statistic after the review, if one was updated.
    pub user_stat: Option<UserStat>,
}

/// Applies one review: reschedules the card, appends its log entry and updates
/// the user's statistic, all in one transaction.
///
/// The transaction is IMMEDIATE so the card is read under SQLite's write lock;
/// two reviews of the same card can't both start from the same stale state.
pub fn record_review(request: &ReviewRequest, conn: &mut Connection) -> Result<RecordedReview> {
    let reviewed_at = request.reviewed_at.unwrap_or_else(Utc::now);
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let card =
        get_card(request.card_id, &tx)?.ok_or(FlashcardError::CardNotFound(request.card_id))?;
    if card.schedule.efactor < MIN_EFACTOR {
        warn!(
            card_id = card.id,
            efactor = card.schedule.efactor,
            "stored efactor is below the SM-2 floor"
        );
    }

    let mut user_stat = match request.user_id {
        Some(user_id) => get_user_stat(user_id, &tx)?,
        None => None,
    };

    let update = sm2::review(&card.schedule, request.quality, reviewed_at, user_stat.as_mut());

    tx.execute(
        "UPDATE cards
         SET interval_days = ?1, repetition = ?2, efactor = ?3, next_review = ?4
         WHERE id = ?5",
        params![
            update.interval_days,
            update.repetition,
            update.efactor,
            to_millis(update.next_review),
            card.id
        ],
    )?;

    let log = update.to_log(card.id, reviewed_at, request.response_time);
    tx.execute(
        "INSERT INTO review_logs (card_id, review_date, quality, interval_days, efactor, response_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            log.card_id,
            to_millis(log.review_date),
            log.quality,
            log.interval_days,
            log.efactor,
            log.response_time
        ],
    )?;
    let log_id = tx.last_insert_rowid();

    if let Some(stat) = &user_stat {
        tx.execute(
            "UPDATE user_stats SET average_efactor = ?1 WHERE user_id = ?2",
            params![stat.average_efactor, stat.user_id],
        )?;
    }

    tx.commit()?;

    info!(
        card_id = card.id,
        quality = update.quality,
        interval_days = update.interval_days,
        efactor = update.efactor,
        "review recorded"
    );

    Ok(RecordedReview {
        log_id,
        update,
        log,
        user_stat,
    })
}

/// Review history of one card, oldest first. Returns (log_id, ReviewLog) tuples.
pub fn get_review_logs(card_id: i64, conn: &Connection) -> Result<Vec<(i64, ReviewLog)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REVIEW_LOG_COLUMNS} FROM review_logs WHERE card_id = ?1 ORDER BY review_date, id"
    ))?;
    let logs = stmt
        .query_map(params![card_id], review_log_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(logs)
}

/// Latest reviews across all cards of a deck, newest first
pub fn recent_review_logs_for_deck(
    deck_id: i64,
    limit: usize,
    conn: &Connection,
) -> Result<Vec<(i64, ReviewLog)>> {
    ensure_deck_exists(deck_id, conn)?;

    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(
        "SELECT r.id, r.card_id, r.review_date, r.quality, r.interval_days, r.efactor, r.response_time
         FROM review_logs r
         JOIN cards c ON c.id = r.card_id
         WHERE c.deck_id = ?1
         ORDER BY r.review_date DESC, r.id DESC
         LIMIT ?2",
    )?;
    let logs = stmt
        .query_map(params![deck_id, limit], review_log_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(logs)
}

/// Card totals and daily review counts for a deck
pub fn deck_stats(deck_id: i64, now: DateTime<Utc>, conn: &Connection) -> Result<DeckStats> {
    ensure_deck_exists(deck_id, conn)?;

    let total_cards: i64 = conn.query_row(
        "SELECT COUNT(*) FROM cards WHERE deck_id = ?1",
        params![deck_id],
        |row| row.get(0),
    )?;
    let due_cards: i64 = conn.query_row(
        "SELECT COUNT(*) FROM cards
         WHERE deck_id = ?1 AND (next_review IS NULL OR next_review <= ?2)",
        params![deck_id, to_millis(now)],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT r.review_date FROM review_logs r
         JOIN cards c ON c.id = r.card_id
         WHERE c.deck_id = ?1",
    )?;
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    let days = stmt.query_map(params![deck_id], |row| timestamp_at(row, 0))?;
    for reviewed_at in days {
        *per_day.entry(reviewed_at?.date_naive()).or_default() += 1;
    }

    Ok(DeckStats {
        total_cards: total_cards as usize,
        due_cards: due_cards as usize,
        reviews_per_day: per_day.into_iter().collect(),
    })
}

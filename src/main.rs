use chrono::Utc;
use flashcard_srs::database::db;
use flashcard_srs::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Single local user until accounts exist outside this binary.
const LOCAL_USER_ID: i64 = 1;

fn main() -> Result<()> {
    let config = AppConfig::from_env()?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();

    let conn = db::init_database(&config.database_path)?;
    let now = Utc::now();

    db::create_user_stat(LOCAL_USER_ID, Some(config.efactor_stability), &conn)?;

    if db::get_decks_for_user(LOCAL_USER_ID, &conn)?.is_empty() {
        let deck_id = db::new_deck(LOCAL_USER_ID, "Polish Vocabulary", now, &conn)?;

        let samples = [
            ("cześć", "hello", "greetings"),
            ("dziękuję", "thank you", "politeness, phrases"),
            ("proszę", "please", "politeness, phrases"),
        ];
        for (front, back, tags) in samples {
            let card_id = db::add_card(deck_id, front, back, now, &conn)?;
            db::set_card_tags(card_id, &models::tag::split_names(tags), &conn)?;
        }

        info!(deck_id, "sample deck created");
    }

    for deck in db::get_decks_for_user(LOCAL_USER_ID, &conn)? {
        let stats = db::deck_stats(deck.id, now, &conn)?;
        let session = ReviewSession::start(deck.id, now, config.due_limit, &conn)?;
        let tags: Vec<String> = db::tags_for_deck(deck.id, &conn)?
            .into_iter()
            .map(|tag| tag.name)
            .collect();
        info!(
            deck = %deck.name,
            total = stats.total_cards,
            due = stats.due_cards,
            queued = session.total_count(),
            tags = %tags.join(", "),
            "deck loaded"
        );
    }

    if let Some(stat) = db::get_user_stat(LOCAL_USER_ID, &conn)? {
        info!(
            average_efactor = stat.average_efactor,
            stability = stat.stability(),
            "user statistics"
        );
    }

    Ok(())
}

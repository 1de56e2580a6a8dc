mod format;
mod playback;
mod player;
mod provider;
mod resolver;
mod resume;


use std::path::Path;

use anyhow::Result;

use crate::cli::{Cli, Command};
use crate::db::{Database, HistoryEntry, HistoryPolicy, WatchHistory};
use crate::paths::{database_file_path, settings_file_path};
use crate::settings::Settings;

use self::format::{format_last_watched, format_position, truncate};
use self::playback::PlaybackOrchestrator;
use self::player::MpvPlayer;
use self::provider::{AllAnimeProvider, ContentProvider, Episode};
use self::resolver::ContentResolver;
use self::resume::ResumeResolver;

pub fn run(cli: Cli) -> Result<()> {
    let settings_path = settings_file_path()?;
    let settings = Settings::load(&settings_path)?;
    tracing::debug!("loaded settings: {settings:?}");

    if let Some(Command::Settings) = cli.command {
        return run_settings(&settings, &settings_path);
    }

    let db = open_db(&settings)?;
    let resolver = ContentResolver::new(AllAnimeProvider::new());

    match cli.command {
        Some(Command::Search { query }) => run_search(&resolver, &query),
        Some(Command::Play {
            query,
            index,
            episode,
            quality,
            start,
        }) => run_play(
            &resolver,
            &db,
            &settings,
            &query,
            index,
            episode,
            quality.as_deref(),
            start,
        )?,
        Some(Command::Resume { id, quality }) => {
            run_resume(&resolver, &db, &settings, id, quality.as_deref())
        }
        Some(Command::Continue { limit }) => run_continue(&resolver, &db, &settings, limit),
        Some(Command::Settings) => run_settings(&settings, &settings_path)?,
        None => run_continue(&resolver, &db, &settings, 10),
    }

    Ok(())
}

fn run_search<P: ContentProvider>(resolver: &ContentResolver<P>, query: &str) {
    let titles = resolver.search(query);
    if titles.is_empty() {
        println!("No results for \"{query}\".");
        return;
    }
    for (idx, title) in titles.iter().enumerate() {
        println!("{:>3}. {:<50} [{}]", idx + 1, truncate(&title.name, 50), title.id);
    }
}

#[allow(clippy::too_many_arguments)]
fn run_play<P: ContentProvider>(
    resolver: &ContentResolver<P>,
    db: &Database,
    settings: &Settings,
    query: &str,
    index: usize,
    episode: Episode,
    quality: Option<&str>,
    start: f64,
) -> Result<()> {
    let titles = resolver.search(query);
    let Some(title) = index
        .checked_sub(1)
        .and_then(|position| titles.get(position))
        .cloned()
    else {
        println!("No result #{index} for \"{query}\".");
        return Ok(());
    };

    let episodes = resolver.episodes_for(&title);
    if let Some(last) = episodes.last()
        && !episodes.contains(&episode)
    {
        println!("{} has no episode {episode} (last is {last}).", title.name);
        return Ok(());
    }

    let quality = quality.unwrap_or(settings.quality.as_str());
    let Some(stream) = resolver.resolve_stream(&title, episode, quality) else {
        println!("No stream found for {} episode {episode}.", title.name);
        return Ok(());
    };

    let stored = db.get_entry(&title.id)?;
    let start_time = initial_start_time(settings, stored.as_ref(), episode, start);
    println!("Playing {} episode {episode}", title.name);

    let mut player = MpvPlayer::new();
    let mut orchestrator = PlaybackOrchestrator::new(resolver, db, &mut player, settings);
    if let Err(err) = orchestrator.play(title, episode, stream, start_time) {
        println!("Player launch failed: {err:#}");
        return Ok(());
    }
    print_session_summary(&orchestrator, db);
    Ok(())
}

/// An explicit `--start` wins; otherwise resume the stored position of the same episode.
pub(crate) fn initial_start_time(
    settings: &Settings,
    stored: Option<&HistoryEntry>,
    episode: Episode,
    requested: f64,
) -> f64 {
    if requested > 0.0 {
        return requested;
    }
    match stored {
        Some(entry) if settings.auto_resume && entry.episode == episode => entry.timestamp,
        _ => 0.0,
    }
}

fn run_resume<P: ContentProvider>(
    resolver: &ContentResolver<P>,
    db: &Database,
    settings: &Settings,
    id: Option<String>,
    quality: Option<&str>,
) {
    let resume = ResumeResolver::new(resolver, db, settings);
    let id = match id {
        Some(id) => id,
        None => match resume.continue_watching(1).into_iter().next() {
            Some(item) => item.anime_id,
            None => {
                println!("Nothing to resume yet. Run `aniplay play <query>` first.");
                return;
            }
        },
    };

    let mut player = MpvPlayer::new();
    let mut orchestrator = PlaybackOrchestrator::new(resolver, db, &mut player, settings);
    if resume.resume(&mut orchestrator, &id, quality) {
        print_session_summary(&orchestrator, db);
    } else {
        println!("Could not resume {id}. Set ANIPLAY_LOG=info for details.");
    }
}

fn run_continue<P: ContentProvider>(
    resolver: &ContentResolver<P>,
    db: &Database,
    settings: &Settings,
    limit: usize,
) {
    let items = ResumeResolver::new(resolver, db, settings).continue_watching(limit);
    if items.is_empty() {
        println!("Nothing to continue yet. Run `aniplay play <query>` first.");
        return;
    }

    println!(
        "{:<26} {:<36} {:<5} {:<9} {:<9} {:<17}",
        "ID", "TITLE", "EP", "PROGRESS", "POSITION", "LAST WATCHED"
    );
    for item in items {
        println!(
            "{:<26} {:<36} {:<5} {:<9} {:<9} {:<17}",
            truncate(&item.anime_id, 26),
            truncate(&item.anime_name, 36),
            item.episode,
            format!("{:.0}%", item.progress_percent),
            format_position(item.timestamp),
            format_last_watched(&item.last_watched)
        );
    }
}

fn run_settings(settings: &Settings, path: &Path) -> Result<()> {
    println!("# {}", path.display());
    print!("{}", settings.to_toml()?);
    Ok(())
}

fn print_session_summary<P, L>(
    orchestrator: &PlaybackOrchestrator<'_, P, Database, L>,
    db: &Database,
) where
    P: ContentProvider,
    L: player::Player,
{
    let Some(session) = orchestrator.session() else {
        return;
    };
    match db.get_entry(&session.title.id) {
        Ok(Some(entry)) => println!(
            "Saved progress: {} episode {} at {} ({:.0}%)",
            entry.anime_name,
            entry.episode,
            format_position(entry.timestamp),
            entry.progress_percent
        ),
        Ok(None) => println!(
            "Last played: {} episode {}",
            session.title.name, session.episode
        ),
        Err(err) => println!("Progress could not be read back: {err:#}"),
    }
}

fn open_db(settings: &Settings) -> Result<Database> {
    let db_path = database_file_path()?;
    let db = Database::open(&db_path)?.with_policy(HistoryPolicy {
        limit: settings.history_limit,
        minimal_progress_seconds: f64::from(settings.minimal_progress_threshold),
    });
    db.migrate()?;
    Ok(db)
}

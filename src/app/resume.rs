use std::fmt;
use std::rc::Rc;

use super::playback::PlaybackOrchestrator;
use super::player::Player;
use super::provider::{ContentProvider, Episode, Stream, Title};
use super::resolver::ContentResolver;
use crate::db::WatchHistory;
use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ResumeFailure {
    NoHistory,
    NoTitle,
    NoStream,
}

impl fmt::Display for ResumeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHistory => write!(f, "no watch history for this title"),
            Self::NoTitle => write!(f, "could not find the title to resume"),
            Self::NoStream => write!(f, "no stream available to resume"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ResumePlan {
    pub(crate) title: Rc<Title>,
    pub(crate) episode: Episode,
    pub(crate) stream: Stream,
    /// Stored position plus the intro skip. Playback adds the skip again on launch.
    pub(crate) start_time: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ContinueWatching {
    pub(crate) anime_id: String,
    pub(crate) anime_name: String,
    pub(crate) episode: Episode,
    pub(crate) progress_percent: f64,
    pub(crate) timestamp: f64,
    pub(crate) last_watched: String,
}

/// Rebuilds a playback session from watch history.
pub(crate) struct ResumeResolver<'a, P, H> {
    resolver: &'a ContentResolver<P>,
    history: &'a H,
    settings: &'a Settings,
}

impl<'a, P, H> ResumeResolver<'a, P, H>
where
    P: ContentProvider,
    H: WatchHistory,
{
    pub(crate) fn new(
        resolver: &'a ContentResolver<P>,
        history: &'a H,
        settings: &'a Settings,
    ) -> Self {
        Self {
            resolver,
            history,
            settings,
        }
    }

    /// Returns whether playback was started. Every failure is logged, never raised.
    pub(crate) fn resume<L: Player>(
        &self,
        orchestrator: &mut PlaybackOrchestrator<'_, P, H, L>,
        anime_id: &str,
        quality: Option<&str>,
    ) -> bool {
        let plan = match self.plan_resume(anime_id, quality) {
            Ok(plan) => plan,
            Err(failure) => {
                tracing::warn!("cannot resume {anime_id}: {failure}");
                return false;
            }
        };

        let ResumePlan {
            title,
            episode,
            stream,
            start_time,
        } = plan;
        match orchestrator.play(title, episode, stream, start_time) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!("resume of {anime_id} could not start playback: {err:#}");
                false
            }
        }
    }

    pub(crate) fn plan_resume(
        &self,
        anime_id: &str,
        quality: Option<&str>,
    ) -> Result<ResumePlan, ResumeFailure> {
        let quality = quality.unwrap_or(self.settings.quality.as_str());
        let entry = match self.history.get_entry(anime_id) {
            Ok(Some(entry)) => entry,
            Ok(None) => return Err(ResumeFailure::NoHistory),
            Err(err) => {
                tracing::error!("reading history for {anime_id} failed: {err:#}");
                return Err(ResumeFailure::NoHistory);
            }
        };

        // Falling back to a name search can pick a different show with the same name.
        let title = self
            .resolver
            .cached_title(anime_id)
            .or_else(|| self.resolver.search(&entry.anime_name).into_iter().next())
            .ok_or(ResumeFailure::NoTitle)?;

        let stream = self
            .resolver
            .resolve_stream(&title, entry.episode, quality)
            .ok_or(ResumeFailure::NoStream)?;

        Ok(ResumePlan {
            title,
            episode: entry.episode,
            stream,
            start_time: entry.timestamp + f64::from(self.settings.skip_intro_seconds),
        })
    }

    pub(crate) fn continue_watching(&self, limit: usize) -> Vec<ContinueWatching> {
        let rows = match self.history.continue_watching(limit) {
            Ok(rows) => rows,
            Err(err) => {
                tracing::error!("reading continue-watching list failed: {err:#}");
                return Vec::new();
            }
        };

        rows.into_iter()
            .map(|(anime_id, entry)| ContinueWatching {
                anime_id,
                anime_name: entry.anime_name,
                episode: entry.episode,
                progress_percent: entry.progress_percent,
                timestamp: entry.timestamp,
                last_watched: entry.last_watched,
            })
            .collect()
    }
}

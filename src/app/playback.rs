use std::rc::Rc;

use anyhow::Result;

use super::player::Player;
use super::provider::{ContentProvider, Episode, Stream, Title};
use super::resolver::ContentResolver;
use crate::db::WatchHistory;
use crate::settings::Settings;

const ALLANIME_REFERRER: &str = "https://allanime.day";
const ALLMANGA_REFERRER: &str = "https://allmanga.to";

/// Seconds added to the elapsed time when the player cannot report a duration.
pub(crate) const UNKNOWN_DURATION_PADDING: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlaybackState {
    Idle,
    Resolving,
    Playing,
    Finalizing,
    AutoAdvancing,
}

/// Title and episode of the most recent launch. Kept after playback ends.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub(crate) title: Rc<Title>,
    pub(crate) episode: Episode,
}

struct PendingPlay {
    episode: Episode,
    stream: Stream,
    start_time: f64,
}

pub(crate) fn referrer_for_url(url: &str) -> &'static str {
    if url.contains("fast4speed") {
        ALLANIME_REFERRER
    } else if url.contains("sunshinerays") {
        ALLMANGA_REFERRER
    } else {
        ALLANIME_REFERRER
    }
}

pub(crate) fn launch_args(settings: &Settings, referrer: &str) -> Vec<String> {
    let mut args = Vec::new();
    if settings.fullscreen {
        args.push("-fs".to_string());
    }
    args.push(format!("--referrer={referrer}"));
    if settings.skip_outro_seconds > 0 {
        args.push(format!("--end=-{}", settings.skip_outro_seconds));
    }
    args
}

/// Drives one title through the player: launch, progress persistence, exit handling and
/// auto-advance to the following episode.
pub(crate) struct PlaybackOrchestrator<'a, P, H, L> {
    resolver: &'a ContentResolver<P>,
    history: &'a H,
    player: &'a mut L,
    settings: &'a Settings,
    state: PlaybackState,
    session: Option<Session>,
}

impl<'a, P, H, L> PlaybackOrchestrator<'a, P, H, L>
where
    P: ContentProvider,
    H: WatchHistory,
    L: Player,
{
    pub(crate) fn new(
        resolver: &'a ContentResolver<P>,
        history: &'a H,
        player: &'a mut L,
        settings: &'a Settings,
    ) -> Self {
        Self {
            resolver,
            history,
            player,
            settings,
            state: PlaybackState::Idle,
            session: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> PlaybackState {
        self.state
    }

    pub(crate) fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Plays `episode` and, with auto-advance on, every following episode that resolves.
    ///
    /// Only a failure to launch the first episode is returned; everything after a
    /// successful launch is logged and ends the session cleanly.
    pub(crate) fn play(
        &mut self,
        title: Rc<Title>,
        episode: Episode,
        stream: Stream,
        start_time: f64,
    ) -> Result<()> {
        let mut pending = Some(PendingPlay {
            episode,
            stream,
            start_time,
        });
        let mut first = true;

        while let Some(request) = pending.take() {
            self.set_state(PlaybackState::Resolving);
            if let Err(err) = self.launch(&title, &request) {
                self.set_state(PlaybackState::Idle);
                if first {
                    return Err(err);
                }
                tracing::error!(
                    "failed to launch {} episode {}: {err:#}",
                    title.name,
                    request.episode
                );
                return Ok(());
            }
            first = false;

            self.set_state(PlaybackState::Playing);
            self.track_progress(&title, request.episode);

            self.set_state(PlaybackState::Finalizing);
            pending = self.finish_episode(&title, request.episode);
        }

        self.set_state(PlaybackState::Idle);
        Ok(())
    }

    fn set_state(&mut self, state: PlaybackState) {
        tracing::debug!("playback state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn launch(&mut self, title: &Rc<Title>, request: &PendingPlay) -> Result<()> {
        let start_time = request.start_time + f64::from(self.settings.skip_intro_seconds);
        let referrer = request
            .stream
            .referrer
            .clone()
            .unwrap_or_else(|| referrer_for_url(&request.stream.url).to_string());
        let args = launch_args(self.settings, &referrer);

        self.session = Some(Session {
            title: Rc::clone(title),
            episode: request.episode,
        });
        tracing::info!(
            "playing {} EP{} with referrer {referrer}, start_time {start_time}",
            title.name,
            request.episode
        );
        self.player.launch(&request.stream.url, start_time, &args)
    }

    fn track_progress(&mut self, title: &Title, episode: Episode) {
        let history = self.history;
        let interval = self.settings.progress_interval();
        let mut on_progress = |elapsed: f64, duration: Option<f64>| {
            if let Err(err) =
                history.update_progress(&title.id, &title.name, episode, elapsed, duration)
            {
                tracing::warn!("failed to save progress for {}: {err:#}", title.name);
            }
        };
        if let Err(err) = self.player.track_until_exit(interval, &mut on_progress) {
            tracing::warn!("lost track of player for {} EP{episode}: {err:#}", title.name);
        }
    }

    /// Runs once per launch after the player has exited. Never fails; returns the next
    /// episode to play when auto-advance applies.
    fn finish_episode(&mut self, title: &Title, episode: Episode) -> Option<PendingPlay> {
        tracing::info!("player closed, saving history for {} EP{episode}", title.name);
        let elapsed = self.player.elapsed_time();
        let duration = self
            .player
            .current_duration()
            .filter(|duration| *duration > 0.0)
            .unwrap_or(elapsed + UNKNOWN_DURATION_PADDING);
        if let Err(err) =
            self.history
                .update_progress(&title.id, &title.name, episode, elapsed, Some(duration))
        {
            tracing::warn!("failed to save final progress for {}: {err:#}", title.name);
            return None;
        }

        if !self.settings.auto_next_episode {
            return None;
        }

        self.set_state(PlaybackState::AutoAdvancing);
        let next_episode = episode.checked_add(1)?;
        let available = self.resolver.episodes_for(title).len();
        if next_episode as usize > available {
            tracing::info!("{} EP{episode} was the last available episode", title.name);
            return None;
        }

        let stream = self
            .resolver
            .resolve_stream(title, next_episode, &self.settings.quality)?;
        tracing::info!("auto-playing next episode: EP{next_episode}");
        Some(PendingPlay {
            episode: next_episode,
            stream,
            start_time: 0.0,
        })
    }
}

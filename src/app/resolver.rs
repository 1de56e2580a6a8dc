use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::provider::{ContentProvider, Episode, Stream, Title};

/// Process-lifetime cache in front of a [`ContentProvider`].
///
/// Titles are handed out as shared `Rc`s: a key seen once always maps to the same
/// instance. Provider errors never escape; they are logged and degrade to empty results.
pub(crate) struct ContentResolver<P> {
    provider: P,
    titles: RefCell<HashMap<String, Rc<Title>>>,
    episodes: RefCell<HashMap<String, Rc<[Episode]>>>,
}

impl<P> ContentResolver<P> {
    #[cfg(test)]
    pub(crate) fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: ContentProvider> ContentResolver<P> {
    pub(crate) fn new(provider: P) -> Self {
        Self {
            provider,
            titles: RefCell::new(HashMap::new()),
            episodes: RefCell::new(HashMap::new()),
        }
    }

    pub(crate) fn search(&self, query: &str) -> Vec<Rc<Title>> {
        tracing::info!("searching for {query:?}");
        let hits = match self.provider.search(query) {
            Ok(hits) => hits,
            Err(err) => {
                tracing::error!("search for {query:?} failed: {err:#}");
                return Vec::new();
            }
        };
        if hits.is_empty() {
            tracing::warn!("no results for {query:?}");
            return Vec::new();
        }

        let mut titles = self.titles.borrow_mut();
        hits.into_iter()
            .enumerate()
            .map(|(index, hit)| {
                let key = hit.id.clone().unwrap_or_else(|| index.to_string());
                Rc::clone(
                    titles
                        .entry(key)
                        .or_insert_with(|| Rc::new(Title::from_hit(hit, index))),
                )
            })
            .collect()
    }

    pub(crate) fn cached_title(&self, id: &str) -> Option<Rc<Title>> {
        self.titles.borrow().get(id).cloned()
    }

    pub(crate) fn episodes_for(&self, title: &Title) -> Rc<[Episode]> {
        if let Some(cached) = self.episodes.borrow().get(&title.id) {
            return Rc::clone(cached);
        }

        match self.provider.episodes(title) {
            Ok(episodes) => {
                let episodes: Rc<[Episode]> = episodes.into();
                self.episodes
                    .borrow_mut()
                    .insert(title.id.clone(), Rc::clone(&episodes));
                episodes
            }
            // Not cached, so the next call asks the provider again.
            Err(err) => {
                tracing::error!("fetching episodes for {} failed: {err:#}", title.name);
                Rc::from(Vec::new())
            }
        }
    }

    /// First candidate stream for the subtitled track, if any.
    pub(crate) fn resolve_stream(
        &self,
        title: &Title,
        episode: Episode,
        quality: &str,
    ) -> Option<Stream> {
        match self.provider.streams(title, episode, quality) {
            Ok(streams) => {
                let stream = streams.into_iter().next();
                match &stream {
                    Some(stream) => tracing::info!(
                        "stream fetched: {} (quality {})",
                        stream.url,
                        stream.quality.as_deref().unwrap_or("auto")
                    ),
                    None => tracing::warn!("no stream for {} episode {episode}", title.name),
                }
                stream
            }
            Err(err) => {
                tracing::error!(
                    "fetching stream for {} episode {episode} failed: {err:#}",
                    title.name
                );
                None
            }
        }
    }
}

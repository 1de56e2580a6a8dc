mod allanime;

use anyhow::Result;

pub(crate) use allanime::AllAnimeProvider;

pub(crate) type Episode = u32;

/// A title as returned by a provider search, before it is cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SearchHit {
    /// Stable provider key; positional index is used when absent.
    pub(crate) id: Option<String>,
    pub(crate) name: String,
    pub(crate) identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Title {
    pub(crate) id: String,
    pub(crate) name: String,
    /// Key sent back to the provider for episode and stream lookups.
    pub(crate) identifier: String,
}

impl Title {
    pub(crate) fn from_hit(hit: SearchHit, index: usize) -> Self {
        Self {
            id: hit.id.unwrap_or_else(|| index.to_string()),
            name: hit.name,
            identifier: hit.identifier,
        }
    }
}

/// A playable URL. `referrer` and `quality` are `None` when the provider does not report them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Stream {
    pub(crate) url: String,
    pub(crate) referrer: Option<String>,
    pub(crate) quality: Option<String>,
}

impl Stream {
    pub(crate) fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referrer: None,
            quality: None,
        }
    }
}

/// Remote catalogue. Episodes and streams always refer to the subtitled track.
pub(crate) trait ContentProvider {
    fn search(&self, query: &str) -> Result<Vec<SearchHit>>;

    fn episodes(&self, title: &Title) -> Result<Vec<Episode>>;

    /// Candidate streams, best first. `preferred_quality` is a hint.
    fn streams(
        &self,
        title: &Title,
        episode: Episode,
        preferred_quality: &str,
    ) -> Result<Vec<Stream>>;
}

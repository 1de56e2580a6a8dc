use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};

use super::{ContentProvider, Episode, SearchHit, Stream, Title};
use crate::http::HttpClient;

const API_URL: &str = "https://api.allanime.day/api";
const API_REFERER: &str = "https://allmanga.to";
const TRANSLATION_TYPE: &str = "sub";

const SEARCH_GQL: &str = "query( $search: SearchInput $limit: Int $page: Int $translationType: VaildTranslationTypeEnumType $countryOrigin: VaildCountryOriginEnumType ) { shows( search: $search limit: $limit page: $page translationType: $translationType countryOrigin: $countryOrigin ) { edges { _id name availableEpisodes __typename } }}";
const EPISODES_GQL: &str =
    "query ($showId: String!) { show( _id: $showId ) { _id availableEpisodesDetail }}";
const EPISODE_GQL: &str = "query ($showId: String!, $translationType: VaildTranslationTypeEnumType!, $episodeString: String!) { episode( showId: $showId translationType: $translationType episodeString: $episodeString ) { episodeString sourceUrls }}";

/// AllAnime GraphQL catalogue. Only direct source URLs are offered as streams.
pub(crate) struct AllAnimeProvider {
    client: HttpClient,
}

impl AllAnimeProvider {
    pub(crate) fn new() -> Self {
        let client = HttpClient::new(API_REFERER)
            .with_timeouts(Duration::from_secs(3), Duration::from_secs(6))
            .with_retries(3, Duration::from_secs(1));
        Self { client }
    }

    fn query(&self, gql: &str, variables: Value) -> Result<Value> {
        let variables = variables.to_string();
        let raw = self
            .client
            .get_text(API_URL, &[("variables", variables.as_str()), ("query", gql)])?;
        serde_json::from_str(&raw).context("provider returned invalid JSON")
    }
}

impl ContentProvider for AllAnimeProvider {
    fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let variables = json!({
            "search": { "allowAdult": false, "allowUnknown": false, "query": query },
            "limit": 40,
            "page": 1,
            "translationType": TRANSLATION_TYPE,
            "countryOrigin": "ALL",
        });
        let response = self.query(SEARCH_GQL, variables)?;
        Ok(parse_search_hits(&response))
    }

    fn episodes(&self, title: &Title) -> Result<Vec<Episode>> {
        let response = self.query(EPISODES_GQL, json!({ "showId": title.identifier }))?;
        parse_episode_numbers(&response, TRANSLATION_TYPE)
            .ok_or_else(|| anyhow!("no episode list for {}", title.identifier))
    }

    fn streams(
        &self,
        title: &Title,
        episode: Episode,
        preferred_quality: &str,
    ) -> Result<Vec<Stream>> {
        tracing::debug!(
            "requesting {} episode {episode} (quality hint {preferred_quality})",
            title.identifier
        );
        let variables = json!({
            "showId": title.identifier,
            "translationType": TRANSLATION_TYPE,
            "episodeString": episode.to_string(),
        });
        let response = self.query(EPISODE_GQL, variables)?;
        Ok(parse_direct_streams(&response))
    }
}

pub(crate) fn parse_search_hits(value: &Value) -> Vec<SearchHit> {
    let Some(edges) = value.pointer("/data/shows/edges").and_then(Value::as_array) else {
        return Vec::new();
    };

    edges
        .iter()
        .filter_map(|edge| {
            let name = edge.get("name")?.as_str()?.trim();
            if name.is_empty() {
                return None;
            }
            let id = edge
                .get("_id")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|id| !id.is_empty())?;
            Some(SearchHit {
                id: Some(id.to_string()),
                name: name.to_string(),
                identifier: id.to_string(),
            })
        })
        .collect()
}

pub(crate) fn parse_episode_numbers(value: &Value, mode: &str) -> Option<Vec<Episode>> {
    let items = value
        .pointer("/data/show/availableEpisodesDetail")?
        .get(mode)?
        .as_array()?;

    // Fractional specials such as "13.5" have no integer slot and are skipped.
    let mut episodes = items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => text.trim().parse::<Episode>().ok(),
            Value::Number(number) => number.as_u64().and_then(|n| Episode::try_from(n).ok()),
            _ => None,
        })
        .collect::<Vec<_>>();
    episodes.sort_unstable();
    episodes.dedup();
    Some(episodes)
}

pub(crate) fn parse_direct_streams(value: &Value) -> Vec<Stream> {
    let Some(sources) = value
        .pointer("/data/episode/sourceUrls")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let mut ranked = sources
        .iter()
        .filter_map(|source| {
            let url = source.get("sourceUrl")?.as_str()?.trim();
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return None;
            }
            let priority = source.get("priority").and_then(Value::as_f64).unwrap_or(0.0);
            Some((priority, Stream::new(url)))
        })
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    ranked.into_iter().map(|(_, stream)| stream).collect()
}

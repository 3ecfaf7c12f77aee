// src/api.rs
//! Realtime-trends JSON channel: request URL, anti-execution prefix handling and
//! tolerant decoding of story/article payloads.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::normalize::{normalize, normalize_opt, truncate_chars};
use crate::temporal::to_epoch_ms;
use crate::types::{ArticleRef, RelatedLink, TopicRecord, DESCRIPTION_MAX_CHARS, MAX_RELATED_LINKS};

pub const REALTIME_ENDPOINT: &str = "https://trends.google.com/trends/api/realtimetrends";

/// Category code meaning "every category" on the API side.
pub const ALL_CATEGORIES: &str = "all";

const XSSI_PREFIX: &str = ")]}'";

/// Parameters of a single API request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiParams {
    pub region: String,
    pub category: String,
    pub language: String,
    pub tz_minutes: i32,
}

/// Build the request URL for `params` against `endpoint`.
pub fn build_url(endpoint: &str, params: &ApiParams) -> Result<String> {
    let tz = params.tz_minutes.to_string();
    let url = url::Url::parse_with_params(
        endpoint,
        &[
            ("hl", params.language.as_str()),
            ("tz", tz.as_str()),
            ("cat", params.category.as_str()),
            ("fi", "0"),
            ("fs", "0"),
            ("geo", params.region.as_str()),
            ("ri", "300"),
            ("rs", "20"),
            ("sort", "0"),
        ],
    )
    .with_context(|| format!("invalid api endpoint {endpoint}"))?;
    Ok(url.into())
}

/// Drop a leading `)]}'`, an optional comma and the following line break.
pub fn strip_xssi_prefix(body: &str) -> &str {
    let trimmed = body.trim_start();
    match trimmed.strip_prefix(XSSI_PREFIX) {
        Some(rest) => {
            let rest = rest.strip_prefix(',').unwrap_or(rest);
            rest.trim_start_matches(['\r', '\n'])
        }
        None => trimmed,
    }
}

/// `null` decodes like a missing field.
fn null_as_default<'de, D, T>(d: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Option::unwrap_or_default)
}

#[derive(Debug, Deserialize, Default)]
struct RealtimePayload {
    #[serde(rename = "storySummaries", default, deserialize_with = "null_as_default")]
    story_summaries: StorySummaries,
}

// Stories and articles stay raw until converted one by one, so a single
// malformed entry is skipped instead of failing the whole body.
#[derive(Debug, Deserialize, Default)]
struct StorySummaries {
    #[serde(rename = "trendingStories", default, deserialize_with = "null_as_default")]
    trending_stories: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawStory {
    title: Option<String>,
    #[serde(rename = "entityNames", default, deserialize_with = "null_as_default")]
    entity_names: Vec<Option<String>>,
    #[serde(rename = "shareUrl")]
    share_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    articles: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawArticle {
    #[serde(rename = "articleTitle")]
    article_title: Option<String>,
    url: Option<String>,
    source: Option<String>,
    #[serde(default)]
    time: Value,
    snippet: Option<String>,
}

/// A trending story before time filtering and ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    pub term: String,
    pub description: String,
    pub explore_link: Option<String>,
    pub articles: Vec<ArticleRef>,
}

impl Story {
    /// True when no article carries a normalized timestamp (including no articles at all).
    pub fn has_only_unknown_times(&self) -> bool {
        self.articles.iter().all(|a| a.published_at_ms.is_none())
    }

    /// Convert into a ranked record; articles with a URL become related links.
    pub fn into_record(self, rank: u32) -> Option<TopicRecord> {
        let links: Vec<RelatedLink> = self
            .articles
            .iter()
            .filter_map(|a| RelatedLink::new(link_title(a), &a.url))
            .take(MAX_RELATED_LINKS)
            .collect();
        TopicRecord::build(rank, &self.term, &self.description, links)
            .map(|r| r.with_explore_link(self.explore_link).with_articles(self.articles))
    }
}

/// Article title, else its source, else the URL itself.
fn link_title(a: &ArticleRef) -> &str {
    [a.title.as_str(), a.source.as_str()]
        .into_iter()
        .find(|t| !t.trim().is_empty())
        .unwrap_or(a.url.as_str())
}

fn raw_time_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn convert_article(raw: RawArticle, now_ms: i64) -> ArticleRef {
    ArticleRef {
        title: normalize_opt(raw.article_title.as_deref()),
        url: raw.url.unwrap_or_default().trim().to_string(),
        source: normalize_opt(raw.source.as_deref()),
        published_raw: raw_time_text(&raw.time),
        published_at_ms: to_epoch_ms(&raw.time, now_ms),
    }
}

fn decode_entry<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(target: "harvest", entry = what, error = %e, "skipping malformed entry");
            None
        }
    }
}

fn convert_story(raw: RawStory, now_ms: i64) -> Option<Story> {
    let mut term = normalize_opt(raw.title.as_deref());
    if term.is_empty() {
        let names: Vec<String> = raw.entity_names.into_iter().flatten().collect();
        term = normalize(&names.join(", "));
    }
    if term.is_empty() {
        return None;
    }
    let raw_articles: Vec<RawArticle> = raw
        .articles
        .into_iter()
        .filter_map(|a| decode_entry(a, "article"))
        .collect();
    let description = raw_articles
        .iter()
        .filter_map(|a| a.snippet.as_deref())
        .map(normalize)
        .find(|s| !s.is_empty())
        .map(|s| truncate_chars(&s, DESCRIPTION_MAX_CHARS))
        .unwrap_or_default();
    let articles = raw_articles
        .into_iter()
        .map(|a| convert_article(a, now_ms))
        .collect();
    Some(Story {
        term,
        description,
        explore_link: raw.share_url,
        articles,
    })
}

/// Decode an API body (prefix already stripped or not) into stories.
/// A body that is not JSON is an error, which the cascade downgrades to zero
/// records. Individual stories or articles of the wrong shape are skipped.
pub fn decode_stories(body: &str, now_ms: i64) -> Result<Vec<Story>> {
    let json = strip_xssi_prefix(body);
    let payload: RealtimePayload =
        serde_json::from_str(json).context("parsing realtime trends json")?;
    Ok(payload
        .story_summaries
        .trending_stories
        .into_iter()
        .filter_map(|s| decode_entry::<RawStory>(s, "story"))
        .filter_map(|s| convert_story(s, now_ms))
        .collect())
}

/// Rank stories in order, dropping any that fail record validation.
pub fn stories_to_records(stories: Vec<Story>) -> Vec<TopicRecord> {
    let mut out = Vec::with_capacity(stories.len());
    for story in stories {
        let rank = u32::try_from(out.len() + 1).unwrap_or(u32::MAX);
        if let Some(rec) = story.into_record(rank) {
            out.push(rec);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000_000;

    #[test]
    fn strips_prefix_variants() {
        assert_eq!(strip_xssi_prefix(")]}',\n{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_xssi_prefix(")]}'\n{}"), "{}");
        assert_eq!(strip_xssi_prefix("{}"), "{}");
    }

    #[test]
    fn url_carries_all_params() {
        let p = ApiParams {
            region: "KR".into(),
            category: "b".into(),
            language: "ko".into(),
            tz_minutes: -540,
        };
        let u = build_url(REALTIME_ENDPOINT, &p).unwrap();
        assert!(u.starts_with(REALTIME_ENDPOINT));
        assert!(u.contains("hl=ko"));
        assert!(u.contains("cat=b"));
        assert!(u.contains("geo=KR"));
        assert!(u.contains("tz=-540"));
    }

    #[test]
    fn decodes_story_with_entity_fallback() {
        let body = r#")]}',
{"storySummaries":{"trendingStories":[
  {"entityNames":["Alpha","Beta"],"articles":[
     {"articleTitle":"A1","url":"https://www.news.example/a","source":"News","time":"2 hours ago","snippet":""},
     {"articleTitle":"A2","url":"https://b.example/b","source":"B","time":"sometime","snippet":"  second  snippet "}
  ],"shareUrl":"https://trends.example/s/1"}
]}}"#;
        let stories = decode_stories(body, NOW).unwrap();
        assert_eq!(stories.len(), 1);
        let s = &stories[0];
        assert_eq!(s.term, "Alpha, Beta");
        assert_eq!(s.description, "second snippet");
        assert_eq!(s.articles[0].published_at_ms, Some(NOW - 2 * 3_600_000));
        assert_eq!(s.articles[1].published_at_ms, None);
        assert_eq!(s.articles[1].published_raw, "sometime");
        assert!(!s.has_only_unknown_times());

        let recs = stories_to_records(stories);
        assert_eq!(recs[0].rank, 1);
        assert_eq!(recs[0].related_links.len(), 2);
        assert_eq!(recs[0].related_links[0].domain, "news.example");
        assert_eq!(recs[0].explore_link.as_deref(), Some("https://trends.example/s/1"));
        assert_eq!(recs[0].articles.len(), 2);
    }

    #[test]
    fn null_and_malformed_entries_do_not_sink_the_batch() {
        let body = r#")]}',
{"storySummaries":{"trendingStories":[
  {"title":"Good","articles":[{"articleTitle":"G1","url":"https://g.example/1","time":"1 hours ago"}]},
  {"title":"NullArticles","articles":null,"entityNames":null},
  {"title":"BadArticle","articles":[{"url":42},{"articleTitle":"ok","url":"https://ok.example/"}]},
  {"title":["not","a","string"]},
  null
]}}"#;
        let stories = decode_stories(body, NOW).unwrap();
        let terms: Vec<_> = stories.iter().map(|s| s.term.as_str()).collect();
        assert_eq!(terms, vec!["Good", "NullArticles", "BadArticle"]);
        assert!(stories[1].articles.is_empty());
        assert_eq!(stories[2].articles.len(), 1);

        let empty = decode_stories(r#"{"storySummaries":{"trendingStories":null}}"#, NOW).unwrap();
        assert!(empty.is_empty());
        assert!(decode_stories(r#"{"storySummaries":null}"#, NOW).unwrap().is_empty());
    }

    #[test]
    fn untitled_articles_still_become_links() {
        let body = r#"{"storySummaries":{"trendingStories":[{"title":"T","articles":[
  {"articleTitle":"","source":"Wire","url":"https://wire.example/a"},
  {"url":"https://bare.example/b"},
  {"articleTitle":"No url"}
]}]}}"#;
        let recs = stories_to_records(decode_stories(body, NOW).unwrap());
        let links = &recs[0].related_links;
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].title, "Wire");
        assert_eq!(links[1].title, "https://bare.example/b");
        assert_eq!(links[1].domain, "bare.example");
        assert_eq!(recs[0].articles.len(), 3);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(decode_stories(")]}'\n{not json", NOW).is_err());
        assert!(decode_stories("{}", NOW).unwrap().is_empty());
    }
}

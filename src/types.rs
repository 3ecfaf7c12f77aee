// src/types.rs
//! Data model shared by the channels, the cascades and the runner.

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::{normalize, registrable_domain, truncate_chars};

/// Maximum length (chars) of a record description.
pub const DESCRIPTION_MAX_CHARS: usize = 160;
/// Maximum number of related links per record.
pub const MAX_RELATED_LINKS: usize = 3;

const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Fixed UTC+9 offset used for every capture timestamp.
pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Current wall clock in UTC+9.
pub fn now_kst() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&kst())
}

/// Floor of the hour containing `at`, in UTC+9.
pub fn logical_slot(at: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let ts = at.timestamp();
    let floored = ts - ts.rem_euclid(3600);
    kst().timestamp_opt(floored, 0).single().unwrap_or(at)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedLink {
    pub title: String,
    pub url: String,
    pub domain: String,
}

impl RelatedLink {
    /// Builds a link with a normalized title and derived domain; `None` if title or url is empty.
    pub fn new(title: &str, url: &str) -> Option<Self> {
        let title = normalize(title);
        let url = url.trim().to_string();
        if title.is_empty() || url.is_empty() {
            return None;
        }
        let domain = registrable_domain(&url);
        Some(Self { title, url, domain })
    }
}

/// One article attached to a story (API channel only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRef {
    pub title: String,
    pub url: String,
    pub source: String,
    pub published_raw: String,
    /// `None` when no representation of the publish time could be normalized.
    pub published_at_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRecord {
    pub rank: u32,
    pub term: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explore_link: Option<String>,
    #[serde(default)]
    pub related_links: Vec<RelatedLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub articles: Vec<ArticleRef>,
}

impl TopicRecord {
    /// Validating constructor: normalizes the term and description, caps the
    /// description and link list. Returns `None` for a rank of 0 or an empty term.
    pub fn build(
        rank: u32,
        term: &str,
        description: &str,
        related_links: Vec<RelatedLink>,
    ) -> Option<Self> {
        let term = normalize(term);
        if rank == 0 || term.is_empty() {
            return None;
        }
        let description = truncate_chars(&normalize(description), DESCRIPTION_MAX_CHARS);
        let mut related_links = related_links;
        related_links.truncate(MAX_RELATED_LINKS);
        Some(Self {
            rank,
            term,
            description,
            explore_link: None,
            related_links,
            articles: Vec::new(),
        })
    }

    pub fn with_explore_link(mut self, link: Option<String>) -> Self {
        self.explore_link = link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
        self
    }

    pub fn with_articles(mut self, articles: Vec<ArticleRef>) -> Self {
        self.articles = articles;
        self
    }
}

/// One (region, window, category) unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComboTarget {
    #[serde(rename = "geo")]
    pub region: String,
    #[serde(rename = "hours")]
    pub window_hours: u32,
    pub category: String,
}

impl ComboTarget {
    pub fn new(region: impl Into<String>, window_hours: u32, category: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            window_hours,
            category: category.into(),
        }
    }

    /// Short key used in artifact names, e.g. `KR_4h_cat3`.
    pub fn key(&self) -> String {
        format!("{}_{}h_cat{}", self.region, self.window_hours, self.category)
    }
}

/// Cross-product of the configured lists: region outer, window middle, category inner.
pub fn expand_targets(regions: &[String], hours: &[u32], categories: &[String]) -> Vec<ComboTarget> {
    let mut out = Vec::with_capacity(regions.len() * hours.len() * categories.len());
    for region in regions {
        for &h in hours {
            for category in categories {
                out.push(ComboTarget::new(region.clone(), h, category.clone()));
            }
        }
    }
    out
}

/// Which step of a cascade an attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptKind {
    Export,
    Dom,
    DomNetworkIdle,
    DomScrolled,
    Api,
}

/// Provenance entry: one tried step of a cascade and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub kind: AttemptKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub success: bool,
    pub record_count: usize,
    /// Records came from the unknown-timestamp recovery rule, not the time window.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub recovered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Attempt {
    pub fn new(kind: AttemptKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            category: None,
            language: None,
            http_status: None,
            success: false,
            record_count: 0,
            recovered: false,
            error: None,
        }
    }

    pub fn finish(mut self, record_count: usize) -> Self {
        self.record_count = record_count;
        self.success = record_count > 0;
        self
    }

    pub fn fail(mut self, error: impl std::fmt::Display) -> Self {
        self.record_count = 0;
        self.success = false;
        self.error = Some(format!("{error:#}"));
        self
    }
}

/// Payload of a target that ran to completion (possibly with zero items).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capture {
    pub source_url: String,
    pub http_status: u16,
    pub fingerprint: String,
    pub item_count: usize,
    pub items: Vec<TopicRecord>,
    pub attempt_provenance: Vec<Attempt>,
    #[serde(default)]
    pub used_export: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_ref: Option<String>,
}

/// Either the captured items or the failure detail, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComboOutcome {
    Captured(Capture),
    #[serde(rename_all = "camelCase")]
    Failed { error: String, item_count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComboResult {
    #[serde(flatten)]
    pub target: ComboTarget,
    pub captured_at: DateTime<FixedOffset>,
    #[serde(flatten)]
    pub outcome: ComboOutcome,
}

impl ComboResult {
    pub fn captured(target: ComboTarget, capture: Capture) -> Self {
        Self {
            target,
            captured_at: now_kst(),
            outcome: ComboOutcome::Captured(capture),
        }
    }

    pub fn failed(target: ComboTarget, error: impl Into<String>) -> Self {
        Self {
            target,
            captured_at: now_kst(),
            outcome: ComboOutcome::Failed {
                error: error.into(),
                item_count: 0,
            },
        }
    }

    pub fn item_count(&self) -> usize {
        match &self.outcome {
            ComboOutcome::Captured(c) => c.item_count,
            ComboOutcome::Failed { .. } => 0,
        }
    }

    pub fn items(&self) -> &[TopicRecord] {
        match &self.outcome {
            ComboOutcome::Captured(c) => &c.items,
            ComboOutcome::Failed { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ComboOutcome::Captured(_) => None,
            ComboOutcome::Failed { error, .. } => Some(error),
        }
    }

    pub fn capture(&self) -> Option<&Capture> {
        match &self.outcome {
            ComboOutcome::Captured(c) => Some(c),
            ComboOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub fetched_at: DateTime<FixedOffset>,
    pub logical_slot: DateTime<FixedOffset>,
    pub strategy: String,
    pub combos: Vec<ComboResult>,
}

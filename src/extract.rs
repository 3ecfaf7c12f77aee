// src/extract.rs
//! Heuristic topic extraction from a rendered page.
//!
//! Headings are harvested from a fixed selector list, filtered and deduplicated,
//! then each one is enriched with a nearby description and outbound links.
//! Every lookup is allowed to fail; a failed enrichment yields an empty
//! description and no links instead of aborting the batch.

use std::collections::HashSet;

use regex::Regex;

use crate::normalize::{normalize, registrable_domain};
use crate::render::{Neighbourhood, RenderSession};
use crate::types::{RelatedLink, TopicRecord, MAX_RELATED_LINKS};

/// Candidate heading selectors, concatenated in this order.
pub const HEADING_SELECTORS: &[&str] = &[
    "h3",
    "h2",
    "[role=\"heading\"]",
    "a[aria-label]",
    "article h3",
    "section h3",
    "li h3",
];

pub const MIN_HEADING_CHARS: usize = 2;
pub const MAX_HEADING_CHARS: usize = 120;
pub const MAX_CANDIDATES: usize = 40;
pub const MAX_EXTRACTED_RECORDS: usize = 30;

/// Normalize, length-filter and case-insensitively dedupe raw heading texts.
pub fn filter_candidates<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut heads = Vec::new();
    for t in raw {
        let s = normalize(t.as_ref());
        let len = s.chars().count();
        if !(MIN_HEADING_CHARS..=MAX_HEADING_CHARS).contains(&len) {
            continue;
        }
        if !seen.insert(s.to_lowercase()) {
            continue;
        }
        heads.push(s);
        if heads.len() >= MAX_CANDIDATES {
            break;
        }
    }
    heads
}

fn is_absolute_http(href: &str) -> bool {
    let h = href.trim_start().to_ascii_lowercase();
    h.starts_with("http://") || h.starts_with("https://")
}

fn is_same_site(link_domain: &str, site_domain: &str) -> bool {
    !site_domain.is_empty()
        && (link_domain == site_domain || link_domain.ends_with(&format!(".{site_domain}")))
}

/// The site a page was rendered from. Links back to it are never related links.
///
/// Covers the page's own domain and its subdomains, plus any URL matching
/// `pattern` (sibling hosts such as `trends.google.com` next to `trends.google.co.kr`).
#[derive(Debug, Clone, Default)]
pub struct SourceSite {
    domain: String,
    pattern: Option<Regex>,
}

impl SourceSite {
    pub fn new(site_url: &str, pattern: Option<Regex>) -> Self {
        Self {
            domain: registrable_domain(site_url),
            pattern,
        }
    }

    pub fn owns(&self, href: &str) -> bool {
        is_same_site(&registrable_domain(href), &self.domain)
            || self.pattern.as_ref().is_some_and(|re| re.is_match(href))
    }
}

/// Description and outbound links derived from a probe result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub description: String,
    pub links: Vec<RelatedLink>,
}

/// Turn a neighbourhood into an enrichment, skipping links back to `site`.
pub fn enrich(hood: &Neighbourhood, site: &SourceSite) -> Enrichment {
    let description = hood.paragraph.as_deref().map(normalize).unwrap_or_default();
    let links = hood
        .anchors
        .iter()
        .filter(|a| is_absolute_http(&a.href))
        .filter(|a| !site.owns(&a.href))
        .filter_map(|a| RelatedLink::new(&a.text, &a.href))
        .take(MAX_RELATED_LINKS)
        .collect();
    Enrichment { description, links }
}

/// Phase 1: collect heading texts selector by selector. A failing selector contributes nothing.
pub async fn collect_headings(session: &dyn RenderSession) -> Vec<String> {
    let mut raw = Vec::new();
    for sel in HEADING_SELECTORS {
        match session.collect_texts(sel).await {
            Ok(mut texts) => raw.append(&mut texts),
            Err(e) => tracing::debug!(target: "harvest", selector = sel, error = %e, "heading query failed"),
        }
    }
    raw
}

/// Run all three phases against `session`. Links owned by `site` are excluded
/// from related links.
pub async fn extract(session: &dyn RenderSession, site: &SourceSite) -> Vec<TopicRecord> {
    let raw = collect_headings(session).await;
    if raw.is_empty() {
        return Vec::new();
    }
    let heads = filter_candidates(raw);

    let mut items = Vec::new();
    for (i, term) in heads.iter().enumerate() {
        let info = match session.probe(term).await {
            Ok(Some(hood)) => enrich(&hood, site),
            Ok(None) => Enrichment::default(),
            Err(e) => {
                tracing::debug!(target: "harvest", term = %term, error = %e, "enrichment failed");
                Enrichment::default()
            }
        };
        let rank = u32::try_from(i + 1).unwrap_or(u32::MAX);
        if let Some(rec) = TopicRecord::build(rank, term, &info.description, info.links) {
            items.push(rec);
        }
        if items.len() >= MAX_EXTRACTED_RECORDS {
            break;
        }
    }
    items
}

// src/render/static_page.rs
//! Render collaborator backed by a plain HTTP fetch and an in-memory DOM.
//!
//! Server-rendered markup is all this session ever sees: load-state escalation
//! and scrolling are no-ops, clicks are never performed, and an export is
//! "downloaded" by following the affordance's `href`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use regex::RegexBuilder;
use scraper::{ElementRef, Html, Selector};

use super::{AnchorRef, ExportAffordance, NavigationResult, Neighbourhood, RenderSession, Renderer};
use crate::normalize::normalize;
use crate::transport::Transport;

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid selector {selector:?}: {e:?}"))
}

fn element_text(el: &ElementRef<'_>) -> String {
    normalize(&el.text().collect::<String>())
}

fn anchors<'a>(it: impl Iterator<Item = ElementRef<'a>>) -> Vec<AnchorRef> {
    it.map(|a| AnchorRef {
        href: a.value().attr("href").unwrap_or_default().to_string(),
        text: element_text(&a),
    })
    .collect()
}

/// Opens [`StaticPageSession`]s that share one transport.
pub struct StaticPageRenderer {
    transport: Arc<dyn Transport>,
    headers: Vec<(String, String)>,
}

impl StaticPageRenderer {
    pub fn new(transport: Arc<dyn Transport>, headers: Vec<(String, String)>) -> Self {
        Self { transport, headers }
    }
}

#[async_trait]
impl Renderer for StaticPageRenderer {
    async fn open(&self) -> Result<Box<dyn RenderSession>> {
        Ok(Box::new(StaticPageSession::new(
            self.transport.clone(),
            self.headers.clone(),
        )))
    }
}

pub struct StaticPageSession {
    transport: Arc<dyn Transport>,
    headers: Vec<(String, String)>,
    url: String,
    html: String,
}

impl StaticPageSession {
    pub fn new(transport: Arc<dyn Transport>, headers: Vec<(String, String)>) -> Self {
        Self {
            transport,
            headers,
            url: String::new(),
            html: String::new(),
        }
    }

    /// Session over already-fetched markup (fixtures, replays of saved snapshots).
    pub fn from_html(transport: Arc<dyn Transport>, url: &str, html: &str) -> Self {
        Self {
            transport,
            headers: Vec::new(),
            url: url.to_string(),
            html: html.to_string(),
        }
    }

    fn texts(&self, selector: &str) -> Result<Vec<String>> {
        let sel = parse_selector(selector)?;
        let doc = Html::parse_document(&self.html);
        Ok(doc
            .select(&sel)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect())
    }

    fn neighbourhood(&self, needle: &str) -> Result<Option<Neighbourhood>> {
        let needle = normalize(needle);
        if needle.is_empty() {
            return Ok(None);
        }
        let doc = Html::parse_document(&self.html);
        let mut node = doc.root_element();
        if !element_text(&node).contains(&needle) {
            return Ok(None);
        }
        // Descend along the first child that still contains the needle.
        while let Some(child) = node
            .children()
            .filter_map(ElementRef::wrap)
            .find(|c| element_text(c).contains(&needle))
        {
            node = child;
        }

        let article = std::iter::once(node)
            .chain(node.ancestors().filter_map(ElementRef::wrap))
            .find(|el| el.value().name().eq_ignore_ascii_case("article"));
        let scope = article.or_else(|| node.parent().and_then(ElementRef::wrap));

        let p_sel = parse_selector("p")?;
        let a_sel = parse_selector("a[href]")?;
        let hood = match scope {
            Some(scope) => Neighbourhood {
                paragraph: scope.select(&p_sel).next().map(|p| element_text(&p)),
                anchors: anchors(scope.select(&a_sel)),
            },
            None => Neighbourhood {
                paragraph: None,
                anchors: anchors(doc.select(&a_sel)),
            },
        };
        Ok(Some(hood))
    }

    fn export_href(&self, affordance: &ExportAffordance) -> Result<Option<String>> {
        let sel = parse_selector(&affordance.selector)?;
        let label = match &affordance.label {
            Some(l) => Some(
                RegexBuilder::new(l)
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("invalid affordance label {l:?}"))?,
            ),
            None => None,
        };
        let doc = Html::parse_document(&self.html);
        let found = doc
            .select(&sel)
            .find(|el| label.as_ref().map_or(true, |re| re.is_match(&element_text(el))));
        let Some(el) = found else {
            return Ok(None);
        };
        let Some(href) = el.value().attr("href").filter(|h| !h.trim().is_empty()) else {
            return Ok(None);
        };
        let base = url::Url::parse(&self.url).with_context(|| format!("page url {}", self.url))?;
        let resolved = base
            .join(href.trim())
            .with_context(|| format!("resolving export href {href}"))?;
        Ok(Some(resolved.into()))
    }
}

#[async_trait]
impl RenderSession for StaticPageSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<NavigationResult> {
        let resp = tokio::time::timeout(timeout, self.transport.get(url, &self.headers))
            .await
            .with_context(|| format!("navigation to {url} timed out"))??;
        self.url = resp.final_url.clone();
        self.html = resp.body;
        Ok(NavigationResult {
            final_url: resp.final_url,
            status: resp.status,
        })
    }

    async fn collect_texts(&self, selector: &str) -> Result<Vec<String>> {
        self.texts(selector)
    }

    async fn probe(&self, needle: &str) -> Result<Option<Neighbourhood>> {
        self.neighbourhood(needle)
    }

    async fn trigger_download(
        &mut self,
        affordance: &ExportAffordance,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let Some(href) = self.export_href(affordance)? else {
            return Ok(None);
        };
        let resp = match tokio::time::timeout(timeout, self.transport.get(&href, &self.headers)).await {
            Ok(resp) => resp?,
            Err(_) => return Ok(None),
        };
        if !resp.is_success() {
            return Err(anyhow!("export download {href} returned status {}", resp.status));
        }
        Ok(Some(resp.body))
    }

    async fn wait_for_network_idle(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        Ok(())
    }

    async fn click(&mut self, selector: &str, _timeout: Duration) -> Result<bool> {
        let present = !self.texts(selector)?.is_empty();
        tracing::debug!(target: "harvest", selector, present, "static session cannot click");
        Ok(false)
    }

    async fn content(&self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn screenshot(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

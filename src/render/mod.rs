// src/render/mod.rs
//! Render collaborator abstraction.
//!
//! The cascade only needs a handful of capabilities from a rendered page:
//! navigation, text collection by selector, a read-only neighbourhood probe,
//! export downloads, load-state escalation, banner clicks and captures.
//! Browser lifecycle stays with the implementor.

pub mod static_page;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use static_page::{StaticPageRenderer, StaticPageSession};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// HTTP status code (0 when the collaborator cannot tell).
    pub status: u16,
}

/// An element that may trigger a structured export when clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportAffordance {
    /// CSS selector for candidate elements.
    pub selector: String,
    /// Case-insensitive regex the element's text must match, if any.
    pub label: Option<String>,
}

impl ExportAffordance {
    pub fn new(selector: &str, label: Option<&str>) -> Self {
        Self {
            selector: selector.to_string(),
            label: label.map(str::to_string),
        }
    }
}

/// An anchor found near a located node: raw `href` attribute and text content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRef {
    pub href: String,
    pub text: String,
}

/// What a read-only probe sees around the first node containing a needle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbourhood {
    /// Text of the first paragraph inside the scope (closest `article`, else parent).
    pub paragraph: Option<String>,
    /// Anchors inside the scope (the whole document when the node has no parent), in document order.
    pub anchors: Vec<AnchorRef>,
}

/// A browser engine (or stand-in) that can open pages.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn open(&self) -> Result<Box<dyn RenderSession>>;
}

/// One open page.
#[async_trait]
pub trait RenderSession: Send + Sync {
    /// Navigate and wait for the load-completion signal.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<NavigationResult>;

    /// Text content of every element matching `selector`, in document order.
    async fn collect_texts(&self, selector: &str) -> Result<Vec<String>>;

    /// Locate the first node whose normalized text contains `needle` and report its
    /// neighbourhood. `Ok(None)` when nothing matches. Must not mutate the page.
    async fn probe(&self, needle: &str) -> Result<Option<Neighbourhood>>;

    /// Click the first element of `affordance` and capture the resulting download.
    /// `Ok(None)` when no such element exists or no download happened in `timeout`.
    async fn trigger_download(
        &mut self,
        affordance: &ExportAffordance,
        timeout: Duration,
    ) -> Result<Option<String>>;

    /// Wait until the page has no outstanding network activity.
    async fn wait_for_network_idle(&mut self, timeout: Duration) -> Result<()>;

    /// Scroll to the bottom of the document to trigger lazy content.
    async fn scroll_to_bottom(&mut self) -> Result<()>;

    /// Click the first element matching `selector`. Returns whether anything was clicked.
    async fn click(&mut self, selector: &str, timeout: Duration) -> Result<bool>;

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String>;

    /// Full-page PNG capture, `None` when unsupported.
    async fn screenshot(&self) -> Result<Option<Vec<u8>>>;
}

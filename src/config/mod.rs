// src/config/mod.rs
//! Explicit run configuration. Defaults are part of the contract; `from_env`
//! overlays the recognised environment variables on top of them.

pub mod categories;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use rand::Rng;
use regex::{Regex, RegexBuilder};

pub use categories::CategoryMap;

use crate::api::REALTIME_ENDPOINT;
use crate::transport::DEFAULT_USER_AGENT;
use crate::types::{expand_targets, ComboTarget};

// --- env names ---
pub const ENV_GEO_LIST: &str = "GEO_LIST";
pub const ENV_HOURS_LIST: &str = "HOURS_LIST";
pub const ENV_CATEGORY_LIST: &str = "CATEGORY_LIST";
pub const ENV_STRATEGY: &str = "HARVEST_STRATEGY";
pub const ENV_DATA_DIR: &str = "HARVEST_DATA_DIR";
pub const ENV_CATEGORY_MAP: &str = "HARVEST_CATEGORY_MAP";
pub const ENV_ALT_LANG: &str = "HARVEST_ALT_LANG";
pub const ENV_RECOVERY_CAP: &str = "HARVEST_RECOVERY_CAP";
pub const ENV_DELAY_MS: &str = "HARVEST_DELAY_MS";
pub const ENV_JITTER_MS: &str = "HARVEST_JITTER_MS";
pub const ENV_TARGET_TIMEOUT_SECS: &str = "HARVEST_TARGET_TIMEOUT_SECS";
pub const ENV_ARTIFACTS: &str = "HARVEST_ARTIFACTS";
pub const ENV_TZ_MINUTES: &str = "HARVEST_TZ_MINUTES";
pub const ENV_SOURCE_SITE: &str = "HARVEST_SOURCE_SITE";

pub const DEFAULT_PAGE_BASE: &str = "https://trends.google.co.kr/trending";
/// Links matching this are the source site itself, whatever its country domain.
pub const DEFAULT_SOURCE_SITE_PATTERN: &str = r"trends\.google\.";

fn source_site_regex(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .with_context(|| format!("{ENV_SOURCE_SITE}: invalid pattern {pattern:?}"))
}

/// Which cascade drives each target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Export download, then heuristic extraction from the rendered page.
    Render,
    /// Realtime JSON API with the parameter fallback chain.
    Api,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Render => "render",
            Strategy::Api => "api",
        }
    }
}

impl FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "render" | "page" | "dom" => Ok(Strategy::Render),
            "api" | "json" => Ok(Strategy::Api),
            other => Err(anyhow!("unknown strategy {other:?} (expected render|api)")),
        }
    }
}

/// Per-suspension-point timeout budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub navigation: Duration,
    pub network_idle: Duration,
    pub export_click: Duration,
    pub download: Duration,
    pub api_request: Duration,
    pub target: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(60),
            network_idle: Duration::from_secs(20),
            export_click: Duration::from_secs(3),
            download: Duration::from_millis(4500),
            api_request: Duration::from_secs(25),
            target: Duration::from_secs(120),
        }
    }
}

/// Inter-target delay: `base + uniform(0..=jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    pub base: Duration,
    pub jitter: Duration,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(800),
            jitter: Duration::from_millis(900),
        }
    }
}

impl DelayPolicy {
    pub fn none() -> Self {
        Self {
            base: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    pub fn next_delay(&self) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        self.base + Duration::from_millis(extra)
    }
}

/// Default UI language for a region.
pub fn default_language(region: &str) -> &'static str {
    match region.trim().to_ascii_uppercase().as_str() {
        "KR" => "ko",
        "US" => "en",
        "JP" => "ja",
        _ => "en",
    }
}

/// Accept-Language header value for a region.
pub fn accept_language(region: &str) -> &'static str {
    match region.trim().to_ascii_uppercase().as_str() {
        "KR" => "ko-KR,ko;q=0.9,en;q=0.8,ja;q=0.7",
        "US" => "en-US,en;q=0.9,ko;q=0.6",
        "JP" => "ja-JP,ja;q=0.9,en;q=0.6,ko;q=0.5",
        _ => "en-US,en;q=0.9",
    }
}

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub regions: Vec<String>,
    pub window_hours: Vec<u32>,
    pub categories: Vec<String>,
    pub strategy: Strategy,
    pub page_base_url: String,
    pub api_endpoint: String,
    pub category_map: CategoryMap,
    /// Language tried after the region's primary language.
    pub alt_language: String,
    /// `tz` parameter sent to the API, minutes (KST = -540).
    pub tz_minutes: i32,
    /// Max stories restored by the unknown-timestamp recovery rule.
    pub recovery_cap: usize,
    pub timeouts: Timeouts,
    pub delay: DelayPolicy,
    pub data_dir: PathBuf,
    pub capture_artifacts: bool,
    pub user_agent: String,
    /// URL pattern for links that lead back to the source site; `None` keeps only the domain check.
    pub source_site: Option<Regex>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            regions: vec!["KR".to_string()],
            window_hours: vec![4],
            categories: vec!["3".to_string()],
            strategy: Strategy::Render,
            page_base_url: DEFAULT_PAGE_BASE.to_string(),
            api_endpoint: REALTIME_ENDPOINT.to_string(),
            category_map: CategoryMap::default(),
            alt_language: "en".to_string(),
            tz_minutes: -540,
            recovery_cap: 10,
            timeouts: Timeouts::default(),
            delay: DelayPolicy::default(),
            data_dir: PathBuf::from("data"),
            capture_artifacts: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            source_site: source_site_regex(DEFAULT_SOURCE_SITE_PATTERN).ok(),
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_num<T: FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{name}: invalid number {raw:?}"))
}

impl HarvestConfig {
    /// Overlay process environment onto the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Overlay values from `lookup` onto the defaults. Invalid values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup(ENV_GEO_LIST) {
            let list = parse_list(&v);
            if !list.is_empty() {
                cfg.regions = list;
            }
        }
        if let Some(v) = lookup(ENV_HOURS_LIST) {
            let list = parse_list(&v)
                .iter()
                .map(|h| parse_num::<u32>(ENV_HOURS_LIST, h))
                .collect::<Result<Vec<_>>>()?;
            if list.iter().any(|h| *h == 0) {
                bail!("{ENV_HOURS_LIST}: window hours must be positive");
            }
            if !list.is_empty() {
                cfg.window_hours = list;
            }
        }
        if let Some(v) = lookup(ENV_CATEGORY_LIST) {
            let list = parse_list(&v);
            if !list.is_empty() {
                cfg.categories = list;
            }
        }
        if let Some(v) = lookup(ENV_STRATEGY) {
            cfg.strategy = v.parse()?;
        }
        if let Some(v) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            cfg.data_dir = PathBuf::from(v.trim());
        }
        if let Some(v) = lookup(ENV_CATEGORY_MAP).filter(|v| !v.trim().is_empty()) {
            let path = PathBuf::from(v.trim());
            let n = cfg.category_map.extend_from_path(&path)?;
            tracing::info!(target: "harvest", path = %path.display(), entries = n, "category map loaded");
        }
        if let Some(v) = lookup(ENV_ALT_LANG).filter(|v| !v.trim().is_empty()) {
            cfg.alt_language = v.trim().to_string();
        }
        if let Some(v) = lookup(ENV_RECOVERY_CAP) {
            cfg.recovery_cap = parse_num(ENV_RECOVERY_CAP, &v)?;
        }
        if let Some(v) = lookup(ENV_DELAY_MS) {
            cfg.delay.base = Duration::from_millis(parse_num(ENV_DELAY_MS, &v)?);
        }
        if let Some(v) = lookup(ENV_JITTER_MS) {
            cfg.delay.jitter = Duration::from_millis(parse_num(ENV_JITTER_MS, &v)?);
        }
        if let Some(v) = lookup(ENV_TARGET_TIMEOUT_SECS) {
            cfg.timeouts.target = Duration::from_secs(parse_num(ENV_TARGET_TIMEOUT_SECS, &v)?);
        }
        if let Some(v) = lookup(ENV_ARTIFACTS) {
            cfg.capture_artifacts = !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        if let Some(v) = lookup(ENV_TZ_MINUTES) {
            cfg.tz_minutes = parse_num(ENV_TZ_MINUTES, &v)?;
        }
        if let Some(v) = lookup(ENV_SOURCE_SITE) {
            let v = v.trim();
            cfg.source_site = if v.is_empty() {
                None
            } else {
                Some(source_site_regex(v)?)
            };
        }

        Ok(cfg)
    }

    /// Work queue in deterministic nested order.
    pub fn targets(&self) -> Vec<ComboTarget> {
        expand_targets(&self.regions, &self.window_hours, &self.categories)
    }

    pub fn primary_language(&self, region: &str) -> &'static str {
        default_language(region)
    }

    /// Rendered-page URL for a target.
    pub fn page_url(&self, target: &ComboTarget) -> Result<String> {
        let hours = target.window_hours.to_string();
        let url = url::Url::parse_with_params(
            &self.page_base_url,
            &[
                ("geo", target.region.as_str()),
                ("hours", hours.as_str()),
                ("category", target.category.as_str()),
            ],
        )
        .with_context(|| format!("invalid page base url {}", self.page_base_url))?;
        Ok(url.into())
    }

    /// Headers sent with every request for `region`.
    pub fn request_headers(&self, region: &str) -> Vec<(String, String)> {
        vec![(
            "Accept-Language".to_string(),
            accept_language(region).to_string(),
        )]
    }
}

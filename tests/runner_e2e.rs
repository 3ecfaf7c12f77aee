// tests/runner_e2e.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use trend_harvester::config::{DelayPolicy, HarvestConfig, Strategy};
use trend_harvester::render::{
    ExportAffordance, NavigationResult, Neighbourhood, RenderSession, Renderer,
    StaticPageRenderer,
};
use trend_harvester::runner::ComboRunner;
use trend_harvester::transport::{Transport, TransportResponse};
use trend_harvester::types::AttemptKind;

const API_BODY: &str = r#")]}',
{"storySummaries":{"trendingStories":[{"title":"Seoul Derby","entityNames":["FC Seoul"],"shareUrl":"https://trends.test/explore?q=derby","articles":[
 {"articleTitle":"Derby preview","url":"https://sports.example.com/preview","source":"Example Sports","time":"2 hours ago","snippet":"Kick-off at seven."},
 {"articleTitle":"Fan guide","url":"https://guide.example.org/fans","source":"Guide","time":"around teatime","snippet":""}
]}]}}"#;

/// Routes by URL substring; unmatched URLs are transport errors.
struct RouteTransport {
    routes: Vec<(&'static str, u16, String)>,
}

#[async_trait]
impl Transport for RouteTransport {
    async fn get(&self, url: &str, _headers: &[(String, String)]) -> Result<TransportResponse> {
        for (needle, status, body) in &self.routes {
            if url.contains(needle) {
                return Ok(TransportResponse {
                    status: *status,
                    final_url: url.to_string(),
                    body: body.clone(),
                });
            }
        }
        Err(anyhow!("connection refused: {url}"))
    }
}

/// Page with no headings whose export always fails.
struct BarePage;

#[async_trait]
impl RenderSession for BarePage {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<NavigationResult> {
        Ok(NavigationResult {
            final_url: url.to_string(),
            status: 200,
        })
    }
    async fn collect_texts(&self, _selector: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
    async fn probe(&self, _needle: &str) -> Result<Option<Neighbourhood>> {
        Ok(None)
    }
    async fn trigger_download(
        &mut self,
        _affordance: &ExportAffordance,
        _timeout: Duration,
    ) -> Result<Option<String>> {
        Err(anyhow!("download failed"))
    }
    async fn wait_for_network_idle(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
    async fn scroll_to_bottom(&mut self) -> Result<()> {
        Ok(())
    }
    async fn click(&mut self, _selector: &str, _timeout: Duration) -> Result<bool> {
        Ok(false)
    }
    async fn content(&self) -> Result<String> {
        Ok("<html></html>".to_string())
    }
    async fn screenshot(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

struct BareRenderer;

#[async_trait]
impl Renderer for BareRenderer {
    async fn open(&self) -> Result<Box<dyn RenderSession>> {
        Ok(Box::new(BarePage))
    }
}

fn base_config(strategy: Strategy) -> HarvestConfig {
    HarvestConfig {
        strategy,
        delay: DelayPolicy::none(),
        capture_artifacts: false,
        api_endpoint: "https://trends.test/api/realtimetrends".to_string(),
        page_base_url: "https://trends.test/trending".to_string(),
        ..HarvestConfig::default()
    }
}

#[tokio::test]
async fn api_target_captures_story_with_mixed_article_times() {
    let transport = Arc::new(RouteTransport {
        routes: vec![("realtimetrends", 200, API_BODY.to_string())],
    });
    let runner = ComboRunner::new(
        base_config(Strategy::Api),
        transport,
        Arc::new(BareRenderer),
        None,
    );

    let snap = runner.run().await;
    assert_eq!(snap.strategy, "api");
    assert_eq!(snap.combos.len(), 1);

    let combo = &snap.combos[0];
    assert_eq!(combo.target.region, "KR");
    assert_eq!(combo.target.window_hours, 4);
    assert_eq!(combo.target.category, "3");
    assert_eq!(combo.error(), None);
    assert_eq!(combo.item_count(), 1);

    let rec = &combo.items()[0];
    assert_eq!(rec.rank, 1);
    assert_eq!(rec.term, "Seoul Derby");
    assert_eq!(rec.description, "Kick-off at seven.");
    assert_eq!(rec.articles.len(), 2);
    assert!(rec.articles[0].published_at_ms.is_some());
    assert_eq!(rec.articles[1].published_at_ms, None);
    assert_eq!(rec.related_links.len(), 2);
    assert_eq!(rec.related_links[0].domain, "sports.example.com");

    let cap = combo.capture().unwrap();
    assert_eq!(cap.attempt_provenance.len(), 1);
    assert_eq!(cap.http_status, 200);
    assert!(cap.fingerprint.starts_with("sha256:"));
    assert!(!cap.used_export);

    let json = serde_json::to_value(combo).unwrap();
    assert_eq!(json["geo"], "KR");
    assert_eq!(json["hours"], 4);
    assert_eq!(json["itemCount"], 1);
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn render_target_with_nothing_on_page_is_empty_not_failed() {
    let transport = Arc::new(RouteTransport { routes: vec![] });
    let runner = ComboRunner::new(
        base_config(Strategy::Render),
        transport,
        Arc::new(BareRenderer),
        None,
    );

    let snap = runner.run().await;
    let combo = &snap.combos[0];
    assert_eq!(combo.error(), None);
    assert_eq!(combo.item_count(), 0);
    assert!(combo.items().is_empty());

    let cap = combo.capture().unwrap();
    let kinds: Vec<_> = cap.attempt_provenance.iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        vec![
            AttemptKind::Export,
            AttemptKind::Dom,
            AttemptKind::DomNetworkIdle,
            AttemptKind::DomScrolled
        ]
    );
    assert!(cap.attempt_provenance[0]
        .error
        .as_deref()
        .unwrap()
        .contains("download failed"));
    assert_eq!(cap.fingerprint, trend_harvester::normalize::fingerprint::<&str>(&[]));
}

#[tokio::test]
async fn failing_target_does_not_stop_the_run() {
    let transport = Arc::new(RouteTransport {
        routes: vec![("geo=US", 200, API_BODY.to_string())],
    });
    let cfg = HarvestConfig {
        regions: vec!["KR".to_string(), "US".to_string()],
        window_hours: vec![4, 24],
        ..base_config(Strategy::Api)
    };
    let runner = ComboRunner::new(cfg, transport, Arc::new(BareRenderer), None);

    let snap = runner.run().await;
    let keys: Vec<_> = snap.combos.iter().map(|c| c.target.key()).collect();
    assert_eq!(keys, vec!["KR_4h_cat3", "KR_24h_cat3", "US_4h_cat3", "US_24h_cat3"]);

    assert!(snap.combos[0].error().unwrap().contains("unreachable"));
    assert_eq!(snap.combos[0].item_count(), 0);
    assert!(snap.combos[1].error().is_some());
    assert_eq!(snap.combos[2].item_count(), 1);
    assert_eq!(snap.combos[3].item_count(), 1);

    let failed = serde_json::to_value(&snap.combos[0]).unwrap();
    assert_eq!(failed["itemCount"], 0);
    assert!(failed.get("items").is_none());
}

#[tokio::test]
async fn navigation_failure_becomes_combo_error() {
    let transport: Arc<dyn Transport> = Arc::new(RouteTransport { routes: vec![] });
    let renderer = Arc::new(StaticPageRenderer::new(transport.clone(), Vec::new()));
    let runner = ComboRunner::new(base_config(Strategy::Render), transport, renderer, None);

    let snap = runner.run().await;
    let err = snap.combos[0].error().unwrap();
    assert!(err.contains("navigating to https://trends.test/trending"));
}

struct StalledTransport;

#[async_trait]
impl Transport for StalledTransport {
    async fn get(&self, _url: &str, _headers: &[(String, String)]) -> Result<TransportResponse> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn slow_target_is_cut_off_by_target_timeout() {
    let mut cfg = base_config(Strategy::Api);
    cfg.timeouts.target = Duration::from_millis(50);
    let runner = ComboRunner::new(cfg, Arc::new(StalledTransport), Arc::new(BareRenderer), None);

    let snap = runner.run().await;
    assert!(snap.combos[0].error().unwrap().contains("timed out"));
}

// src/cascade/render.rs
//! Export-then-render cascade.
//!
//! Order: structured export → heading extraction → extraction after network
//! idle → extraction after scrolling to the bottom. A consent banner is
//! dismissed once, opportunistically, before the first step.

use anyhow::{anyhow, Context, Result};
use metrics::counter;

use super::{ArtifactKind, CascadeOutcome, RawArtifact};
use crate::config::HarvestConfig;
use crate::delimited;
use crate::extract::{self, SourceSite};
use crate::render::{ExportAffordance, RenderSession};
use crate::types::{Attempt, AttemptKind, ComboTarget, TopicRecord};

/// Escalation order of the cascade.
pub const RENDER_STEPS: [AttemptKind; 4] = [
    AttemptKind::Export,
    AttemptKind::Dom,
    AttemptKind::DomNetworkIdle,
    AttemptKind::DomScrolled,
];

/// (selector, label regex) pairs that may trigger a CSV export, tried in order.
pub const EXPORT_AFFORDANCES: &[(&str, Option<&str>)] = &[
    ("a[download$=\".csv\"]", None),
    ("a", Some("CSV")),
    ("button", Some("CSV")),
    ("a, button", Some("CSV|내보내기|다운로드|export|download")),
];

pub const CONSENT_SELECTORS: &[&str] = &[
    "button[aria-label*=\"Accept\"]",
    "form[action*=\"consent\"] button",
];

fn step_name(kind: AttemptKind) -> &'static str {
    match kind {
        AttemptKind::Export => "export",
        AttemptKind::Dom => "dom",
        AttemptKind::DomNetworkIdle => "dom-network-idle",
        AttemptKind::DomScrolled => "dom-scrolled",
        AttemptKind::Api => "api",
    }
}

/// A download only counts if its first line looks delimited.
pub fn looks_delimited(text: &str) -> bool {
    let first = text.split('\n').next().unwrap_or_default();
    first.contains(',') || first.contains(';')
}

/// Result of a single cascade step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub attempt: Attempt,
    pub records: Vec<TopicRecord>,
    /// Raw export text when the export step captured one.
    pub export: Option<String>,
}

pub struct RenderCascade<'a> {
    config: &'a HarvestConfig,
}

impl<'a> RenderCascade<'a> {
    pub fn new(config: &'a HarvestConfig) -> Self {
        Self { config }
    }

    /// Advisory: click the first consent affordance that responds. Never fails.
    pub async fn dismiss_consent(&self, session: &mut dyn RenderSession) -> bool {
        let budget = self.config.timeouts.export_click;
        for sel in CONSENT_SELECTORS {
            match tokio::time::timeout(budget, session.click(sel, budget)).await {
                Ok(Ok(true)) => {
                    tracing::debug!(target: "harvest", selector = sel, "consent dismissed");
                    return true;
                }
                Ok(Ok(false)) => {}
                Ok(Err(e)) => tracing::debug!(target: "harvest", selector = sel, error = %e, "consent click failed"),
                Err(_) => tracing::debug!(target: "harvest", selector = sel, "consent click timed out"),
            }
        }
        false
    }

    /// Try every export affordance in order; first delimited download wins.
    /// `Ok(None)` when nothing could be triggered, `Err` when the last failure was an error.
    pub async fn try_export(&self, session: &mut dyn RenderSession) -> Result<Option<String>> {
        let t = self.config.timeouts;
        let budget = t.export_click + t.download;
        let mut last_err = None;
        for (selector, label) in EXPORT_AFFORDANCES {
            let aff = ExportAffordance::new(selector, *label);
            match tokio::time::timeout(budget, session.trigger_download(&aff, t.download)).await {
                Ok(Ok(Some(text))) if looks_delimited(&text) => return Ok(Some(text)),
                Ok(Ok(Some(_))) => {
                    last_err = Some(anyhow!("download from {selector} is not delimited text"));
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => last_err = Some(e.context(format!("export via {selector}"))),
                Err(_) => last_err = Some(anyhow!("export via {selector} timed out")),
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    async fn dom_pass(&self, session: &dyn RenderSession, site_url: &str, attempt: Attempt) -> StepResult {
        let site = SourceSite::new(site_url, self.config.source_site.clone());
        let records = extract::extract(session, &site).await;
        StepResult {
            attempt: attempt.finish(records.len()),
            records,
            export: None,
        }
    }

    /// Run one named step against an already navigated session.
    pub async fn run_step(
        &self,
        session: &mut dyn RenderSession,
        kind: AttemptKind,
        site_url: &str,
    ) -> StepResult {
        let attempt = Attempt::new(kind, step_name(kind));
        match kind {
            AttemptKind::Export => match self.try_export(session).await {
                Ok(Some(text)) => {
                    let records = delimited::parse(&text);
                    StepResult {
                        attempt: attempt.finish(records.len()),
                        records,
                        export: Some(text),
                    }
                }
                Ok(None) => StepResult {
                    attempt: attempt.fail("no export affordance found"),
                    records: Vec::new(),
                    export: None,
                },
                Err(e) => StepResult {
                    attempt: attempt.fail(e),
                    records: Vec::new(),
                    export: None,
                },
            },
            AttemptKind::Dom => self.dom_pass(session, site_url, attempt).await,
            AttemptKind::DomNetworkIdle => {
                let idle = self.config.timeouts.network_idle;
                match tokio::time::timeout(idle, session.wait_for_network_idle(idle)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::debug!(target: "harvest", error = %e, "network idle wait failed"),
                    Err(_) => tracing::debug!(target: "harvest", "network idle wait timed out"),
                }
                self.dom_pass(session, site_url, attempt).await
            }
            AttemptKind::DomScrolled => {
                if let Err(e) = session.scroll_to_bottom().await {
                    tracing::debug!(target: "harvest", error = %e, "scroll to bottom failed");
                }
                self.dom_pass(session, site_url, attempt).await
            }
            AttemptKind::Api => StepResult {
                attempt: attempt.fail("api step is not part of the render cascade"),
                records: Vec::new(),
                export: None,
            },
        }
    }

    async fn capture_artifacts(&self, session: &dyn RenderSession) -> Vec<RawArtifact> {
        let mut out = Vec::new();
        match session.content().await {
            Ok(html) => out.push(RawArtifact {
                kind: ArtifactKind::RenderedHtml,
                bytes: html.into_bytes(),
            }),
            Err(e) => tracing::debug!(target: "harvest", error = %e, "page content unavailable"),
        }
        match session.screenshot().await {
            Ok(Some(png)) => out.push(RawArtifact {
                kind: ArtifactKind::Screenshot,
                bytes: png,
            }),
            Ok(None) => {}
            Err(e) => tracing::debug!(target: "harvest", error = %e, "screenshot failed"),
        }
        out
    }

    /// Navigate to the target page and escalate through [`RENDER_STEPS`].
    /// Only a failed navigation is an error.
    pub async fn run(
        &self,
        session: &mut dyn RenderSession,
        target: &ComboTarget,
    ) -> Result<CascadeOutcome> {
        let url = self.config.page_url(target)?;
        let nav = session
            .navigate(&url, self.config.timeouts.navigation)
            .await
            .with_context(|| format!("navigating to {url}"))?;

        let consent = self.dismiss_consent(session).await;
        tracing::debug!(target: "harvest", combo = %target.key(), consent, status = nav.status, "page loaded");

        let mut out = CascadeOutcome {
            source_url: url.clone(),
            http_status: nav.status,
            ..CascadeOutcome::default()
        };
        for kind in RENDER_STEPS {
            let step = self.run_step(session, kind, &nav.final_url).await;
            tracing::info!(
                target: "harvest",
                combo = %target.key(),
                attempt = step.attempt.name.as_str(),
                records = step.attempt.record_count,
                error = ?step.attempt.error,
                "render attempt"
            );
            counter!("harvest_attempts_total").increment(1);

            let done = !step.records.is_empty();
            out.attempts.push(step.attempt);
            if done {
                out.used_export = step.export.is_some();
                out.records = step.records;
                break;
            }
        }

        if self.config.capture_artifacts {
            out.artifacts = self.capture_artifacts(session).await;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimited_sniff_checks_first_line_only() {
        assert!(looks_delimited("a,b\nc"));
        assert!(looks_delimited("a;b"));
        assert!(!looks_delimited("<html>\n,,,"));
        assert!(!looks_delimited(""));
    }

    #[test]
    fn steps_escalate_in_fixed_order() {
        let names: Vec<_> = RENDER_STEPS.iter().map(|k| step_name(*k)).collect();
        assert_eq!(names, vec!["export", "dom", "dom-network-idle", "dom-scrolled"]);
    }
}

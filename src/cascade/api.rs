// src/cascade/api.rs
//! API parameter-fallback cascade.
//!
//! Attempts, strictly in order, stopping at the first one with records after
//! time filtering:
//!   1. primary category + primary language
//!   2. `all` + primary language        (only if the primary category is not `all`)
//!   3. primary category + alt language
//!   4. `all` + alt language            (only if the primary category is not `all`)
//! A (category, language) pair is never requested twice for one target.

use std::collections::HashSet;

use anyhow::{anyhow, Result};
use metrics::counter;

use super::window::apply_window;
use super::{ArtifactKind, CascadeOutcome, RawArtifact};
use crate::api::{build_url, decode_stories, stories_to_records, ApiParams, ALL_CATEGORIES};
use crate::config::HarvestConfig;
use crate::transport::Transport;
use crate::types::{Attempt, AttemptKind, ComboTarget, TopicRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiAttemptPlan {
    pub name: &'static str,
    pub category: String,
    pub language: String,
}

/// Ordered, duplicate-free attempt list for one target.
pub fn plan_attempts(
    primary_category: &str,
    primary_language: &str,
    alt_language: &str,
) -> Vec<ApiAttemptPlan> {
    let specific = primary_category != ALL_CATEGORIES;
    let candidates = [
        ("primary", primary_category, primary_language, true),
        ("all-categories", ALL_CATEGORIES, primary_language, specific),
        ("alt-language", primary_category, alt_language, true),
        ("alt-language-all-categories", ALL_CATEGORIES, alt_language, specific),
    ];

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(candidates.len());
    for (name, category, language, enabled) in candidates {
        if !enabled || !seen.insert((category.to_string(), language.to_string())) {
            continue;
        }
        out.push(ApiAttemptPlan {
            name,
            category: category.to_string(),
            language: language.to_string(),
        });
    }
    out
}

pub struct ApiCascade<'a> {
    config: &'a HarvestConfig,
    transport: &'a dyn Transport,
}

struct AttemptRun {
    attempt: Attempt,
    records: Vec<TopicRecord>,
    body: Option<String>,
}

impl<'a> ApiCascade<'a> {
    pub fn new(config: &'a HarvestConfig, transport: &'a dyn Transport) -> Self {
        Self { config, transport }
    }

    /// Plan for `target` using the configured category table and languages.
    pub fn plan(&self, target: &ComboTarget) -> Vec<ApiAttemptPlan> {
        plan_attempts(
            self.config.category_map.api_code(&target.category),
            self.config.primary_language(&target.region),
            &self.config.alt_language,
        )
    }

    /// Execute one planned attempt. Never fails: errors land in the attempt record.
    async fn run_attempt(
        &self,
        target: &ComboTarget,
        plan: &ApiAttemptPlan,
        url: &str,
        now_ms: i64,
    ) -> AttemptRun {
        let mut attempt = Attempt::new(AttemptKind::Api, plan.name);
        attempt.category = Some(plan.category.clone());
        attempt.language = Some(plan.language.clone());

        let headers = self.config.request_headers(&target.region);
        let resp = match tokio::time::timeout(
            self.config.timeouts.api_request,
            self.transport.get(url, &headers),
        )
        .await
        {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                return AttemptRun {
                    attempt: attempt.fail(e),
                    records: Vec::new(),
                    body: None,
                }
            }
            Err(_) => {
                let msg = format!(
                    "timed out after {}s",
                    self.config.timeouts.api_request.as_secs_f32()
                );
                return AttemptRun {
                    attempt: attempt.fail(msg),
                    records: Vec::new(),
                    body: None,
                };
            }
        };

        attempt.http_status = Some(resp.status);
        if !resp.is_success() {
            return AttemptRun {
                attempt: attempt.fail(format!("http status {}", resp.status)),
                records: Vec::new(),
                body: Some(resp.body),
            };
        }

        match decode_stories(&resp.body, now_ms) {
            Ok(stories) => {
                let windowed = apply_window(
                    stories,
                    target.window_hours,
                    now_ms,
                    self.config.recovery_cap,
                );
                if windowed.recovered || windowed.dropped > 0 {
                    tracing::debug!(
                        target: "harvest",
                        combo = %target.key(),
                        attempt = plan.name,
                        dropped = windowed.dropped,
                        recovered = windowed.recovered,
                        "time window applied"
                    );
                }
                attempt.recovered = windowed.recovered;
                let records = stories_to_records(windowed.stories);
                AttemptRun {
                    attempt: attempt.finish(records.len()),
                    records,
                    body: Some(resp.body),
                }
            }
            Err(e) => AttemptRun {
                attempt: attempt.fail(e),
                records: Vec::new(),
                body: Some(resp.body),
            },
        }
    }

    /// Run the cascade. Errors only when no attempt could reach the API at all
    /// or the endpoint is misconfigured.
    pub async fn run(&self, target: &ComboTarget, now_ms: i64) -> Result<CascadeOutcome> {
        let mut out = CascadeOutcome::default();
        let mut responded = false;

        for plan in self.plan(target) {
            let params = ApiParams {
                region: target.region.clone(),
                category: plan.category.clone(),
                language: plan.language.clone(),
                tz_minutes: self.config.tz_minutes,
            };
            let url = build_url(&self.config.api_endpoint, &params)?;
            let run = self.run_attempt(target, &plan, &url, now_ms).await;

            tracing::info!(
                target: "harvest",
                combo = %target.key(),
                attempt = plan.name,
                category = %plan.category,
                language = %plan.language,
                status = ?run.attempt.http_status,
                records = run.attempt.record_count,
                error = ?run.attempt.error,
                "api attempt"
            );
            counter!("harvest_attempts_total").increment(1);

            if let Some(status) = run.attempt.http_status {
                responded = true;
                out.http_status = status;
                out.source_url = url.clone();
            }
            if let Some(body) = run.body {
                out.artifacts = vec![RawArtifact {
                    kind: ArtifactKind::ApiBody,
                    bytes: body.into_bytes(),
                }];
            }
            let done = !run.records.is_empty();
            out.attempts.push(run.attempt);
            if done {
                out.records = run.records;
                break;
            }
        }

        if !responded {
            let last = out
                .attempts
                .last()
                .and_then(|a| a.error.clone())
                .unwrap_or_else(|| "no attempts planned".to_string());
            return Err(anyhow!(
                "api unreachable after {} attempt(s): {last}",
                out.attempts.len()
            ));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(plan: &[ApiAttemptPlan]) -> Vec<(&str, &str)> {
        plan.iter()
            .map(|p| (p.category.as_str(), p.language.as_str()))
            .collect()
    }

    #[test]
    fn specific_category_gets_four_attempts() {
        let plan = plan_attempts("b", "ko", "en");
        assert_eq!(
            pairs(&plan),
            vec![("b", "ko"), ("all", "ko"), ("b", "en"), ("all", "en")]
        );
        assert_eq!(plan[0].name, "primary");
    }

    #[test]
    fn all_category_skips_forced_all_steps() {
        let plan = plan_attempts("all", "ko", "en");
        assert_eq!(pairs(&plan), vec![("all", "ko"), ("all", "en")]);
    }

    #[test]
    fn same_language_never_repeats_a_pair() {
        let plan = plan_attempts("b", "en", "en");
        assert_eq!(pairs(&plan), vec![("b", "en"), ("all", "en")]);
        let plan = plan_attempts("all", "en", "en");
        assert_eq!(pairs(&plan), vec![("all", "en")]);
    }
}

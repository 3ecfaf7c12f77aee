// src/runner.rs
//! Sequential combo runner.
//!
//! Targets run one at a time in configured order with a jittered pause in
//! between. Each target moves `Pending → Running → Done | Failed`; a failed
//! target becomes a `ComboResult` carrying its error and the run goes on.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::cascade::{ApiCascade, CascadeOutcome, RenderCascade};
use crate::config::{HarvestConfig, Strategy};
use crate::normalize::fingerprint_records;
use crate::render::Renderer;
use crate::storage::{artifact_name, artifact_stamp, ArtifactSink};
use crate::transport::Transport;
use crate::types::{logical_slot, now_kst, Capture, ComboResult, ComboTarget, RunSnapshot};

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("harvest_targets_total", "Targets processed.");
        describe_counter!(
            "harvest_target_failures_total",
            "Targets that ended with an error."
        );
        describe_counter!("harvest_attempts_total", "Cascade attempts made.");
        describe_counter!("harvest_records_total", "Topic records captured.");
    });
}

/// Per-target lifecycle; `Failed` never fails the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComboState {
    Pending,
    Running,
    Done,
    Failed,
}

pub struct ComboRunner {
    config: HarvestConfig,
    transport: Arc<dyn Transport>,
    renderer: Arc<dyn Renderer>,
    artifacts: Option<Arc<dyn ArtifactSink>>,
}

impl ComboRunner {
    pub fn new(
        config: HarvestConfig,
        transport: Arc<dyn Transport>,
        renderer: Arc<dyn Renderer>,
        artifacts: Option<Arc<dyn ArtifactSink>>,
    ) -> Self {
        Self {
            config,
            transport,
            renderer,
            artifacts,
        }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Process every target and assemble the snapshot in iteration order.
    pub async fn run(&self) -> RunSnapshot {
        ensure_metrics_described();
        let fetched_at = now_kst();
        let targets = self.config.targets();
        let total = targets.len();
        let mut combos = Vec::with_capacity(total);

        for (i, target) in targets.into_iter().enumerate() {
            log_state(&target, ComboState::Pending, None);
            combos.push(self.run_target(&target).await);

            if i + 1 < total {
                let pause = self.config.delay.next_delay();
                tracing::debug!(target: "harvest", pause_ms = pause.as_millis() as u64, "inter-target delay");
                tokio::time::sleep(pause).await;
            }
        }

        RunSnapshot {
            fetched_at,
            logical_slot: logical_slot(fetched_at),
            strategy: self.config.strategy.as_str().to_string(),
            combos,
        }
    }

    /// Run one target under the target timeout. Never fails.
    pub async fn run_target(&self, target: &ComboTarget) -> ComboResult {
        log_state(target, ComboState::Running, None);
        counter!("harvest_targets_total").increment(1);

        let budget = self.config.timeouts.target;
        let outcome = match tokio::time::timeout(budget, self.drive(target)).await {
            Ok(res) => res,
            Err(_) => Err(anyhow::anyhow!(
                "target timed out after {}s",
                budget.as_secs_f32()
            )),
        };

        match outcome {
            Ok(capture) => {
                counter!("harvest_records_total").increment(capture.item_count as u64);
                log_state(target, ComboState::Done, Some(capture.item_count));
                ComboResult::captured(target.clone(), capture)
            }
            Err(e) => {
                counter!("harvest_target_failures_total").increment(1);
                let error = format!("{e:#}");
                tracing::warn!(target: "harvest", combo = %target.key(), %error, "combo failed");
                log_state(target, ComboState::Failed, None);
                ComboResult::failed(target.clone(), error)
            }
        }
    }

    async fn drive(&self, target: &ComboTarget) -> Result<Capture> {
        let outcome = match self.config.strategy {
            Strategy::Api => {
                let now_ms = Utc::now().timestamp_millis();
                ApiCascade::new(&self.config, self.transport.as_ref())
                    .run(target, now_ms)
                    .await?
            }
            Strategy::Render => {
                let mut session = self
                    .renderer
                    .open()
                    .await
                    .context("opening render session")?;
                RenderCascade::new(&self.config)
                    .run(session.as_mut(), target)
                    .await?
            }
        };
        let snapshot_ref = self.store_artifacts(target, &outcome).await;
        Ok(into_capture(outcome, snapshot_ref))
    }

    /// Advisory: store raw artifacts, returning the first stored reference.
    async fn store_artifacts(&self, target: &ComboTarget, outcome: &CascadeOutcome) -> Option<String> {
        let sink = self.artifacts.as_ref()?;
        if !self.config.capture_artifacts || outcome.artifacts.is_empty() {
            return None;
        }
        let stamp = artifact_stamp(Utc::now());
        let mut first = None;
        for art in &outcome.artifacts {
            let name = artifact_name(target, art.kind, &stamp);
            match sink.store(&name, &art.bytes).await {
                Ok(path) => {
                    if first.is_none() {
                        first = Some(path);
                    }
                }
                Err(e) => {
                    tracing::warn!(target: "harvest", combo = %target.key(), artifact = %name, error = %e, "artifact not stored")
                }
            }
        }
        first
    }
}

fn into_capture(outcome: CascadeOutcome, snapshot_ref: Option<String>) -> Capture {
    Capture {
        source_url: outcome.source_url,
        http_status: outcome.http_status,
        fingerprint: fingerprint_records(&outcome.records),
        item_count: outcome.records.len(),
        items: outcome.records,
        attempt_provenance: outcome.attempts,
        used_export: outcome.used_export,
        snapshot_ref,
    }
}

fn log_state(target: &ComboTarget, state: ComboState, items: Option<usize>) {
    tracing::info!(
        target: "harvest",
        combo = %target.key(),
        state = ?state,
        items = ?items,
        "combo state"
    );
}

// src/storage.rs
//! Persistence: the "latest" run document, its timestamped history copy, and
//! per-target audit artifacts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;

use crate::cascade::ArtifactKind;
use crate::types::{ComboTarget, RunSnapshot};

pub const LATEST_FILE: &str = "latest.json";
pub const HISTORY_DIR: &str = "history";
pub const SNAPSHOT_DIR: &str = "snapshots";

#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Store `bytes` under `name`; returns the reference recorded as `snapshotRef`.
    async fn store(&self, name: &str, bytes: &[u8]) -> Result<String>;
}

/// File-name stamp, e.g. `2026-10-19T03-12-45-123Z`.
pub fn artifact_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string()
}

/// `trending_KR_4h_cat3_<stamp>.html`, `api_KR_4h_cat3_<stamp>.txt`, ...
pub fn artifact_name(target: &ComboTarget, kind: ArtifactKind, stamp: &str) -> String {
    format!(
        "{}_{}_{}.{}",
        kind.prefix(),
        target.key(),
        stamp,
        kind.extension()
    )
}

/// Writes artifacts into an existing directory.
pub struct FsArtifactSink {
    dir: PathBuf,
}

impl FsArtifactSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ArtifactSink for FsArtifactSink {
    async fn store(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let path = self.dir.join(name);
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing artifact {}", path.display()))?;
        Ok(path.to_string_lossy().to_string())
    }
}

/// Layout under the data directory:
/// `latest.json`, `history/latest_YYYYMMDDHHMM.json`, `snapshots/*`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn latest_path(&self) -> PathBuf {
        self.root.join(LATEST_FILE)
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.root.join(SNAPSHOT_DIR)
    }

    pub fn history_path(&self, at: DateTime<Utc>) -> PathBuf {
        self.root
            .join(HISTORY_DIR)
            .join(format!("latest_{}.json", at.format("%Y%m%d%H%M")))
    }

    /// Create the data, history and snapshot directories.
    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.root.clone(), self.root.join(HISTORY_DIR), self.snapshot_dir()] {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }

    /// Write the pretty "latest" document and a compact history copy.
    pub async fn write(&self, snapshot: &RunSnapshot, at: DateTime<Utc>) -> Result<(PathBuf, PathBuf)> {
        let latest = self.latest_path();
        let pretty = serde_json::to_vec_pretty(snapshot).context("serializing run snapshot")?;
        fs::write(&latest, pretty)
            .await
            .with_context(|| format!("writing {}", latest.display()))?;

        let history = self.history_path(at);
        let compact = serde_json::to_vec(snapshot).context("serializing run snapshot")?;
        fs::write(&history, compact)
            .await
            .with_context(|| format!("writing {}", history.display()))?;
        Ok((latest, history))
    }

    pub async fn read_latest(&self) -> Result<RunSnapshot> {
        let path = self.latest_path();
        let s = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&s).with_context(|| format!("parsing {}", path.display()))
    }
}

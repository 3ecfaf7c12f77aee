// src/cascade/mod.rs
//! Fallback cascades: ordered, named strategies tried until one yields records.
//!
//! Each cascade returns the winning records together with the provenance of
//! every attempt and any raw artifacts worth keeping for audit.

pub mod api;
pub mod render;
pub mod window;

use crate::types::{Attempt, TopicRecord};

pub use api::{plan_attempts, ApiAttemptPlan, ApiCascade};
pub use render::{RenderCascade, CONSENT_SELECTORS, EXPORT_AFFORDANCES, RENDER_STEPS};
pub use window::{apply_window, WindowOutcome};

/// Kind of raw bytes a cascade hands to the persistence collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    RenderedHtml,
    Screenshot,
    ApiBody,
}

impl ArtifactKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ArtifactKind::RenderedHtml | ArtifactKind::Screenshot => "trending",
            ArtifactKind::ApiBody => "api",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::RenderedHtml => "html",
            ArtifactKind::Screenshot => "png",
            ArtifactKind::ApiBody => "txt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArtifact {
    pub kind: ArtifactKind,
    pub bytes: Vec<u8>,
}

/// What a cascade produced for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub records: Vec<TopicRecord>,
    pub attempts: Vec<Attempt>,
    pub source_url: String,
    pub http_status: u16,
    pub used_export: bool,
    pub artifacts: Vec<RawArtifact>,
}

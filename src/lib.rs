// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cascade;
pub mod config;
pub mod delimited;
pub mod extract;
pub mod normalize;
pub mod render;
pub mod runner;
pub mod storage;
pub mod temporal;
pub mod transport;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::config::{HarvestConfig, Strategy};
pub use crate::runner::{ComboRunner, ComboState};
pub use crate::types::{
    ArticleRef, Attempt, AttemptKind, Capture, ComboOutcome, ComboResult, ComboTarget,
    RelatedLink, RunSnapshot, TopicRecord,
};

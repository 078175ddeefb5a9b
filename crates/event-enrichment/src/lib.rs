//! Event Enrichment Core
//!
//! Enriches short geopolitical and CTI event records with an offline
//! geolocation, severity/confidence/priority scores, and per-tag spike
//! detection.
//!
//! # Flow
//!
//! ```text
//! EventRecord batch ──► resolver (gazetteer) ──► scoring ──► EnrichedEvent batch
//!                                                                │
//!                                 accumulated history ──► spike ─┴─► TagWindowStat
//! ```
//!
//! Everything here is synchronous and CPU-bound. Feed fetching, storage and
//! dashboards live outside this crate.
//!
//! | Module       | Role |
//! |--------------|------|
//! | `resolver`   | Token-span place-name extraction and ranking |
//! | `scoring`    | Severity, confidence, priority |
//! | `spike`      | Bucketed per-tag spike detection |
//! | `pipeline`   | Batch enrichment with per-record skip reasons |
//! | `config`     | JSON configuration and validation |
//! | `situations` | Per-tag roll-up for triage |
//! | `export`     | GeoJSON of geolocated events |

use thiserror::Error;

pub mod config;
pub mod export;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod resolver;
pub mod scoring;
pub mod situations;
pub mod spike;

pub use config::{ConfigError, EnrichmentConfig};
pub use model::{Domain, EnrichedEvent, EventRecord, GeoTag};
pub use pipeline::{BatchOutcome, BatchStats, Enricher, SkipReason, SkippedRecord};
pub use resolver::{resolve, resolve_event, ResolvedLocation};
pub use scoring::{score, Scores, ScoringConfig};
pub use spike::{detect, rank_by_spike_score, SpikeConfig, SpikeRule, TagWindowStat};

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Gazetteer load error: {0}")]
    Gazetteer(#[from] gazetteer::GazetteerError),
}

pub type Result<T> = std::result::Result<T, EnrichError>;

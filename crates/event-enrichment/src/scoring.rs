//! Scoring Engine
//!
//! Three independent scores in [0, 1]:
//!
//! ```text
//! severity   = clamp(B_domain + Σ w_category · hit(category))
//! confidence = clamp(R_source + boost · resolved)
//! priority   = clamp(severity · (base + gain · confidence))
//! ```
//!
//! With `base, gain ≥ 0` priority is non-decreasing in both severity and
//! confidence, and is 0 whenever severity is 0. All weights come from
//! [`ScoringConfig`]; nothing is hardcoded here.

use crate::model::{Domain, EventRecord};
use crate::resolver::ResolvedLocation;
use gazetteer::normalize_name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Keyword category with its severity weight.
///
/// Terms are stored normalized and match whole tokens only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCategory {
    pub name: String,
    pub weight: f64,
    pub terms: Vec<String>,
}

impl KeywordCategory {
    /// True when any term appears in `padded` (normalized text wrapped in spaces)
    fn matches(&self, padded: &str) -> bool {
        self.terms
            .iter()
            .any(|term| padded.contains(&format!(" {} ", term)))
    }
}

/// Per-source reputation weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReputation {
    /// Keyed by lowercased, trimmed source name
    pub sources: HashMap<String, f64>,
    /// Weight for sources not listed
    pub default: f64,
}

impl SourceReputation {
    pub fn weight(&self, source_name: &str) -> f64 {
        self.sources
            .get(&source_name.trim().to_lowercase())
            .copied()
            .unwrap_or(self.default)
    }
}

/// Base severity per domain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainWeights {
    pub geopolitics: f64,
    pub cti: f64,
}

impl DomainWeights {
    pub fn weight(&self, domain: Domain) -> f64 {
        match domain {
            Domain::Geopolitics => self.geopolitics,
            Domain::Cti => self.cti,
        }
    }
}

/// Coefficients of the priority combination
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityCoefficients {
    /// Share of severity carried regardless of confidence
    pub base: f64,
    /// Extra share of severity per unit of confidence
    pub confidence_gain: f64,
}

impl PriorityCoefficients {
    pub fn combine(&self, severity: f64, confidence: f64) -> f64 {
        (severity * (self.base + self.confidence_gain * confidence)).clamp(0.0, 1.0)
    }
}

/// Validated scoring configuration (see `config::EnrichmentConfig`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub keyword_categories: Vec<KeywordCategory>,
    pub domain_base_weight: DomainWeights,
    pub source_reputation: SourceReputation,
    /// Confidence added when the event was geolocated
    pub geo_confidence_boost: f64,
    pub priority: PriorityCoefficients,
}

/// Severity, confidence and priority of one event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub severity: f64,
    pub confidence: f64,
    pub priority: f64,
}

/// Scores plus the keyword categories that fired
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub scores: Scores,
    pub matched_categories: Vec<String>,
}

/// Score an event and report which keyword categories matched
pub fn assess(event: &EventRecord, geo: Option<&ResolvedLocation>, config: &ScoringConfig) -> Assessment {
    let padded = format!(" {} ", normalize_name(&event.text()));

    let matched: Vec<&KeywordCategory> = config
        .keyword_categories
        .iter()
        .filter(|c| c.matches(&padded))
        .collect();

    let keyword_weight: f64 = matched.iter().map(|c| c.weight).sum();
    let severity = (config.domain_base_weight.weight(event.domain) + keyword_weight).clamp(0.0, 1.0);

    let geo_boost = if geo.is_some() {
        config.geo_confidence_boost
    } else {
        0.0
    };
    let confidence = (config.source_reputation.weight(&event.source_name) + geo_boost).clamp(0.0, 1.0);

    let priority = config.priority.combine(severity, confidence);

    debug!(
        "Scored {}: sev={:.3} conf={:.3} prio={:.3} (categories={:?}, geo={})",
        event.event_id,
        severity,
        confidence,
        priority,
        matched.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        geo.is_some()
    );

    Assessment {
        scores: Scores {
            severity,
            confidence,
            priority,
        },
        matched_categories: matched.into_iter().map(|c| c.name.clone()).collect(),
    }
}

/// Score an event; pure function of its inputs
pub fn score(event: &EventRecord, geo: Option<&ResolvedLocation>, config: &ScoringConfig) -> Scores {
    assess(event, geo, config).scores
}

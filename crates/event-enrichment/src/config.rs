//! Enrichment configuration
//!
//! One JSON document drives both the Scoring Engine and the Spike Detector.
//! Every required weight and threshold is an `Option` at parse time so a
//! missing entry fails with [`ConfigError::Missing`] instead of falling back
//! to a silent default. Unknown keys are rejected.
//!
//! ```json
//! {
//!   "keyword_categories": [{"name": "conflict", "weight": 0.3, "terms": ["missile"]}],
//!   "source_reputation": {"default": 0.5, "sources": {"BBC World": 0.8}},
//!   "domain_base_weight": {"geopolitics": 0.1, "cti": 0.2},
//!   "geo_confidence_boost": 0.1,
//!   "priority": {"base": 0.5, "confidence_gain": 0.5},
//!   "spike": {"window_secs": 86400, "lookback_buckets": 7,
//!             "threshold_factor": 3.0, "minimum_count": 5}
//! }
//! ```

use crate::model::Domain;
use crate::scoring::{DomainWeights, KeywordCategory, PriorityCoefficients, ScoringConfig, SourceReputation};
use crate::spike::{SpikeConfig, SpikeRule};
use gazetteer::normalize_name;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing required config entry: {field}")]
    Missing { field: String },
    #[error("validation error: {field}: {message}")]
    Validation { field: String, message: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawKeywordCategory {
    pub name: Option<String>,
    pub weight: Option<f64>,
    pub terms: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSourceReputation {
    pub default: Option<f64>,
    #[serde(default)]
    pub sources: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPriority {
    pub base: Option<f64>,
    pub confidence_gain: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSpike {
    pub window_secs: Option<u64>,
    pub lookback_buckets: Option<usize>,
    pub threshold_factor: Option<f64>,
    pub minimum_count: Option<usize>,
}

/// Configuration document as read from disk (unvalidated)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichmentConfig {
    pub keyword_categories: Option<Vec<RawKeywordCategory>>,
    pub source_reputation: Option<RawSourceReputation>,
    pub domain_base_weight: Option<HashMap<String, f64>>,
    pub geo_confidence_boost: Option<f64>,
    pub priority: Option<RawPriority>,
    pub spike: Option<RawSpike>,
}

fn require<T>(value: Option<T>, field: &str) -> Result<T, ConfigError> {
    value.ok_or_else(|| ConfigError::Missing {
        field: field.to_string(),
    })
}

/// Finite and non-negative
fn non_negative(value: f64, field: &str) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Validation {
            field: field.to_string(),
            message: format!("must be a finite number >= 0, got {}", value),
        })
    }
}

/// Within [0, 1]
fn unit_interval(value: f64, field: &str) -> Result<f64, ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Validation {
            field: field.to_string(),
            message: format!("must be within [0, 1], got {}", value),
        })
    }
}

impl EnrichmentConfig {
    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading enrichment config from {:?}", path);

        let file = File::open(path)?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate the scoring part
    pub fn scoring_config(&self) -> Result<ScoringConfig, ConfigError> {
        let raw_categories = require(self.keyword_categories.as_ref(), "keyword_categories")?;
        if raw_categories.is_empty() {
            return Err(ConfigError::Validation {
                field: "keyword_categories".to_string(),
                message: "at least one category is required".to_string(),
            });
        }

        let mut seen = HashSet::new();
        let mut keyword_categories = Vec::with_capacity(raw_categories.len());
        for (i, raw) in raw_categories.iter().enumerate() {
            let prefix = format!("keyword_categories[{}]", i);
            let name = require(raw.name.as_deref(), &format!("{}.name", prefix))?.trim();
            if name.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("{}.name", prefix),
                    message: "name must not be blank".to_string(),
                });
            }
            if !seen.insert(name.to_string()) {
                return Err(ConfigError::Validation {
                    field: format!("{}.name", prefix),
                    message: format!("duplicate category '{}'", name),
                });
            }

            let weight_field = format!("{}.weight", prefix);
            let weight = non_negative(require(raw.weight, &weight_field)?, &weight_field)?;

            let terms_field = format!("{}.terms", prefix);
            let mut terms: Vec<String> = Vec::new();
            for term in require(raw.terms.as_ref(), &terms_field)? {
                let normalized = normalize_name(term);
                if normalized.is_empty() {
                    return Err(ConfigError::Validation {
                        field: terms_field.clone(),
                        message: format!("term {:?} has no alphanumeric characters", term),
                    });
                }
                if !terms.contains(&normalized) {
                    terms.push(normalized);
                }
            }
            if terms.is_empty() {
                return Err(ConfigError::Validation {
                    field: terms_field,
                    message: "at least one term is required".to_string(),
                });
            }

            keyword_categories.push(KeywordCategory {
                name: name.to_string(),
                weight,
                terms,
            });
        }

        let raw_domains = require(self.domain_base_weight.as_ref(), "domain_base_weight")?;
        let mut domain_weights: HashMap<Domain, f64> = HashMap::new();
        for (key, &weight) in raw_domains {
            let field = format!("domain_base_weight.{}", key);
            let domain = key.parse::<Domain>().map_err(|message| ConfigError::Validation {
                field: field.clone(),
                message,
            })?;
            domain_weights.insert(domain, non_negative(weight, &field)?);
        }
        let mut domain_weight = |domain: Domain| {
            domain_weights
                .remove(&domain)
                .ok_or_else(|| ConfigError::Missing {
                    field: format!("domain_base_weight.{}", domain),
                })
        };
        let domain_base_weight = DomainWeights {
            geopolitics: domain_weight(Domain::Geopolitics)?,
            cti: domain_weight(Domain::Cti)?,
        };

        let raw_reputation = require(self.source_reputation.as_ref(), "source_reputation")?;
        let default = unit_interval(
            require(raw_reputation.default, "source_reputation.default")?,
            "source_reputation.default",
        )?;
        let mut sources = HashMap::with_capacity(raw_reputation.sources.len());
        for (name, &weight) in &raw_reputation.sources {
            let field = format!("source_reputation.sources.{}", name);
            let weight = unit_interval(weight, &field)?;
            if sources.insert(name.trim().to_lowercase(), weight).is_some() {
                return Err(ConfigError::Validation {
                    field,
                    message: "source name differs from another only by case or padding"
                        .to_string(),
                });
            }
        }

        let geo_confidence_boost = non_negative(
            require(self.geo_confidence_boost, "geo_confidence_boost")?,
            "geo_confidence_boost",
        )?;

        let raw_priority = require(self.priority.as_ref(), "priority")?;
        let base = non_negative(require(raw_priority.base, "priority.base")?, "priority.base")?;
        let confidence_gain = non_negative(
            require(raw_priority.confidence_gain, "priority.confidence_gain")?,
            "priority.confidence_gain",
        )?;
        if base + confidence_gain == 0.0 {
            return Err(ConfigError::Validation {
                field: "priority".to_string(),
                message: "base and confidence_gain cannot both be zero".to_string(),
            });
        }

        Ok(ScoringConfig {
            keyword_categories,
            domain_base_weight,
            source_reputation: SourceReputation { sources, default },
            geo_confidence_boost,
            priority: PriorityCoefficients {
                base,
                confidence_gain,
            },
        })
    }

    /// Validate the spike detector part
    pub fn spike_config(&self) -> Result<SpikeConfig, ConfigError> {
        let raw = require(self.spike.as_ref(), "spike")?;
        let window_secs = require(raw.window_secs, "spike.window_secs")?;
        let lookback = require(raw.lookback_buckets, "spike.lookback_buckets")?;
        let threshold_factor = require(raw.threshold_factor, "spike.threshold_factor")?;
        let minimum_count = require(raw.minimum_count, "spike.minimum_count")?;

        let window_secs = i64::try_from(window_secs).map_err(|_| ConfigError::Validation {
            field: "spike.window_secs".to_string(),
            message: format!("window of {} seconds is too large", window_secs),
        })?;
        let window = chrono::Duration::try_seconds(window_secs).ok_or_else(|| ConfigError::Validation {
            field: "spike.window_secs".to_string(),
            message: format!("window of {} seconds is too large", window_secs),
        })?;

        SpikeConfig::new(
            window,
            lookback,
            SpikeRule {
                threshold_factor,
                minimum_count,
            },
        )
    }

    /// Validate everything at once
    pub fn validate(&self) -> Result<(ScoringConfig, SpikeConfig), ConfigError> {
        Ok((self.scoring_config()?, self.spike_config()?))
    }
}

//! Batch enrichment: resolve → score → tag
//!
//! A bad record is skipped with a reason; it never aborts the batch.

use crate::model::{Domain, EnrichedEvent, EventRecord, GeoTag};
use crate::resolver::{resolve_event, ResolvedLocation};
use crate::scoring::{assess, ScoringConfig};
use gazetteer::{normalize_name, GazetteerIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use tracing::{info, warn};

/// Why a record was left out of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    EmptyEventId,
    /// Title and summary are both blank
    EmptyText,
    /// Same event id seen earlier in the batch
    DuplicateEventId,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::EmptyEventId => "empty event id",
            SkipReason::EmptyText => "empty title and summary",
            SkipReason::DuplicateEventId => "duplicate event id in batch",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub event_id: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub enriched: usize,
    pub skipped: usize,
    pub geo_resolved: usize,
    pub geo_unresolved: usize,
}

/// Result of one enrichment batch
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub enriched: Vec<EnrichedEvent>,
    pub skipped: Vec<SkippedRecord>,
}

impl BatchOutcome {
    pub fn stats(&self) -> BatchStats {
        let geo_resolved = self.enriched.iter().filter(|e| e.is_geolocated()).count();
        BatchStats {
            enriched: self.enriched.len(),
            skipped: self.skipped.len(),
            geo_resolved,
            geo_unresolved: self.enriched.len() - geo_resolved,
        }
    }
}

/// Tags derived from the domain, matched keyword categories and location
pub fn derived_tags(domain: Domain, categories: &[String], geo: Option<&ResolvedLocation>) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    tags.insert(domain.as_str().to_string());
    tags.extend(categories.iter().cloned());

    if let Some(loc) = geo {
        let label = normalize_name(&loc.label);
        if !label.is_empty() {
            tags.insert(format!("geo:{}", label));
        }
        let country = loc.country_code.trim().to_lowercase();
        if !country.is_empty() {
            tags.insert(format!("country:{}", country));
        }
    }

    tags
}

/// Enriches events against a fixed gazetteer and scoring config.
///
/// Holds only shared references, so one enricher can serve many batches
/// and each event is independent of the others.
#[derive(Debug, Clone, Copy)]
pub struct Enricher<'a> {
    index: &'a GazetteerIndex,
    scoring: &'a ScoringConfig,
}

impl<'a> Enricher<'a> {
    pub fn new(index: &'a GazetteerIndex, scoring: &'a ScoringConfig) -> Self {
        Self { index, scoring }
    }

    /// Enrich one record
    pub fn enrich(&self, mut record: EventRecord) -> Result<EnrichedEvent, SkipReason> {
        if record.event_id.trim().is_empty() {
            return Err(SkipReason::EmptyEventId);
        }
        if !record.has_text() {
            return Err(SkipReason::EmptyText);
        }

        let location = resolve_event(&record, self.index);
        let assessment = assess(&record, location.as_ref(), self.scoring);

        let tags = derived_tags(record.domain, &assessment.matched_categories, location.as_ref());
        record.tags.extend(tags);

        Ok(EnrichedEvent {
            record,
            scores: assessment.scores,
            geo: location.as_ref().map(GeoTag::from),
        })
    }

    /// Enrich a batch; every input record ends up enriched or skipped
    pub fn enrich_batch(&self, records: Vec<EventRecord>) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            enriched: Vec::with_capacity(records.len()),
            skipped: Vec::new(),
        };
        let mut seen: HashSet<String> = HashSet::with_capacity(records.len());

        for record in records {
            let event_id = record.event_id.clone();
            // Only accepted records claim their id
            let result = if seen.contains(&event_id) {
                Err(SkipReason::DuplicateEventId)
            } else {
                self.enrich(record)
            };

            match result {
                Ok(event) => {
                    seen.insert(event_id);
                    outcome.enriched.push(event);
                }
                Err(reason) => {
                    warn!("Skipping event {:?}: {}", event_id, reason);
                    outcome.skipped.push(SkippedRecord { event_id, reason });
                }
            }
        }

        let stats = outcome.stats();
        info!(
            "Enriched batch: {} events ({} geo_ok, {} geo_miss), {} skipped",
            stats.enriched, stats.geo_resolved, stats.geo_unresolved, stats.skipped
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::test_support::sample_config;
    use chrono::{TimeZone, Utc};
    use gazetteer::RawGazetteerRow;

    fn index() -> GazetteerIndex {
        GazetteerIndex::build(vec![
            RawGazetteerRow::new("Kyiv", "UA", 50.4501, 30.5234, 2_900_000),
            RawGazetteerRow::new("Paris", "FR", 48.8566, 2.3522, 2_100_000),
        ])
        .unwrap()
    }

    fn record(id: &str, title: &str, summary: &str) -> EventRecord {
        EventRecord {
            event_id: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap(),
            domain: Domain::Geopolitics,
            title: title.to_string(),
            summary: summary.to_string(),
            source_name: "BBC World".to_string(),
            tags: BTreeSet::from(["watchlist".to_string()]),
        }
    }

    #[test]
    fn test_enrich_resolved_event() {
        let index = index();
        let config = sample_config();
        let enricher = Enricher::new(&index, &config);

        let event = enricher
            .enrich(record("a", "Missile strike on Kyiv", "Power outage reported."))
            .unwrap();

        assert_eq!(event.geo_label(), Some("Kyiv"));
        assert_eq!(event.geo_country(), Some("UA"));
        assert_eq!(event.geo_lat(), Some(50.4501));
        assert_eq!(event.geo_lon(), Some(30.5234));
        assert!((event.scores.confidence - 0.9).abs() < 1e-9);

        let tags: Vec<&str> = event.record.tags.iter().map(String::as_str).collect();
        assert_eq!(
            tags,
            vec!["conflict", "country:ua", "geo:kyiv", "geopolitics", "outage", "watchlist"]
        );
    }

    #[test]
    fn test_enrich_unresolved_event() {
        let index = index();
        let config = sample_config();
        let event = Enricher::new(&index, &config)
            .enrich(record("b", "talks stall again", ""))
            .unwrap();

        assert!(event.geo.is_none());
        assert!(event.geo_label().is_none());
        assert!((event.scores.confidence - 0.8).abs() < 1e-9);
        assert!(!event.record.tags.iter().any(|t| t.starts_with("geo:")));
    }

    #[test]
    fn test_batch_isolates_bad_records() {
        let index = index();
        let config = sample_config();
        let records = vec![
            record("1", "Blackout in Paris", ""),
            record("", "Orphan headline", ""),
            record("2", "  ", "   "),
            record("3", "Ceasefire holds", ""),
            record("1", "Blackout in Paris again", ""),
        ];

        let outcome = Enricher::new(&index, &config).enrich_batch(records);

        let ids: Vec<&str> = outcome.enriched.iter().map(|e| e.event_id()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(
            outcome.skipped,
            vec![
                SkippedRecord {
                    event_id: String::new(),
                    reason: SkipReason::EmptyEventId
                },
                SkippedRecord {
                    event_id: "2".to_string(),
                    reason: SkipReason::EmptyText
                },
                SkippedRecord {
                    event_id: "1".to_string(),
                    reason: SkipReason::DuplicateEventId
                },
            ]
        );

        let stats = outcome.stats();
        assert_eq!(stats.enriched, 2);
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.geo_resolved, 1);
        assert_eq!(stats.geo_unresolved, 1);
    }

    #[test]
    fn test_skipped_record_does_not_claim_its_id() {
        let index = index();
        let config = sample_config();
        let records = vec![record("x", " ", ""), record("x", "Real headline", "")];

        let outcome = Enricher::new(&index, &config).enrich_batch(records);

        let ids: Vec<&str> = outcome.enriched.iter().map(|e| e.event_id()).collect();
        assert_eq!(ids, vec!["x"]);
        assert_eq!(
            outcome.skipped,
            vec![SkippedRecord {
                event_id: "x".to_string(),
                reason: SkipReason::EmptyText
            }]
        );
    }

    #[test]
    fn test_empty_batch() {
        let index = index();
        let config = sample_config();
        let outcome = Enricher::new(&index, &config).enrich_batch(Vec::new());
        assert!(outcome.enriched.is_empty());
        assert_eq!(outcome.stats(), BatchStats::default());
    }

    #[test]
    fn test_derived_tags_without_geo() {
        let tags = derived_tags(Domain::Cti, &["breach".to_string()], None);
        assert_eq!(tags, BTreeSet::from(["breach".to_string(), "cti".to_string()]));
    }
}

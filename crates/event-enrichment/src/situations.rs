//! Active situation summary: per-tag roll-up of enriched events
//!
//! Situations are ranked by
//! `situation_score = max_priority + 2 * events + 0.2 * avg_priority`,
//! so sustained activity outranks a single high-priority item.

use crate::model::EnrichedEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SCORE_MAX_PRIORITY_WEIGHT: f64 = 1.0;
const SCORE_EVENTS_WEIGHT: f64 = 2.0;
const SCORE_AVG_PRIORITY_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Situation {
    pub tag: String,
    pub events: usize,
    pub max_priority: f64,
    pub avg_priority: f64,
    pub last_seen: DateTime<Utc>,
    /// Most frequent source (ties go to the alphabetically first)
    pub top_source: String,
    pub situation_score: f64,
}

#[derive(Debug)]
struct Acc<'a> {
    events: usize,
    max_priority: f64,
    sum_priority: f64,
    last_seen: DateTime<Utc>,
    sources: BTreeMap<&'a str, usize>,
}

/// Summarize tags by descending situation score, then max priority, then
/// event count, then name
pub fn summarize_situations(events: &[EnrichedEvent], top_n: usize) -> Vec<Situation> {
    let mut by_tag: BTreeMap<&str, Acc<'_>> = BTreeMap::new();

    for event in events {
        let priority = event.scores.priority;
        for tag in &event.record.tags {
            let acc = by_tag.entry(tag.as_str()).or_insert_with(|| Acc {
                events: 0,
                max_priority: 0.0,
                sum_priority: 0.0,
                last_seen: event.timestamp(),
                sources: BTreeMap::new(),
            });
            acc.events += 1;
            acc.max_priority = acc.max_priority.max(priority);
            acc.sum_priority += priority;
            acc.last_seen = acc.last_seen.max(event.timestamp());
            *acc.sources.entry(event.record.source_name.as_str()).or_default() += 1;
        }
    }

    let mut situations: Vec<Situation> = by_tag
        .into_iter()
        .map(|(tag, acc)| {
            let mut top_source = "";
            let mut top_count = 0;
            for (source, count) in acc.sources {
                if count > top_count {
                    top_source = source;
                    top_count = count;
                }
            }

            let avg_priority = acc.sum_priority / acc.events as f64;
            Situation {
                tag: tag.to_string(),
                events: acc.events,
                max_priority: acc.max_priority,
                avg_priority,
                last_seen: acc.last_seen,
                top_source: top_source.to_string(),
                situation_score: SCORE_MAX_PRIORITY_WEIGHT * acc.max_priority
                    + SCORE_EVENTS_WEIGHT * acc.events as f64
                    + SCORE_AVG_PRIORITY_WEIGHT * avg_priority,
            }
        })
        .collect();

    situations.sort_by(|a, b| {
        b.situation_score
            .total_cmp(&a.situation_score)
            .then(b.max_priority.total_cmp(&a.max_priority))
            .then(b.events.cmp(&a.events))
            .then_with(|| a.tag.cmp(&b.tag))
    });
    situations.truncate(top_n);
    situations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Domain, EventRecord};
    use crate::scoring::Scores;
    use chrono::{Duration, TimeZone};

    fn event(id: usize, hours_ago: i64, priority: f64, source: &str, tags: &[&str]) -> EnrichedEvent {
        let now = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        EnrichedEvent {
            record: EventRecord {
                event_id: id.to_string(),
                timestamp: now - Duration::hours(hours_ago),
                domain: Domain::Cti,
                title: "t".to_string(),
                summary: String::new(),
                source_name: source.to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
            scores: Scores {
                severity: priority,
                confidence: 1.0,
                priority,
            },
            geo: None,
        }
    }

    #[test]
    fn test_rollup_and_ordering() {
        let events = vec![
            event(1, 5, 0.4, "Krebs", &["ransomware", "cti"]),
            event(2, 1, 0.9, "THN", &["ransomware", "cti"]),
            event(3, 3, 0.2, "THN", &["phishing", "cti"]),
            event(4, 2, 0.9, "Krebs", &["apt"]),
        ];

        let s = summarize_situations(&events, 10);
        let tags: Vec<&str> = s.iter().map(|x| x.tag.as_str()).collect();
        // cti 7.0, ransomware 5.03, apt 3.08, phishing 2.24
        assert_eq!(tags, vec!["cti", "ransomware", "apt", "phishing"]);
        assert!((s[0].situation_score - 7.0).abs() < 1e-9);

        let ransomware = &s[1];
        assert_eq!(ransomware.events, 2);
        assert!((ransomware.avg_priority - 0.65).abs() < 1e-9);
        assert_eq!(ransomware.last_seen, events[1].timestamp());
        // one each: alphabetical tie-break
        assert_eq!(ransomware.top_source, "Krebs");

        assert_eq!(s[0].top_source, "THN");
    }

    #[test]
    fn test_top_n_truncates() {
        let events = vec![event(1, 1, 0.5, "a", &["x", "y", "z"])];
        assert_eq!(summarize_situations(&events, 2).len(), 2);
        assert!(summarize_situations(&[], 5).is_empty());
    }

    #[test]
    fn test_busy_situation_outranks_single_critical_event() {
        let events = vec![
            event(1, 1, 1.0, "CERT", &["zero-day"]),
            event(2, 2, 0.1, "Blog", &["botnet"]),
            event(3, 3, 0.1, "Blog", &["botnet"]),
            event(4, 4, 0.1, "Blog", &["botnet"]),
        ];

        let s = summarize_situations(&events, 10);
        assert_eq!(s[0].tag, "botnet");
        assert!((s[0].situation_score - 6.12).abs() < 1e-9);
        assert_eq!(s[1].tag, "zero-day");
        assert!((s[1].situation_score - 3.2).abs() < 1e-9);
    }
}

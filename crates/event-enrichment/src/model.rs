//! Event records in and out of the enrichment core

use crate::resolver::ResolvedLocation;
use crate::scoring::Scores;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Event domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Geopolitics,
    Cti,
}

impl Domain {
    pub const ALL: [Domain; 2] = [Domain::Geopolitics, Domain::Cti];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Geopolitics => "geopolitics",
            Domain::Cti => "cti",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "geopolitics" => Ok(Domain::Geopolitics),
            "cti" => Ok(Domain::Cti),
            other => Err(format!("unknown domain '{}'", other)),
        }
    }
}

/// Normalized event handed over by ingestion (already deduplicated)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub domain: Domain,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    pub source_name: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl EventRecord {
    /// Title and summary joined, title first
    pub fn text(&self) -> String {
        if self.summary.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.summary)
        }
    }

    pub fn has_text(&self) -> bool {
        !self.title.trim().is_empty() || !self.summary.trim().is_empty()
    }
}

/// Resolved geolocation as stored on an enriched event.
///
/// Either all four fields are present or the whole group is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTag {
    #[serde(rename = "geo_label")]
    pub label: String,
    #[serde(rename = "geo_country")]
    pub country: String,
    #[serde(rename = "geo_lat")]
    pub latitude: f64,
    #[serde(rename = "geo_lon")]
    pub longitude: f64,
}

impl From<&ResolvedLocation> for GeoTag {
    fn from(loc: &ResolvedLocation) -> Self {
        Self {
            label: loc.label.clone(),
            country: loc.country_code.clone(),
            latitude: loc.latitude,
            longitude: loc.longitude,
        }
    }
}

/// Event after geolocation and scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEvent {
    #[serde(flatten)]
    pub record: EventRecord,
    #[serde(flatten)]
    pub scores: Scores,
    #[serde(flatten)]
    pub geo: Option<GeoTag>,
}

impl EnrichedEvent {
    pub fn event_id(&self) -> &str {
        &self.record.event_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.record.timestamp
    }

    pub fn is_geolocated(&self) -> bool {
        self.geo.is_some()
    }

    pub fn geo_label(&self) -> Option<&str> {
        self.geo.as_ref().map(|g| g.label.as_str())
    }

    pub fn geo_country(&self) -> Option<&str> {
        self.geo.as_ref().map(|g| g.country.as_str())
    }

    pub fn geo_lat(&self) -> Option<f64> {
        self.geo.as_ref().map(|g| g.latitude)
    }

    pub fn geo_lon(&self) -> Option<f64> {
        self.geo.as_ref().map(|g| g.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> EventRecord {
        EventRecord {
            event_id: "evt-1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            domain: Domain::Cti,
            title: "Ransomware hits hospital in Lyon".to_string(),
            summary: String::new(),
            source_name: "KrebsOnSecurity".to_string(),
            tags: BTreeSet::new(),
        }
    }

    #[test]
    fn test_domain_parse() {
        assert_eq!("CTI".parse::<Domain>().unwrap(), Domain::Cti);
        assert_eq!(" geopolitics ".parse::<Domain>().unwrap(), Domain::Geopolitics);
        assert!("weather".parse::<Domain>().is_err());
    }

    #[test]
    fn test_record_text_and_emptiness() {
        let mut r = record();
        assert_eq!(r.text(), "Ransomware hits hospital in Lyon");
        r.summary = "Systems offline.".to_string();
        assert_eq!(r.text(), "Ransomware hits hospital in Lyon Systems offline.");

        r.title = "  ".to_string();
        r.summary = String::new();
        assert!(!r.has_text());
    }

    #[test]
    fn test_record_deserializes_with_defaults() {
        let json = r#"{
            "event_id": "e-9",
            "timestamp": "2026-03-01T12:00:00Z",
            "domain": "geopolitics",
            "title": "Ceasefire talks",
            "source_name": "BBC World"
        }"#;
        let r: EventRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.domain, Domain::Geopolitics);
        assert!(r.summary.is_empty());
        assert!(r.tags.is_empty());
    }

    #[test]
    fn test_unresolved_event_omits_geo_fields() {
        let event = EnrichedEvent {
            record: record(),
            scores: Scores {
                severity: 0.5,
                confidence: 0.6,
                priority: 0.3,
            },
            geo: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["severity"], 0.5);
        assert!(value.get("geo_label").is_none());
        assert!(value.get("geo_lat").is_none());
        assert!(event.geo_country().is_none());
    }

    #[test]
    fn test_resolved_event_serializes_all_geo_fields() {
        let event = EnrichedEvent {
            record: record(),
            scores: Scores {
                severity: 0.5,
                confidence: 0.6,
                priority: 0.3,
            },
            geo: Some(GeoTag {
                label: "Lyon".to_string(),
                country: "FR".to_string(),
                latitude: 45.75,
                longitude: 4.85,
            }),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["geo_label"], "Lyon");
        assert_eq!(value["geo_country"], "FR");
        assert_eq!(value["geo_lat"], 45.75);
        assert_eq!(value["geo_lon"], 4.85);
        assert_eq!(value["event_id"], "evt-1");
    }
}

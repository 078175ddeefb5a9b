//! Offline Gazetteer Index
//!
//! Static table of place names (city, country, coordinates, population)
//! built once at startup and queried by normalized name.
//!
//! # Layout
//!
//! ```text
//! entries: [GazetteerEntry; N]           (arena, input order)
//! buckets: normalized key -> [entry idx] (sorted by population, descending)
//! ```
//!
//! Homonymous places share a bucket; the most populous one comes first,
//! which is the disambiguation tie-break used by the resolver. Aliases
//! (alternate names) add extra keys that point at the same entry.
//!
//! The index is immutable after [`GazetteerIndex::build`]; concurrent
//! lookups through `&GazetteerIndex` need no locking.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

pub mod loader;
pub mod normalize;

pub use normalize::{normalize_name, token_count};

/// Gazetteer load failure. Any bad row rejects the whole load.
#[derive(Error, Debug)]
pub enum GazetteerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Gazetteer input is empty")]
    Empty,
    #[error("Row {row}: missing required field '{field}'")]
    MissingField { row: usize, field: &'static str },
    #[error("Row {row}: invalid value for '{field}': {value}")]
    InvalidValue {
        row: usize,
        field: &'static str,
        value: String,
    },
    #[error("Row {row}: malformed row: {reason}")]
    MalformedRow { row: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, GazetteerError>;

/// Shortest key (in characters) eligible for fuzzy matching
pub const MIN_FUZZY_KEY_CHARS: usize = 4;

/// Most a fuzzy candidate key may differ in length from the query
const MAX_FUZZY_LEN_DIFF: usize = 2;

/// Raw gazetteer row as handed over by a loader.
///
/// `name`, `latitude` and `longitude` are required; the rest default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGazetteerRow {
    pub name: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub population: Option<u64>,
    /// Alternate names, each indexed as an extra key
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl RawGazetteerRow {
    pub fn new(name: &str, country_code: &str, latitude: f64, longitude: f64, population: u64) -> Self {
        Self {
            name: Some(name.to_string()),
            country_code: Some(country_code.to_string()),
            latitude: Some(latitude),
            longitude: Some(longitude),
            population: Some(population),
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }
}

/// Immutable gazetteer record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazetteerEntry {
    pub name: String,
    pub normalized_name: String,
    /// ISO 3166-1 alpha-2, uppercase (empty when the source had none)
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub population: u64,
}

/// Validate latitude is in valid range
fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && lat.is_finite()
}

/// Validate longitude is in valid range
fn is_valid_longitude(lon: f64) -> bool {
    (-180.0..=180.0).contains(&lon) && lon.is_finite()
}

impl GazetteerEntry {
    /// Validate a raw row (1-based `row` for error messages)
    fn from_raw(row: usize, raw: &RawGazetteerRow) -> Result<Self> {
        let name = raw
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(GazetteerError::MissingField { row, field: "name" })?;
        let latitude = raw
            .latitude
            .ok_or(GazetteerError::MissingField { row, field: "latitude" })?;
        let longitude = raw
            .longitude
            .ok_or(GazetteerError::MissingField { row, field: "longitude" })?;

        if !is_valid_latitude(latitude) {
            return Err(GazetteerError::InvalidValue {
                row,
                field: "latitude",
                value: latitude.to_string(),
            });
        }
        if !is_valid_longitude(longitude) {
            return Err(GazetteerError::InvalidValue {
                row,
                field: "longitude",
                value: longitude.to_string(),
            });
        }

        let normalized_name = normalize_name(name);
        if normalized_name.is_empty() {
            return Err(GazetteerError::MalformedRow {
                row,
                reason: format!("name {:?} has no alphanumeric characters", name),
            });
        }

        Ok(Self {
            name: name.to_string(),
            normalized_name,
            country_code: raw
                .country_code
                .as_deref()
                .map(|cc| cc.trim().to_ascii_uppercase())
                .unwrap_or_default(),
            latitude,
            longitude,
            population: raw.population.unwrap_or(0),
        })
    }
}

/// Nearest key for a query with no exact hit
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatch<'a> {
    pub key: &'a str,
    /// Most populous entry of the key's bucket
    pub entry: &'a GazetteerEntry,
    /// Jaro-Winkler similarity, in `[0, 1]`
    pub similarity: f64,
}

/// Name → places index, built once and read many times
#[derive(Debug, Clone)]
pub struct GazetteerIndex {
    entries: Vec<GazetteerEntry>,
    buckets: HashMap<String, Vec<usize>>,
    max_key_tokens: usize,
}

impl GazetteerIndex {
    /// Build the index from raw rows.
    ///
    /// All-or-nothing: an empty input or any invalid row fails the build.
    pub fn build<I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = RawGazetteerRow>,
    {
        let mut entries: Vec<GazetteerEntry> = Vec::new();
        let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
        let mut max_key_tokens = 0;
        let mut alias_keys = 0usize;

        for (i, raw) in rows.into_iter().enumerate() {
            let entry = GazetteerEntry::from_raw(i + 1, &raw)?;
            let idx = entries.len();

            let mut keys: Vec<String> = vec![entry.normalized_name.clone()];
            for alias in &raw.aliases {
                let key = normalize_name(alias);
                if !key.is_empty() && !keys.contains(&key) {
                    keys.push(key);
                    alias_keys += 1;
                }
            }

            for key in keys {
                max_key_tokens = max_key_tokens.max(token_count(&key));
                buckets.entry(key).or_default().push(idx);
            }
            entries.push(entry);
        }

        if entries.is_empty() {
            return Err(GazetteerError::Empty);
        }

        // Stable sort: equal populations keep input order
        for bucket in buckets.values_mut() {
            bucket.sort_by_key(|&idx| Reverse(entries[idx].population));
        }

        info!(
            "Built gazetteer index: {} entries, {} keys ({} from aliases), longest key {} tokens",
            entries.len(),
            buckets.len(),
            alias_keys,
            max_key_tokens
        );

        Ok(Self {
            entries,
            buckets,
            max_key_tokens,
        })
    }

    /// Replace this index with one built from `rows`.
    ///
    /// On failure the current index is left untouched.
    pub fn rebuild<I>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = RawGazetteerRow>,
    {
        let fresh = Self::build(rows)?;
        debug!(
            "Rebuilt gazetteer index: {} -> {} entries",
            self.entries.len(),
            fresh.entries.len()
        );
        *self = fresh;
        Ok(())
    }

    /// Look up a free-form name; results ordered by descending population
    pub fn lookup(&self, name: &str) -> Vec<&GazetteerEntry> {
        self.lookup_normalized(&normalize_name(name)).collect()
    }

    /// Look up an already normalized key
    pub fn lookup_normalized<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a GazetteerEntry> + 'a {
        self.buckets
            .get(key)
            .map(|bucket| bucket.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&idx| &self.entries[idx])
    }

    /// Most populous entry for an already normalized key
    pub fn best_normalized(&self, key: &str) -> Option<&GazetteerEntry> {
        self.lookup_normalized(key).next()
    }

    /// Closest key to an already normalized query, by Jaro-Winkler similarity.
    ///
    /// Only keys with the same first character, the same number of tokens
    /// and a length within two characters are compared; queries shorter than
    /// [`MIN_FUZZY_KEY_CHARS`] never match. Ties go to the more populous
    /// entry, then to the lexicographically smaller key, so the answer does
    /// not depend on hash order.
    pub fn best_fuzzy(&self, key: &str, min_similarity: f64) -> Option<FuzzyMatch<'_>> {
        let len = key.chars().count();
        let first = key.chars().next()?;
        if len < MIN_FUZZY_KEY_CHARS {
            return None;
        }
        let tokens = token_count(key);

        let mut best: Option<FuzzyMatch<'_>> = None;
        for (candidate, bucket) in &self.buckets {
            if !candidate.starts_with(first)
                || candidate.chars().count().abs_diff(len) > MAX_FUZZY_LEN_DIFF
                || token_count(candidate) != tokens
            {
                continue;
            }
            let similarity = strsim::jaro_winkler(key, candidate);
            if similarity < min_similarity {
                continue;
            }
            let Some(&idx) = bucket.first() else {
                continue;
            };
            let found = FuzzyMatch {
                key: candidate.as_str(),
                entry: &self.entries[idx],
                similarity,
            };

            let better = match &best {
                None => true,
                Some(b) => found
                    .similarity
                    .total_cmp(&b.similarity)
                    .then(found.entry.population.cmp(&b.entry.population))
                    .then_with(|| b.key.cmp(found.key))
                    .is_gt(),
            };
            if better {
                best = Some(found);
            }
        }

        if let Some(m) = &best {
            debug!("Fuzzy match {:?} -> {:?} ({:.3})", key, m.key, m.similarity);
        }
        best
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.buckets.contains_key(key)
    }

    /// Number of entries (places)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct normalized keys
    pub fn key_count(&self) -> usize {
        self.buckets.len()
    }

    /// Longest key, in tokens
    pub fn max_key_tokens(&self) -> usize {
        self.max_key_tokens
    }

    pub fn entries(&self) -> &[GazetteerEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paris_rows() -> Vec<RawGazetteerRow> {
        vec![
            RawGazetteerRow::new("Paris", "US", 33.6609, -95.5555, 25_000),
            RawGazetteerRow::new("Paris", "FR", 48.8566, 2.3522, 2_100_000),
            RawGazetteerRow::new("Paris", "CA", 43.2, -80.3833, 12_000),
        ]
    }

    #[test]
    fn test_bucket_sorted_by_population() {
        let index = GazetteerIndex::build(paris_rows()).unwrap();
        let hits = index.lookup("paris");
        let countries: Vec<&str> = hits.iter().map(|e| e.country_code.as_str()).collect();
        assert_eq!(countries, vec!["FR", "US", "CA"]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.key_count(), 1);
    }

    #[test]
    fn test_lookup_normalizes_query() {
        let index = GazetteerIndex::build(vec![RawGazetteerRow::new(
            "São Paulo",
            "br",
            -23.5505,
            -46.6333,
            12_300_000,
        )])
        .unwrap();

        let hits = index.lookup("SAO-PAULO");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "São Paulo");
        assert_eq!(hits[0].country_code, "BR");
        assert_eq!(index.max_key_tokens(), 2);
    }

    #[test]
    fn test_lookup_miss_is_empty() {
        let index = GazetteerIndex::build(paris_rows()).unwrap();
        assert!(index.lookup("atlantis").is_empty());
        assert!(index.best_normalized("atlantis").is_none());
    }

    #[test]
    fn test_equal_population_keeps_input_order() {
        let rows = vec![
            RawGazetteerRow::new("Springfield", "US", 39.78, -89.65, 100),
            RawGazetteerRow::new("Springfield", "US", 37.21, -93.29, 100),
        ];
        let index = GazetteerIndex::build(rows).unwrap();
        let hits = index.lookup("Springfield");
        assert_eq!(hits[0].latitude, 39.78);
        assert_eq!(hits[1].latitude, 37.21);
    }

    #[test]
    fn test_aliases_point_at_same_entry() {
        let rows = vec![RawGazetteerRow::new("Kyiv", "UA", 50.4501, 30.5234, 2_900_000)
            .with_aliases(["Kiev", "Kyiv", "Київ"])];
        let index = GazetteerIndex::build(rows).unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("Kiev")[0].name, "Kyiv");
        assert_eq!(index.lookup("kyiv").len(), 1);
        assert_eq!(index.lookup("Київ").len(), 1);
    }

    #[test]
    fn test_empty_input_fails() {
        let err = GazetteerIndex::build(Vec::new()).unwrap_err();
        assert!(matches!(err, GazetteerError::Empty));
    }

    #[test]
    fn test_missing_required_field_fails_whole_load() {
        let mut rows = paris_rows();
        rows.push(RawGazetteerRow {
            name: Some("Nowhere".to_string()),
            latitude: Some(1.0),
            ..Default::default()
        });

        let err = GazetteerIndex::build(rows).unwrap_err();
        assert!(matches!(
            err,
            GazetteerError::MissingField {
                row: 4,
                field: "longitude"
            }
        ));
    }

    #[test]
    fn test_blank_name_is_missing() {
        let rows = vec![RawGazetteerRow {
            name: Some("   ".to_string()),
            latitude: Some(1.0),
            longitude: Some(1.0),
            ..Default::default()
        }];
        assert!(matches!(
            GazetteerIndex::build(rows).unwrap_err(),
            GazetteerError::MissingField { row: 1, field: "name" }
        ));
    }

    #[test]
    fn test_out_of_range_coordinate_fails() {
        let rows = vec![RawGazetteerRow::new("Bad", "XX", 91.0, 0.0, 1)];
        assert!(matches!(
            GazetteerIndex::build(rows).unwrap_err(),
            GazetteerError::InvalidValue { field: "latitude", .. }
        ));
    }

    #[test]
    fn test_rebuild_keeps_old_index_on_failure() {
        let mut index = GazetteerIndex::build(paris_rows()).unwrap();
        assert!(index.rebuild(Vec::new()).is_err());
        assert_eq!(index.len(), 3);

        index
            .rebuild(vec![RawGazetteerRow::new("Lagos", "NG", 6.5244, 3.3792, 15_000_000)])
            .unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.lookup("Paris").is_empty());
    }

    #[test]
    fn test_tone_marks_reach_plain_spelling() {
        let index = GazetteerIndex::build(vec![
            RawGazetteerRow::new("Hà Nội", "VN", 21.0245, 105.8412, 8_000_000),
            RawGazetteerRow::new("Xī'ān", "CN", 34.2583, 108.9286, 12_900_000),
        ])
        .unwrap();

        assert_eq!(index.lookup("Ha Noi")[0].country_code, "VN");
        assert_eq!(index.lookup("xi an")[0].country_code, "CN");
        assert!(index.contains_key("ha noi"));
    }

    #[test]
    fn test_best_fuzzy_finds_spelling_variant() {
        let index = GazetteerIndex::build(vec![
            RawGazetteerRow::new("Tehran", "IR", 35.6944, 51.4215, 7_150_000),
            RawGazetteerRow::new("Kharkiv", "UA", 49.9935, 36.2304, 1_400_000),
        ])
        .unwrap();

        let m = index.best_fuzzy("teheran", 0.9).unwrap();
        assert_eq!(m.key, "tehran");
        assert_eq!(m.entry.name, "Tehran");
        assert!(m.similarity > 0.9 && m.similarity < 1.0);

        assert_eq!(index.best_fuzzy("kharkov", 0.9).unwrap().entry.name, "Kharkiv");
    }

    #[test]
    fn test_best_fuzzy_rejects_weak_and_short_queries() {
        let index = GazetteerIndex::build(paris_rows()).unwrap();
        // "parts" vs "paris" scores about 0.91
        assert!(index.best_fuzzy("parts", 0.93).is_none());
        assert!(index.best_fuzzy("par", 0.1).is_none());
        assert!(index.best_fuzzy("", 0.1).is_none());
        // different first letter is never compared
        assert!(index.best_fuzzy("baris", 0.1).is_none());
    }

    #[test]
    fn test_best_fuzzy_tie_break() {
        let rows = |pop_a, pop_o| {
            vec![
                RawGazetteerRow::new("Alpha", "AA", 1.0, 1.0, pop_a),
                RawGazetteerRow::new("Alpho", "AO", 2.0, 2.0, pop_o),
            ]
        };

        // equal similarity: population decides
        let index = GazetteerIndex::build(rows(10, 20)).unwrap();
        assert_eq!(index.best_fuzzy("alphx", 0.9).unwrap().key, "alpho");

        // then the smaller key
        let index = GazetteerIndex::build(rows(10, 10)).unwrap();
        for _ in 0..10 {
            assert_eq!(index.best_fuzzy("alphx", 0.9).unwrap().key, "alpha");
        }
    }
}

//! Gazetteer loading from GeoNames dumps and JSON files
//!
//! Loaders only turn bytes into [`RawGazetteerRow`]s; validation happens in
//! [`GazetteerIndex::build`]. File handles live only for the duration of
//! the load call.

use crate::{GazetteerError, GazetteerIndex, RawGazetteerRow, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

/// Column positions in a GeoNames `cities*.txt` dump
const GN_NAME: usize = 1;
const GN_ASCII_NAME: usize = 2;
const GN_ALTERNATE_NAMES: usize = 3;
const GN_LATITUDE: usize = 4;
const GN_LONGITUDE: usize = 5;
const GN_COUNTRY_CODE: usize = 8;
const GN_POPULATION: usize = 14;
const GN_MIN_COLUMNS: usize = 15;

fn parse_f64(row: usize, field: &'static str, raw: &str) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| GazetteerError::InvalidValue {
            row,
            field,
            value: raw.to_string(),
        })
}

fn parse_population(row: usize, raw: &str) -> Result<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse::<u64>().map_err(|_| GazetteerError::InvalidValue {
        row,
        field: "population",
        value: raw.to_string(),
    })
}

fn non_empty(raw: &str) -> Option<String> {
    let raw = raw.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

/// Parse a GeoNames tab-separated dump.
///
/// Blank lines and `#` comments are ignored; `asciiname` and the
/// comma-separated `alternatenames` become aliases.
pub fn parse_geonames<R: BufRead>(reader: R) -> Result<Vec<RawGazetteerRow>> {
    let mut rows = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let row = i + 1;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < GN_MIN_COLUMNS {
            return Err(GazetteerError::MalformedRow {
                row,
                reason: format!("expected at least {} columns, found {}", GN_MIN_COLUMNS, cols.len()),
            });
        }

        let name = non_empty(cols[GN_NAME]);
        let mut aliases: Vec<String> = Vec::new();
        if let Some(ascii) = non_empty(cols[GN_ASCII_NAME]) {
            if Some(&ascii) != name.as_ref() {
                aliases.push(ascii);
            }
        }
        aliases.extend(cols[GN_ALTERNATE_NAMES].split(',').filter_map(non_empty));

        rows.push(RawGazetteerRow {
            name,
            country_code: non_empty(cols[GN_COUNTRY_CODE]),
            latitude: parse_f64(row, "latitude", cols[GN_LATITUDE])?,
            longitude: parse_f64(row, "longitude", cols[GN_LONGITUDE])?,
            population: Some(parse_population(row, cols[GN_POPULATION])?),
            aliases,
        });
    }

    Ok(rows)
}

/// Load rows from a GeoNames dump on disk
pub fn load_geonames(path: impl AsRef<Path>) -> Result<Vec<RawGazetteerRow>> {
    let path = path.as_ref();
    info!("Loading GeoNames gazetteer from {:?}", path);

    let file = File::open(path)?;
    let rows = parse_geonames(BufReader::new(file))?;

    info!("Read {} gazetteer rows", rows.len());
    Ok(rows)
}

/// Load rows from a JSON array of row objects
pub fn load_json_rows(path: impl AsRef<Path>) -> Result<Vec<RawGazetteerRow>> {
    let path = path.as_ref();
    info!("Loading JSON gazetteer from {:?}", path);

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let rows: Vec<RawGazetteerRow> = serde_json::from_reader(reader)?;

    info!("Read {} gazetteer rows", rows.len());
    Ok(rows)
}

/// Load and build an index, picking the format from the file extension
/// (`.json` is JSON rows, anything else is a GeoNames dump)
pub fn load_index(path: impl AsRef<Path>) -> Result<GazetteerIndex> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let rows = if is_json {
        load_json_rows(path)?
    } else {
        load_geonames(path)?
    };

    GazetteerIndex::build(rows)
}

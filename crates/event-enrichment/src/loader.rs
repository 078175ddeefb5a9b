//! Event batch files: JSON in, JSON out

use crate::model::EventRecord;
use crate::Result;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// Load a JSON array of event records
pub fn load_events(path: impl AsRef<Path>) -> Result<Vec<EventRecord>> {
    let path = path.as_ref();
    info!("Loading events from {:?}", path);

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let events: Vec<EventRecord> = serde_json::from_reader(reader)?;

    info!("Loaded {} event records", events.len());
    Ok(events)
}

/// Write any serializable value as pretty JSON
pub fn write_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    info!("Writing {:?}", path);

    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Domain;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_events() {
        let json = r#"[
            {"event_id": "a", "timestamp": "2026-04-01T10:00:00Z", "domain": "cti",
             "title": "Phishing wave", "summary": "Banks targeted", "source_name": "KrebsOnSecurity",
             "tags": ["phishing"]},
            {"event_id": "b", "timestamp": "2026-04-01T11:30:00+02:00", "domain": "geopolitics",
             "title": "Sanctions widened", "source_name": "BBC World"}
        ]"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let events = load_events(file.path()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].domain, Domain::Cti);
        assert!(events[0].tags.contains("phishing"));
        assert_eq!(events[1].timestamp.to_rfc3339(), "2026-04-01T09:30:00+00:00");
    }

    #[test]
    fn test_load_events_rejects_unknown_domain() {
        let json = r#"[{"event_id": "a", "timestamp": "2026-04-01T10:00:00Z", "domain": "sports",
                        "title": "x", "source_name": "y"}]"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        assert!(load_events(file.path()).is_err());
    }

    #[test]
    fn test_write_json() {
        let file = NamedTempFile::new().unwrap();
        write_json(file.path(), &vec![1, 2, 3]).unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        let back: Vec<u32> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }
}

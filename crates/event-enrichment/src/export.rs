//! GeoJSON export of geolocated events for map layers

use crate::model::EnrichedEvent;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;

/// Point features for every geolocated event; unresolved events are left out
pub fn to_geojson(events: &[EnrichedEvent]) -> FeatureCollection {
    let features = events
        .iter()
        .filter_map(|event| {
            let geo = event.geo.as_ref()?;

            let mut properties = JsonObject::new();
            properties.insert("event_id".to_string(), json!(event.record.event_id));
            properties.insert("title".to_string(), json!(event.record.title));
            properties.insert("domain".to_string(), json!(event.record.domain.as_str()));
            properties.insert("timestamp".to_string(), json!(event.record.timestamp.to_rfc3339()));
            properties.insert("severity".to_string(), json!(event.scores.severity));
            properties.insert("confidence".to_string(), json!(event.scores.confidence));
            properties.insert("priority".to_string(), json!(event.scores.priority));
            properties.insert("geo_label".to_string(), json!(geo.label));
            properties.insert("geo_country".to_string(), json!(geo.country));

            Some(Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![geo.longitude, geo.latitude]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            })
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

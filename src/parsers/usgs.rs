//! USGS GeoJSON summary-feed parser.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::errors::EnvelopeParseError;
use crate::geo::normalize_longitude;
use crate::models::CanonicalEvent;
use crate::parsers::extract_region;

const SOURCE: &str = "usgs";
const ALLOWED_STATUSES: &[&str] = &["automatic", "reviewed", "deleted"];

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    id: String,
    properties: Properties,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct Properties {
    mag: Option<f64>,
    #[serde(rename = "magType")]
    mag_type: Option<String>,
    place: Option<String>,
    time: i64,
    updated: Option<i64>,
    status: Option<String>,
    net: Option<String>,
    url: Option<String>,
    #[serde(rename = "horizontalError")]
    horizontal_error: Option<f64>,
    #[serde(rename = "depthError")]
    depth_error: Option<f64>,
    #[serde(rename = "magError")]
    mag_error: Option<f64>,
    #[serde(rename = "timeError")]
    time_error: Option<f64>,
    nph: Option<i32>,
    gap: Option<f64>,
}

/// Parse a USGS GeoJSON response body into canonical events.
///
/// # Errors
///
/// Returns an error if the payload is not valid JSON or lacks a
/// `features` array entirely. Individual malformed features are skipped.
pub fn parse(raw_text: &str, fetched_at: DateTime<Utc>) -> Result<Vec<CanonicalEvent>, EnvelopeParseError> {
    let trimmed = raw_text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let collection: FeatureCollection = serde_json::from_str(trimmed).map_err(|e| EnvelopeParseError {
        source: SOURCE.to_string(),
        reason: e.to_string(),
    })?;

    Ok(collection
        .features
        .into_iter()
        .filter_map(|feature| parse_feature(feature, fetched_at).ok())
        .collect())
}

fn parse_feature(feature: Feature, fetched_at: DateTime<Utc>) -> Result<CanonicalEvent, ()> {
    if feature.geometry.coordinates.len() != 3 {
        return Err(());
    }

    let origin_time_utc = Utc
        .timestamp_millis_opt(feature.properties.time)
        .single()
        .ok_or(())?;

    let updated_at = feature
        .properties
        .updated
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

    let mut status = feature
        .properties
        .status
        .as_deref()
        .unwrap_or("automatic")
        .to_lowercase();
    if !ALLOWED_STATUSES.contains(&status.as_str()) {
        status = "automatic".to_string();
    }

    let mag_type = feature
        .properties
        .mag_type
        .as_deref()
        .unwrap_or("ml")
        .to_lowercase();

    let longitude = normalize_longitude(feature.geometry.coordinates[0]);

    let region = extract_region(feature.properties.place.as_deref());

    Ok(CanonicalEvent {
        event_uid: format!("{SOURCE}:{}", feature.id),
        source: SOURCE.to_string(),
        source_event_id: feature.id,
        origin_time_utc,
        latitude: feature.geometry.coordinates[1],
        longitude,
        depth_km: feature.geometry.coordinates[2],
        magnitude_value: feature.properties.mag.unwrap_or(0.0),
        magnitude_type: mag_type,
        place: feature.properties.place,
        region,
        lat_error_km: feature.properties.horizontal_error,
        lon_error_km: feature.properties.horizontal_error,
        depth_error_km: feature.properties.depth_error,
        mag_error: feature.properties.mag_error,
        time_error_sec: feature.properties.time_error,
        status,
        num_phases: feature.properties.nph,
        azimuthal_gap: feature.properties.gap,
        author: feature.properties.net,
        url: feature.properties.url,
        fetched_at,
        updated_at,
        raw_payload: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": "us7000test",
                "properties": {
                    "mag": 5.2,
                    "place": "10km NE of Ridgecrest, CA",
                    "time": 1705312800000,
                    "updated": 1705312900000,
                    "status": "reviewed",
                    "magType": "Mw",
                    "net": "us",
                    "url": "https://earthquake.usgs.gov/x",
                    "horizontalError": 0.5,
                    "depthError": 1.2,
                    "nph": 120,
                    "gap": 35.0
                },
                "geometry": { "type": "Point", "coordinates": [-120.5, 35.8, 12.3] }
            }
        ]
    }"#;

    #[test]
    fn test_parse_sample_feature() {
        let events = parse(SAMPLE, Utc::now()).expect("parse ok");
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.event_uid, "usgs:us7000test");
        assert_eq!(e.source, "usgs");
        assert!((e.magnitude_value - 5.2).abs() < 1e-9);
        assert_eq!(e.magnitude_type, "mw");
        assert_eq!(e.status, "reviewed");
        assert_eq!(e.region.as_deref(), Some("CA"));
        assert!((e.latitude - 35.8).abs() < 1e-9);
        assert!((e.longitude - (-120.5)).abs() < 1e-9);
        assert!((e.depth_km - 12.3).abs() < 1e-9);
    }

    #[test]
    fn test_parse_empty_feature_collection() {
        let events = parse(r#"{"type":"FeatureCollection","features":[]}"#, Utc::now()).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_parse_204_empty_body() {
        let events = parse("", Utc::now()).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_parse_unparseable_envelope_is_error() {
        let result = parse("not json at all", Utc::now());
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_skips_bad_record_keeps_good_ones() {
        let payload = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature", "id": "bad1",
                    "properties": { "time": 1705312800000, "mag": 4.0 },
                    "geometry": { "type": "Point", "coordinates": [1.0, 2.0] }
                },
                {
                    "type": "Feature", "id": "good1",
                    "properties": { "time": 1705312800000, "mag": 4.0, "status": "automatic" },
                    "geometry": { "type": "Point", "coordinates": [1.0, 2.0, 5.0] }
                }
            ]
        }"#;
        let events = parse(payload, Utc::now()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_uid, "usgs:good1");
    }

    #[test]
    fn test_longitude_normalized_over_180() {
        let payload = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","id":"a1","properties":{"time":1705312800000,"mag":4.0},
             "geometry":{"type":"Point","coordinates":[200.0,10.0,5.0]}}
        ]}"#;
        let events = parse(payload, Utc::now()).unwrap();
        assert!((events[0].longitude - (-160.0)).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_status_falls_back_to_automatic() {
        let payload = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","id":"a1","properties":{"time":1705312800000,"mag":4.0,"status":"superseded"},
             "geometry":{"type":"Point","coordinates":[1.0,2.0,5.0]}}
        ]}"#;
        let events = parse(payload, Utc::now()).unwrap();
        assert_eq!(events[0].status, "automatic");
    }
}

//! EMSC (SeismicPortal) GeoJSON parser.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::EnvelopeParseError;
use crate::geo::normalize_longitude;
use crate::models::CanonicalEvent;

const SOURCE: &str = "emsc";
const ALLOWED_STATUSES: &[&str] = &["automatic", "reviewed", "deleted"];

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    id: Option<String>,
    properties: Properties,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct Properties {
    unid: Option<String>,
    source_id: Option<String>,
    time: Value,
    mag: Option<f64>,
    magtype: Option<String>,
    #[serde(rename = "magType")]
    mag_type_alt: Option<String>,
    flynn_region: Option<String>,
    place: Option<String>,
    lastupdate: Option<Value>,
    updated: Option<Value>,
    status: Option<String>,
    auth: Option<String>,
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

/// Parse an EMSC/SeismicPortal GeoJSON response body into canonical events.
///
/// # Errors
///
/// Returns an error if the payload is not valid JSON. Individual
/// malformed features are skipped.
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

    let source_event_id = feature
        .properties
        .unid
        .clone()
        .or_else(|| feature.properties.source_id.clone())
        .or(feature.id)
        .filter(|s| !s.is_empty())
        .ok_or(())?;

    let origin_time_utc = parse_timestamp(&feature.properties.time).ok_or(())?;

    let updated_at = feature
        .properties
        .lastupdate
        .as_ref()
        .or(feature.properties.updated.as_ref())
        .and_then(parse_timestamp);

    let mag_type = feature
        .properties
        .magtype
        .clone()
        .or(feature.properties.mag_type_alt.clone())
        .unwrap_or_else(|| "ml".to_string())
        .to_lowercase();

    let mut status = feature
        .properties
        .status
        .as_deref()
        .unwrap_or("automatic")
        .to_lowercase();
    if !ALLOWED_STATUSES.contains(&status.as_str()) {
        status = "automatic".to_string();
    }

    let longitude = normalize_longitude(feature.geometry.coordinates[0]);

    let region = feature.properties.flynn_region.clone();
    let place = region.clone().or_else(|| feature.properties.place.clone());

    Ok(CanonicalEvent {
        event_uid: format!("{SOURCE}:{source_event_id}"),
        source: SOURCE.to_string(),
        source_event_id,
        origin_time_utc,
        latitude: feature.geometry.coordinates[1],
        longitude,
        depth_km: feature.geometry.coordinates[2],
        magnitude_value: feature.properties.mag.unwrap_or(0.0),
        magnitude_type: mag_type,
        place,
        region,
        lat_error_km: feature.properties.horizontal_error,
        lon_error_km: feature.properties.horizontal_error,
        depth_error_km: feature.properties.depth_error,
        mag_error: feature.properties.mag_error,
        time_error_sec: feature.properties.time_error,
        status,
        num_phases: feature.properties.nph,
        azimuthal_gap: feature.properties.gap,
        author: feature.properties.auth.clone().or(feature.properties.net.clone()),
        url: feature.properties.url,
        fetched_at,
        updated_at,
        raw_payload: String::new(),
    })
}

/// EMSC ships `time` either as an ISO 8601 string or as epoch milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

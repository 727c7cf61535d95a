//! FDSN pipe-delimited text parser (GFZ GEOFON, ISC, GeoNet, and other
//! FDSN-compliant services that support `format=text`).

use chrono::{DateTime, Utc};

use crate::geo::normalize_longitude;
use crate::models::CanonicalEvent;

// EventID|Time|Latitude|Longitude|Depth/km|Author|Catalog|Contributor|
// ContributorID|MagType|Magnitude|MagAuthor|EventLocationName
const COL_EVENT_ID: usize = 0;
const COL_TIME: usize = 1;
const COL_LAT: usize = 2;
const COL_LON: usize = 3;
const COL_DEPTH: usize = 4;
const COL_AUTHOR: usize = 5;
const COL_MAG_TYPE: usize = 9;
const COL_MAG: usize = 10;
const COL_LOCATION: usize = 12;

/// Parse a pipe-delimited FDSN text response into canonical events.
///
/// Line-oriented and infallible at the envelope level: a malformed line
/// is skipped, never raised. `source` both prefixes `event_uid` and
/// fills `source`/`region` defaults.
#[must_use]
pub fn parse(raw_text: &str, fetched_at: DateTime<Utc>, source: &str) -> Vec<CanonicalEvent> {
    raw_text
        .trim()
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with("EventID") && !trimmed.starts_with('#')
        })
        .filter_map(|line| parse_line(line, fetched_at, source))
        .collect()
}

fn parse_line(line: &str, fetched_at: DateTime<Utc>, source: &str) -> Option<CanonicalEvent> {
    let cols: Vec<&str> = line.split('|').map(str::trim).collect();
    if cols.len() <= COL_AUTHOR {
        return None;
    }

    let source_event_id = cols[COL_EVENT_ID];
    if source_event_id.is_empty() {
        return None;
    }

    let origin_time_utc = parse_fdsn_timestamp(cols[COL_TIME])?;

    let latitude: f64 = cols[COL_LAT].parse().ok()?;
    let longitude = normalize_longitude(cols[COL_LON].parse().ok()?);
    let depth_km = if cols[COL_DEPTH].is_empty() {
        0.0
    } else {
        cols[COL_DEPTH].parse().ok()?
    };

    let mag_type = cols
        .get(COL_MAG_TYPE)
        .filter(|s| !s.is_empty())
        .map_or_else(|| "ml".to_string(), |s| s.to_lowercase());
    let magnitude_value = cols
        .get(COL_MAG)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0);

    let author = cols
        .get(COL_AUTHOR)
        .filter(|s| !s.is_empty())
        .map(|s| (*s).to_string());

    let place = cols
        .get(COL_LOCATION)
        .filter(|s| !s.is_empty())
        .map(|s| (*s).to_string());

    Some(CanonicalEvent {
        event_uid: format!("{source}:{source_event_id}"),
        source: source.to_string(),
        source_event_id: source_event_id.to_string(),
        origin_time_utc,
        latitude,
        longitude,
        depth_km,
        magnitude_value,
        magnitude_type: mag_type,
        place: place.clone(),
        region: place,
        lat_error_km: None,
        lon_error_km: None,
        depth_error_km: None,
        mag_error: None,
        time_error_sec: None,
        status: "automatic".to_string(),
        num_phases: None,
        azimuthal_gap: None,
        author,
        url: None,
        fetched_at,
        updated_at: None,
        raw_payload: String::new(),
    })
}

/// Normalize fractional seconds to exactly 6 digits before handing the
/// timestamp to an RFC 3339 parser, matching the reference service's
/// variable-precision output.
fn parse_fdsn_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let normalized = raw.replace('Z', "+00:00");

    let Some(dot_idx) = normalized.find('.') else {
        return DateTime::parse_from_rfc3339(&normalized)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
    };

    let (base, rest) = normalized.split_at(dot_idx);
    let rest = &rest[1..];
    let split_at = rest.find(['+', '-']).unwrap_or(rest.len());
    let (frac, tz_suffix) = rest.split_at(split_at);

    let mut frac = frac.to_string();
    frac.truncate(6);
    while frac.len() < 6 {
        frac.push('0');
    }

    let tz_suffix = if tz_suffix.is_empty() { "+00:00" } else { tz_suffix };
    let normalized = format!("{base}.{frac}{tz_suffix}");

    DateTime::parse_from_rfc3339(&normalized)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "EventID|Time|Latitude|Longitude|Depth/km|Author|Catalog|Contributor|ContributorID|MagType|Magnitude|MagAuthor|EventLocationName";

    #[test]
    fn test_parse_single_line() {
        let payload = format!(
            "{HEADER}\ngfz2024abcd|2024-01-15T12:00:00.5Z|35.8|-120.5|12.3|GFZ|GFZ|GFZ|1|mw|5.2|GFZ|Central California"
        );
        let events = parse(&payload, Utc::now(), "gfz");
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.event_uid, "gfz:gfz2024abcd");
        assert_eq!(e.status, "automatic");
        assert!((e.magnitude_value - 5.2).abs() < 1e-9);
        assert_eq!(e.region.as_deref(), Some("Central California"));
    }

    #[test]
    fn test_skips_header_and_blank_lines() {
        let payload = format!("{HEADER}\n\n   \n# comment");
        assert!(parse(&payload, Utc::now(), "gfz").is_empty());
    }

    #[test]
    fn test_skips_malformed_line() {
        let payload = format!("{HEADER}\nonly|two|fields");
        assert!(parse(&payload, Utc::now(), "gfz").is_empty());
    }

    #[test]
    fn test_longitude_normalized() {
        let payload = format!(
            "{HEADER}\ngfz1|2024-01-15T12:00:00Z|10.0|200.0|5.0|GFZ|||||4.0||Somewhere"
        );
        let events = parse(&payload, Utc::now(), "gfz");
        assert_eq!(events.len(), 1);
        assert!((events[0].longitude - (-160.0)).abs() < 1e-9);
    }

    #[test]
    fn test_fractional_seconds_normalized_to_six_digits() {
        let payload = format!(
            "{HEADER}\ngfz1|2024-01-15T12:00:00.123456789Z|10.0|20.0|5.0|GFZ|||||4.0||Somewhere"
        );
        let events = parse(&payload, Utc::now(), "gfz");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_missing_mag_type_defaults_ml() {
        let payload = format!("{HEADER}\ngfz1|2024-01-15T12:00:00Z|10.0|20.0|5.0|GFZ");
        let events = parse(&payload, Utc::now(), "gfz");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].magnitude_type, "ml");
        assert!((events[0].magnitude_value - 0.0).abs() < 1e-9);
    }
}

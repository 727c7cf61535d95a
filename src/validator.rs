//! Validates canonical events before they enter the raw store.
//!
//! Pure function: `validate(event) -> Vec<String>` (empty = valid). Any
//! non-empty output diverts the record to the dead-letter table.

use chrono::{Duration, Utc};

use crate::models::CanonicalEvent;

const ALLOWED_STATUSES: &[&str] = &["automatic", "reviewed", "deleted"];

/// Tolerance for "not in the future" — catalogs occasionally report an
/// origin time slightly ahead of our clock due to clock skew.
const FUTURE_TOLERANCE: Duration = Duration::hours(1);

/// Validate one canonical event, returning one message per violated rule.
#[must_use]
pub fn validate(event: &CanonicalEvent) -> Vec<String> {
    let mut errors = Vec::new();

    if !(-90.0..=90.0).contains(&event.latitude) {
        errors.push(format!("latitude {} out of range [-90, 90]", event.latitude));
    }

    if !(-180.0..=180.0).contains(&event.longitude) {
        errors.push(format!("longitude {} out of range [-180, 180]", event.longitude));
    }

    if !(-10.0..=800.0).contains(&event.depth_km) {
        errors.push(format!("depth_km {} out of range [-10, 800]", event.depth_km));
    }

    if !(-2.0..=10.0).contains(&event.magnitude_value) {
        errors.push(format!(
            "magnitude_value {} out of range [-2, 10]",
            event.magnitude_value
        ));
    }

    let now = Utc::now();
    if event.origin_time_utc > now + FUTURE_TOLERANCE {
        errors.push(format!(
            "origin_time_utc {} is in the future",
            event.origin_time_utc
        ));
    }

    if !ALLOWED_STATUSES.contains(&event.status.as_str()) {
        errors.push(format!(
            "status '{}' not in (automatic, reviewed, deleted)",
            event.status
        ));
    }

    if event.event_uid.is_empty() {
        errors.push("event_uid is empty".to_string());
    }
    if event.source.is_empty() {
        errors.push("source is empty".to_string());
    }
    if event.source_event_id.is_empty() {
        errors.push("source_event_id is empty".to_string());
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn valid_event() -> CanonicalEvent {
        CanonicalEvent {
            event_uid: "usgs:us1".to_string(),
            source: "usgs".to_string(),
            source_event_id: "us1".to_string(),
            origin_time_utc: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
            latitude: 35.0,
            longitude: -120.0,
            depth_km: 10.0,
            magnitude_value: 5.0,
            magnitude_type: "mw".to_string(),
            place: None,
            region: None,
            lat_error_km: None,
            lon_error_km: None,
            depth_error_km: None,
            mag_error: None,
            time_error_sec: None,
            status: "automatic".to_string(),
            num_phases: None,
            azimuthal_gap: None,
            author: None,
            url: None,
            fetched_at: Utc::now(),
            updated_at: None,
            raw_payload: String::new(),
        }
    }

    #[test]
    fn test_valid_event_has_no_errors() {
        assert!(validate(&valid_event()).is_empty());
    }

    #[test]
    fn test_latitude_out_of_range_is_named() {
        let mut event = valid_event();
        event.latitude = 95.0;
        let errors = validate(&event);
        assert!(errors.iter().any(|e| e.contains("latitude")));
    }

    #[test]
    fn test_longitude_out_of_range_is_named() {
        let mut event = valid_event();
        event.longitude = 200.0;
        let errors = validate(&event);
        assert!(errors.iter().any(|e| e.contains("longitude")));
    }

    #[test]
    fn test_depth_out_of_range_is_named() {
        let mut event = valid_event();
        event.depth_km = 900.0;
        let errors = validate(&event);
        assert!(errors.iter().any(|e| e.contains("depth_km")));
    }

    #[test]
    fn test_magnitude_out_of_range_is_named() {
        let mut event = valid_event();
        event.magnitude_value = 15.0;
        let errors = validate(&event);
        assert!(errors.iter().any(|e| e.contains("magnitude_value")));
    }

    #[test]
    fn test_future_origin_time_is_named() {
        let mut event = valid_event();
        event.origin_time_utc = Utc::now() + Duration::hours(5);
        let errors = validate(&event);
        assert!(errors.iter().any(|e| e.contains("origin_time_utc")));
    }

    #[test]
    fn test_slightly_future_within_tolerance_is_valid() {
        let mut event = valid_event();
        event.origin_time_utc = Utc::now() + Duration::minutes(30);
        assert!(validate(&event).is_empty());
    }

    #[test]
    fn test_invalid_status_is_named() {
        let mut event = valid_event();
        event.status = "bogus".to_string();
        let errors = validate(&event);
        assert!(errors.iter().any(|e| e.contains("status")));
    }

    #[test]
    fn test_empty_required_fields_are_named() {
        let mut event = valid_event();
        event.event_uid.clear();
        event.source.clear();
        event.source_event_id.clear();
        let errors = validate(&event);
        assert!(errors.iter().any(|e| e.contains("event_uid")));
        assert!(errors.iter().any(|e| e.contains("source")));
        assert!(errors.iter().any(|e| e.contains("source_event_id")));
    }
}

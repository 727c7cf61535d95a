//! Canonical data models shared by every source.
//!
//! These are the source-agnostic structures the parsers emit and the
//! validator, clusterer, unifier and warehouse all operate on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One normalized observation of one earthquake by one catalog.
///
/// Identity is `event_uid = "{source}:{source_event_id}"`, globally
/// unique and stable across re-fetches. Never mutated in place once
/// constructed — a re-fetch produces a new value with the same
/// `event_uid`, not an edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub event_uid: String,
    pub source: String,
    pub source_event_id: String,

    pub origin_time_utc: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,

    pub magnitude_value: f64,
    pub magnitude_type: String,

    pub place: Option<String>,
    pub region: Option<String>,

    pub lat_error_km: Option<f64>,
    pub lon_error_km: Option<f64>,
    pub depth_error_km: Option<f64>,
    pub mag_error: Option<f64>,
    pub time_error_sec: Option<f64>,

    pub status: String,
    pub num_phases: Option<i32>,
    pub azimuthal_gap: Option<f64>,

    pub author: Option<String>,
    pub url: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,

    /// Truncated to at most 10,000 characters before it reaches the raw store.
    pub raw_payload: String,
}

/// Maximum length of a raw payload retained in the raw store or a
/// dead-letter row.
pub const MAX_RAW_PAYLOAD_CHARS: usize = 10_000;

/// Truncate a string to at most `MAX_RAW_PAYLOAD_CHARS` characters,
/// respecting UTF-8 boundaries.
#[must_use]
pub fn truncate_payload(raw: &str) -> String {
    match raw.char_indices().nth(MAX_RAW_PAYLOAD_CHARS) {
        Some((byte_idx, _)) => raw[..byte_idx].to_string(),
        None => raw.to_string(),
    }
}

/// A record that entered the pipeline but failed parse or validation.
/// Retained for forensics, excluded from analytics. Terminal: never
/// retried or promoted to a `CanonicalEvent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub source: String,
    pub source_event_id: Option<String>,
    pub raw_payload: String,
    pub error_messages: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl DeadLetterRecord {
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        source_event_id: Option<String>,
        raw_payload: &str,
        error_messages: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            source_event_id,
            raw_payload: truncate_payload(raw_payload),
            error_messages,
            created_at,
        }
    }
}

/// The deduplicated, cross-catalog best estimate of one physical
/// earthquake. Persistent; inserted on first unification, re-upserted on
/// every subsequent cycle with the same `unified_event_id`, never
/// deleted by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedEvent {
    pub unified_event_id: String,

    pub origin_time_utc: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,

    pub magnitude_value: f64,
    pub magnitude_type: String,

    pub place: Option<String>,
    pub region: Option<String>,
    pub status: String,

    pub num_sources: u32,
    pub preferred_source: String,
    pub source_event_uids: Vec<String>,

    pub magnitude_std: f64,
    pub location_spread_km: f64,
    pub source_agreement_score: f64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Terminal status of one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ok,
    Failed,
}

/// One row per invocation, recording outcome and counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLog {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub sources_fetched: Vec<String>,
    pub raw_events_count: u64,
    pub unified_events_count: u64,
    pub dead_letter_count: u64,
    pub error_message: Option<String>,
    pub duration_seconds: f64,
}

/// Maximum length of a run log's error message.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 2_000;

impl RunLog {
    /// Truncate `error_message` to [`MAX_ERROR_MESSAGE_CHARS`], matching
    /// the run log's "never throws from within the log path" contract.
    #[must_use]
    pub fn with_truncated_error(mut self) -> Self {
        if let Some(msg) = &self.error_message {
            if msg.chars().count() > MAX_ERROR_MESSAGE_CHARS {
                self.error_message = Some(truncate_to_chars(msg, MAX_ERROR_MESSAGE_CHARS));
            }
        }
        self
    }
}

fn truncate_to_chars(s: &str, n: usize) -> String {
    match s.char_indices().nth(n) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_event() -> CanonicalEvent {
        CanonicalEvent {
            event_uid: "usgs:us7000test".to_string(),
            source: "usgs".to_string(),
            source_event_id: "us7000test".to_string(),
            origin_time_utc: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
            latitude: 35.8,
            longitude: -120.5,
            depth_km: 12.3,
            magnitude_value: 5.2,
            magnitude_type: "mw".to_string(),
            place: Some("10km NE of Somewhere, CA".to_string()),
            region: Some("CA".to_string()),
            lat_error_km: None,
            lon_error_km: None,
            depth_error_km: None,
            mag_error: None,
            time_error_sec: None,
            status: "reviewed".to_string(),
            num_phases: None,
            azimuthal_gap: None,
            author: Some("us".to_string()),
            url: None,
            fetched_at: Utc.with_ymd_and_hms(2024, 1, 15, 12, 1, 0).unwrap(),
            updated_at: None,
            raw_payload: String::new(),
        }
    }

    #[test]
    fn test_canonical_event_json_round_trip() {
        let event = sample_event();
        let json = serde_json::to_string(&event).expect("serialize");
        let back: CanonicalEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(event, back);
        assert_eq!(back.origin_time_utc.timezone(), Utc);
    }

    #[test]
    fn test_truncate_payload_respects_limit() {
        let long = "x".repeat(MAX_RAW_PAYLOAD_CHARS + 500);
        let truncated = truncate_payload(&long);
        assert_eq!(truncated.chars().count(), MAX_RAW_PAYLOAD_CHARS);
    }

    #[test]
    fn test_truncate_payload_under_limit_unchanged() {
        let short = "short payload";
        assert_eq!(truncate_payload(short), short);
    }

    #[test]
    fn test_dead_letter_truncates_on_construction() {
        let long = "y".repeat(MAX_RAW_PAYLOAD_CHARS + 10);
        let dl = DeadLetterRecord::new("usgs", None, &long, vec!["bad".to_string()], Utc::now());
        assert_eq!(dl.raw_payload.chars().count(), MAX_RAW_PAYLOAD_CHARS);
    }

    #[test]
    fn test_run_log_error_message_truncated() {
        let long_msg = "e".repeat(MAX_ERROR_MESSAGE_CHARS + 100);
        let log = RunLog {
            run_id: "abc12345".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            status: RunStatus::Failed,
            sources_fetched: vec![],
            raw_events_count: 0,
            unified_events_count: 0,
            dead_letter_count: 0,
            error_message: Some(long_msg),
            duration_seconds: 1.0,
        }
        .with_truncated_error();
        assert_eq!(
            log.error_message.unwrap().chars().count(),
            MAX_ERROR_MESSAGE_CHARS
        );
    }
}

//! Greedy chronological clustering of canonical events into groups that
//! represent the same physical earthquake.

use crate::geo::haversine_distance;
use crate::models::CanonicalEvent;

pub const MAX_TIME_DIFF_SEC: f64 = 30.0;
pub const MAX_DISTANCE_KM: f64 = 100.0;
pub const MAX_MAG_DIFF: f64 = 0.5;
pub const MATCH_SCORE_THRESHOLD: f64 = 0.6;

/// A group of canonical events believed to be the same physical earthquake.
///
/// `anchor` is always `members[0]` — the chronologically earliest event,
/// since clusters are built in time order and never reordered.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub members: Vec<CanonicalEvent>,
}

impl Cluster {
    #[must_use]
    pub fn anchor(&self) -> &CanonicalEvent {
        &self.members[0]
    }
}

/// Score the similarity of two events in `[0, 1]`. Any of the three hard
/// cutoffs (time, distance, magnitude) collapses the score to zero before
/// the weighted sum is computed.
#[must_use]
pub fn compute_match_score(a: &CanonicalEvent, b: &CanonicalEvent) -> f64 {
    let dt = (a.origin_time_utc - b.origin_time_utc).num_milliseconds().abs() as f64 / 1000.0;
    if dt > MAX_TIME_DIFF_SEC {
        return 0.0;
    }

    let dist = haversine_distance(a.latitude, a.longitude, b.latitude, b.longitude);
    if dist > MAX_DISTANCE_KM {
        return 0.0;
    }

    let dmag = (a.magnitude_value - b.magnitude_value).abs();
    if dmag > MAX_MAG_DIFF {
        return 0.0;
    }

    0.4 * (1.0 - dt / MAX_TIME_DIFF_SEC).max(0.0)
        + 0.4 * (1.0 - dist / MAX_DISTANCE_KM).max(0.0)
        + 0.2 * (1.0 - dmag / MAX_MAG_DIFF).max(0.0)
}

/// Cluster events by sorting chronologically and greedily attaching each
/// one to the highest-scoring existing cluster whose anchor it matches
/// above [`MATCH_SCORE_THRESHOLD`]. Ties keep the earliest-created
/// cluster, since a strictly-greater comparison preserves insertion order.
#[must_use]
pub fn cluster_events(events: Vec<CanonicalEvent>) -> Vec<Cluster> {
    let mut sorted = events;
    sorted.sort_by_key(|e| e.origin_time_utc);

    let mut clusters: Vec<Cluster> = Vec::new();

    for event in sorted {
        let mut best_index: Option<usize> = None;
        let mut best_score = 0.0_f64;

        for (i, cluster) in clusters.iter().enumerate() {
            let score = compute_match_score(&event, cluster.anchor());
            if score >= MATCH_SCORE_THRESHOLD && score > best_score {
                best_index = Some(i);
                best_score = score;
            }
        }

        match best_index {
            Some(i) => clusters[i].members.push(event),
            None => clusters.push(Cluster { members: vec![event] }),
        }
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn event(source: &str, time_offset_sec: i64, lat: f64, lon: f64, mag: f64) -> CanonicalEvent {
        let base = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        CanonicalEvent {
            event_uid: format!("{source}:e{time_offset_sec}"),
            source: source.to_string(),
            source_event_id: format!("e{time_offset_sec}"),
            origin_time_utc: base + Duration::seconds(time_offset_sec),
            latitude: lat,
            longitude: lon,
            depth_km: 10.0,
            magnitude_value: mag,
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
    fn test_identical_events_score_one() {
        let a = event("usgs", 0, 35.0, -120.0, 5.0);
        let b = event("emsc", 0, 35.0, -120.0, 5.0);
        assert!((compute_match_score(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_time_cutoff_zeroes_score() {
        let a = event("usgs", 0, 35.0, -120.0, 5.0);
        let b = event("emsc", 60, 35.0, -120.0, 5.0);
        assert_eq!(compute_match_score(&a, &b), 0.0);
    }

    #[test]
    fn test_single_source_forms_own_cluster() {
        let events = vec![event("usgs", 0, 35.0, -120.0, 5.0)];
        let clusters = cluster_events(events);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 1);
    }

    #[test]
    fn test_two_sources_same_event_merge() {
        let events = vec![
            event("usgs", 0, 35.0, -120.0, 5.0),
            event("emsc", 5, 35.01, -120.01, 5.1),
        ];
        let clusters = cluster_events(events);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 2);
    }

    #[test]
    fn test_distant_events_form_separate_clusters() {
        let events = vec![
            event("usgs", 0, 35.0, -120.0, 5.0),
            event("emsc", 2, 10.0, 50.0, 5.0),
        ];
        let clusters = cluster_events(events);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_clustering_is_chronologically_sorted_first() {
        let events = vec![
            event("usgs", 10, 35.0, -120.0, 5.0),
            event("emsc", 0, 35.0, -120.0, 5.0),
        ];
        let clusters = cluster_events(events);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].anchor().source, "emsc");
    }
}

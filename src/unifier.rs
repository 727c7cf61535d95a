//! Turns a [`Cluster`] into a single [`UnifiedEvent`]: preferred-member
//! selection, a deterministic identity, a weighted spatial mean, and
//! cross-source agreement metrics.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::clusterer::{compute_match_score, Cluster};
use crate::geo::haversine_distance;
use crate::models::{CanonicalEvent, UnifiedEvent};

/// Select the preferred member of a cluster: reviewed beats automatic;
/// within the same status tier, lowest source-priority rank wins; ties
/// break on the lexicographically smallest `event_uid`.
#[must_use]
pub fn select_preferred<'a>(cluster: &'a Cluster, source_priority: &[&str]) -> &'a CanonicalEvent {
    let reviewed: Vec<&CanonicalEvent> = cluster
        .members
        .iter()
        .filter(|m| m.status == "reviewed")
        .collect();
    let candidates: Vec<&CanonicalEvent> = if reviewed.is_empty() {
        cluster.members.iter().collect()
    } else {
        reviewed
    };

    candidates
        .into_iter()
        .min_by_key(|m| (source_rank(m.source.as_str(), source_priority), m.event_uid.clone()))
        .unwrap_or_else(|| cluster.anchor())
}

fn source_rank(source: &str, source_priority: &[&str]) -> usize {
    source_priority
        .iter()
        .position(|s| *s == source)
        .unwrap_or(source_priority.len())
}

/// Deterministic `unified_event_id`: `"UE-"` followed by the first 16 hex
/// characters of the SHA-256 digest of the cluster's sorted, pipe-joined
/// `event_uid`s. Stable across cycles as long as cluster membership
/// doesn't change.
#[must_use]
pub fn compute_unified_id(cluster: &Cluster) -> String {
    let mut uids: Vec<&str> = cluster.members.iter().map(|m| m.event_uid.as_str()).collect();
    uids.sort_unstable();
    let content = uids.join("|");

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();

    format!("UE-{}", &hex[..16])
}

/// Weighted mean of (latitude, longitude, depth_km). Weight per member is
/// `max(1, |source_priority| - rank)`, so higher-priority sources pull the
/// estimate more without a zero-priority source being excluded entirely.
#[must_use]
pub fn weighted_mean(cluster: &Cluster, source_priority: &[&str]) -> (f64, f64, f64) {
    let mut total_weight = 0.0;
    let mut lat_sum = 0.0;
    let mut lon_sum = 0.0;
    let mut depth_sum = 0.0;

    for member in &cluster.members {
        let rank = source_rank(member.source.as_str(), source_priority);
        #[allow(clippy::cast_precision_loss)]
        let weight = (source_priority.len() as f64 - rank as f64).max(1.0);

        lat_sum += member.latitude * weight;
        lon_sum += member.longitude * weight;
        depth_sum += member.depth_km * weight;
        total_weight += weight;
    }

    if total_weight == 0.0 {
        let anchor = cluster.anchor();
        return (anchor.latitude, anchor.longitude, anchor.depth_km);
    }

    (lat_sum / total_weight, lon_sum / total_weight, depth_sum / total_weight)
}

/// Population standard deviation of member magnitudes.
#[must_use]
pub fn magnitude_std(cluster: &Cluster) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let n = cluster.members.len() as f64;
    if n <= 1.0 {
        return 0.0;
    }
    let mean = cluster.members.iter().map(|m| m.magnitude_value).sum::<f64>() / n;
    let variance = cluster
        .members
        .iter()
        .map(|m| (m.magnitude_value - mean).powi(2))
        .sum::<f64>()
        / n;
    variance.sqrt()
}

/// Maximum pairwise haversine distance among cluster members, in km.
#[must_use]
pub fn location_spread_km(cluster: &Cluster) -> f64 {
    let members = &cluster.members;
    let mut max_dist = 0.0_f64;
    for i in 0..members.len() {
        for j in (i + 1)..members.len() {
            let d = haversine_distance(
                members[i].latitude,
                members[i].longitude,
                members[j].latitude,
                members[j].longitude,
            );
            max_dist = max_dist.max(d);
        }
    }
    max_dist
}

/// Distinct sources / total members. Single-member clusters report `1.0`
/// by convention — there's no disagreement to measure.
#[must_use]
pub fn source_agreement_score(cluster: &Cluster) -> f64 {
    if cluster.members.len() <= 1 {
        return 1.0;
    }
    let mut sources: Vec<&str> = cluster.members.iter().map(|m| m.source.as_str()).collect();
    sources.sort_unstable();
    sources.dedup();
    #[allow(clippy::cast_precision_loss)]
    let score = sources.len() as f64 / cluster.members.len() as f64;
    score
}

/// Build a [`UnifiedEvent`] from a cluster.
#[must_use]
pub fn unify(cluster: &Cluster, source_priority: &[&str], now: DateTime<Utc>) -> UnifiedEvent {
    let preferred = select_preferred(cluster, source_priority);
    let unified_event_id = compute_unified_id(cluster);
    let (latitude, longitude, depth_km) = weighted_mean(cluster, source_priority);

    let mut sources: Vec<&str> = cluster.members.iter().map(|m| m.source.as_str()).collect();
    sources.sort_unstable();
    sources.dedup();

    let mut source_event_uids: Vec<String> =
        cluster.members.iter().map(|m| m.event_uid.clone()).collect();
    source_event_uids.sort_unstable();

    UnifiedEvent {
        unified_event_id,
        origin_time_utc: preferred.origin_time_utc,
        latitude,
        longitude,
        depth_km,
        magnitude_value: preferred.magnitude_value,
        magnitude_type: preferred.magnitude_type.clone(),
        place: preferred.place.clone(),
        region: preferred.region.clone(),
        status: preferred.status.clone(),
        #[allow(clippy::cast_possible_truncation)]
        num_sources: sources.len() as u32,
        preferred_source: preferred.source.clone(),
        source_event_uids,
        magnitude_std: magnitude_std(cluster),
        location_spread_km: location_spread_km(cluster),
        source_agreement_score: source_agreement_score(cluster),
        created_at: now,
        updated_at: now,
    }
}

/// Per-member match score against the cluster's preferred event, used for
/// the crosswalk table. The preferred member always scores `1.0`.
#[must_use]
pub fn crosswalk_score(member: &CanonicalEvent, preferred: &CanonicalEvent) -> f64 {
    if member.event_uid == preferred.event_uid {
        1.0
    } else {
        compute_match_score(member, preferred)
    }
}

//! Orchestrates one end-to-end ingestion cycle: fetch every enabled
//! source concurrently, parse, validate, persist raw events, cluster
//! against recent history, unify, and upsert — recording a run log row
//! regardless of outcome.

use chrono::{Duration, Utc};
use futures::future::join_all;
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::client::FdsnClient;
use crate::clusterer::cluster_events;
use crate::config::Config;
use crate::errors::PipelineError;
use crate::models::{CanonicalEvent, DeadLetterRecord, RunLog, RunStatus};
use crate::parsers;
use crate::sources::{self, SourceConfig};
use crate::unifier::unify;
use crate::validator::validate;

/// Summary of one completed cycle, returned to the HTTP trigger handler.
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub run_id: String,
    pub sources_fetched: Vec<String>,
    pub raw_events_count: u64,
    pub unified_events_count: u64,
    pub dead_letter_count: u64,
    pub duration_seconds: f64,
}

/// Run one full ingestion cycle.
///
/// # Errors
///
/// Returns [`PipelineError::AllSourcesFailed`] if every configured
/// source's fetch failed — the only condition that fails the cycle.
/// Per-source fetch failures, per-record parse/validation failures, and
/// warehouse writes are otherwise absorbed into counters and the dead
/// letter table; the run log is always written, including on failure.
pub async fn run_cycle(
    pool: &PgPool,
    registry: &[SourceConfig],
    config: &Config,
) -> Result<CycleSummary, PipelineError> {
    let run_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    let started_at = Utc::now();
    let t0 = std::time::Instant::now();

    let window_start = started_at - Duration::minutes(config.fetch_window_minutes);

    info!(run_id, %window_start, now = %started_at, "pipeline cycle starting");

    let enabled: Vec<&SourceConfig> = sources::enabled(registry).collect();
    let fetches = enabled.iter().map(|source| {
        let source = (*source).clone();
        let window_start = window_start;
        let now = started_at;
        let min_magnitude = config.min_magnitude;
        async move {
            let client = FdsnClient::new(source.clone())?;
            client
                .fetch_events(window_start, now, min_magnitude)
                .await
                .map(|body| (source.name, body))
        }
    });

    let results = join_all(fetches).await;

    let mut raw_data: Vec<(&'static str, String)> = Vec::new();
    let mut fetch_errors: Vec<String> = Vec::new();

    for result in results {
        match result {
            Ok((name, body)) => raw_data.push((name, body)),
            Err(e) => {
                error!(source = e.source, "fetch failed: {}", e.reason);
                fetch_errors.push(format!("{}: {}", e.source, e.reason));
            }
        }
    }

    if raw_data.is_empty() {
        let duration = t0.elapsed().as_secs_f64();
        let log = RunLog {
            run_id: run_id.clone(),
            started_at,
            finished_at: Utc::now(),
            status: RunStatus::Failed,
            sources_fetched: vec![],
            raw_events_count: 0,
            unified_events_count: 0,
            dead_letter_count: 0,
            error_message: Some(format!("all sources failed: {fetch_errors:?}")),
            duration_seconds: duration,
        }
        .with_truncated_error();

        if let Err(e) = crate::warehouse::log_pipeline_run(pool, &log).await {
            error!("failed to write run log: {e}");
        }

        return Err(PipelineError::AllSourcesFailed(fetch_errors));
    }

    let sources_fetched: Vec<String> = raw_data.iter().map(|(name, _)| (*name).to_string()).collect();

    let mut accepted: Vec<CanonicalEvent> = Vec::new();
    let mut dead_letters: Vec<DeadLetterRecord> = Vec::new();

    for (name, raw_text) in &raw_data {
        if raw_text.trim().is_empty() {
            continue;
        }

        let Some(source_cfg) = sources::lookup(registry, name) else {
            warn!(source = name, "no registered source config for fetched payload");
            continue;
        };

        let parsed = match parsers::dispatch(source_cfg.format, name, raw_text, started_at) {
            Ok(events) => events,
            Err(e) => {
                error!(source = name, "envelope parse error: {}", e.reason);
                dead_letters.push(DeadLetterRecord::new(
                    (*name).to_string(),
                    None,
                    raw_text,
                    vec![format!("envelope parse error: {}", e.reason)],
                    started_at,
                ));
                continue;
            }
        };

        for event in parsed {
            let errors = validate(&event);
            if errors.is_empty() {
                accepted.push(event);
            } else {
                dead_letters.push(DeadLetterRecord::new(
                    event.source.clone(),
                    Some(event.source_event_id.clone()),
                    &event.raw_payload,
                    errors,
                    started_at,
                ));
            }
        }
    }

    info!(
        run_id,
        accepted = accepted.len(),
        dead_lettered = dead_letters.len(),
        "parsed and validated"
    );

    let raw_events_count = match crate::warehouse::insert_raw_events(pool, &accepted).await {
        Ok(n) => n,
        Err(e) => return Err(PipelineError::WarehouseUnavailable(e)),
    };

    if !dead_letters.is_empty() {
        if let Err(e) = crate::warehouse::insert_dead_letters(pool, &dead_letters).await {
            error!("failed to write dead letters: {e}");
        }
    }

    let mut history = crate::warehouse::query_recent_raw_events(pool, config.dedup_lookback_hours)
        .await
        .map_err(PipelineError::WarehouseUnavailable)?;

    let mut seen: std::collections::HashSet<String> =
        history.iter().map(|e| e.event_uid.clone()).collect();
    for event in &accepted {
        if seen.insert(event.event_uid.clone()) {
            history.push(event.clone());
        }
    }

    let clusters = cluster_events(history);
    let now = Utc::now();
    let unified: Vec<_> = clusters
        .iter()
        .map(|cluster| unify(cluster, sources::SOURCE_PRIORITY, now))
        .collect();

    let unified_events_count = crate::warehouse::merge_unified_events(pool, &unified)
        .await
        .map_err(PipelineError::WarehouseUnavailable)?;

    let duration = t0.elapsed().as_secs_f64();
    let log = RunLog {
        run_id: run_id.clone(),
        started_at,
        finished_at: Utc::now(),
        status: RunStatus::Ok,
        sources_fetched: sources_fetched.clone(),
        raw_events_count,
        unified_events_count,
        dead_letter_count: dead_letters.len() as u64,
        error_message: None,
        duration_seconds: duration,
    };

    if let Err(e) = crate::warehouse::log_pipeline_run(pool, &log).await {
        error!("failed to write run log: {e}");
    }

    info!(run_id, duration, "pipeline cycle complete");

    Ok(CycleSummary {
        run_id,
        sources_fetched,
        raw_events_count,
        unified_events_count,
        dead_letter_count: dead_letters.len() as u64,
        duration_seconds: duration,
    })
}

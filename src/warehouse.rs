//! Postgres-backed persistence for the pipeline's warehouse tables.
//!
//! Stands in for the reference system's BigQuery MERGE/stream-insert
//! pair: `sqlx` plus `INSERT ... ON CONFLICT ... DO UPDATE` gives the
//! same idempotent-upsert contract without a BigQuery client in reach.
//! Uses runtime-checked queries (`sqlx::query`/`query_as`, not the
//! `query!` macros) since there is no live database to check against at
//! build time.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use crate::models::{CanonicalEvent, DeadLetterRecord, RunLog, RunStatus, UnifiedEvent};

/// Open a connection pool against `database_url`.
///
/// # Errors
///
/// Returns the underlying `sqlx::Error` if the pool cannot be established.
pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run the warehouse's schema migrations.
///
/// # Errors
///
/// Returns the underlying `sqlx::Error` on failure.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Append-only insert of canonical events into `raw_events`.
///
/// Duplicates across cycles are expected and tolerated here; the
/// clusterer's recent-events query dedups by `event_uid` at read time.
///
/// # Errors
///
/// Returns the underlying `sqlx::Error` on failure.
pub async fn insert_raw_events(pool: &PgPool, events: &[CanonicalEvent]) -> Result<u64, sqlx::Error> {
    if events.is_empty() {
        return Ok(0);
    }

    let ingested_at = Utc::now();
    let mut inserted = 0_u64;

    let mut tx = pool.begin().await?;
    for event in events {
        sqlx::query(
            r"
            INSERT INTO raw_events (
                event_uid, source, source_event_id, origin_time_utc,
                latitude, longitude, depth_km, magnitude_value, magnitude_type,
                place, region, status, lat_error_km, lon_error_km, depth_error_km,
                mag_error, time_error_sec, num_phases, azimuthal_gap, author, url,
                fetched_at, updated_at, ingested_at, raw_payload
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22, $23, $24, $25
            )
            ",
        )
        .bind(&event.event_uid)
        .bind(&event.source)
        .bind(&event.source_event_id)
        .bind(event.origin_time_utc)
        .bind(event.latitude)
        .bind(event.longitude)
        .bind(event.depth_km)
        .bind(event.magnitude_value)
        .bind(&event.magnitude_type)
        .bind(&event.place)
        .bind(&event.region)
        .bind(&event.status)
        .bind(event.lat_error_km)
        .bind(event.lon_error_km)
        .bind(event.depth_error_km)
        .bind(event.mag_error)
        .bind(event.time_error_sec)
        .bind(event.num_phases)
        .bind(event.azimuthal_gap)
        .bind(&event.author)
        .bind(&event.url)
        .bind(event.fetched_at)
        .bind(event.updated_at)
        .bind(ingested_at)
        .bind(&event.raw_payload)
        .execute(&mut *tx)
        .await?;
        inserted += 1;
    }
    tx.commit().await?;

    Ok(inserted)
}

#[derive(Debug, FromRow)]
struct RawEventRow {
    event_uid: String,
    source: String,
    source_event_id: String,
    origin_time_utc: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    depth_km: f64,
    magnitude_value: f64,
    magnitude_type: String,
    place: Option<String>,
    region: Option<String>,
    status: String,
    lat_error_km: Option<f64>,
    lon_error_km: Option<f64>,
    depth_error_km: Option<f64>,
    mag_error: Option<f64>,
    time_error_sec: Option<f64>,
    num_phases: Option<i32>,
    azimuthal_gap: Option<f64>,
    author: Option<String>,
    url: Option<String>,
    fetched_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<RawEventRow> for CanonicalEvent {
    fn from(row: RawEventRow) -> Self {
        Self {
            event_uid: row.event_uid,
            source: row.source,
            source_event_id: row.source_event_id,
            origin_time_utc: row.origin_time_utc,
            latitude: row.latitude,
            longitude: row.longitude,
            depth_km: row.depth_km,
            magnitude_value: row.magnitude_value,
            magnitude_type: row.magnitude_type,
            place: row.place,
            region: row.region,
            lat_error_km: row.lat_error_km,
            lon_error_km: row.lon_error_km,
            depth_error_km: row.depth_error_km,
            mag_error: row.mag_error,
            time_error_sec: row.time_error_sec,
            status: row.status,
            num_phases: row.num_phases,
            azimuthal_gap: row.azimuthal_gap,
            author: row.author,
            url: row.url,
            fetched_at: row.fetched_at,
            updated_at: row.updated_at,
            raw_payload: String::new(),
        }
    }
}

/// Read the most recent row per `event_uid` within the lookback window,
/// the context the clusterer needs to merge new events against history.
///
/// # Errors
///
/// Returns the underlying `sqlx::Error` on failure.
pub async fn query_recent_raw_events(
    pool: &PgPool,
    lookback_hours: i64,
) -> Result<Vec<CanonicalEvent>, sqlx::Error> {
    let rows: Vec<RawEventRow> = sqlx::query_as(
        r"
        SELECT DISTINCT ON (event_uid)
            event_uid, source, source_event_id, origin_time_utc,
            latitude, longitude, depth_km, magnitude_value, magnitude_type,
            place, region, status, lat_error_km, lon_error_km, depth_error_km,
            mag_error, time_error_sec, num_phases, azimuthal_gap, author, url,
            fetched_at, updated_at
        FROM raw_events
        WHERE origin_time_utc >= NOW() - ($1 || ' hours')::interval
        ORDER BY event_uid, fetched_at DESC
        ",
    )
    .bind(lookback_hours.to_string())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(CanonicalEvent::from).collect())
}

/// Idempotently upsert unified events. Re-running with the same cluster
/// contents is a no-op beyond `updated_at`.
///
/// # Errors
///
/// Returns the underlying `sqlx::Error` on failure.
pub async fn merge_unified_events(pool: &PgPool, unified: &[UnifiedEvent]) -> Result<u64, sqlx::Error> {
    if unified.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    for u in unified {
        sqlx::query(
            r"
            INSERT INTO unified_events (
                unified_event_id, origin_time_utc, latitude, longitude, depth_km,
                magnitude_value, magnitude_type, place, region, status,
                num_sources, preferred_source, source_event_uids,
                magnitude_std, location_spread_km, source_agreement_score,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (unified_event_id) DO UPDATE SET
                origin_time_utc = EXCLUDED.origin_time_utc,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                depth_km = EXCLUDED.depth_km,
                magnitude_value = EXCLUDED.magnitude_value,
                magnitude_type = EXCLUDED.magnitude_type,
                place = EXCLUDED.place,
                region = EXCLUDED.region,
                status = EXCLUDED.status,
                num_sources = EXCLUDED.num_sources,
                preferred_source = EXCLUDED.preferred_source,
                source_event_uids = EXCLUDED.source_event_uids,
                magnitude_std = EXCLUDED.magnitude_std,
                location_spread_km = EXCLUDED.location_spread_km,
                source_agreement_score = EXCLUDED.source_agreement_score,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(&u.unified_event_id)
        .bind(u.origin_time_utc)
        .bind(u.latitude)
        .bind(u.longitude)
        .bind(u.depth_km)
        .bind(u.magnitude_value)
        .bind(&u.magnitude_type)
        .bind(&u.place)
        .bind(&u.region)
        .bind(&u.status)
        .bind(i64::from(u.num_sources))
        .bind(&u.preferred_source)
        .bind(&u.source_event_uids)
        .bind(u.magnitude_std)
        .bind(u.location_spread_km)
        .bind(u.source_agreement_score)
        .bind(u.created_at)
        .bind(u.updated_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    #[allow(clippy::cast_possible_truncation)]
    Ok(unified.len() as u64)
}

/// Insert dead-lettered records. Terminal: never read back by the
/// pipeline, forensics-only.
///
/// # Errors
///
/// Returns the underlying `sqlx::Error` on failure.
pub async fn insert_dead_letters(pool: &PgPool, records: &[DeadLetterRecord]) -> Result<(), sqlx::Error> {
    if records.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for record in records {
        sqlx::query(
            r"
            INSERT INTO dead_letter_events (source, source_event_id, raw_payload, error_messages, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&record.source)
        .bind(&record.source_event_id)
        .bind(&record.raw_payload)
        .bind(&record.error_messages)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(())
}

/// Write one run log row. Never propagates a failure into the pipeline's
/// result — a run-log write failure is logged and swallowed by the
/// caller, matching the reference implementation's "never throws" note.
///
/// # Errors
///
/// Returns the underlying `sqlx::Error` on failure; callers are expected
/// to log and ignore it rather than fail the cycle over it.
pub async fn log_pipeline_run(pool: &PgPool, log: &RunLog) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        INSERT INTO pipeline_runs (
            run_id, started_at, finished_at, status, sources_fetched,
            raw_events_count, unified_events_count, dead_letter_count,
            error_message, duration_seconds
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ",
    )
    .bind(&log.run_id)
    .bind(log.started_at)
    .bind(log.finished_at)
    .bind(match log.status {
        RunStatus::Ok => "ok",
        RunStatus::Failed => "failed",
    })
    .bind(&log.sources_fetched)
    .bind(i64::try_from(log.raw_events_count).unwrap_or(i64::MAX))
    .bind(i64::try_from(log.unified_events_count).unwrap_or(i64::MAX))
    .bind(i64::try_from(log.dead_letter_count).unwrap_or(i64::MAX))
    .bind(&log.error_message)
    .bind(log.duration_seconds)
    .execute(pool)
    .await?;

    Ok(())
}

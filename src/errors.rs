//! Error types for the ingestion pipeline.
//!
//! Uses `thiserror` for library-style error definitions, one enum per
//! failure domain rather than a single catch-all.

use thiserror::Error;

/// Errors that can occur while fetching a single source.
///
/// Carries enough context for the run log and for the pipeline's
/// "source omitted from cycle" logging.
#[derive(Error, Debug)]
#[error("source '{source}' fetch failed after {attempts} attempt(s): {reason}")]
pub struct FetchError {
    pub source: String,
    pub last_status: Option<u16>,
    pub attempts: u32,
    pub reason: String,
}

/// Errors raised while parsing one source's whole response envelope.
///
/// Per-record parse failures are never raised; they're skipped silently
/// at the parser level. Only an unparseable envelope (malformed JSON,
/// missing `features` array) becomes this.
#[derive(Error, Debug)]
#[error("source '{source}' envelope could not be parsed: {reason}")]
pub struct EnvelopeParseError {
    pub source: String,
    pub reason: String,
}

/// Top-level pipeline failures.
///
/// Only these variants fail a cycle and surface as an HTTP 500 from the
/// trigger handler; everything else (per-source fetch failure, per-record
/// validation failure, run-log write failure) is absorbed into counters
/// and the dead-letter table.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("all sources failed: {0:?}")]
    AllSourcesFailed(Vec<String>),

    #[error("warehouse unavailable: {0}")]
    WarehouseUnavailable(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

//! One parser per payload dialect, dispatched by [`crate::sources::FormatTag`].
//!
//! Every parser implements the same contract:
//! `parse(raw_text, fetched_at, source) -> Vec<CanonicalEvent>`, never
//! raising on a per-record error — a bad record is skipped silently. A
//! whole-payload failure (unparseable envelope) is the only thing that
//! becomes an [`EnvelopeParseError`](crate::errors::EnvelopeParseError).

mod emsc;
mod fdsn_text;
mod usgs;

use chrono::{DateTime, Utc};

use crate::errors::EnvelopeParseError;
use crate::models::CanonicalEvent;
use crate::sources::FormatTag;

/// Parse a source's raw response body into canonical events, dispatching
/// on its configured format tag.
///
/// # Errors
///
/// Returns [`EnvelopeParseError`] if the whole payload is unparseable
/// (e.g. malformed JSON for a GeoJSON dialect). Individual malformed
/// records within an otherwise-valid payload are skipped, not raised.
pub fn dispatch(
    format: FormatTag,
    source: &str,
    raw_text: &str,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<CanonicalEvent>, EnvelopeParseError> {
    match format {
        FormatTag::GeoJsonUsgs => usgs::parse(raw_text, fetched_at),
        FormatTag::GeoJsonEmsc => emsc::parse(raw_text, fetched_at),
        FormatTag::FdsnText => Ok(fdsn_text::parse(raw_text, fetched_at, source)),
    }
}

/// Extract the last comma-separated token of a place string as its region.
///
/// `"10km NE of Somewhere, CA"` -> `Some("CA")`. A place with no comma
/// has no discernible region and maps to the place itself, matching the
/// reference implementation.
pub(crate) fn extract_region(place: Option<&str>) -> Option<String> {
    let place = place?;
    let parts: Vec<&str> = place.split(", ").collect();
    if parts.len() > 1 {
        parts.last().map(|s| (*s).to_string())
    } else {
        Some(place.to_string())
    }
}

//! Source registry — static, process-wide configuration for each FDSN peer.
//!
//! No runtime mutation: the registry is built once and enumerated by the
//! fetcher each cycle. Mirrors the teacher's `FeedType` enum-of-constants
//! style, generalized to a data table since sources now carry per-source
//! rate limits, retry policy, and a format tag instead of being a fixed
//! compile-time enum of USGS-only feed names.

/// Payload dialect a source speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatTag {
    /// USGS-flavored GeoJSON (`properties.time` in ms, `magType`, ...).
    GeoJsonUsgs,
    /// EMSC/SeismicPortal-flavored GeoJSON (`unid`, `flynn_region`, ...).
    GeoJsonEmsc,
    /// FDSN pipe-delimited text.
    FdsnText,
}

impl FormatTag {
    /// The `format` query parameter FDSN expects for this dialect.
    #[must_use]
    pub const fn query_param(self) -> &'static str {
        match self {
            Self::GeoJsonUsgs | Self::GeoJsonEmsc => "geojson",
            Self::FdsnText => "text",
        }
    }
}

/// Static configuration for a single earthquake data source.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub name: &'static str,
    pub base_url: &'static str,
    pub poll_interval_seconds: u64,
    pub max_retries: u32,
    pub retry_backoff_base: f64,
    pub rate_limit_rpm: u32,
    pub timeout_seconds: u64,
    pub format: FormatTag,
    pub enabled: bool,
}

impl SourceConfig {
    /// `min_interval = 60 / rate_limit_rpm`, per the fetcher's token-bucket contract.
    #[must_use]
    pub fn min_interval_seconds(&self) -> f64 {
        60.0 / f64::from(self.rate_limit_rpm.max(1))
    }
}

/// Default source priority: lower index wins ties in the unifier.
pub const SOURCE_PRIORITY: &[&str] = &["usgs", "emsc", "gfz"];

/// The default source registry (USGS, EMSC, GFZ GEOFON).
///
/// Additional FDSN peers may be registered with the same contract by
/// extending this slice; every enabled source here must have a matching
/// parser in [`crate::parsers::dispatch`].
#[must_use]
pub fn default_registry() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            name: "usgs",
            base_url: "https://earthquake.usgs.gov/fdsnws/event/1/query",
            poll_interval_seconds: 60,
            max_retries: 3,
            retry_backoff_base: 2.0,
            rate_limit_rpm: 30,
            timeout_seconds: 15,
            format: FormatTag::GeoJsonUsgs,
            enabled: true,
        },
        SourceConfig {
            name: "emsc",
            base_url: "https://seismicportal.eu/fdsnws/event/1/query",
            poll_interval_seconds: 120,
            max_retries: 3,
            retry_backoff_base: 2.0,
            rate_limit_rpm: 20,
            timeout_seconds: 20,
            format: FormatTag::GeoJsonEmsc,
            enabled: true,
        },
        SourceConfig {
            name: "gfz",
            base_url: "https://geofon.gfz.de/fdsnws/event/1/query",
            poll_interval_seconds: 180,
            max_retries: 3,
            retry_backoff_base: 2.0,
            rate_limit_rpm: 10,
            timeout_seconds: 20,
            format: FormatTag::FdsnText,
            enabled: true,
        },
    ]
}

/// Look up a source by name within a registry.
#[must_use]
pub fn lookup<'a>(registry: &'a [SourceConfig], name: &str) -> Option<&'a SourceConfig> {
    registry.iter().find(|s| s.name == name)
}

/// Enumerate the enabled sources of a registry.
pub fn enabled(registry: &[SourceConfig]) -> impl Iterator<Item = &SourceConfig> {
    registry.iter().filter(|s| s.enabled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_has_three_sources() {
        let registry = default_registry();
        assert_eq!(registry.len(), 3);
        assert!(lookup(&registry, "usgs").is_some());
        assert!(lookup(&registry, "emsc").is_some());
        assert!(lookup(&registry, "gfz").is_some());
    }

    #[test]
    fn test_min_interval() {
        let registry = default_registry();
        let usgs = lookup(&registry, "usgs").unwrap();
        assert!((usgs.min_interval_seconds() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_enabled_have_unique_names() {
        let registry = default_registry();
        let names: Vec<&str> = enabled(&registry).map(|s| s.name).collect();
        let mut unique = names.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(names.len(), unique.len());
    }
}

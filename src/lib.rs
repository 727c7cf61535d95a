//! Multi-source seismic event ingestion and reconciliation pipeline.
//!
//! Fetches events from FDSN-compliant catalogs (USGS, EMSC, GFZ GEOFON),
//! normalizes, validates, clusters near-duplicate reports of the same
//! physical earthquake across sources, and upserts the result into a
//! Postgres warehouse. Exposed as a library so integration tests can
//! drive the parsing/clustering/unification pipeline directly, and as a
//! binary (`main.rs`) that wires it to an HTTP trigger surface.

pub mod client;
pub mod clusterer;
pub mod config;
pub mod errors;
pub mod geo;
pub mod models;
pub mod parsers;
pub mod pipeline;
pub mod server;
pub mod sources;
pub mod unifier;
pub mod validator;
pub mod warehouse;

//! Tairis: nearby medical facility discovery and red-flag safety triage.
//!
//! Two halves:
//!
//! - [`discovery`] finds facilities around a point through an Overpass →
//!   Nominatim provider chain, normalizes them, sorts by distance and caches
//!   the result under a quantized key.
//! - [`safety`] and [`triage`] classify free text for life-threatening
//!   phrases locally, answering with an emergency-call response before any
//!   remote reasoning call is made.

pub mod config;
pub mod discovery;
pub mod geo;
pub mod safety;
pub mod server;
pub mod triage;

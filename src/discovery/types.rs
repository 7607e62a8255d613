//! Core types for the facility discovery subsystem.

use crate::geo::Coordinates;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Which provider produced a facility record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacilitySource {
    /// Overpass API (primary).
    Overpass,
    /// Nominatim search (fallback).
    Nominatim,
}

impl FacilitySource {
    /// Prefix used when building facility ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Overpass => "overpass",
            Self::Nominatim => "nominatim",
        }
    }
}

impl fmt::Display for FacilitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overpass => write!(f, "Overpass"),
            Self::Nominatim => write!(f, "Nominatim"),
        }
    }
}

/// A medical facility normalized from any provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    /// Source-prefixed id, e.g. `overpass-123456`.
    pub id: String,
    pub name: String,
    /// Free-form category (hospital, clinic, pharmacy...).
    #[serde(rename = "type")]
    pub kind: String,
    pub coords: Coordinates,
    #[serde(default)]
    pub phone: Option<String>,
    /// Distance from the query point in meters.
    pub distance_m: f64,
    pub source: FacilitySource,
    /// Title-cased, de-duplicated service names.
    #[serde(default)]
    pub services: Vec<String>,
    /// Provider tags, passed through untouched.
    #[serde(default)]
    pub raw_tags: BTreeMap<String, String>,
}

/// A discovery request.
#[derive(Debug, Clone, PartialEq)]
pub struct PoiQuery {
    pub origin: Coordinates,
    pub radius_m: u32,
    pub category: String,
}

impl PoiQuery {
    pub const DEFAULT_RADIUS_M: u32 = 5000;
    pub const DEFAULT_CATEGORY: &'static str = "medical";

    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            origin: Coordinates::new(lat, lon),
            radius_m: Self::DEFAULT_RADIUS_M,
            category: Self::DEFAULT_CATEGORY.to_string(),
        }
    }

    pub fn with_radius(mut self, radius_m: u32) -> Self {
        self.radius_m = radius_m;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn validate(&self) -> Result<(), InputError> {
        if !self.origin.is_valid() {
            return Err(InputError::InvalidCoordinates {
                lat: self.origin.lat,
                lon: self.origin.lon,
            });
        }
        if self.radius_m == 0 {
            return Err(InputError::InvalidRadius(self.radius_m));
        }
        if self.category.trim().is_empty() {
            return Err(InputError::MissingField("category"));
        }
        Ok(())
    }
}

/// Rejected caller input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("Invalid coordinates ({lat}, {lon}). Lat: -90..90, Lon: -180..180")]
    InvalidCoordinates { lat: f64, lon: f64 },
    #[error("Invalid search radius: {0} m")]
    InvalidRadius(u32),
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),
}

/// A single provider call failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("{provider} network error: {message}")]
    Network { provider: &'static str, message: String },
    #[error("{provider} returned HTTP {status}")]
    Status { provider: &'static str, status: u16 },
    #[error("{provider} rate limit exceeded (429)")]
    RateLimited { provider: &'static str },
    #[error("{provider} returned an invalid response: {message}")]
    InvalidResponse { provider: &'static str, message: String },
}

impl ProviderError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// One entry of an aggregate failure report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub message: String,
    pub rate_limited: bool,
}

impl From<&ProviderError> for ProviderFailure {
    fn from(err: &ProviderError) -> Self {
        let provider = match err {
            ProviderError::Network { provider, .. }
            | ProviderError::Status { provider, .. }
            | ProviderError::RateLimited { provider }
            | ProviderError::InvalidResponse { provider, .. } => *provider,
        };
        Self {
            provider: provider.to_string(),
            message: err.to_string(),
            rate_limited: err.is_rate_limited(),
        }
    }
}

/// Discovery failed as a whole.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("All facility providers failed: {}", summarize(.failures))]
    AllProvidersFailed { failures: Vec<ProviderFailure> },
}

fn summarize(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(|f| f.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

//! POI providers: Overpass API (primary) and Nominatim search (fallback).
//!
//! Each provider implements [`PoiProvider`] and hands back its own record
//! type wrapped in [`RawPoi`]; turning those into [`Facility`] values is the
//! normalizer's job.
//!
//! [`Facility`]: super::types::Facility

use super::types::{PoiQuery, ProviderError};
use crate::config::Settings;
use crate::geo::Coordinates;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// A source of raw points of interest near a location.
pub trait PoiProvider: Send + Sync {
    /// Short provider name used in logs and failure reports.
    fn name(&self) -> &'static str;

    /// Search for POIs around the query point. One request, no retries.
    fn search(&self, query: &PoiQuery) -> Result<Vec<RawPoi>, ProviderError>;
}

/// A provider record before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPoi {
    Overpass(OverpassElement),
    Nominatim(NominatimPlace),
}

// ─── Overpass ───────────────────────────────────────────────────

pub const OVERPASS_NAME: &str = "overpass";

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct OverpassCenter {
    pub lat: f64,
    pub lon: f64,
}

/// One element of an Overpass `out center tags` response.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct OverpassElement {
    pub id: i64,
    #[serde(default, rename = "type")]
    pub element_type: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    /// Present for ways and relations.
    #[serde(default)]
    pub center: Option<OverpassCenter>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Map a discovery category onto an Overpass `amenity` regex.
pub fn amenity_filter(category: &str) -> &'static str {
    match category.trim().to_lowercase().as_str() {
        "hospital" => "hospital",
        "clinic" => "clinic",
        "pharmacy" => "pharmacy",
        "doctors" | "doctor" => "doctors",
        "dentist" => "dentist",
        _ => "hospital|clinic|pharmacy|doctors",
    }
}

/// Build the Overpass QL query for a discovery request.
pub fn overpass_query(query: &PoiQuery) -> String {
    let filter = amenity_filter(&query.category);
    let around = format!(
        "around:{},{},{}",
        query.radius_m, query.origin.lat, query.origin.lon
    );
    format!(
        "[out:json][timeout:25];\n(\n  node[\"amenity\"~\"{f}\"]({a});\n  way[\"amenity\"~\"{f}\"]({a});\n  relation[\"amenity\"~\"{f}\"]({a});\n);\nout center tags;",
        f = filter,
        a = around,
    )
}

/// Pull the `elements` array out of an Overpass response.
///
/// Elements that fail to deserialize are skipped rather than failing the batch.
pub fn parse_overpass_response(body: Value) -> Result<Vec<OverpassElement>, ProviderError> {
    let elements = match body {
        Value::Object(mut map) => match map.remove("elements") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(ProviderError::InvalidResponse {
                    provider: OVERPASS_NAME,
                    message: "missing 'elements' array".into(),
                })
            }
        },
        _ => {
            return Err(ProviderError::InvalidResponse {
                provider: OVERPASS_NAME,
                message: "expected a JSON object".into(),
            })
        }
    };

    Ok(elements
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(el) => Some(el),
            Err(e) => {
                debug!(provider = OVERPASS_NAME, error = %e, "skipping malformed element");
                None
            }
        })
        .collect())
}

/// Primary provider backed by the Overpass interpreter endpoint.
pub struct OverpassProvider {
    agent: ureq::Agent,
    endpoint: String,
}

impl OverpassProvider {
    pub fn new(endpoint: impl Into<String>, user_agent: &str, timeout: Duration) -> Self {
        Self {
            agent: build_agent(user_agent, timeout),
            endpoint: endpoint.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.overpass_url.clone(),
            &settings.user_agent,
            settings.provider_timeout(),
        )
    }
}

impl PoiProvider for OverpassProvider {
    fn name(&self) -> &'static str {
        OVERPASS_NAME
    }

    fn search(&self, query: &PoiQuery) -> Result<Vec<RawPoi>, ProviderError> {
        let ql = overpass_query(query);
        let response = self
            .agent
            .post(&self.endpoint)
            .send_form(&[("data", ql.as_str())])
            .map_err(|e| map_http_error(OVERPASS_NAME, e))?;

        let body: Value = response.into_json().map_err(|e| ProviderError::InvalidResponse {
            provider: OVERPASS_NAME,
            message: e.to_string(),
        })?;

        Ok(parse_overpass_response(body)?
            .into_iter()
            .map(RawPoi::Overpass)
            .collect())
    }
}

// ─── Nominatim ──────────────────────────────────────────────────

pub const NOMINATIM_NAME: &str = "nominatim";

/// Half-width of the search box around the query point, in degrees (~11 km).
const VIEWBOX_HALF_DEG: f64 = 0.1;

/// One Nominatim search result (`format=json`).
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct NominatimPlace {
    pub place_id: u64,
    pub lat: String,
    pub lon: String,
    #[serde(default, rename = "type")]
    pub place_type: Option<String>,
    #[serde(default, rename = "class")]
    pub place_class: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub extratags: Option<BTreeMap<String, String>>,
}

/// `left,top,right,bottom` box around a point.
pub fn viewbox(origin: &Coordinates) -> String {
    format!(
        "{},{},{},{}",
        origin.lon - VIEWBOX_HALF_DEG,
        origin.lat + VIEWBOX_HALF_DEG,
        origin.lon + VIEWBOX_HALF_DEG,
        origin.lat - VIEWBOX_HALF_DEG,
    )
}

/// Parse a Nominatim result array, skipping entries that don't deserialize.
pub fn parse_nominatim_response(body: Value) -> Result<Vec<NominatimPlace>, ProviderError> {
    let items = match body {
        Value::Array(items) => items,
        _ => {
            return Err(ProviderError::InvalidResponse {
                provider: NOMINATIM_NAME,
                message: "expected a JSON array".into(),
            })
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(place) => Some(place),
            Err(e) => {
                debug!(provider = NOMINATIM_NAME, error = %e, "skipping malformed place");
                None
            }
        })
        .collect())
}

/// Fallback provider backed by Nominatim free-text search.
pub struct NominatimProvider {
    agent: ureq::Agent,
    endpoint: String,
    search_term: String,
    limit: u32,
}

impl NominatimProvider {
    pub fn new(
        endpoint: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
        search_term: impl Into<String>,
        limit: u32,
    ) -> Self {
        Self {
            agent: build_agent(user_agent, timeout),
            endpoint: endpoint.into(),
            search_term: search_term.into(),
            limit,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.nominatim_url.clone(),
            &settings.user_agent,
            settings.provider_timeout(),
            settings.fallback_search_term.clone(),
            settings.fallback_limit,
        )
    }

    fn fetch(&self, params: &[(&str, &str)]) -> Result<Vec<NominatimPlace>, ProviderError> {
        let mut request = self.agent.get(&self.endpoint);
        for (k, v) in params {
            request = request.query(k, v);
        }
        let response = request.call().map_err(|e| map_http_error(NOMINATIM_NAME, e))?;

        let body: Value = response.into_json().map_err(|e| ProviderError::InvalidResponse {
            provider: NOMINATIM_NAME,
            message: e.to_string(),
        })?;

        parse_nominatim_response(body)
    }

    /// Geocode a free-text address to the first candidate's coordinates.
    pub fn geocode(&self, address: &str) -> Result<Option<Coordinates>, ProviderError> {
        let places = self.fetch(&[("q", address), ("format", "json"), ("limit", "1")])?;
        Ok(places.first().and_then(|p| {
            let lat = p.lat.trim().parse::<f64>().ok()?;
            let lon = p.lon.trim().parse::<f64>().ok()?;
            Some(Coordinates::new(lat, lon))
        }))
    }
}

impl PoiProvider for NominatimProvider {
    fn name(&self) -> &'static str {
        NOMINATIM_NAME
    }

    fn search(&self, query: &PoiQuery) -> Result<Vec<RawPoi>, ProviderError> {
        let limit = self.limit.to_string();
        let viewbox = viewbox(&query.origin);
        let places = self.fetch(&[
            ("q", self.search_term.as_str()),
            ("format", "json"),
            ("limit", limit.as_str()),
            ("viewbox", viewbox.as_str()),
            ("bounded", "1"),
            ("addressdetails", "1"),
            ("extratags", "1"),
        ])?;
        Ok(places.into_iter().map(RawPoi::Nominatim).collect())
    }
}

// ─── HTTP plumbing ──────────────────────────────────────────────

fn build_agent(user_agent: &str, timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
}

fn map_http_error(provider: &'static str, err: ureq::Error) -> ProviderError {
    match err {
        ureq::Error::Status(429, _) => ProviderError::RateLimited { provider },
        ureq::Error::Status(status, _) => ProviderError::Status { provider, status },
        ureq::Error::Transport(t) => ProviderError::Network {
            provider,
            message: t.to_string(),
        },
    }
}

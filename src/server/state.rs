use crate::config::Settings;
use crate::discovery::{FacilityCache, FacilityFinder, NominatimProvider};
use crate::triage::TriageEngine;

/// Shared, request-independent services. Per-caller data (location,
/// discovered facilities) travels with each request.
pub struct AppState {
    pub finder: FacilityFinder,
    pub geocoder: NominatimProvider,
    pub engine: TriageEngine,
    pub default_radius_m: u32,
}

impl AppState {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            finder: FacilityFinder::from_settings(settings, FacilityCache::from_settings(settings)),
            geocoder: NominatimProvider::from_settings(settings),
            engine: TriageEngine::from_settings(settings),
            default_radius_m: settings.default_radius_m,
        }
    }
}

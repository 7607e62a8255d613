//! Facility discovery: cache → provider chain → normalize → sort → cache.
//!
//! Chain: Overpass → Nominatim ("hospital" search) → aggregate error
//!
//! The chain stops at the first provider that yields at least one usable
//! facility. A failed provider and an empty one both hand over to the next
//! provider; there are no retries.

use super::cache::FacilityCache;
use super::normalize::normalize_all;
use super::providers::{NominatimProvider, OverpassProvider, PoiProvider};
use super::types::{DiscoveryError, Facility, PoiQuery, ProviderFailure};
use crate::config::Settings;
use tracing::{debug, error, info, warn};

/// Discovers nearby facilities through an ordered provider chain.
pub struct FacilityFinder {
    providers: Vec<Box<dyn PoiProvider>>,
    cache: FacilityCache,
}

impl FacilityFinder {
    /// A finder with an empty chain; add providers in priority order.
    pub fn new(cache: FacilityCache) -> Self {
        Self {
            providers: Vec::new(),
            cache,
        }
    }

    /// Overpass as primary, Nominatim as fallback.
    pub fn from_settings(settings: &Settings, cache: FacilityCache) -> Self {
        Self::new(cache)
            .with_provider(OverpassProvider::from_settings(settings))
            .with_provider(NominatimProvider::from_settings(settings))
    }

    pub fn with_provider(mut self, provider: impl PoiProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn cache(&self) -> &FacilityCache {
        &self.cache
    }

    /// Facilities near the query point, nearest first.
    pub fn discover(&self, query: &PoiQuery) -> Result<Vec<Facility>, DiscoveryError> {
        query.validate()?;

        let key = FacilityCache::generate_key(
            query.origin.lat,
            query.origin.lon,
            query.radius_m,
            &query.category,
        );

        // 1. Cache
        if let Some(cached) = self.cache.get::<Vec<Facility>>(&key) {
            debug!(%key, count = cached.len(), "facility cache hit");
            return Ok(cached);
        }

        // 2. Provider chain
        let mut facilities: Vec<Facility> = Vec::new();
        let mut failures: Vec<ProviderFailure> = Vec::new();
        let mut any_success = false;
        let mut last_ok = false;

        for provider in &self.providers {
            match provider.search(query) {
                Ok(raw) => {
                    any_success = true;
                    last_ok = true;
                    let mut found = normalize_all(&raw, &query.origin);
                    info!(
                        provider = provider.name(),
                        raw = raw.len(),
                        usable = found.len(),
                        "provider responded"
                    );
                    if !found.is_empty() {
                        facilities.append(&mut found);
                        break;
                    }
                }
                Err(e) => {
                    last_ok = false;
                    if e.is_rate_limited() {
                        warn!(provider = provider.name(), "rate limited, trying next provider");
                    } else {
                        warn!(provider = provider.name(), error = %e, "provider failed, trying next provider");
                    }
                    failures.push((&e).into());
                }
            }
        }

        if !any_success {
            let err = DiscoveryError::AllProvidersFailed { failures };
            error!(error = %err, "facility discovery failed");
            return Err(err);
        }

        // 3. Sort (stable, so equal distances keep provider order)
        facilities.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));

        // 4. Cache only when the chain ended on a successful call
        if last_ok {
            self.cache.set(&key, &facilities);
        } else {
            warn!(%key, "last provider in chain failed; result not cached");
        }

        Ok(facilities)
    }
}

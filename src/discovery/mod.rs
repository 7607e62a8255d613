//! Nearby medical facility discovery.
//!
//! Queries Overpass for amenities around a point, falls back to Nominatim
//! search when Overpass fails or finds nothing, normalizes both schemas into
//! [`Facility`] and caches the sorted result under a quantized key.

pub mod cache;
pub mod normalize;
pub mod orchestrator;
pub mod providers;
pub mod types;

pub use cache::{CacheBackend, FacilityCache, FileBackend, MemoryBackend};
pub use orchestrator::FacilityFinder;
pub use providers::{NominatimProvider, OverpassProvider, PoiProvider, RawPoi};
pub use types::{DiscoveryError, Facility, FacilitySource, InputError, PoiQuery, ProviderError};

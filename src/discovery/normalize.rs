//! Provider record normalization into [`Facility`].
//!
//! Records without usable coordinates normalize to `None` and are dropped by
//! the caller; that is a per-record skip, not an error.

use super::providers::{NominatimPlace, OverpassElement, RawPoi};
use super::types::{Facility, FacilitySource};
use crate::geo::Coordinates;
use std::collections::BTreeMap;

const UNKNOWN_NAME: &str = "Unknown Facility";
const UNKNOWN_TYPE: &str = "unknown";

/// Dispatch on the record variant.
pub fn normalize(raw: &RawPoi, origin: &Coordinates) -> Option<Facility> {
    match raw {
        RawPoi::Overpass(el) => normalize_overpass(el, origin),
        RawPoi::Nominatim(place) => normalize_nominatim(place, origin),
    }
}

/// Normalize a batch, preserving provider order and dropping unusable records.
pub fn normalize_all(raw: &[RawPoi], origin: &Coordinates) -> Vec<Facility> {
    raw.iter().filter_map(|r| normalize(r, origin)).collect()
}

pub fn normalize_overpass(el: &OverpassElement, origin: &Coordinates) -> Option<Facility> {
    let (lat, lon) = match (el.lat, el.lon, &el.center) {
        (Some(lat), Some(lon), _) => (lat, lon),
        (_, _, Some(c)) => (c.lat, c.lon),
        _ => return None,
    };
    if !lat.is_finite() || !lon.is_finite() {
        return None;
    }

    let tags = &el.tags;
    let name = first_tag(tags, &["name", "name:en"]).unwrap_or(UNKNOWN_NAME);
    let kind = first_tag(tags, &["amenity"]).unwrap_or(UNKNOWN_TYPE);
    let phone = first_tag(tags, &["phone", "contact:phone", "emergency:phone"]);

    let coords = Coordinates::new(lat, lon);
    Some(Facility {
        id: format!("{}-{}", FacilitySource::Overpass.id_prefix(), el.id),
        name: name.to_string(),
        kind: kind.to_string(),
        coords,
        phone: phone.map(str::to_string),
        distance_m: origin.distance_to(&coords),
        source: FacilitySource::Overpass,
        services: extract_services(tags),
        raw_tags: tags.clone(),
    })
}

pub fn normalize_nominatim(place: &NominatimPlace, origin: &Coordinates) -> Option<Facility> {
    let lat: f64 = place.lat.trim().parse().ok()?;
    let lon: f64 = place.lon.trim().parse().ok()?;
    if !lat.is_finite() || !lon.is_finite() {
        return None;
    }

    let empty = BTreeMap::new();
    let extra = place.extratags.as_ref().unwrap_or(&empty);

    let name = first_tag(extra, &["name"])
        .or_else(|| non_empty(place.name.as_deref()))
        .unwrap_or_else(|| place.display_name.split(',').next().unwrap_or("").trim());
    let name = if name.is_empty() { UNKNOWN_NAME } else { name };

    let kind = non_empty(place.place_type.as_deref())
        .or_else(|| non_empty(place.place_class.as_deref()))
        .unwrap_or(UNKNOWN_TYPE);
    let phone = first_tag(extra, &["phone", "contact:phone"]);

    let coords = Coordinates::new(lat, lon);
    Some(Facility {
        id: format!("{}-{}", FacilitySource::Nominatim.id_prefix(), place.place_id),
        name: name.to_string(),
        kind: kind.to_string(),
        coords,
        phone: phone.map(str::to_string),
        distance_m: origin.distance_to(&coords),
        source: FacilitySource::Nominatim,
        services: Vec::new(),
        raw_tags: extra.clone(),
    })
}

/// Collect services from `healthcare:speciality` and `service:*=yes` tags.
pub fn extract_services(tags: &BTreeMap<String, String>) -> Vec<String> {
    let mut services: Vec<String> = Vec::new();
    let mut add = |raw: &str| {
        let formatted = format_service(raw);
        if !formatted.is_empty() && !services.contains(&formatted) {
            services.push(formatted);
        }
    };

    if let Some(spec) = tags.get("healthcare:speciality") {
        spec.split(';').for_each(&mut add);
    }

    for (key, value) in tags {
        if let Some(service) = key.strip_prefix("service:") {
            if value == "yes" {
                add(service);
            }
        }
    }

    if services.is_empty() && tags.get("amenity").map(String::as_str) == Some("pharmacy") {
        services.push("Pharmacy".to_string());
    }

    services
}

/// `general_practice` → `General Practice`.
pub fn format_service(raw: &str) -> String {
    raw.trim()
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_tag<'a>(tags: &'a BTreeMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| non_empty(tags.get(*k).map(String::as_str)))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::providers::OverpassCenter;

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn origin() -> Coordinates {
        Coordinates::new(40.7128, -74.0060)
    }

    fn node(id: i64, lat: Option<f64>, lon: Option<f64>, t: &[(&str, &str)]) -> OverpassElement {
        OverpassElement {
            id,
            element_type: Some("node".into()),
            lat,
            lon,
            center: None,
            tags: tags(t),
        }
    }

    fn place(id: u64, lat: &str, lon: &str) -> NominatimPlace {
        NominatimPlace {
            place_id: id,
            lat: lat.into(),
            lon: lon.into(),
            place_type: None,
            place_class: None,
            display_name: "St. Vincent Hospital, 7th Avenue, New York".into(),
            name: None,
            extratags: None,
        }
    }

    #[test]
    fn test_overpass_direct_coordinates() {
        let el = node(
            101,
            Some(40.7130),
            Some(-74.0070),
            &[("amenity", "hospital"), ("name", "Mercy General"), ("phone", "+1 555 0100")],
        );
        let f = normalize_overpass(&el, &origin()).unwrap();
        assert_eq!(f.id, "overpass-101");
        assert_eq!(f.name, "Mercy General");
        assert_eq!(f.kind, "hospital");
        assert_eq!(f.phone.as_deref(), Some("+1 555 0100"));
        assert_eq!(f.source, FacilitySource::Overpass);
        assert!(f.distance_m > 0.0 && f.distance_m < 200.0);
        assert_eq!(f.raw_tags["name"], "Mercy General");
    }

    #[test]
    fn test_overpass_center_coordinates() {
        let mut el = node(7, None, None, &[("amenity", "clinic")]);
        el.element_type = Some("way".into());
        el.center = Some(OverpassCenter { lat: 40.72, lon: -74.01 });
        let f = normalize_overpass(&el, &origin()).unwrap();
        assert_eq!(f.coords, Coordinates::new(40.72, -74.01));
    }

    #[test]
    fn test_overpass_without_coordinates_is_dropped() {
        let el = node(8, Some(40.0), None, &[("amenity", "clinic")]);
        assert!(normalize_overpass(&el, &origin()).is_none());
    }

    #[test]
    fn test_overpass_name_and_type_fallbacks() {
        let el = node(9, Some(1.0), Some(1.0), &[("name:en", "Riverside Clinic")]);
        let f = normalize_overpass(&el, &origin()).unwrap();
        assert_eq!(f.name, "Riverside Clinic");
        assert_eq!(f.kind, "unknown");

        let bare = node(10, Some(1.0), Some(1.0), &[]);
        let f = normalize_overpass(&bare, &origin()).unwrap();
        assert_eq!(f.name, "Unknown Facility");
        assert!(f.phone.is_none());
    }

    #[test]
    fn test_overpass_phone_precedence() {
        let el = node(
            11,
            Some(1.0),
            Some(1.0),
            &[("contact:phone", "222"), ("emergency:phone", "333")],
        );
        assert_eq!(normalize_overpass(&el, &origin()).unwrap().phone.as_deref(), Some("222"));

        let el = node(12, Some(1.0), Some(1.0), &[("emergency:phone", "333")]);
        assert_eq!(normalize_overpass(&el, &origin()).unwrap().phone.as_deref(), Some("333"));
    }

    #[test]
    fn test_services_from_speciality_and_service_tags() {
        let t = tags(&[
            ("amenity", "hospital"),
            ("healthcare:speciality", "general;emergency;general"),
            ("service:emergency", "yes"),
            ("service:intensive_care", "yes"),
            ("service:dialysis", "no"),
        ]);
        assert_eq!(
            extract_services(&t),
            vec!["General", "Emergency", "Intensive Care"]
        );
    }

    #[test]
    fn test_pharmacy_default_service() {
        assert_eq!(extract_services(&tags(&[("amenity", "pharmacy")])), vec!["Pharmacy"]);
        assert!(extract_services(&tags(&[("amenity", "clinic")])).is_empty());
        assert_eq!(
            extract_services(&tags(&[("amenity", "pharmacy"), ("service:vaccination", "yes")])),
            vec!["Vaccination"]
        );
    }

    #[test]
    fn test_format_service() {
        assert_eq!(format_service("general_practice"), "General Practice");
        assert_eq!(format_service("ENT"), "ENT");
        assert_eq!(format_service(" cardiology "), "Cardiology");
        assert_eq!(format_service(""), "");
    }

    #[test]
    fn test_nominatim_name_from_display_name() {
        let p = place(55, "40.7", "-74.0");
        let f = normalize_nominatim(&p, &origin()).unwrap();
        assert_eq!(f.id, "nominatim-55");
        assert_eq!(f.name, "St. Vincent Hospital");
        assert_eq!(f.kind, "unknown");
        assert!(f.services.is_empty());
        assert_eq!(f.source, FacilitySource::Nominatim);
    }

    #[test]
    fn test_nominatim_name_and_phone_precedence() {
        let mut p = place(56, "40.7", "-74.0");
        p.name = Some("Top Level".into());
        p.place_class = Some("amenity".into());
        p.extratags = Some(tags(&[("name", "Extra Name"), ("contact:phone", "444")]));
        let f = normalize_nominatim(&p, &origin()).unwrap();
        assert_eq!(f.name, "Extra Name");
        assert_eq!(f.kind, "amenity");
        assert_eq!(f.phone.as_deref(), Some("444"));
        assert_eq!(f.raw_tags["contact:phone"], "444");

        p.extratags = None;
        p.place_type = Some("hospital".into());
        let f = normalize_nominatim(&p, &origin()).unwrap();
        assert_eq!(f.name, "Top Level");
        assert_eq!(f.kind, "hospital");
        assert!(f.phone.is_none());
    }

    #[test]
    fn test_nominatim_bad_coordinates_dropped() {
        assert!(normalize_nominatim(&place(1, "abc", "-74.0"), &origin()).is_none());
        assert!(normalize_nominatim(&place(2, "40.7", ""), &origin()).is_none());
    }

    #[test]
    fn test_normalize_all_drops_unusable() {
        let raw = vec![
            RawPoi::Overpass(node(1, Some(40.71), Some(-74.0), &[])),
            RawPoi::Overpass(node(2, None, None, &[])),
            RawPoi::Nominatim(place(3, "40.72", "-74.0")),
            RawPoi::Nominatim(place(4, "x", "y")),
        ];
        let ids: Vec<String> = normalize_all(&raw, &origin()).into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["overpass-1", "nominatim-3"]);
    }
}

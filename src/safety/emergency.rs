//! Emergency number resolution by country.
//!
//! Resolution order: exact table entry → EU member state (112) → universal
//! fallback (112, 911). The first number is the one to dial.

const EU_NUMBERS: &[&str] = &["112"];
const UNIVERSAL_NUMBERS: &[&str] = &["112", "911"];

/// Countries with their own table entry.
const EMERGENCY_NUMBERS: &[(&str, &[&str])] = &[
    ("US", &["911"]),
    ("CA", &["911"]),
    ("MX", &["911"]),
    ("GB", &["999", "112"]),
    ("UK", &["999", "112"]),
    ("IE", &["112", "999"]),
    ("EU", EU_NUMBERS),
    ("IN", &["112", "102", "108"]),
    ("AU", &["000", "112"]),
    ("NZ", &["111"]),
    ("JP", &["119", "110"]),
    ("CN", &["120", "110"]),
    ("BR", &["192", "190"]),
    ("ZA", &["10177", "112"]),
];

/// EU member states without a dedicated entry above.
const EU_MEMBERS: &[&str] = &[
    "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IT", "LV",
    "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
];

/// Dialable emergency numbers for an ISO 3166-1 alpha-2 code. Never empty.
pub fn resolve(country_code: Option<&str>) -> Vec<String> {
    let numbers = country_code
        .map(|cc| cc.trim().to_uppercase())
        .and_then(|cc| lookup(&cc))
        .unwrap_or(UNIVERSAL_NUMBERS);
    numbers.iter().map(|n| n.to_string()).collect()
}

fn lookup(cc: &str) -> Option<&'static [&'static str]> {
    if let Some((_, numbers)) = EMERGENCY_NUMBERS.iter().find(|(code, _)| *code == cc) {
        return Some(*numbers);
    }
    if EU_MEMBERS.contains(&cc) {
        return Some(EU_NUMBERS);
    }
    None
}
